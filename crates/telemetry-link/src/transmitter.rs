//! Resumable Chunked Transmitter
//!
//! Holds at most one pending record for the constrained link and pushes it
//! out across as many polls as the link needs:
//!
//! ```text
//!   Idle ──begin──▶ Sending ──body done──▶ AwaitingTerminator ──"\n"──▶ Idle
//!     ▲                │                         │
//!     └── stall / disconnect (pending dropped) ──┘
//! ```

use crate::backoff::write_some;
use crate::channel::ConstrainedChannel;
use crate::config::TransmitterConfig;
use record_codec::{CONSTRAINED_TERMINATOR, MAX_RECORD_LEN};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Transmitter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Nothing pending
    Idle,
    /// Body partially sent
    Sending,
    /// Body sent, terminator not yet accepted
    AwaitingTerminator,
}

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was pending
    Idle,
    /// Some bytes were accepted, record still pending
    Progress { sent: usize, total: usize },
    /// Link accepted nothing this attempt
    Backpressure { sent: usize, total: usize },
    /// Body and terminator fully sent
    Delivered,
    /// No progress within the stall timeout; record dropped, cooldown started
    Stalled,
    /// Link went down; record dropped
    Disconnected,
}

/// Transmitter counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitterStats {
    /// Records accepted by `begin`
    pub started: u64,
    /// Records fully delivered
    pub delivered: u64,
    /// Records dropped by stall timeout
    pub stalled: u64,
    /// Records dropped by disconnect
    pub disconnected: u64,
    /// Body bytes accepted by the link
    pub bytes_sent: u64,
}

/// The single in-flight record
struct Pending {
    body: [u8; MAX_RECORD_LEN],
    total: usize,
    sent: usize,
    terminator_sent: bool,
}

impl Pending {
    fn state(&self) -> TxState {
        if self.sent < self.total {
            TxState::Sending
        } else {
            TxState::AwaitingTerminator
        }
    }
}

/// Resumable, stall-aware sender for the constrained link
pub struct Transmitter {
    config: TransmitterConfig,
    pending: Option<Pending>,
    /// Last time the pending record made progress (or was started)
    last_progress: Instant,
    /// No new record may start before this instant
    cooldown_until: Option<Instant>,
    stats: TransmitterStats,
}

impl Transmitter {
    /// Create an idle transmitter
    pub fn new(config: TransmitterConfig) -> Self {
        debug!("Creating transmitter with config: {:?}", config);
        Self {
            config,
            pending: None,
            last_progress: Instant::now(),
            cooldown_until: None,
            stats: TransmitterStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> TxState {
        self.pending.as_ref().map_or(TxState::Idle, Pending::state)
    }

    /// Check if nothing is pending
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// `(sent, total)` of the pending record
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.pending.as_ref().map(|p| (p.sent, p.total))
    }

    /// Body of the pending record
    pub fn pending_body(&self) -> Option<&[u8]> {
        self.pending.as_ref().map(|p| &p.body[..p.total])
    }

    /// Time left before a new record may start after a stall
    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        self.cooldown_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    /// Whether `begin` would accept a record at `now`
    pub fn can_begin(&self, now: Instant) -> bool {
        self.is_idle() && self.cooldown_remaining(now).is_zero()
    }

    /// Take a copy of `body` as the new pending record.
    ///
    /// Returns false when a record is already pending or the post-stall
    /// cooldown has not elapsed. Bodies longer than a record are cut.
    pub fn begin(&mut self, body: &[u8]) -> bool {
        let now = Instant::now();
        if !self.can_begin(now) {
            return false;
        }

        let total = body.len().min(MAX_RECORD_LEN);
        let mut pending = Pending {
            body: [0; MAX_RECORD_LEN],
            total,
            sent: 0,
            terminator_sent: false,
        };
        pending.body[..total].copy_from_slice(&body[..total]);

        self.pending = Some(pending);
        self.cooldown_until = None;
        self.last_progress = now;
        self.stats.started += 1;
        true
    }

    /// Drop whatever is pending because the link went down.
    ///
    /// Returns true if a record was discarded.
    pub fn reset_on_disconnect(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                info!(
                    "Link disconnected, dropping pending record ({}/{} bytes sent)",
                    pending.sent, pending.total
                );
                self.stats.disconnected += 1;
                self.last_progress = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Give up on the pending record and hold off new ones for the cooldown.
    ///
    /// Stall timer and cooldown change together with the move to `Idle`.
    fn drop_stalled(&mut self, now: Instant) {
        self.pending = None;
        self.last_progress = now;
        self.cooldown_until = Some(now + self.config.cooldown());
        self.stats.stalled += 1;
    }

    /// Make one bounded attempt to move the pending record forward.
    ///
    /// Writes the unsent body within the body budget; once the body is
    /// complete (possibly in this same poll) writes the terminator within
    /// its own budget.
    pub async fn poll<C>(&mut self, channel: &mut C) -> PollOutcome
    where
        C: ConstrainedChannel + ?Sized,
    {
        let Some(mut pending) = self.pending.take() else {
            return PollOutcome::Idle;
        };

        if !channel.is_connected() {
            self.pending = Some(pending);
            self.reset_on_disconnect();
            return PollOutcome::Disconnected;
        }

        let mut progressed = false;

        if pending.sent < pending.total {
            let written = write_some(
                &mut *channel,
                &pending.body[pending.sent..pending.total],
                self.config.body_budget(),
                &self.config.backoff,
            )
            .await;
            if written > 0 {
                pending.sent += written;
                self.stats.bytes_sent += written as u64;
                progressed = true;
                debug!("Sent {} bytes ({}/{})", written, pending.sent, pending.total);
            }
        }

        if pending.sent == pending.total {
            let written = write_some(
                &mut *channel,
                CONSTRAINED_TERMINATOR,
                self.config.terminator_budget(),
                &self.config.backoff,
            )
            .await;
            pending.terminator_sent = written == CONSTRAINED_TERMINATOR.len();
        }

        let now = Instant::now();
        if pending.terminator_sent {
            self.last_progress = now;
            self.stats.delivered += 1;
            debug!("Record delivered ({} bytes)", pending.total);
            return PollOutcome::Delivered;
        }

        if !channel.is_connected() {
            self.pending = Some(pending);
            self.reset_on_disconnect();
            return PollOutcome::Disconnected;
        }

        if progressed {
            self.last_progress = now;
        } else if now.saturating_duration_since(self.last_progress) >= self.config.stall_timeout() {
            warn!(
                "No link progress for {:?}, dropping record ({}/{} bytes sent), cooling down {:?}",
                now.saturating_duration_since(self.last_progress),
                pending.sent,
                pending.total,
                self.config.cooldown()
            );
            self.drop_stalled(now);
            return PollOutcome::Stalled;
        }

        let (sent, total) = (pending.sent, pending.total);
        self.pending = Some(pending);
        if progressed {
            PollOutcome::Progress { sent, total }
        } else {
            PollOutcome::Backpressure { sent, total }
        }
    }

    /// Get transmitter counters
    pub fn stats(&self) -> TransmitterStats {
        self.stats
    }

    /// Get the configuration
    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }
}

impl Default for Transmitter {
    fn default() -> Self {
        Self::new(TransmitterConfig::default())
    }
}
