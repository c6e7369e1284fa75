//! Transmitter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff between zero-byte writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// First delay after a zero-byte write (milliseconds)
    pub initial_ms: u64,
    /// Delay cap (milliseconds)
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 1,
            max_ms: 32,
        }
    }
}

impl BackoffPolicy {
    /// First delay, never below 1 ms so the retry loop cannot spin
    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms.max(1))
    }

    /// Delay cap, never below the first delay
    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms.max(self.initial_ms).max(1))
    }
}

/// Resumable transmitter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitterConfig {
    /// Time budget for one body write attempt (milliseconds)
    pub body_budget_ms: u64,
    /// Time budget for one terminator write attempt (milliseconds)
    pub terminator_budget_ms: u64,
    /// No progress for this long drops the pending record (milliseconds)
    pub stall_timeout_ms: u64,
    /// Pause after a stall drop before a new record may start (milliseconds)
    pub cooldown_ms: u64,
    /// Retry backoff inside an attempt
    pub backoff: BackoffPolicy,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            body_budget_ms: 120,
            terminator_budget_ms: 100,
            stall_timeout_ms: 3000,
            cooldown_ms: 200,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl TransmitterConfig {
    /// Budget for one body write attempt
    pub fn body_budget(&self) -> Duration {
        Duration::from_millis(self.body_budget_ms)
    }

    /// Budget for one terminator write attempt
    pub fn terminator_budget(&self) -> Duration {
        Duration::from_millis(self.terminator_budget_ms)
    }

    /// Time without progress before the pending record is dropped
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    /// Pause after a stall drop
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}
