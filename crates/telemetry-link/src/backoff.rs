//! Bounded write with exponential backoff

use crate::channel::ConstrainedChannel;
use crate::config::BackoffPolicy;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Write as much of `bytes` as the channel takes within `budget`.
///
/// Zero-byte writes are retried after a backoff that doubles up to the
/// policy cap; any progress resets it. The attempt ends when everything is
/// written, the budget is spent, or the channel reports disconnected.
/// Backoff sleeps are clipped to the remaining budget. Returns the number of
/// bytes accepted, which may be 0.
pub async fn write_some<C>(
    channel: &mut C,
    bytes: &[u8],
    budget: Duration,
    policy: &BackoffPolicy,
) -> usize
where
    C: ConstrainedChannel + ?Sized,
{
    let start = Instant::now();
    let mut written = 0;
    let mut backoff = policy.initial();

    while written < bytes.len() {
        let remaining = budget.saturating_sub(start.elapsed());
        if remaining.is_zero() || !channel.is_connected() {
            break;
        }

        let accepted = channel.write(&bytes[written..]).min(bytes.len() - written);
        if accepted > 0 {
            written += accepted;
            backoff = policy.initial();
        } else {
            sleep(backoff.min(remaining)).await;
            backoff = (backoff * 2).min(policy.max());
        }
    }

    written
}
