//! Constrained Link Transmission
//!
//! Delivers one record at a time over a link that may accept only part of
//! a write, accept nothing for a while, or drop the connection. Each poll
//! does a bounded amount of work so the sampling loop is never held up.

mod backoff;
mod channel;
mod config;
mod transmitter;

pub use backoff::write_some;
pub use channel::{ConstrainedChannel, MockChannel};
pub use config::{BackoffPolicy, TransmitterConfig};
pub use transmitter::{PollOutcome, Transmitter, TransmitterStats, TxState};
