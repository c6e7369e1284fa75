//! Ring Buffer Error Types

use thiserror::Error;

/// Errors reported by the audio ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// Capacity too small to hold any sample (one slot is always reserved)
    #[error("ring capacity {0} is too small, need at least 2 slots")]
    InvalidCapacity(usize),

    /// Fewer samples buffered than the requested window
    #[error("insufficient data: {available} samples available, {requested} requested")]
    InsufficientData { available: usize, requested: usize },

    /// Requested window can never be satisfied by this ring
    #[error("window of {requested} samples exceeds ring limit of {max}")]
    WindowTooLarge { requested: usize, max: usize },
}
