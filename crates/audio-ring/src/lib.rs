//! Lock-Free Audio Ring Buffer
//!
//! Provides the SPSC hand-off between the audio capture callback (interrupt
//! context) and the cooperative sampling loop.

mod buffer;
mod error;

pub use buffer::{AudioConsumer, AudioProducer, AudioRing, DEFAULT_CAPACITY};
pub use error::RingError;

/// Signed 16-bit PCM amplitude as delivered by the microphone
pub type Sample = i16;

/// Microphone sample rate in Hz
pub const SAMPLE_RATE_HZ: u32 = 16_000;
