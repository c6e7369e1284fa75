//! Audio Energy Reduction
//!
//! Reduces fixed-size audio frames to a single RMS energy value per frame.

mod energy;

pub use energy::{rms, EnergyConfig, EnergyReducer, ReducerStats, DEFAULT_FRAME_SAMPLES};
