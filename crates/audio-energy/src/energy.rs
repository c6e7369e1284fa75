//! RMS Energy Computation

use audio_ring::{AudioConsumer, Sample};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Default frame length (160 samples = 10 ms at 16 kHz)
pub const DEFAULT_FRAME_SAMPLES: usize = 160;

/// Root-mean-square of a window of samples.
///
/// No DC offset is removed. The sum of squares is accumulated in `f64`, so
/// any window that fits in memory is safe from overflow. An empty window
/// has zero energy.
pub fn rms(window: &[Sample]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = window
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();

    (sum_sq / window.len() as f64).sqrt()
}

/// Energy reducer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Samples per frame (default: 160)
    pub frame_samples: usize,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            frame_samples: DEFAULT_FRAME_SAMPLES,
        }
    }
}

/// Counters kept by the reducer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReducerStats {
    /// Frames reduced to an energy value
    pub frames_reduced: u64,
    /// Calls that found less than a frame buffered
    pub frames_missed: u64,
}

/// Pops whole frames from the audio ring and reduces each one to RMS
pub struct EnergyReducer {
    consumer: AudioConsumer,
    /// Pre-allocated frame scratch space
    frame: Box<[Sample]>,
    stats: ReducerStats,
}

impl EnergyReducer {
    /// Create a reducer owning the consumer side of the ring.
    ///
    /// The frame length is clamped to what the ring can ever hold.
    pub fn new(consumer: AudioConsumer, config: &EnergyConfig) -> Self {
        let frame_samples = config.frame_samples.clamp(1, consumer.max_window());
        if frame_samples != config.frame_samples {
            debug!(
                "Frame length {} clamped to {} for ring capacity {}",
                config.frame_samples,
                frame_samples,
                consumer.capacity()
            );
        }

        Self {
            consumer,
            frame: vec![0; frame_samples].into_boxed_slice(),
            stats: ReducerStats::default(),
        }
    }

    /// Reduce the next buffered frame.
    ///
    /// Returns `None` without consuming anything when less than one frame
    /// is buffered.
    pub fn next_energy(&mut self) -> Option<f32> {
        match self.consumer.pop_window(&mut self.frame) {
            Ok(_) => {
                self.stats.frames_reduced += 1;
                Some(rms(&self.frame) as f32)
            }
            Err(e) => {
                trace!("No audio frame this tick: {}", e);
                self.stats.frames_missed += 1;
                None
            }
        }
    }

    /// Samples per frame
    pub fn frame_samples(&self) -> usize {
        self.frame.len()
    }

    /// Samples currently waiting in the ring
    pub fn available(&self) -> usize {
        self.consumer.available()
    }

    /// Samples the ring has dropped on overflow
    pub fn dropped_samples(&self) -> usize {
        self.consumer.dropped()
    }

    /// Get reducer counters
    pub fn stats(&self) -> ReducerStats {
        self.stats
    }
}
