//! Sensor Reading Types

use serde::{Deserialize, Serialize};

/// One IMU snapshot as returned by the motion sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Acceleration X/Y/Z (g)
    pub accel: [f32; 3],
    /// Angular rate X/Y/Z (deg/s)
    pub gyro: [f32; 3],
    /// Die temperature (Celsius)
    pub temperature_c: f32,
}

/// A timestamped reading, created once per sampling tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Milliseconds since the sampling loop started
    pub timestamp_ms: u64,
    /// Acceleration X/Y/Z (g)
    pub accel: [f32; 3],
    /// Angular rate X/Y/Z (deg/s)
    pub gyro: [f32; 3],
    /// Temperature (Celsius)
    pub temperature_c: f32,
    /// RMS of one audio frame, `None` if no full frame was buffered
    pub audio_rms: Option<f32>,
}

impl Reading {
    /// Combine a motion snapshot with the tick's audio energy
    pub fn new(timestamp_ms: u64, motion: MotionSample, audio_rms: Option<f32>) -> Self {
        Self {
            timestamp_ms,
            accel: motion.accel,
            gyro: motion.gyro,
            temperature_c: motion.temperature_c,
            audio_rms,
        }
    }

    /// Motion part of the reading
    pub fn motion(&self) -> MotionSample {
        MotionSample {
            accel: self.accel,
            gyro: self.gyro,
            temperature_c: self.temperature_c,
        }
    }
}
