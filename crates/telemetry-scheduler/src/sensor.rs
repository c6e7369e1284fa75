//! Motion Sensor Interface

use record_codec::MotionSample;
use thiserror::Error;

/// Motion sensor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("motion sensor not initialized")]
    NotInitialized,

    #[error("motion sensor read failed: {0}")]
    Read(String),
}

/// Pull interface to the IMU
pub trait MotionSensor {
    /// Read the current acceleration, angular rate and temperature
    fn read(&mut self) -> Result<MotionSample, SensorError>;

    /// Try to bring a failing sensor back. Called at a slow, fixed pace
    /// while reads keep failing.
    fn recover(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

impl<T: MotionSensor + ?Sized> MotionSensor for Box<T> {
    fn read(&mut self) -> Result<MotionSample, SensorError> {
        (**self).read()
    }

    fn recover(&mut self) -> Result<(), SensorError> {
        (**self).recover()
    }
}
