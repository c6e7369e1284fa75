//! Dual-Channel Telemetry Scheduler
//!
//! Samples motion and audio at a fixed cadence, writes every record to the
//! reliable channel, and offers a throttled subset to the constrained link.

mod scheduler;
mod sensor;

pub use scheduler::{DualChannelScheduler, SchedulerConfig, SchedulerStats, TickReport};
pub use sensor::{MotionSensor, SensorError};
