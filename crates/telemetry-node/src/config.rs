//! Node configuration
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `TELEMETRY__*` environment variables (`__` separates nested keys, e.g.
//! `TELEMETRY__SCHEDULER__LINK_THROTTLE_MS=200`).

use audio_energy::EnergyConfig;
use serde::{Deserialize, Serialize};
use telemetry_scheduler::SchedulerConfig;
use thiserror::Error;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "telemetry-node.toml";

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Max level: trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Simulated collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the pseudo-random sensor and link behaviour
    pub seed: u64,
    /// Every Nth IMU read fails (0 = never)
    pub imu_fail_every: u64,
    /// Tone frequency of the simulated microphone (Hz)
    pub tone_hz: f32,
    /// Peak amplitude of the simulated tone
    pub tone_amplitude: f32,
    /// Largest chunk the simulated link accepts per write (bytes)
    pub link_chunk: usize,
    /// Chance that a write is refused outright (percent)
    pub link_congestion_pct: u32,
    /// Chance that a write drops the connection (per mille)
    pub link_drop_per_mille: u32,
    /// How long a dropped link stays down (milliseconds)
    pub link_outage_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            imu_fail_every: 0,
            tone_hz: 440.0,
            tone_amplitude: 3000.0,
            link_chunk: 20,
            link_congestion_pct: 10,
            link_drop_per_mille: 2,
            link_outage_ms: 500,
        }
    }
}

/// Top-level node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Audio ring capacity in samples
    pub ring_capacity: usize,
    /// Stop after this many seconds (0 = run until interrupted)
    pub run_seconds: u64,
    pub log: LogConfig,
    pub energy: EnergyConfig,
    pub scheduler: SchedulerConfig,
    pub sim: SimConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ring_capacity: audio_ring::DEFAULT_CAPACITY,
            run_seconds: 0,
            log: LogConfig::default(),
            energy: EnergyConfig::default(),
            scheduler: SchedulerConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from `path` (optional file) and the environment
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("TELEMETRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: NodeConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_capacity < 2 {
            return Err(ConfigError::Invalid(format!(
                "ring_capacity must be at least 2, got {}",
                self.ring_capacity
            )));
        }
        if self.energy.frame_samples == 0 {
            return Err(ConfigError::Invalid("energy.frame_samples must be positive".to_string()));
        }
        if self.scheduler.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("scheduler.tick_period_ms must be positive".to_string()));
        }
        if self.sim.link_chunk == 0 {
            return Err(ConfigError::Invalid("sim.link_chunk must be positive".to_string()));
        }
        Ok(())
    }
}
