//! Telemetry Node
//!
//! Wires the telemetry pipeline to simulated hardware so it can run on a
//! host: a seeded IMU, a tone-generating microphone thread, a lossy radio
//! link with a parsing peer, and any `Write` sink as the reliable channel.

pub mod config;
pub mod sim;

use anyhow::{Context, Result};
use audio_energy::EnergyReducer;
use audio_ring::AudioRing;
use std::future::Future;
use std::io::Write;
use telemetry_link::TransmitterStats;
use telemetry_scheduler::{DualChannelScheduler, SchedulerStats};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub use crate::config::{LogConfig, NodeConfig, SimConfig};
pub use sim::{AudioSource, PeerStats, SimulatedImu, SimulatedLink};

/// Initialize logging.
///
/// Logs go to stderr; stdout carries the reliable record stream.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let level: Level = config
        .level
        .parse()
        .with_context(|| format!("unknown log level {:?}", config.level))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// End-of-run totals
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub scheduler: SchedulerStats,
    pub link: TransmitterStats,
    pub peer: PeerStats,
    /// Audio samples produced by the microphone thread
    pub audio_samples: u64,
    /// Audio samples overwritten before they were read
    pub audio_dropped: usize,
}

/// Run the pipeline until `shutdown` completes.
///
/// Every record goes to `reliable` as a CRLF-terminated line, preceded by
/// the CSV header.
pub async fn run_node<W, F>(config: &NodeConfig, mut reliable: W, shutdown: F) -> Result<RunSummary>
where
    W: Write,
    F: Future<Output = ()>,
{
    config.validate()?;

    let ring = AudioRing::new(config.ring_capacity)?;
    let (producer, consumer) = ring.split();
    let reducer = EnergyReducer::new(consumer, &config.energy);

    write!(reliable, "{}\r\n", record_codec::CSV_HEADER).context("writing CSV header")?;

    let source = AudioSource::spawn(producer, &config.sim).context("starting audio source")?;
    let mut scheduler = DualChannelScheduler::new(
        config.scheduler.clone(),
        SimulatedImu::new(&config.sim),
        reducer,
        reliable,
        SimulatedLink::new(&config.sim),
    );

    let stats = scheduler.run(shutdown).await;
    let audio_samples = source.stop();

    let summary = RunSummary {
        scheduler: stats,
        link: scheduler.transmitter().stats(),
        peer: scheduler.link().stats(),
        audio_samples,
        audio_dropped: scheduler.reducer().dropped_samples(),
    };

    info!(
        "Run complete: {} records, {} admitted to link, {} delivered, {} stalled, {} dropped on disconnect",
        summary.scheduler.records,
        summary.scheduler.admitted,
        summary.link.delivered,
        summary.link.stalled,
        summary.link.disconnected
    );
    info!(
        "Peer received {} records ({} malformed); audio {} samples, {} overwritten",
        summary.peer.records, summary.peer.malformed, summary.audio_samples, summary.audio_dropped
    );

    Ok(summary)
}
