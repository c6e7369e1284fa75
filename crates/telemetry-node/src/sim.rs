//! Simulated collaborators for running the pipeline on a host
//!
//! Pseudo-random values are derived by hashing a seed with a counter, so a
//! given seed always produces the same sensor and link behaviour.

use crate::config::SimConfig;
use audio_ring::{AudioProducer, Sample, SAMPLE_RATE_HZ};
use record_codec::{parse_record, LineAssembler, MotionSample};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use telemetry_link::ConstrainedChannel;
use telemetry_scheduler::{MotionSensor, SensorError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

fn hash3(seed: u64, counter: u64, salt: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    counter.hash(&mut hasher);
    salt.hash(&mut hasher);
    hasher.finish()
}

/// Map a hash to `[-1.0, 1.0]`
fn unit(hash: u64) -> f32 {
    (hash % 2001) as f32 / 1000.0 - 1.0
}

/// IMU that reports a device lying flat with a little noise
pub struct SimulatedImu {
    seed: u64,
    reads: u64,
    fail_every: u64,
    recoveries: u64,
}

impl SimulatedImu {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            seed: config.seed,
            reads: 0,
            fail_every: config.imu_fail_every,
            recoveries: 0,
        }
    }

    /// Recovery attempts made so far
    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }
}

impl MotionSensor for SimulatedImu {
    fn read(&mut self) -> Result<MotionSample, SensorError> {
        self.reads += 1;
        if self.fail_every > 0 && self.reads % self.fail_every == 0 {
            return Err(SensorError::Read(format!("simulated fault on read {}", self.reads)));
        }

        let n = |axis: u64| unit(hash3(self.seed, self.reads, axis));
        Ok(MotionSample {
            accel: [0.02 * n(0), 0.02 * n(1), 1.0 + 0.01 * n(2)],
            gyro: [0.5 * n(3), 0.5 * n(4), 0.5 * n(5)],
            temperature_c: 25.0 + 0.25 * n(6),
        })
    }

    fn recover(&mut self) -> Result<(), SensorError> {
        self.recoveries += 1;
        debug!("Simulated IMU re-initialized");
        Ok(())
    }
}

/// Microphone thread feeding a tone into the audio ring in 10 ms blocks
pub struct AudioSource {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl AudioSource {
    /// Start producing into `producer`
    pub fn spawn(mut producer: AudioProducer, config: &SimConfig) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let tone_hz = config.tone_hz;
        let amplitude = config.tone_amplitude.clamp(0.0, Sample::MAX as f32);
        let seed = config.seed;

        let handle = std::thread::Builder::new()
            .name("audio-source".to_string())
            .spawn(move || {
                let block = (SAMPLE_RATE_HZ / 100) as usize;
                let mut frame: Vec<Sample> = vec![0; block];
                let mut n: u64 = 0;

                while !flag.load(Ordering::Relaxed) {
                    for sample in frame.iter_mut() {
                        let t = n as f32 / SAMPLE_RATE_HZ as f32;
                        let tone = amplitude * (2.0 * std::f32::consts::PI * tone_hz * t).sin();
                        let noise = 50.0 * unit(hash3(seed, n, 99));
                        *sample = (tone + noise) as Sample;
                        n += 1;
                    }
                    producer.push_slice(&frame);
                    std::thread::sleep(Duration::from_millis(10));
                }
                n
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and return the number of samples produced
    pub fn stop(mut self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(samples)) => samples,
            Some(Err(_)) => {
                warn!("Audio source thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for AudioSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// What the simulated peer received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    /// Bytes accepted from the sender
    pub bytes: u64,
    /// Complete lines that parsed as records
    pub records: u64,
    /// Complete lines that did not parse
    pub malformed: u64,
    /// Writes refused because of congestion
    pub refused: u64,
}

/// Lossy short-range radio link with a receiving peer on the other end.
///
/// Writes are cut to the configured chunk size, sometimes refused, and
/// occasionally drop the connection for a while. The peer reassembles
/// lines and checks that each one parses.
pub struct SimulatedLink {
    seed: u64,
    writes: u64,
    chunk: usize,
    congestion_pct: u32,
    drop_per_mille: u32,
    outage: Duration,
    down_until: Option<Instant>,
    disconnects: u64,
    peer: LineAssembler,
    stats: PeerStats,
}

impl SimulatedLink {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            seed: config.seed,
            writes: 0,
            chunk: config.link_chunk.max(1),
            congestion_pct: config.link_congestion_pct.min(100),
            drop_per_mille: config.link_drop_per_mille.min(1000),
            outage: Duration::from_millis(config.link_outage_ms),
            down_until: None,
            disconnects: 0,
            peer: LineAssembler::default(),
            stats: PeerStats::default(),
        }
    }

    /// Peer-side counters
    pub fn stats(&self) -> PeerStats {
        self.stats
    }

    fn receive(&mut self, bytes: &[u8]) {
        self.stats.bytes += bytes.len() as u64;
        for line in self.peer.extend(bytes) {
            match parse_record(&line) {
                Ok(reading) => {
                    self.stats.records += 1;
                    debug!("Peer received record at {} ms", reading.timestamp_ms);
                }
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!("Peer received malformed line {:?}: {}", line, e);
                }
            }
        }
    }
}

impl ConstrainedChannel for SimulatedLink {
    fn write(&mut self, bytes: &[u8]) -> usize {
        if !self.is_connected() {
            return 0;
        }
        self.writes += 1;
        let roll = hash3(self.seed, self.writes, 7);

        if (roll % 1000) < self.drop_per_mille as u64 {
            self.disconnects += 1;
            self.down_until = Some(Instant::now() + self.outage);
            // The peer loses any partial line with the connection.
            self.peer.reset();
            info!("Simulated link dropped for {:?}", self.outage);
            return 0;
        }
        if ((roll >> 16) % 100) < self.congestion_pct as u64 {
            self.stats.refused += 1;
            return 0;
        }

        let n = bytes.len().min(self.chunk);
        self.receive(&bytes[..n]);
        n
    }

    fn is_connected(&self) -> bool {
        self.down_until.map_or(true, |until| Instant::now() >= until)
    }

    fn disconnect_count(&self) -> u64 {
        self.disconnects
    }
}
