//! Dual-Channel Scheduler Implementation

use crate::sensor::{MotionSensor, SensorError};
use audio_energy::EnergyReducer;
use record_codec::{Reading, Record, RELIABLE_TERMINATOR};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use telemetry_link::{ConstrainedChannel, PollOutcome, Transmitter, TransmitterConfig};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the telemetry scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sampling tick period in milliseconds (default: 10, ~100 Hz)
    pub tick_period_ms: u64,
    /// Minimum time from the last link write attempt to the next admission (default: 100, ~10 Hz)
    pub link_throttle_ms: u64,
    /// Pace of recovery attempts while the motion sensor fails (default: 1000)
    pub sensor_retry_ms: u64,
    /// Constrained link transmitter settings
    pub transmitter: TransmitterConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 10,
            link_throttle_ms: 100,
            sensor_retry_ms: 1000,
            transmitter: TransmitterConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Tick period, never below 1 ms
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    /// Minimum time between link write attempt and next admission
    pub fn link_throttle(&self) -> Duration {
        Duration::from_millis(self.link_throttle_ms)
    }

    /// Pace of sensor recovery attempts
    pub fn sensor_retry(&self) -> Duration {
        Duration::from_millis(self.sensor_retry_ms)
    }
}

/// What happened during one tick
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Reading timestamp (milliseconds since the scheduler started)
    pub timestamp_ms: u64,
    /// Record produced this tick
    pub record: Option<Record>,
    /// Whether a full audio frame was reduced
    pub audio_available: bool,
    /// Whether the record reached the reliable channel
    pub reliable_written: bool,
    /// Whether a link drop forced the transmitter back to idle
    pub link_reset: bool,
    /// Whether the record was admitted to the constrained link
    pub admitted: bool,
    /// Transmitter result for this tick
    pub link: PollOutcome,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ticks executed
    pub ticks: u64,
    /// Records encoded
    pub records: u64,
    /// Ticks without a motion reading
    pub sensor_failures: u64,
    /// Readings that could not be formatted
    pub format_failures: u64,
    /// Failed writes to the reliable channel
    pub reliable_errors: u64,
    /// Records handed to the transmitter
    pub admitted: u64,
}

/// Control loop tying sampling, encoding and both output channels together.
///
/// The reliable channel receives every record; the constrained link only
/// gets a new record when the throttle has elapsed and the transmitter is
/// idle, so it sees a latest-biased subsequence.
pub struct DualChannelScheduler<S, R, C> {
    config: SchedulerConfig,
    sensor: S,
    reducer: EnergyReducer,
    reliable: R,
    link: C,
    transmitter: Transmitter,
    /// Timestamp origin
    epoch: Instant,
    /// Start of the last write attempt on the link; the throttle runs from here
    last_attempt: Option<Instant>,
    /// Link state seen at the previous tick
    link_connected: bool,
    link_disconnects: u64,
    /// Last recovery attempt while the sensor is failing
    last_recovery: Option<Instant>,
    sensor_down: bool,
    stats: SchedulerStats,
}

impl<S, R, C> DualChannelScheduler<S, R, C>
where
    S: MotionSensor,
    R: Write,
    C: ConstrainedChannel,
{
    /// Create a new scheduler owning all collaborators
    pub fn new(config: SchedulerConfig, sensor: S, reducer: EnergyReducer, reliable: R, link: C) -> Self {
        info!(
            "Telemetry scheduler created: tick {} ms, link throttle {} ms, audio frame {} samples",
            config.tick_period_ms,
            config.link_throttle_ms,
            reducer.frame_samples()
        );

        let transmitter = Transmitter::new(config.transmitter.clone());
        let link_connected = link.is_connected();
        let link_disconnects = link.disconnect_count();

        Self {
            config,
            sensor,
            reducer,
            reliable,
            link,
            transmitter,
            epoch: Instant::now(),
            last_attempt: None,
            link_connected,
            link_disconnects,
            last_recovery: None,
            sensor_down: false,
            stats: SchedulerStats::default(),
        }
    }

    /// Run one sampling tick
    pub async fn tick(&mut self) -> TickReport {
        let now = Instant::now();
        self.stats.ticks += 1;

        let mut report = TickReport {
            timestamp_ms: now.saturating_duration_since(self.epoch).as_millis() as u64,
            record: None,
            audio_available: false,
            reliable_written: false,
            link_reset: false,
            admitted: false,
            link: PollOutcome::Idle,
        };

        // Link drops are handled before any new send logic.
        report.link_reset = self.observe_link();

        if let Some(reading) = self.sample(now, report.timestamp_ms) {
            report.audio_available = reading.audio_rms.is_some();
            match Record::encode(&reading) {
                Ok(record) => {
                    self.stats.records += 1;
                    report.record = Some(record);
                }
                Err(e) => {
                    self.stats.format_failures += 1;
                    debug!("Skipping record at {} ms: {}", report.timestamp_ms, e);
                }
            }
        }

        if let Some(record) = &report.record {
            report.reliable_written = self.write_reliable(record);

            if self.should_admit(now) && self.transmitter.begin(record.as_bytes()) {
                self.stats.admitted += 1;
                report.admitted = true;
            }
        }

        if !self.transmitter.is_idle() {
            self.last_attempt = Some(Instant::now());
            report.link = self.transmitter.poll(&mut self.link).await;
        }

        report
    }

    /// Run ticks at the configured period until `shutdown` completes
    pub async fn run<F>(&mut self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        info!("Starting telemetry scheduler");
        tokio::pin!(shutdown);

        let mut ticker = interval(self.config.tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Telemetry scheduler stopped: {:?}, link {:?}", self.stats, self.transmitter.stats());
        self.stats
    }

    /// Detect a link drop since the previous tick and discard pending content
    fn observe_link(&mut self) -> bool {
        let connected = self.link.is_connected();
        let disconnects = self.link.disconnect_count();

        let dropped = (self.link_connected && !connected) || disconnects != self.link_disconnects;
        if connected != self.link_connected {
            info!("Link {}", if connected { "connected" } else { "disconnected" });
        }
        self.link_connected = connected;
        self.link_disconnects = disconnects;

        if dropped {
            self.transmitter.reset_on_disconnect();
        }
        dropped
    }

    /// Pull one motion snapshot and, best effort, one audio frame
    fn sample(&mut self, now: Instant, timestamp_ms: u64) -> Option<Reading> {
        match self.sensor.read() {
            Ok(motion) => {
                if self.sensor_down {
                    info!("Motion sensor readings resumed");
                    self.sensor_down = false;
                    self.last_recovery = None;
                }
                let audio = self.reducer.next_energy();
                Some(Reading::new(timestamp_ms, motion, audio))
            }
            Err(e) => {
                self.stats.sensor_failures += 1;
                self.sensor_down = true;
                self.retry_sensor(now, &e);
                None
            }
        }
    }

    fn retry_sensor(&mut self, now: Instant, cause: &SensorError) {
        let due = self
            .last_recovery
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.sensor_retry());
        if !due {
            return;
        }

        self.last_recovery = Some(now);
        warn!("Motion sensor unavailable ({}), attempting recovery", cause);
        match self.sensor.recover() {
            Ok(()) => info!("Motion sensor recovery succeeded"),
            Err(e) => warn!("Motion sensor recovery failed: {}", e),
        }
    }

    fn write_reliable(&mut self, record: &Record) -> bool {
        let result = self
            .reliable
            .write_all(record.as_bytes())
            .and_then(|_| self.reliable.write_all(RELIABLE_TERMINATOR))
            .and_then(|_| self.reliable.flush());

        match result {
            Ok(()) => true,
            Err(e) => {
                self.stats.reliable_errors += 1;
                warn!("Reliable channel write failed: {}", e);
                false
            }
        }
    }

    fn should_admit(&self, now: Instant) -> bool {
        let throttle_elapsed = self
            .last_attempt
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.link_throttle());

        self.link_connected && throttle_elapsed && self.transmitter.can_begin(now)
    }

    /// Get scheduler counters
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Get the constrained link transmitter
    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    /// Get the energy reducer
    pub fn reducer(&self) -> &EnergyReducer {
        &self.reducer
    }

    /// Get the reliable channel
    pub fn reliable(&self) -> &R {
        &self.reliable
    }

    /// Get the constrained link
    pub fn link(&self) -> &C {
        &self.link
    }

    /// Get the constrained link mutably
    pub fn link_mut(&mut self) -> &mut C {
        &mut self.link
    }

    /// Get the configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_energy::EnergyConfig;
    use audio_ring::{AudioProducer, AudioRing};
    use record_codec::{parse_record, LineAssembler, MotionSample};
    use telemetry_link::{MockChannel, TxState};

    struct FixedSensor;

    impl MotionSensor for FixedSensor {
        fn read(&mut self) -> Result<MotionSample, SensorError> {
            Ok(MotionSample {
                accel: [0.012, -0.034, 0.998],
                gyro: [1.5, -0.25, 0.125],
                temperature_c: 24.75,
            })
        }
    }

    /// Fails a fixed number of reads, counting recovery attempts
    struct FlakySensor {
        failures_left: u32,
        recoveries: u32,
    }

    impl MotionSensor for FlakySensor {
        fn read(&mut self) -> Result<MotionSample, SensorError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(SensorError::Read("bus timeout".to_string()));
            }
            FixedSensor.read()
        }

        fn recover(&mut self) -> Result<(), SensorError> {
            self.recoveries += 1;
            Ok(())
        }
    }

    type TestScheduler<S> = DualChannelScheduler<S, Vec<u8>, MockChannel>;

    fn build<S: MotionSensor>(sensor: S, link: MockChannel) -> (AudioProducer, TestScheduler<S>) {
        let (producer, consumer) = AudioRing::with_default_capacity().split();
        let reducer = EnergyReducer::new(consumer, &EnergyConfig::default());
        let scheduler = DualChannelScheduler::new(SchedulerConfig::default(), sensor, reducer, Vec::new(), link);
        (producer, scheduler)
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        LineAssembler::default().extend(bytes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_tick_reaches_reliable_channel() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::disconnected());

        for _ in 0..25 {
            let report = scheduler.tick().await;
            assert!(report.reliable_written);
            assert!(!report.admitted);
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        let reliable = scheduler.reliable();
        assert!(reliable.ends_with(b"\r\n"));
        let lines = lines(reliable);
        assert_eq!(lines.len(), 25);
        assert_eq!(parse_record(&lines[3]).unwrap().timestamp_ms, 30);
        assert_eq!(lines[0], "0,0.012,-0.034,0.998,1.500,-0.250,0.125,24.75,-1.00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_throttled_to_subsequence() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::connected());

        for _ in 0..100 {
            scheduler.tick().await;
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        let reliable = lines(scheduler.reliable());
        let link = lines(scheduler.link().received());
        assert_eq!(reliable.len(), 100);
        assert_eq!(link.len(), 10);
        assert!(!scheduler.link().received_text().contains('\r'));

        // Link records appear on the reliable channel in the same order.
        let mut cursor = reliable.iter();
        for line in &link {
            assert!(cursor.any(|r| r == line), "{} missing or out of order", line);
        }
        let stamps: Vec<u64> = link.iter().map(|l| parse_record(l).unwrap().timestamp_ms).collect();
        assert_eq!(stamps, (0..10).map(|i| i * 100).collect::<Vec<u64>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_link_delivers_within_tick() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::connected());

        let report = scheduler.tick().await;
        assert!(report.admitted);
        assert_eq!(report.link, PollOutcome::Delivered);
        assert_eq!(scheduler.transmitter().state(), TxState::Idle);

        let record = report.record.unwrap();
        let mut expected = record.as_bytes().to_vec();
        expected.push(b'\n');
        assert_eq!(scheduler.link().received(), expected.as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_audio_yields_sentinel_without_consuming() {
        let (mut producer, mut scheduler) = build(FixedSensor, MockChannel::disconnected());

        producer.push_slice(&[800; 100]);
        let report = scheduler.tick().await;
        assert!(!report.audio_available);
        assert!(report.record.unwrap().as_str().ends_with(",-1.00"));
        assert_eq!(scheduler.reducer().available(), 100);

        producer.push_slice(&[800; 60]);
        let report = scheduler.tick().await;
        assert!(report.audio_available);
        assert!(report.record.unwrap().as_str().ends_with(",800.00"));
        assert_eq!(scheduler.reducer().available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_send_resets_next_tick() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::connected().with_allowance(50));

        let report = scheduler.tick().await;
        assert!(report.admitted);
        let total = report.record.unwrap().len();
        assert_eq!(report.link, PollOutcome::Progress { sent: 50, total });
        assert_eq!(scheduler.transmitter().state(), TxState::Sending);

        scheduler.link_mut().set_connected(false);
        tokio::time::advance(Duration::from_millis(10)).await;

        let report = scheduler.tick().await;
        assert!(report.link_reset);
        assert!(!report.admitted);
        assert_eq!(scheduler.transmitter().state(), TxState::Idle);
        assert_eq!(scheduler.transmitter().pending_body(), None);
        assert_eq!(scheduler.transmitter().stats().disconnected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_between_ticks_still_drops_old_record() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::connected().with_allowance(50));

        let first = scheduler.tick().await.record.unwrap();
        assert_eq!(scheduler.transmitter().progress(), Some((50, first.len())));

        // Drop and come back before the scheduler looks again.
        scheduler.link_mut().set_connected(false);
        scheduler.link_mut().set_connected(true);
        tokio::time::advance(Duration::from_millis(10)).await;

        let report = scheduler.tick().await;
        assert!(report.link_reset);
        assert_eq!(scheduler.transmitter().stats().disconnected, 1);
        if let Some(body) = scheduler.transmitter().pending_body() {
            assert_ne!(body, first.as_bytes());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_link_drops_once_and_cools_down() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::connected().with_allowance(0));
        let start = Instant::now();

        let mut stalled_at = None;
        let mut stalls = 0;
        let mut readmitted_at = None;

        while start.elapsed() < Duration::from_millis(3500) {
            let report = scheduler.tick().await;
            let now = Instant::now();

            if report.link == PollOutcome::Stalled {
                stalls += 1;
                stalled_at = Some(now);
            } else if report.admitted && stalled_at.is_some() && readmitted_at.is_none() {
                readmitted_at = Some(now);
            }
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        assert_eq!(stalls, 1);
        let stalled_at = stalled_at.unwrap();
        assert!(stalled_at - start >= Duration::from_millis(3000));
        let readmitted_at = readmitted_at.expect("link should be offered records again");
        assert!(readmitted_at - stalled_at >= Duration::from_millis(200));
        // Reliable output never paused.
        assert_eq!(scheduler.stats().records, scheduler.stats().ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_failure_skips_records_and_paces_recovery() {
        let sensor = FlakySensor {
            failures_left: 3,
            recoveries: 0,
        };
        let (_producer, mut scheduler) = build(sensor, MockChannel::connected());

        for _ in 0..3 {
            let report = scheduler.tick().await;
            assert!(report.record.is_none());
            assert!(!report.reliable_written);
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(scheduler.sensor.recoveries, 1);
        assert!(scheduler.reliable().is_empty());

        let report = scheduler.tick().await;
        assert!(report.reliable_written);
        assert!(report.admitted);
        assert_eq!(scheduler.stats().sensor_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::connected());

        let stats = scheduler
            .run(tokio::time::sleep(Duration::from_millis(105)))
            .await;

        assert!((10..=12).contains(&stats.ticks), "ticks = {}", stats.ticks);
        assert_eq!(lines(scheduler.reliable()).len() as u64, stats.ticks);
        assert_eq!(lines(scheduler.link().received()).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_runs_from_last_write_attempt() {
        let (_producer, mut scheduler) = build(FixedSensor, MockChannel::connected().with_allowance(20));
        let start = Instant::now();

        let report = scheduler.tick().await;
        assert!(report.admitted);
        assert!(matches!(report.link, PollOutcome::Progress { sent: 20, .. }));

        scheduler.link_mut().set_allowance(None);
        tokio::time::advance(Duration::from_millis(10)).await;

        let finishing_attempt = Instant::now();
        let report = scheduler.tick().await;
        assert!(!report.admitted);
        assert_eq!(report.link, PollOutcome::Delivered);
        assert!(finishing_attempt - start >= Duration::from_millis(130));

        let mut readmitted_at = None;
        for _ in 0..20 {
            tokio::time::advance(Duration::from_millis(10)).await;
            let now = Instant::now();
            if scheduler.tick().await.admitted {
                readmitted_at = Some(now);
                break;
            }
        }

        let readmitted_at = readmitted_at.expect("link should be offered a new record");
        let gap = readmitted_at - finishing_attempt;
        assert!(gap >= Duration::from_millis(100), "readmitted after {:?}", gap);
        assert!(gap < Duration::from_millis(110), "readmitted after {:?}", gap);
        assert_eq!(lines(scheduler.link().received()).len(), 2);
    }

    /// Reliable sink that rejects every write
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "serial port gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "serial port gone"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reliable_errors_do_not_gate_link() {
        let (_producer, consumer) = AudioRing::with_default_capacity().split();
        let reducer = EnergyReducer::new(consumer, &EnergyConfig::default());
        let mut scheduler = DualChannelScheduler::new(
            SchedulerConfig::default(),
            FixedSensor,
            reducer,
            BrokenPipe,
            MockChannel::connected(),
        );

        let report = scheduler.tick().await;
        assert!(!report.reliable_written);
        assert!(report.admitted);
        assert_eq!(report.link, PollOutcome::Delivered);
        assert_eq!(scheduler.stats().reliable_errors, 1);
        assert_eq!(scheduler.stats().records, 1);

        let record = report.record.unwrap();
        assert_eq!(lines(scheduler.link().received()), vec![record.as_str().to_string()]);

        tokio::time::advance(Duration::from_millis(10)).await;
        scheduler.tick().await;
        assert_eq!(scheduler.stats().reliable_errors, 2);
    }
}
