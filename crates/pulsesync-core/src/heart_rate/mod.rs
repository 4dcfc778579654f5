//! Heart-rate samples, sources and rolling statistics.
//!
//! Heart-rate readings feed only the display (current / minimum / maximum /
//! average); the session synchronization never looks at them.
//!
//! A [`HeartRateSource`] is a subscription-style feed with a one-time
//! authorization step and start/stop controls. [`SimulatedHeartRate`] stands
//! in for a platform health service.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::HeartRateConfig;
use crate::error::{Error, Result};

/// Lowest value the simulated source will produce.
const SIMULATED_MIN_BPM: f64 = 40.0;

/// Highest value the simulated source will produce.
const SIMULATED_MAX_BPM: f64 = 200.0;

/// A single heart-rate reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    /// Beats per minute
    pub bpm: f64,
    /// When the reading was taken
    pub recorded_at: DateTime<Utc>,
}

impl HeartRateSample {
    /// Create a sample stamped with the current time.
    #[must_use]
    pub fn now(bpm: f64) -> Self {
        Self {
            bpm,
            recorded_at: Utc::now(),
        }
    }
}

/// Display values derived from [`HeartRateStats`], truncated to whole beats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSummary {
    /// Latest reading
    pub current: u32,
    /// Lowest reading
    pub minimum: u32,
    /// Highest reading
    pub maximum: u32,
    /// Mean of all readings
    pub average: u32,
}

/// Running aggregation over the readings of one session.
#[derive(Debug, Clone, Default)]
pub struct HeartRateStats {
    count: u64,
    sum: f64,
    current: Option<f64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl HeartRateStats {
    /// Create empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reading. Non-finite or non-positive values are ignored.
    pub fn record(&mut self, bpm: f64) {
        if !bpm.is_finite() || bpm <= 0.0 {
            tracing::debug!("Ignoring invalid heart-rate reading: {}", bpm);
            return;
        }

        self.count += 1;
        self.sum += bpm;
        self.current = Some(bpm);
        self.minimum = Some(self.minimum.map_or(bpm, |m| m.min(bpm)));
        self.maximum = Some(self.maximum.map_or(bpm, |m| m.max(bpm)));
    }

    /// Forget every reading.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of readings recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Latest reading.
    #[must_use]
    pub fn current(&self) -> Option<f64> {
        self.current
    }

    /// Lowest reading.
    #[must_use]
    pub fn minimum(&self) -> Option<f64> {
        self.minimum
    }

    /// Highest reading.
    #[must_use]
    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    /// Mean of all readings.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Whole-beat display values; zero when nothing was recorded.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn summary(&self) -> HeartRateSummary {
        let truncate = |v: Option<f64>| v.map_or(0, |v| v as u32);
        HeartRateSummary {
            current: truncate(self.current),
            minimum: truncate(self.minimum),
            maximum: truncate(self.maximum),
            average: truncate(self.average()),
        }
    }
}

/// Subscription-style heart-rate feed.
pub trait HeartRateSource: Send {
    /// One-time authorization to read heart-rate data.
    ///
    /// # Errors
    ///
    /// Returns an error if access is denied.
    fn authorize(&mut self) -> Result<()>;

    /// Start delivering samples. Restarts the feed if already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not authorized.
    fn start(&mut self) -> Result<mpsc::Receiver<HeartRateSample>>;

    /// Stop delivering samples. Stopping a stopped source is a no-op.
    fn stop(&mut self);
}

/// Random walk around a resting baseline.
#[derive(Debug)]
pub struct SimulatedHeartRate {
    baseline: f64,
    interval: Duration,
    seed: Option<u64>,
    authorized: bool,
    task: Option<JoinHandle<()>>,
}

impl SimulatedHeartRate {
    /// Create a simulated source.
    #[must_use]
    pub fn new(baseline: f64, interval: Duration) -> Self {
        Self {
            baseline,
            interval,
            seed: None,
            authorized: false,
            task: None,
        }
    }

    /// Create a simulated source from configuration.
    #[must_use]
    pub fn from_config(config: &HeartRateConfig) -> Self {
        Self::new(config.baseline_bpm, config.sample_interval)
    }

    /// Use a fixed seed so the produced sequence is reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Whether samples are currently being produced.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn next_bpm(rng: &mut StdRng, previous: f64, baseline: f64) -> f64 {
        let drift = (baseline - previous) * 0.1;
        let noise = rng.gen_range(-2.0..=2.0);
        (previous + drift + noise).clamp(SIMULATED_MIN_BPM, SIMULATED_MAX_BPM)
    }
}

impl HeartRateSource for SimulatedHeartRate {
    fn authorize(&mut self) -> Result<()> {
        self.authorized = true;
        Ok(())
    }

    fn start(&mut self) -> Result<mpsc::Receiver<HeartRateSample>> {
        if !self.authorized {
            return Err(Error::SensorError(
                "heart-rate access has not been authorized".to_string(),
            ));
        }

        self.stop();

        let (tx, rx) = mpsc::channel(16);
        let baseline = self.baseline;
        let interval = self.interval;
        let mut rng = self
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut bpm = baseline;

            loop {
                ticker.tick().await;
                bpm = Self::next_bpm(&mut rng, bpm, baseline);
                if tx.send(HeartRateSample::now(bpm)).await.is_err() {
                    tracing::debug!("Heart-rate subscriber gone, stopping simulation");
                    break;
                }
            }
        }));

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SimulatedHeartRate {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_summary_is_zero() {
        let stats = HeartRateStats::new();
        assert_eq!(stats.summary(), HeartRateSummary::default());
        assert!(stats.average().is_none());
    }

    #[test]
    fn test_stats_aggregation() {
        let mut stats = HeartRateStats::new();
        for bpm in [72.0, 80.5, 65.9, 90.2] {
            stats.record(bpm);
        }

        assert_eq!(stats.count(), 4);
        assert_eq!(stats.current(), Some(90.2));
        assert_eq!(stats.minimum(), Some(65.9));
        assert_eq!(stats.maximum(), Some(90.2));

        let summary = stats.summary();
        assert_eq!(summary.current, 90);
        assert_eq!(summary.minimum, 65);
        assert_eq!(summary.maximum, 90);
        assert_eq!(summary.average, 77);
    }

    #[test]
    fn test_invalid_readings_ignored() {
        let mut stats = HeartRateStats::new();
        stats.record(f64::NAN);
        stats.record(-5.0);
        stats.record(0.0);
        assert_eq!(stats.count(), 0);

        stats.record(60.0);
        assert_eq!(stats.summary().average, 60);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut stats = HeartRateStats::new();
        stats.record(100.0);
        stats.reset();
        assert_eq!(stats.count(), 0);
        assert!(stats.current().is_none());
    }

    #[tokio::test]
    async fn test_simulated_requires_authorization() {
        let mut source = SimulatedHeartRate::new(72.0, Duration::from_millis(10));
        assert!(matches!(source.start(), Err(Error::SensorError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_samples_stay_in_range() {
        let mut source = SimulatedHeartRate::new(72.0, Duration::from_secs(1)).with_seed(7);
        source.authorize().unwrap();
        let mut rx = source.start().expect("start");

        for _ in 0..20 {
            let sample = rx.recv().await.expect("sample");
            assert!((SIMULATED_MIN_BPM..=SIMULATED_MAX_BPM).contains(&sample.bpm));
        }

        assert!(source.is_running());
        source.stop();
        source.stop();

        // Buffered samples may still drain; the feed must then close.
        while rx.recv().await.is_some() {}
        assert!(!source.is_running());
    }
}
