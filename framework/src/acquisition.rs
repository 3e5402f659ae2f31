//! Periodic acquisition: poll the sample source, publish into the store
//!
//! Failures are per-cycle. A failed read skips that cycle with no retry or
//! backoff; the next poll is the retry.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::sensors::SampleSource;
use crate::shutdown::Shutdown;
use crate::store::LatestSampleStore;

/// Acquisition configuration
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionConfig {
    /// Delay between polls
    pub period: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
        }
    }
}

/// What a single cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    /// Read succeeded but the store was contended
    Dropped,
    ReadFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub cycles: u32,
    pub read_failures: u32,
    pub dropped: u32,
}

pub struct AcquisitionLoop<S> {
    source: S,
    store: Arc<LatestSampleStore>,
    config: AcquisitionConfig,
    stats: AcquisitionStats,
}

impl<S: SampleSource> AcquisitionLoop<S> {
    pub fn new(source: S, store: Arc<LatestSampleStore>, config: AcquisitionConfig) -> Self {
        Self {
            source,
            store,
            config,
            stats: AcquisitionStats::default(),
        }
    }

    /// Poll once and publish on success
    pub fn cycle(&mut self) -> CycleOutcome {
        self.stats.cycles = self.stats.cycles.wrapping_add(1);

        match self.source.read_sample() {
            Ok(sample) => {
                debug!(
                    "Accel [{:.2}, {:.2}, {:.2}] m/s² Gyro [{:.3}, {:.3}, {:.3}] rad/s",
                    sample.ax, sample.ay, sample.az, sample.gx, sample.gy, sample.gz
                );
                if self.store.publish(sample) {
                    CycleOutcome::Published
                } else {
                    self.stats.dropped = self.stats.dropped.wrapping_add(1);
                    warn!("Sample store busy, dropped sample");
                    CycleOutcome::Dropped
                }
            }
            Err(e) => {
                self.stats.read_failures = self.stats.read_failures.wrapping_add(1);
                warn!("Failed to read sensor data: {}", e);
                CycleOutcome::ReadFailed
            }
        }
    }

    /// Poll at the configured period until shutdown is requested
    pub fn run(&mut self, shutdown: &Shutdown) {
        info!(
            "Acquisition loop started ({} ms period)",
            self.config.period.as_millis()
        );

        while !shutdown.is_requested() {
            self.cycle();
            if !shutdown.sleep(self.config.period) {
                break;
            }
        }

        info!(
            "Acquisition loop stopped after {} cycles ({} read failures)",
            self.stats.cycles, self.stats.read_failures
        );
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn into_source(self) -> S {
        self.source
    }
}
