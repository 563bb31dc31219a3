//! Test utilities and common fixtures for the sentinel test suite.
//!
//! Series builders are fully deterministic (sine-based wobble instead of a
//! RNG) so fusion idempotence can be asserted exactly. All builders emit
//! 5-second ticks ending just before "now", matching the scrape cadence the
//! extractor expects.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use crate::features::{ServiceFeatures, TrendDirection};
use crate::infrastructure::store::{MemoryStore, MetricSample, MetricStore};
use crate::utils::error::SentinelResult;

pub const TICK_SECS: i64 = 5;

/// Deterministic wobble in [-1, 1] with period unrelated to the tick rate.
fn wobble(i: usize, phase: f64) -> f64 {
    ((i as f64) * 2.5 + phase).sin()
}

/// A flat series: `base ± amplitude` of deterministic noise.
pub fn uniform_series(
    service: &str,
    metric: &str,
    base: f64,
    amplitude: f64,
    ticks: usize,
) -> Vec<MetricSample> {
    series_from_fn(service, metric, ticks, |i| base + amplitude * wobble(i, 0.3))
}

/// A linear ramp with optional deterministic noise.
pub fn ramp_series(
    service: &str,
    metric: &str,
    start: f64,
    slope_per_tick: f64,
    noise: f64,
    ticks: usize,
) -> Vec<MetricSample> {
    series_from_fn(service, metric, ticks, |i| {
        start + slope_per_tick * i as f64 + noise * wobble(i, 1.1)
    })
}

/// A mostly-flat series with rare large bursts (every `burst_every` ticks).
pub fn bursty_series(
    service: &str,
    metric: &str,
    base: f64,
    burst: f64,
    burst_every: usize,
    ticks: usize,
) -> Vec<MetricSample> {
    series_from_fn(service, metric, ticks, |i| {
        if burst_every > 0 && i % burst_every == burst_every - 1 {
            burst
        } else {
            base
        }
    })
}

/// A ramp that plateaus: rises over `ramp_ticks`, then wobbles around the
/// plateau value for the remaining ticks.
pub fn ramp_then_plateau_series(
    service: &str,
    metric: &str,
    start: f64,
    plateau: f64,
    ramp_ticks: usize,
    total_ticks: usize,
) -> Vec<MetricSample> {
    series_from_fn(service, metric, total_ticks, |i| {
        if i < ramp_ticks {
            start + (plateau - start) * i as f64 / ramp_ticks as f64
        } else {
            plateau + wobble(i, 0.7)
        }
    })
}

/// Build a series from a per-tick function, ending `TICK_SECS` before now.
pub fn series_from_fn<F: Fn(usize) -> f64>(
    service: &str,
    metric: &str,
    ticks: usize,
    f: F,
) -> Vec<MetricSample> {
    let end = Utc::now() - ChronoDuration::seconds(TICK_SECS);
    (0..ticks)
        .map(|i| {
            let ts = end - ChronoDuration::seconds(TICK_SECS * (ticks - 1 - i) as i64);
            MetricSample::new(service, metric, f(i), ts)
        })
        .collect()
}

pub async fn seed(store: &MemoryStore, series: Vec<Vec<MetricSample>>) {
    for samples in series {
        store
            .insert_samples(&samples)
            .await
            .unwrap_or_else(|e| panic!("seeding test store failed: {e}"));
    }
}

/// 29 minutes of ticks: comfortably inside the default 30-minute window so
/// back-to-back extractions see the identical sample set.
pub const FULL_WINDOW_TICKS: usize = 348;

/// Scenario: flat CPU, memory climbing ~0.24%/min, negligible errors.
pub async fn memory_leak_store(service: &str) -> MemoryStore {
    let store = MemoryStore::new();
    seed(
        &store,
        vec![
            uniform_series(service, "cpu_usage", 45.0, 2.0, FULL_WINDOW_TICKS),
            ramp_series(service, "memory_usage", 60.0, 0.02, 0.25, FULL_WINDOW_TICKS),
            uniform_series(service, "error_rate", 0.5, 0.3, FULL_WINDOW_TICKS),
        ],
    )
    .await;
    store
}

/// Scenario: CPU and memory both pinned near their ceilings.
pub async fn resource_exhaustion_store(service: &str) -> MemoryStore {
    let store = MemoryStore::new();
    seed(
        &store,
        vec![
            uniform_series(service, "cpu_usage", 92.0, 4.0, FULL_WINDOW_TICKS),
            uniform_series(service, "memory_usage", 93.0, 3.5, FULL_WINDOW_TICKS),
            uniform_series(service, "error_rate", 6.0, 2.5, FULL_WINDOW_TICKS),
        ],
    )
    .await;
    store
}

/// Scenario: rare large error bursts on calm resources.
pub async fn deployment_bug_store(service: &str) -> MemoryStore {
    let store = MemoryStore::new();
    seed(
        &store,
        vec![
            uniform_series(service, "cpu_usage", 52.0, 7.0, FULL_WINDOW_TICKS),
            uniform_series(service, "memory_usage", 57.0, 6.0, FULL_WINDOW_TICKS),
            bursty_series(service, "error_rate", 14.0, 80.0, 30, FULL_WINDOW_TICKS),
        ],
    )
    .await;
    store
}

/// Scenario: tail latency in lockstep with errors, resources calm.
pub async fn external_failure_store(service: &str) -> MemoryStore {
    let store = MemoryStore::new();
    let errors = series_from_fn(service, "error_rate", FULL_WINDOW_TICKS, |i| {
        16.0 + 4.0 * ((i as f64) * 0.9).sin()
    });
    let latency = series_from_fn(service, "response_time", FULL_WINDOW_TICKS, |i| {
        500.0 + 250.0 * (16.0 + 4.0 * ((i as f64) * 0.9).sin())
    });
    seed(
        &store,
        vec![
            uniform_series(service, "cpu_usage", 45.0, 8.0, FULL_WINDOW_TICKS),
            uniform_series(service, "memory_usage", 55.0, 5.0, FULL_WINDOW_TICKS),
            errors,
            latency,
        ],
    )
    .await;
    store
}

/// Scenario: everything ramps up and stays degraded.
pub async fn cascade_store(service: &str) -> MemoryStore {
    let store = MemoryStore::new();
    // 20 minutes: a 4-minute climb, then a degraded plateau.
    let ticks = 240;
    let ramp = 48;
    seed(
        &store,
        vec![
            ramp_then_plateau_series(service, "cpu_usage", 60.0, 96.0, ramp, ticks),
            ramp_then_plateau_series(service, "memory_usage", 60.0, 96.0, ramp, ticks),
            ramp_then_plateau_series(service, "error_rate", 5.0, 30.0, ramp, ticks),
            ramp_then_plateau_series(service, "response_time", 800.0, 2600.0, ramp, ticks),
        ],
    )
    .await;
    store
}

/// Scenario: a comfortably healthy service.
pub async fn healthy_store(service: &str) -> MemoryStore {
    let store = MemoryStore::new();
    seed(
        &store,
        vec![
            uniform_series(service, "cpu_usage", 42.0, 6.0, FULL_WINDOW_TICKS),
            uniform_series(service, "memory_usage", 52.0, 5.0, FULL_WINDOW_TICKS),
            uniform_series(service, "error_rate", 0.4, 0.3, FULL_WINDOW_TICKS),
        ],
    )
    .await;
    store
}

/// Synthetic fingerprint builder for direct detector tests.
#[must_use]
pub fn base_features(service: &str) -> ServiceFeatures {
    let mut features = ServiceFeatures::empty(service, 30);
    for stats in [
        &mut features.cpu,
        &mut features.memory,
        &mut features.error_rate,
        &mut features.latency,
        &mut features.request_rate,
    ] {
        stats.sample_count = 100;
    }
    features.trend_direction = TrendDirection::Stable;
    features
}

/// Store wrapper that delays every read, for deadline/cancellation tests.
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    #[must_use]
    pub fn new(inner: MemoryStore, delay: Duration) -> Self {
        Self { inner, delay }
    }

    #[must_use]
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait::async_trait]
impl MetricStore for SlowStore {
    async fn insert_samples(&self, samples: &[MetricSample]) -> SentinelResult<usize> {
        self.inner.insert_samples(samples).await
    }

    async fn latest(
        &self,
        service: &str,
        metric: &str,
    ) -> SentinelResult<Option<MetricSample>> {
        tokio::time::sleep(self.delay).await;
        self.inner.latest(service, metric).await
    }

    async fn range(
        &self,
        service: &str,
        metric: &str,
        from: chrono::DateTime<Utc>,
        to: chrono::DateTime<Utc>,
    ) -> SentinelResult<Vec<MetricSample>> {
        tokio::time::sleep(self.delay).await;
        self.inner.range(service, metric, from, to).await
    }

    async fn services_with_data_since(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> SentinelResult<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        self.inner.services_with_data_since(since).await
    }

    async fn insert_event(
        &self,
        event: &crate::infrastructure::store::ClusterEvent,
    ) -> SentinelResult<()> {
        self.inner.insert_event(event).await
    }

    async fn recent_events(
        &self,
        pod: Option<&str>,
        limit: usize,
    ) -> SentinelResult<Vec<crate::infrastructure::store::ClusterEvent>> {
        self.inner.recent_events(pod, limit).await
    }

    async fn save_diagnosis(
        &self,
        record: &crate::infrastructure::store::DiagnosisRecord,
    ) -> SentinelResult<()> {
        self.inner.save_diagnosis(record).await
    }

    async fn recent_diagnoses(
        &self,
        service: &str,
        limit: usize,
    ) -> SentinelResult<Vec<crate::infrastructure::store::DiagnosisRecord>> {
        self.inner.recent_diagnoses(service, limit).await
    }
}
