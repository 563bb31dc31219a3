//! Feature extraction: one pass over the stored series for a service,
//! reducing them to the [`ServiceFeatures`] fingerprint the detectors score.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::features::types::{MetricStats, ServiceFeatures, TrendDirection};
use crate::infrastructure::store::{MetricSample, MetricStore};
use crate::utils::error::SentinelResult;
use crate::utils::math;

/// Alias priority lists for the five canonical metrics; the first name that
/// returns data from the store wins.
pub const CPU_ALIASES: &[&str] = &["cpu_usage", "cpu_usage_percent"];
pub const MEMORY_ALIASES: &[&str] = &[
    "memory_usage",
    "memory_usage_percent",
    "memory_working_set_bytes",
];
pub const ERROR_ALIASES: &[&str] = &[
    "error_rate",
    "app_errors_total",
    "errors_total",
    "error_count",
];
pub const LATENCY_ALIASES: &[&str] = &[
    "response_time",
    "response_time_p95_ms",
    "http_latency",
    "latency_ms",
];
pub const REQUEST_ALIASES: &[&str] = &["request_rate", "http_requests_total", "http_requests"];

const MIN_SAMPLES: usize = 3;

/// Reduces raw metric series into per-service fingerprints.
///
/// The extractor owns no state beyond its store handle; extractions for
/// different services never observe each other.
pub struct FeatureExtractor {
    store: Arc<dyn MetricStore>,
}

impl FeatureExtractor {
    #[must_use]
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    /// Extract the fingerprint for `service` over the trailing `window`.
    ///
    /// Missing series yield zeroed statistics; correlations and pattern
    /// flags are only computed when both participating series carry at
    /// least three samples.
    pub async fn extract(
        &self,
        service: &str,
        window: Duration,
    ) -> SentinelResult<ServiceFeatures> {
        let window_minutes = window.as_secs() / 60;

        let cpu_series = self.resolve_series(service, CPU_ALIASES, window).await?;
        let mem_series = self.resolve_series(service, MEMORY_ALIASES, window).await?;
        let err_series = self.resolve_series(service, ERROR_ALIASES, window).await?;
        let lat_series = self.resolve_series(service, LATENCY_ALIASES, window).await?;
        let req_series = self.resolve_series(service, REQUEST_ALIASES, window).await?;

        let mut features = ServiceFeatures::empty(service, window_minutes);

        features.cpu = Self::metric_stats(service, "cpu", &cpu_series);
        features.memory = Self::metric_stats(service, "memory", &mem_series);
        features.error_rate = Self::metric_stats(service, "error_rate", &err_series);
        features.latency = Self::metric_stats(service, "latency", &lat_series);
        features.request_rate = Self::metric_stats(service, "request_rate", &req_series);

        let lat_values = values_of(&lat_series);
        if lat_values.len() >= MIN_SAMPLES {
            features.latency_p50 = math::percentile(&lat_values, 50.0).unwrap_or(0.0);
            features.latency_p95 = math::percentile(&lat_values, 95.0).unwrap_or(0.0);
            features.latency_p99 = math::percentile(&lat_values, 99.0).unwrap_or(0.0);
        }
        let err_values = values_of(&err_series);
        if err_values.len() >= MIN_SAMPLES {
            features.error_spikiness = math::spikiness(&err_values).unwrap_or(0.0);
        }

        let cpu_values = values_of(&cpu_series);
        let mem_values = values_of(&mem_series);
        let req_values = values_of(&req_series);
        features.cpu_memory_corr = correlate(&cpu_values, &mem_values);
        features.cpu_error_corr = correlate(&cpu_values, &err_values);
        features.memory_error_corr = correlate(&mem_values, &err_values);
        features.latency_error_corr = correlate(&lat_values, &err_values);
        features.request_cpu_corr = correlate(&req_values, &cpu_values);

        self.detect_periodicity(&mut features, &cpu_series);
        Self::classify_trend(&mut features);
        Self::composite_scores(&mut features);

        debug!(
            service = %service,
            health = features.health_score,
            stress = features.system_stress,
            "Features extracted"
        );
        Ok(features)
    }

    /// Walk the alias priority list and return the first series with data.
    async fn resolve_series(
        &self,
        service: &str,
        aliases: &[&str],
        window: Duration,
    ) -> SentinelResult<Vec<MetricSample>> {
        for alias in aliases {
            let samples = self.store.recent(service, alias, window).await?;
            if !samples.is_empty() {
                return Ok(samples);
            }
        }
        Ok(Vec::new())
    }

    /// Per-series statistics. Domain errors (non-finite values that slipped
    /// past ingest) degrade this metric to neutral instead of failing the
    /// extraction.
    fn metric_stats(service: &str, metric: &str, samples: &[MetricSample]) -> MetricStats {
        if samples.len() < MIN_SAMPLES {
            return MetricStats {
                sample_count: samples.len(),
                ..MetricStats::default()
            };
        }
        match Self::try_metric_stats(samples) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(
                    service = %service,
                    metric = %metric,
                    error = %e,
                    "Degrading metric to neutral statistics"
                );
                MetricStats::default()
            }
        }
    }

    fn try_metric_stats(samples: &[MetricSample]) -> SentinelResult<MetricStats> {
        let values = values_of(samples);
        let mean = math::mean(&values)?;
        let stddev = math::stddev(&values)?;
        let (min, max) = math::min_max(&values)?;

        let t0 = samples[0].timestamp;
        let points: Vec<(f64, f64)> = samples
            .iter()
            .map(|s| {
                let minutes = (s.timestamp - t0).num_milliseconds() as f64 / 60_000.0;
                (minutes, s.value)
            })
            .collect();
        let fit = math::linear_regression(&points)?;

        Ok(MetricStats {
            mean,
            stddev,
            min,
            max,
            range: max - min,
            trend_slope: fit.slope,
            volatility: math::volatility(&values)?,
            autocorrelation: math::autocorrelation(&values, 1)?,
            anomaly_score: math::anomaly_fraction(&values, 2.0)?,
            sample_count: samples.len(),
        })
    }

    /// Autocorrelation peak search over lags 1..=min(n/3, 20); a peak above
    /// 0.5 marks the series periodic with period = lag * sample spacing.
    fn detect_periodicity(&self, features: &mut ServiceFeatures, cpu_series: &[MetricSample]) {
        let values = values_of(cpu_series);
        if values.len() < MIN_SAMPLES * 3 {
            return;
        }
        let max_lag = (values.len() / 3).min(20);
        let mut peak = 0.0_f64;
        let mut peak_lag = 0_usize;
        for lag in 1..=max_lag {
            let ac = math::autocorrelation(&values, lag).unwrap_or(0.0);
            if ac > peak {
                peak = ac;
                peak_lag = lag;
            }
        }
        if peak > 0.5 && peak_lag > 0 {
            features.has_periodic_pattern = true;
            features.period_length_secs = peak_lag as f64 * median_spacing_secs(cpu_series);
        }
    }

    /// The dominant resource trend drives the direction flag: whichever of
    /// cpu and memory moves faster, with a 0.05 units/minute dead band.
    fn classify_trend(features: &mut ServiceFeatures) {
        let cpu = features.cpu.trend_slope;
        let mem = features.memory.trend_slope;
        let dominant = if cpu.abs() >= mem.abs() { cpu } else { mem };
        features.trend_direction = if dominant > 0.05 {
            TrendDirection::Increasing
        } else if dominant < -0.05 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };
        features.has_trend = features.trend_direction != TrendDirection::Stable;
    }

    fn composite_scores(features: &mut ServiceFeatures) {
        let cpu = &features.cpu;
        let mem = &features.memory;
        let err = &features.error_rate;

        features.system_stress =
            ((cpu.mean + mem.mean + 10.0 * err.mean) / 3.0).clamp(0.0, 100.0);

        let mut deductions: f64 = 0.0;
        if cpu.mean > 80.0 {
            deductions += 20.0;
        }
        if mem.mean > 85.0 {
            deductions += 20.0;
        }
        if err.mean > 5.0 {
            deductions += 30.0;
        }
        if features.latency_p95 > 2000.0 {
            deductions += 15.0;
        }
        if cpu.trend_slope > 0.5 {
            deductions += 10.0;
        }
        if mem.trend_slope > 0.5 {
            deductions += 10.0;
        }
        features.health_score = (100.0 - deductions).max(0.0);

        features.stability_index = (10.0 * (1.0 - cpu.volatility.min(1.0))
            + 10.0 * (1.0 - mem.volatility.min(1.0)))
            / 2.0;

        let mut predictability: f64 = 50.0;
        if features.has_periodic_pattern {
            predictability += 20.0;
        }
        if cpu.autocorrelation > 0.7 {
            predictability += 15.0;
        }
        if features.trend_direction != TrendDirection::Stable {
            predictability += 10.0;
        }
        features.predictability_score = predictability.min(100.0);
    }
}

fn values_of(samples: &[MetricSample]) -> Vec<f64> {
    samples.iter().map(|s| s.value).collect()
}

/// Pairwise correlation over the trailing overlap of two series; 0 when
/// either side is too short.
fn correlate(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < MIN_SAMPLES {
        return 0.0;
    }
    let xs_tail = &xs[xs.len() - n..];
    let ys_tail = &ys[ys.len() - n..];
    math::pearson_correlation(xs_tail, ys_tail).unwrap_or(0.0)
}

/// Median gap between consecutive samples, in seconds. Falls back to 5s
/// (the default scrape cadence) for degenerate series.
fn median_spacing_secs(samples: &[MetricSample]) -> f64 {
    if samples.len() < 2 {
        return 5.0;
    }
    let mut gaps: Vec<f64> = samples
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .filter(|g| *g > 0.0)
        .collect();
    if gaps.is_empty() {
        return 5.0;
    }
    gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    gaps[gaps.len() / 2]
}
