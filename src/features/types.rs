use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of the dominant resource trend over the extraction window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Statistics derived from one metric series over the window.
///
/// A series with fewer than three samples yields the neutral (all-zero)
/// statistics and contributes nothing to detector signals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Least-squares slope in metric units per minute
    pub trend_slope: f64,
    /// stddev / mean, 0 when the mean is 0
    pub volatility: f64,
    /// Autocorrelation at lag 1
    pub autocorrelation: f64,
    /// Fraction of points with |z| > 2
    pub anomaly_score: f64,
    pub sample_count: usize,
}

impl MetricStats {
    /// Whether the series carried enough samples to produce real statistics.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.sample_count >= 3
    }
}

/// The per-service fingerprint every detector consumes.
///
/// One extraction reduces the raw series for the five canonical metrics into
/// roughly sixty scalar features: per-metric statistics, cross-metric
/// correlations, pattern flags, and four composite scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceFeatures {
    pub service: String,
    pub window_minutes: u64,
    pub extracted_at: DateTime<Utc>,

    pub cpu: MetricStats,
    pub memory: MetricStats,
    pub error_rate: MetricStats,
    pub latency: MetricStats,
    pub request_rate: MetricStats,

    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    /// Coefficient of variation of successive error-count differences
    pub error_spikiness: f64,

    pub cpu_memory_corr: f64,
    pub cpu_error_corr: f64,
    pub memory_error_corr: f64,
    pub latency_error_corr: f64,
    pub request_cpu_corr: f64,

    pub has_periodic_pattern: bool,
    /// Dominant period in seconds, 0 when no periodicity was found
    pub period_length_secs: f64,
    pub has_trend: bool,
    pub trend_direction: TrendDirection,

    /// (cpu_mean + mem_mean + 10 * err_mean) / 3, clamped to [0, 100]
    pub system_stress: f64,
    /// 100 minus rule-based deductions, floored at 0
    pub health_score: f64,
    /// Volatility-based stability on a 0-10 scale
    pub stability_index: f64,
    /// How forecastable the service looks, 0-100
    pub predictability_score: f64,
}

impl ServiceFeatures {
    /// Neutral fingerprint for a service with no usable data.
    #[must_use]
    pub fn empty(service: &str, window_minutes: u64) -> Self {
        Self {
            service: service.to_string(),
            window_minutes,
            extracted_at: Utc::now(),
            cpu: MetricStats::default(),
            memory: MetricStats::default(),
            error_rate: MetricStats::default(),
            latency: MetricStats::default(),
            request_rate: MetricStats::default(),
            latency_p50: 0.0,
            latency_p95: 0.0,
            latency_p99: 0.0,
            error_spikiness: 0.0,
            cpu_memory_corr: 0.0,
            cpu_error_corr: 0.0,
            memory_error_corr: 0.0,
            latency_error_corr: 0.0,
            request_cpu_corr: 0.0,
            has_periodic_pattern: false,
            period_length_secs: 0.0,
            has_trend: false,
            trend_direction: TrendDirection::Stable,
            system_stress: 0.0,
            health_score: 100.0,
            stability_index: 10.0,
            predictability_score: 50.0,
        }
    }

    /// Number of the four severe-degradation criteria currently met:
    /// cpu mean > 85, memory mean > 88, error mean > 15, latency P95 > 2000.
    #[must_use]
    pub fn degraded_count(&self) -> usize {
        let mut count = 0;
        if self.cpu.mean > 85.0 {
            count += 1;
        }
        if self.memory.mean > 88.0 {
            count += 1;
        }
        if self.error_rate.mean > 15.0 {
            count += 1;
        }
        if self.latency_p95 > 2000.0 {
            count += 1;
        }
        count
    }

    /// Number of resource trends rising faster than 0.1 units/minute.
    #[must_use]
    pub fn rising_trend_count(&self) -> usize {
        [
            self.cpu.trend_slope,
            self.memory.trend_slope,
            self.error_rate.trend_slope,
            self.latency.trend_slope,
        ]
        .iter()
        .filter(|slope| **slope > 0.1)
        .count()
    }
}
