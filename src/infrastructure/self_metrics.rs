//! Process-level self-metrics.
//!
//! Counters and histograms describing the sentinel itself (not the services
//! it watches): scrape cycles, diagnoses run, persistence failures. Exposed
//! in the Prometheus text format at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use tracing::error;

lazy_static! {
    /// Diagnoses started, labeled by outcome (completed, failed, deadline)
    pub static ref DIAGNOSES_TOTAL: CounterVec = register_counter_vec!(
        "sentinel_diagnoses_total",
        "Diagnoses run, by outcome",
        &["outcome"]
    )
    .expect("metric registration failed");

    /// Diagnosis latency in seconds
    pub static ref DIAGNOSIS_DURATION: HistogramVec = register_histogram_vec!(
        "sentinel_diagnosis_duration_seconds",
        "Diagnosis duration in seconds",
        &["service"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric registration failed");

    /// Diagnosis records that could not be written (diagnosis still returned)
    pub static ref PERSISTENCE_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "sentinel_persistence_failures_total",
        "Diagnosis records that failed to persist",
        &["operation"]
    )
    .expect("metric registration failed");

    /// Scrape cycles, labeled by target service and outcome
    pub static ref SCRAPE_CYCLES_TOTAL: CounterVec = register_counter_vec!(
        "sentinel_scrape_cycles_total",
        "Scrape cycles, by service and outcome",
        &["service", "outcome"]
    )
    .expect("metric registration failed");

    /// Samples ingested, labeled by source (scraper, api)
    pub static ref SAMPLES_INGESTED_TOTAL: CounterVec = register_counter_vec!(
        "sentinel_samples_ingested_total",
        "Metric samples ingested, by source",
        &["source"]
    )
    .expect("metric registration failed");
}

/// Render the default registry in the Prometheus text exposition format.
#[must_use]
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("Failed to encode self-metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
