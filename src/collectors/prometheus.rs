//! Prometheus scraping worker.
//!
//! Polls each configured target's exposition endpoint on a fixed cadence
//! (with jitter so a fleet of sentinels does not thunder in lockstep),
//! parses the text format subset the sentinel consumes, and bulk-inserts
//! the allowed metrics as samples for the target's service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::infrastructure::self_metrics::{SAMPLES_INGESTED_TOTAL, SCRAPE_CYCLES_TOTAL};
use crate::infrastructure::store::{MetricSample, MetricStore};
use crate::utils::config::{ScrapeTarget, ScraperConfig};
use crate::utils::error::{SentinelError, SentinelResult};
use crate::utils::structured_logging::StructuredLogger;

/// `metric_name{labels} value [timestamp]` — the sample-line subset of the
/// text exposition format. Histogram/summary internals arrive as ordinary
/// sample lines and are simply filtered by the allowlist.
static SAMPLE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z_:][a-zA-Z0-9_:]*)(\{[^}]*\})?\s+([^\s]+)")
        .unwrap_or_else(|e| unreachable!("sample line regex is static: {e}"))
});

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_][a-zA-Z0-9_]*)="([^"]*)""#)
        .unwrap_or_else(|e| unreachable!("label regex is static: {e}"))
});

/// Parse an exposition page into samples for `service`, keeping only the
/// allowlisted metric names. Non-finite values are dropped where they
/// stand; they would otherwise poison the numeric kernel downstream.
#[must_use]
pub fn parse_exposition(body: &str, service: &str, allowlist: &[String]) -> Vec<MetricSample> {
    let now = Utc::now();
    let mut samples = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(caps) = SAMPLE_LINE_RE.captures(line) else {
            continue;
        };
        let name = &caps[1];
        if !allowlist.iter().any(|allowed| allowed == name) {
            continue;
        }
        let Ok(value) = caps[3].parse::<f64>() else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }
        let mut sample = MetricSample::new(service, name, value, now);
        if let Some(labels) = caps.get(2) {
            for label in LABEL_RE.captures_iter(labels.as_str()) {
                sample
                    .labels
                    .insert(label[1].to_string(), label[2].to_string());
            }
        }
        samples.push(sample);
    }
    samples
}

/// Background poller feeding the samples table.
pub struct ScrapeWorker {
    store: Arc<dyn MetricStore>,
    client: reqwest::Client,
    config: ScraperConfig,
}

impl ScrapeWorker {
    pub fn new(store: Arc<dyn MetricStore>, config: ScraperConfig) -> SentinelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SentinelError::Configuration {
                reason: format!("Failed to build scrape client: {e}"),
            })?;
        Ok(Self {
            store,
            client,
            config,
        })
    }

    /// Run the scrape loop until the task is aborted. Per-target failures
    /// are logged and the cycle continues.
    pub async fn run(self) {
        info!(
            targets = self.config.targets.len(),
            interval_secs = self.config.interval_secs,
            "Scrape worker started"
        );
        let base = Duration::from_secs(self.config.interval_secs);
        loop {
            for target in &self.config.targets {
                match self.scrape_target(target).await {
                    Ok(count) => {
                        SCRAPE_CYCLES_TOTAL
                            .with_label_values(&[&target.service, "ok"])
                            .inc();
                        StructuredLogger::log_scrape_cycle(
                            &target.url,
                            &target.service,
                            count,
                            true,
                        );
                    }
                    Err(e) => {
                        SCRAPE_CYCLES_TOTAL
                            .with_label_values(&[&target.service, "error"])
                            .inc();
                        StructuredLogger::log_scrape_cycle(&target.url, &target.service, 0, false);
                        warn!(target = %target.url, error = %e, "Scrape failed");
                    }
                }
            }
            tokio::time::sleep(jittered(base)).await;
        }
    }

    async fn scrape_target(&self, target: &ScrapeTarget) -> SentinelResult<usize> {
        let url = format!("{}/metrics", target.url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SentinelError::ScrapeFailed {
                target: target.url.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(SentinelError::ScrapeFailed {
                target: target.url.clone(),
                reason: format!("status {}", response.status()),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| SentinelError::ScrapeFailed {
                target: target.url.clone(),
                reason: e.to_string(),
            })?;

        let samples = parse_exposition(&body, &target.service, &self.config.metric_allowlist);
        if samples.is_empty() {
            debug!(target = %target.url, "Exposition page had no allowlisted metrics");
            return Ok(0);
        }
        let inserted = self.store.insert_samples(&samples).await?;
        SAMPLES_INGESTED_TOTAL
            .with_label_values(&["scraper"])
            .inc_by(inserted as f64);
        Ok(inserted)
    }
}

/// Interval with up to ±10% random jitter.
fn jittered(base: Duration) -> Duration {
    let jitter_range = base.as_millis() as f64 * 0.1;
    let offset = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    let millis = (base.as_millis() as f64 + offset).max(100.0);
    Duration::from_millis(millis as u64)
}
