use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::error::{SentinelError, SentinelResult};

static SERVICE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9._-]{0,126}[a-z0-9])?$")
        .unwrap_or_else(|e| unreachable!("service name regex is static: {e}"))
});

static METRIC_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]{0,254}$")
        .unwrap_or_else(|e| unreachable!("metric name regex is static: {e}"))
});

/// Input validation for API payloads and ingested identifiers
pub struct InputValidator;

impl InputValidator {
    /// Validate a service name (DNS-label-ish, as pods and deployments use)
    pub fn validate_service_name(name: &str) -> SentinelResult<()> {
        if SERVICE_NAME_RE.is_match(name) {
            Ok(())
        } else {
            Err(SentinelError::Validation {
                field: "service".to_string(),
                reason: format!("'{name}' is not a valid service name"),
            })
        }
    }

    /// Validate a metric name against the Prometheus identifier grammar
    pub fn validate_metric_name(name: &str) -> SentinelResult<()> {
        if METRIC_NAME_RE.is_match(name) {
            Ok(())
        } else {
            Err(SentinelError::Validation {
                field: "metric_name".to_string(),
                reason: format!("'{name}' is not a valid metric name"),
            })
        }
    }

    /// Validate a metric value as it enters the store. Counters and gauges
    /// the sentinel consumes are finite and non-negative.
    pub fn validate_sample_value(value: f64) -> SentinelResult<()> {
        if !value.is_finite() {
            return Err(SentinelError::Validation {
                field: "value".to_string(),
                reason: "sample value must be finite".to_string(),
            });
        }
        if value < 0.0 {
            return Err(SentinelError::Validation {
                field: "value".to_string(),
                reason: "sample value must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    /// Validate a history/comparison limit parameter
    pub fn validate_limit(limit: usize) -> SentinelResult<()> {
        if limit == 0 || limit > 1000 {
            return Err(SentinelError::Validation {
                field: "limit".to_string(),
                reason: "limit must lie in [1, 1000]".to_string(),
            });
        }
        Ok(())
    }
}
