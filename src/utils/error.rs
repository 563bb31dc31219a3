use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Custom error types for the service sentinel system
///
/// This enum provides structured error handling for every component, from
/// the numeric kernel up to the HTTP surface, with proper error chaining.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SentinelError {
    /// A detector or the feature extractor had fewer samples than required.
    /// Non-fatal: callers degrade to a neutral non-detection.
    #[error("Insufficient data: {service}/{metric}, have {have} samples, need {need}")]
    InsufficientData {
        service: String,
        metric: String,
        have: usize,
        need: usize,
    },

    /// The metric store cannot be reached. Fatal for the whole diagnosis.
    #[error("Metric store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Store query failed: {operation}, reason: {reason}")]
    StoreQueryFailed { operation: String, reason: String },

    /// Diagnosis computed but could not be written. The diagnosis is still
    /// returned; the failure is counted separately.
    #[error("Persistence error: {operation}, reason: {reason}")]
    Persistence { operation: String, reason: String },

    /// Caller deadline elapsed. Returned verbatim; no side effects.
    #[error("Deadline exceeded: {operation} after {timeout_ms}ms")]
    DeadlineExceeded { operation: String, timeout_ms: u64 },

    /// Caller cancellation. Returned verbatim; no side effects.
    #[error("Cancelled: {operation}")]
    Cancelled { operation: String },

    /// NaN/Inf or negative counts in numeric inputs. Downgraded to
    /// InsufficientData for the offending metric only.
    #[error("Domain error in {function}: {reason}")]
    Domain { function: String, reason: String },

    #[error("Detector failed: {detector}, reason: {reason}")]
    DetectorFailed { detector: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Configuration file not found: {path}")]
    ConfigurationFileNotFound { path: String },

    /// Scraper errors
    #[error("Scrape failed: {target}, reason: {reason}")]
    ScrapeFailed { target: String, reason: String },

    #[error("Exposition parse error: {target}, line {line}: {reason}")]
    ExpositionParse {
        target: String,
        line: usize,
        reason: String,
    },

    /// Validation errors
    #[error("Invalid input: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("IO error: {reason}")]
    Io { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("Operation failed: {reason}")]
    OperationFailed { reason: String },
}

/// Result type alias used throughout the crate
pub type SentinelResult<T> = Result<T, SentinelError>;

impl SentinelError {
    /// Whether this error leaves the diagnosis usable (the engine degrades
    /// instead of aborting).
    #[must_use]
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            SentinelError::InsufficientData { .. }
                | SentinelError::Domain { .. }
                | SentinelError::DetectorFailed { .. }
        )
    }

    /// Whether the error came from caller cancellation or deadline expiry.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            SentinelError::Cancelled { .. } | SentinelError::DeadlineExceeded { .. }
        )
    }

    /// Stable machine-readable code for API error envelopes. Never exposes
    /// store internals.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SentinelError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            SentinelError::StoreUnavailable { .. } | SentinelError::StoreQueryFailed { .. } => {
                "STORE_UNAVAILABLE"
            }
            SentinelError::Persistence { .. } => "PERSISTENCE_FAILED",
            SentinelError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            SentinelError::Cancelled { .. } => "CANCELLED",
            SentinelError::Domain { .. } => "DOMAIN_ERROR",
            SentinelError::DetectorFailed { .. } => "DETECTOR_FAILED",
            SentinelError::Configuration { .. }
            | SentinelError::ConfigurationFileNotFound { .. } => "CONFIGURATION_ERROR",
            SentinelError::ScrapeFailed { .. } | SentinelError::ExpositionParse { .. } => {
                "SCRAPE_FAILED"
            }
            SentinelError::Validation { .. } => "VALIDATION_ERROR",
            SentinelError::NotFound { .. } => "NOT_FOUND",
            SentinelError::Io { .. } => "IO_ERROR",
            SentinelError::Serialization { .. } => "SERIALIZATION_ERROR",
            SentinelError::OperationFailed { .. } => "OPERATION_FAILED",
        }
    }
}

impl From<std::io::Error> for SentinelError {
    fn from(err: std::io::Error) -> Self {
        SentinelError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(err: serde_json::Error) -> Self {
        SentinelError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Extension trait for attaching sentinel context to arbitrary results
pub trait ResultExt<T> {
    fn with_operation(self, operation: &str) -> SentinelResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_operation(self, operation: &str) -> SentinelResult<T> {
        self.map_err(|e| SentinelError::OperationFailed {
            reason: format!("{operation}: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradable_classification() {
        let err = SentinelError::InsufficientData {
            service: "api".to_string(),
            metric: "cpu_usage".to_string(),
            have: 2,
            need: 3,
        };
        assert!(err.is_degradable());
        assert!(!err.is_cancellation());

        let fatal = SentinelError::StoreUnavailable {
            reason: "connection refused".to_string(),
        };
        assert!(!fatal.is_degradable());
    }

    #[test]
    fn test_cancellation_classification() {
        let err = SentinelError::DeadlineExceeded {
            operation: "diagnose".to_string(),
            timeout_ms: 5000,
        };
        assert!(err.is_cancellation());
        assert_eq!(err.code(), "DEADLINE_EXCEEDED");
    }

    #[test]
    fn test_error_codes_hide_store_details() {
        let err = SentinelError::StoreQueryFailed {
            operation: "range".to_string(),
            reason: "no such table: metric_samples".to_string(),
        };
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
    }
}
