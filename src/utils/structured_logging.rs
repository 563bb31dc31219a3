use tracing::{event, Level};
use uuid::Uuid;

/// Structured logging utilities for better observability and debugging
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log the outcome of one diagnosis with its fused verdict
    pub fn log_diagnosis(
        prediction_id: Uuid,
        service: &str,
        problem_type: &str,
        confidence: f64,
        severity: &str,
        risk_level: &str,
        detector_failures: usize,
    ) {
        event!(
            Level::INFO,
            prediction_id = %prediction_id,
            service = %service,
            problem_type = %problem_type,
            confidence = confidence,
            severity = %severity,
            risk_level = %risk_level,
            detector_failures = detector_failures,
            "Diagnosis completed"
        );
    }

    /// Log a single detector verdict at debug level
    pub fn log_detection(service: &str, detector: &str, detected: bool, confidence: f64) {
        event!(
            Level::DEBUG,
            service = %service,
            detector = %detector,
            detected = detected,
            confidence = confidence,
            "Detector verdict"
        );
    }

    /// Log a persisted high-confidence diagnosis record
    pub fn log_diagnosis_persisted(record_id: Uuid, service: &str, problem_type: &str) {
        event!(
            Level::INFO,
            record_id = %record_id,
            service = %service,
            problem_type = %problem_type,
            "Diagnosis record persisted"
        );
    }

    /// Log one scrape cycle outcome
    pub fn log_scrape_cycle(target: &str, service: &str, samples: usize, success: bool) {
        if success {
            event!(
                Level::DEBUG,
                target = %target,
                service = %service,
                samples = samples,
                "Scrape cycle completed"
            );
        } else {
            event!(
                Level::WARN,
                target = %target,
                service = %service,
                "Scrape cycle failed"
            );
        }
    }

    /// Log a cluster event as it is ingested
    pub fn log_cluster_event(event_type: &str, pod: &str, namespace: &str) {
        event!(
            Level::INFO,
            event_type = %event_type,
            pod = %pod,
            namespace = %namespace,
            "Cluster event ingested"
        );
    }

    /// Log API request/response for debugging
    pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64) {
        let level_is_error = status_code >= 500;
        if level_is_error {
            event!(
                Level::ERROR,
                method = %method,
                path = %path,
                status_code = status_code,
                duration_ms = duration_ms,
                "API request"
            );
        } else {
            event!(
                Level::DEBUG,
                method = %method,
                path = %path,
                status_code = status_code,
                duration_ms = duration_ms,
                "API request"
            );
        }
    }
}
