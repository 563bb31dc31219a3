//! External failure detection.
//!
//! An upstream dependency degrading shows as latency blowing out together
//! with errors while the service's own resources stay calm. The amplifier
//! (the "external pattern") is high tail latency moving in lockstep with
//! errors; it bypasses the three-signal quality gate.

use serde_json::json;

use crate::detectors::detector::{
    apply_gate, round2, severity_ladder, Detection, Detector, ProblemType, Severity, SignalTally,
};
use crate::features::ServiceFeatures;

const BASE_THRESHOLD: f64 = 55.0;
const Q_MIN: usize = 3;
const DAMPING: f64 = 0.65;
const CRITICAL_THRESHOLD: f64 = 90.0;

pub struct ExternalFailureDetector;

impl Detector for ExternalFailureDetector {
    fn name(&self) -> &'static str {
        "external_failure"
    }

    fn problem_type(&self) -> ProblemType {
        ProblemType::ExternalFailure
    }

    fn analyze(&self, features: &ServiceFeatures) -> Detection {
        if !features.latency.has_data() && !features.error_rate.has_data() {
            return Detection::not_detected(
                ProblemType::ExternalFailure,
                &features.service,
                "insufficient data",
            );
        }

        let cpu = &features.cpu;
        let mem = &features.memory;
        let err = &features.error_rate;
        let lat_err_corr = features.latency_error_corr;
        let external_pattern = lat_err_corr.abs() > 0.6 && features.latency_p99 > 3000.0;

        let mut tally = SignalTally::new();
        if features.latency_p99 > 3000.0 {
            tally.add("tail_latency_blowout", 35.0, features.latency_p99 > 5000.0);
        }
        if lat_err_corr.abs() > 0.6 {
            tally.add("latency_error_lockstep", 30.0, lat_err_corr.abs() > 0.75);
        }
        if err.mean > 10.0 && cpu.mean < 65.0 && mem.mean < 70.0 {
            tally.add("errors_without_pressure", 20.0, err.mean > 15.0);
        }
        if features.error_spikiness > 2.5 {
            tally.add("error_bursts", 15.0, features.error_spikiness > 3.5);
        }
        // Memory uninvolved in the error pattern: failures originate outside.
        if features.memory_error_corr.abs() < 0.3 && err.mean > 8.0 {
            tally.bonus("memory_decoupled_errors", 10.0);
        }

        let quality = tally.quality();
        let outcome = apply_gate(
            tally.total(),
            BASE_THRESHOLD,
            quality,
            Q_MIN,
            external_pattern,
            DAMPING,
        );
        let severity = severity_ladder(
            outcome.detected,
            outcome.confidence,
            CRITICAL_THRESHOLD,
            external_pattern,
        );

        let mut evidence = tally.into_signals();
        evidence.insert("latency_p99".to_string(), json!(round2(features.latency_p99)));
        evidence.insert(
            "latency_error_corr".to_string(),
            json!(round2(lat_err_corr)),
        );
        evidence.insert(
            "memory_error_corr".to_string(),
            json!(round2(features.memory_error_corr)),
        );
        evidence.insert("error_mean".to_string(), json!(round2(err.mean)));
        evidence.insert("cpu_mean".to_string(), json!(round2(cpu.mean)));
        evidence.insert("external_pattern".to_string(), json!(external_pattern));
        evidence.insert("signal_quality".to_string(), json!(quality));
        if outcome.damped {
            evidence.insert("confidence_damped".to_string(), json!(true));
        }

        Detection {
            problem_type: ProblemType::ExternalFailure,
            service: features.service.clone(),
            detected: outcome.detected,
            confidence: outcome.confidence,
            severity,
            evidence,
            recommendation: recommendation(severity),
            timestamp: chrono::Utc::now(),
        }
    }
}

fn recommendation(severity: Severity) -> String {
    match severity {
        Severity::Critical => {
            "Upstream dependency failing hard: tail latency and errors moving together. Enable the fallback path and shed load to the dependency.".to_string()
        }
        Severity::High => {
            "Latency and errors track an external dependency. Enable cached fallbacks and add retry with backoff on dependency calls.".to_string()
        }
        Severity::Medium => {
            "Elevated tail latency correlated with errors. Check dependency health dashboards and connection pool saturation.".to_string()
        }
        Severity::Low => {
            "Intermittent latency spikes observed. Verify external endpoints and DNS resolution times.".to_string()
        }
        Severity::None => String::new(),
    }
}
