//! Deployment bug detection.
//!
//! A bad rollout produces bursty errors on an otherwise healthy resource
//! profile: error spikes decorrelated from CPU, resources nowhere near
//! their ceilings. No deployment metadata is assumed; the shape of the
//! error series carries the verdict.

use serde_json::json;

use crate::detectors::detector::{
    apply_gate, round2, severity_ladder, Detection, Detector, ProblemType, Severity, SignalTally,
};
use crate::features::ServiceFeatures;

const BASE_THRESHOLD: f64 = 55.0;
const Q_MIN: usize = 2;
const DAMPING: f64 = 0.70;
const CRITICAL_THRESHOLD: f64 = 90.0;

pub struct DeploymentBugDetector;

impl Detector for DeploymentBugDetector {
    fn name(&self) -> &'static str {
        "deployment_bug"
    }

    fn problem_type(&self) -> ProblemType {
        ProblemType::DeploymentBug
    }

    fn analyze(&self, features: &ServiceFeatures) -> Detection {
        if !features.error_rate.has_data() {
            return Detection::not_detected(
                ProblemType::DeploymentBug,
                &features.service,
                "insufficient data",
            );
        }

        let cpu = &features.cpu;
        let mem = &features.memory;
        let err = &features.error_rate;
        let spikiness = features.error_spikiness;

        let mut tally = SignalTally::new();
        if spikiness > 2.0 && err.mean > 5.0 {
            tally.add("error_bursts", 40.0, spikiness > 3.0);
        }
        if err.mean > 15.0 {
            tally.add("high_error_level", 25.0, err.mean > 25.0);
        }
        if features.cpu_error_corr.abs() < 0.25 && err.mean > 10.0 {
            tally.add(
                "load_decoupled_errors",
                20.0,
                features.cpu_error_corr.abs() < 0.15,
            );
        }
        if features.stability_index < 4.0 {
            tally.add("low_stability", 15.0, features.stability_index < 2.5);
        }
        // Errors without resource pressure: the code, not the cluster.
        if cpu.mean < 70.0 && mem.mean < 70.0 && err.mean > 10.0 {
            tally.bonus("healthy_resources_failing_requests", 15.0);
        }

        let quality = tally.quality();
        let outcome = apply_gate(tally.total(), BASE_THRESHOLD, quality, Q_MIN, false, DAMPING);
        let amplifier = quality >= 3;
        let severity = severity_ladder(
            outcome.detected,
            outcome.confidence,
            CRITICAL_THRESHOLD,
            amplifier,
        );

        let mut evidence = tally.into_signals();
        evidence.insert("error_spikiness".to_string(), json!(round2(spikiness)));
        evidence.insert("error_mean".to_string(), json!(round2(err.mean)));
        evidence.insert(
            "cpu_error_corr".to_string(),
            json!(round2(features.cpu_error_corr)),
        );
        evidence.insert("cpu_mean".to_string(), json!(round2(cpu.mean)));
        evidence.insert("memory_mean".to_string(), json!(round2(mem.mean)));
        evidence.insert(
            "stability_index".to_string(),
            json!(round2(features.stability_index)),
        );
        evidence.insert("signal_quality".to_string(), json!(quality));
        if outcome.damped {
            evidence.insert("confidence_damped".to_string(), json!(true));
        }

        Detection {
            problem_type: ProblemType::DeploymentBug,
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
            "Error bursts with healthy resources point at the latest rollout. Roll back to the previous stable version immediately and block further deploys.".to_string()
        }
        Severity::High => {
            "Error pattern matches a bad deployment. Roll back to the previous stable version and watch the error rate recover.".to_string()
        }
        Severity::Medium => {
            "Bursty errors not explained by load. Review the most recent deployment diff and canary metrics.".to_string()
        }
        Severity::Low => {
            "Error behavior changed recently. Compare error signatures before and after the last rollout.".to_string()
        }
        Severity::None => String::new(),
    }
}
