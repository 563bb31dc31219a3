//! Cascading failure detection.
//!
//! Everything degrading at once: multiple metrics past their severe
//! thresholds, stress high, health collapsing, several series still rising.
//! The quality gate additionally requires at least three degraded metrics;
//! four degraded metrics is the CRITICAL amplifier.

use serde_json::json;

use crate::detectors::detector::{
    apply_gate, round2, severity_ladder, Detection, Detector, ProblemType, Severity, SignalTally,
};
use crate::features::ServiceFeatures;

const BASE_THRESHOLD: f64 = 60.0;
const Q_MIN: usize = 2;
const DAMPING: f64 = 0.75;
const CRITICAL_THRESHOLD: f64 = 85.0;

pub struct CascadeFailureDetector;

impl CascadeFailureDetector {
    /// Weight of the degraded-metrics signal, scaled by how far each
    /// degraded metric overshoots its severe threshold. Sitting exactly at
    /// the thresholds earns ~75% of the weight; deep overshoot saturates it.
    fn degraded_weight(features: &ServiceFeatures) -> f64 {
        let mut overshoots = Vec::new();
        if features.cpu.mean > 85.0 {
            overshoots.push(((features.cpu.mean / 85.0) - 1.0).clamp(0.0, 1.0));
        }
        if features.memory.mean > 88.0 {
            overshoots.push(((features.memory.mean / 88.0) - 1.0).clamp(0.0, 1.0));
        }
        if features.error_rate.mean > 15.0 {
            overshoots.push(((features.error_rate.mean / 15.0) - 1.0).clamp(0.0, 1.0));
        }
        if features.latency_p95 > 2000.0 {
            overshoots.push(((features.latency_p95 / 2000.0) - 1.0).clamp(0.0, 1.0));
        }
        if overshoots.is_empty() {
            return 0.0;
        }
        let avg_excess = overshoots.iter().sum::<f64>() / overshoots.len() as f64;
        35.0 * (0.75 + avg_excess).min(1.0)
    }
}

impl Detector for CascadeFailureDetector {
    fn name(&self) -> &'static str {
        "cascade_failure"
    }

    fn problem_type(&self) -> ProblemType {
        ProblemType::CascadingFailure
    }

    fn analyze(&self, features: &ServiceFeatures) -> Detection {
        if !features.cpu.has_data() && !features.memory.has_data() {
            return Detection::not_detected(
                ProblemType::CascadingFailure,
                &features.service,
                "insufficient data",
            );
        }

        let degraded = features.degraded_count();
        let rising = features.rising_trend_count();

        let mut tally = SignalTally::new();
        if degraded >= 3 {
            tally.add(
                "multiple_metrics_degraded",
                Self::degraded_weight(features),
                degraded >= 4,
            );
        }
        if features.system_stress > 80.0 {
            tally.add("extreme_stress", 30.0, features.system_stress > 90.0);
        }
        if features.health_score < 35.0 {
            tally.add("health_collapse", 20.0, features.health_score < 20.0);
        }
        if rising >= 2 {
            tally.add("compounding_trends", 15.0, rising >= 3);
        }
        if features.stability_index < 2.5 {
            tally.add("instability", 10.0, features.stability_index < 1.5);
        }

        let quality = tally.quality();
        // The gate carries an extra structural requirement: a cascade needs
        // at least three metrics past their severe thresholds.
        let gate_quality = if degraded >= 3 { quality } else { 0 };
        let outcome = apply_gate(
            tally.total(),
            BASE_THRESHOLD,
            gate_quality,
            Q_MIN,
            false,
            DAMPING,
        );
        let amplifier = degraded >= 4;
        let severity = severity_ladder(
            outcome.detected,
            outcome.confidence,
            CRITICAL_THRESHOLD,
            amplifier,
        );

        let mut evidence = tally.into_signals();
        evidence.insert("degraded_count".to_string(), json!(degraded));
        evidence.insert("rising_trends".to_string(), json!(rising));
        evidence.insert("system_stress".to_string(), json!(round2(features.system_stress)));
        evidence.insert("health_score".to_string(), json!(round2(features.health_score)));
        evidence.insert(
            "stability_index".to_string(),
            json!(round2(features.stability_index)),
        );
        evidence.insert("signal_quality".to_string(), json!(quality));
        if outcome.damped {
            evidence.insert("confidence_damped".to_string(), json!(true));
        }

        Detection {
            problem_type: ProblemType::CascadingFailure,
            service: features.service.clone(),
            detected: outcome.detected,
            confidence: outcome.confidence,
            severity,
            evidence,
            recommendation: recommendation(severity, degraded),
            timestamp: chrono::Utc::now(),
        }
    }
}

fn recommendation(severity: Severity, degraded: usize) -> String {
    match severity {
        Severity::Critical => format!(
            "{degraded} metrics degraded simultaneously: cascade in progress. Open circuit breakers to stop the propagation, then scale aggressively."
        ),
        Severity::High => {
            "Degradation spreading across metrics. Isolate the failing dependency chain and add capacity now.".to_string()
        }
        Severity::Medium => {
            "Several metrics degrading together. Check shared dependencies and recent traffic shifts.".to_string()
        }
        Severity::Low => {
            "Correlated degradation starting. Watch for error and latency feedback loops.".to_string()
        }
        Severity::None => String::new(),
    }
}
