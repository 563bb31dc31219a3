//! Resource exhaustion detection.
//!
//! Fires when CPU and memory sit near their ceilings at the same time,
//! usually with errors already climbing. Both resources being high is the
//! amplifier: it bypasses the quality gate and is required for a CRITICAL
//! verdict.

use serde_json::json;

use crate::detectors::detector::{
    apply_gate, round2, severity_ladder, Detection, Detector, ProblemType, Severity, SignalTally,
};
use crate::features::ServiceFeatures;

const BASE_THRESHOLD: f64 = 60.0;
const Q_MIN: usize = 2;
const DAMPING: f64 = 0.75;
const CRITICAL_THRESHOLD: f64 = 85.0;

pub struct ResourceExhaustionDetector;

impl Detector for ResourceExhaustionDetector {
    fn name(&self) -> &'static str {
        "resource_exhaustion"
    }

    fn problem_type(&self) -> ProblemType {
        ProblemType::ResourceExhaustion
    }

    fn analyze(&self, features: &ServiceFeatures) -> Detection {
        if !features.cpu.has_data() && !features.memory.has_data() {
            return Detection::not_detected(
                ProblemType::ResourceExhaustion,
                &features.service,
                "insufficient data",
            );
        }

        let cpu = &features.cpu;
        let mem = &features.memory;
        let err = &features.error_rate;
        let both_high = cpu.mean > 80.0 && mem.mean > 80.0;

        let mut tally = SignalTally::new();
        if cpu.mean > 80.0 {
            tally.add("cpu_saturation", 30.0, cpu.mean > 90.0);
        }
        if mem.mean > 85.0 {
            tally.add("memory_saturation", 30.0, mem.mean > 92.0);
        }
        if err.mean > 8.0 || err.trend_slope > 2.0 {
            tally.add("error_pressure", 25.0, err.mean > 15.0);
        }
        if features.system_stress > 75.0 {
            tally.add("system_stress", 15.0, features.system_stress > 85.0);
        }
        if both_high {
            tally.bonus("both_resources_high", 20.0);
        }

        let quality = tally.quality();
        let outcome = apply_gate(
            tally.total(),
            BASE_THRESHOLD,
            quality,
            Q_MIN,
            both_high,
            DAMPING,
        );
        let severity = severity_ladder(
            outcome.detected,
            outcome.confidence,
            CRITICAL_THRESHOLD,
            both_high,
        );

        let mut evidence = tally.into_signals();
        evidence.insert("cpu_mean".to_string(), json!(round2(cpu.mean)));
        evidence.insert("memory_mean".to_string(), json!(round2(mem.mean)));
        evidence.insert("error_mean".to_string(), json!(round2(err.mean)));
        evidence.insert("system_stress".to_string(), json!(round2(features.system_stress)));
        evidence.insert("both_resources_high".to_string(), json!(both_high));
        evidence.insert("signal_quality".to_string(), json!(quality));
        if outcome.damped {
            evidence.insert("confidence_damped".to_string(), json!(true));
        }

        Detection {
            problem_type: ProblemType::ResourceExhaustion,
            service: features.service.clone(),
            detected: outcome.detected,
            confidence: outcome.confidence,
            severity,
            evidence,
            recommendation: recommendation(severity, cpu.mean, mem.mean),
            timestamp: chrono::Utc::now(),
        }
    }
}

fn recommendation(severity: Severity, cpu_mean: f64, mem_mean: f64) -> String {
    match severity {
        Severity::Critical => format!(
            "CPU at {:.0}% and memory at {:.0}%: the service is out of headroom. Scale out immediately and raise resource limits.",
            cpu_mean, mem_mean
        ),
        Severity::High => {
            "Resources near saturation. Add replicas before the next traffic peak and review limit requests.".to_string()
        }
        Severity::Medium => {
            "Resource usage elevated. Plan a capacity increase and check for recent load growth.".to_string()
        }
        Severity::Low => {
            "Resource usage above normal. Monitor utilization trends over the next hour.".to_string()
        }
        Severity::None => String::new(),
    }
}
