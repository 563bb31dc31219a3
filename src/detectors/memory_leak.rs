//! Memory leak detection.
//!
//! A leak shows up as sustained low-volatility memory growth that is not
//! explained by CPU load. The strongest single signal is the regression
//! trend; decorrelation from CPU earns a bonus because load-driven memory
//! growth tracks CPU while a leak does not.

use serde_json::json;

use crate::detectors::detector::{
    apply_gate, round2, severity_ladder, Detection, Detector, ProblemType, Severity, SignalTally,
};
use crate::features::ServiceFeatures;

const BASE_THRESHOLD: f64 = 65.0;
const Q_MIN: usize = 2;
const DAMPING: f64 = 0.70;
const CRITICAL_THRESHOLD: f64 = 85.0;

pub struct MemoryLeakDetector;

impl Detector for MemoryLeakDetector {
    fn name(&self) -> &'static str {
        "memory_leak"
    }

    fn problem_type(&self) -> ProblemType {
        ProblemType::MemoryLeak
    }

    fn analyze(&self, features: &ServiceFeatures) -> Detection {
        if !features.memory.has_data() {
            return Detection::not_detected(
                ProblemType::MemoryLeak,
                &features.service,
                "insufficient data",
            );
        }

        let mem = &features.memory;
        let mut tally = SignalTally::new();

        if mem.trend_slope > 0.15 {
            tally.add("sustained_growth", 35.0, mem.trend_slope > 0.25);
        }
        if mem.volatility < 0.15 && mem.trend_slope > 0.1 {
            tally.add("steady_climb", 25.0, mem.volatility < 0.10);
        }
        if mem.mean > 75.0 {
            tally.add("elevated_usage", 20.0, mem.mean > 85.0);
        }
        if mem.range > 15.0 {
            tally.add("wide_range", 10.0, mem.range > 25.0);
        }
        if mem.autocorrelation > 0.8 {
            tally.add("persistent_series", 10.0, mem.autocorrelation > 0.9);
        }
        // Growth decoupled from CPU load points at allocation, not traffic.
        if features.cpu_memory_corr.abs() < 0.3 && mem.trend_slope > 0.1 {
            tally.bonus("cpu_decoupled_growth", 15.0);
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
        evidence.insert("memory_trend".to_string(), json!(round2(mem.trend_slope)));
        evidence.insert(
            "memory_trend_unit".to_string(),
            json!("percent_per_minute"),
        );
        evidence.insert("memory_mean".to_string(), json!(round2(mem.mean)));
        evidence.insert("memory_volatility".to_string(), json!(round2(mem.volatility)));
        evidence.insert("memory_range".to_string(), json!(round2(mem.range)));
        evidence.insert(
            "cpu_memory_corr".to_string(),
            json!(round2(features.cpu_memory_corr)),
        );
        evidence.insert("signal_quality".to_string(), json!(quality));
        if outcome.damped {
            evidence.insert("confidence_damped".to_string(), json!(true));
        }

        Detection {
            problem_type: ProblemType::MemoryLeak,
            service: features.service.clone(),
            detected: outcome.detected,
            confidence: outcome.confidence,
            severity,
            evidence,
            recommendation: recommendation(severity, mem.trend_slope),
            timestamp: chrono::Utc::now(),
        }
    }
}

fn recommendation(severity: Severity, trend: f64) -> String {
    match severity {
        Severity::Critical => format!(
            "Memory climbing at {:.2}%/min with no headroom left. Restart the workload now and capture a heap dump before the next OOM kill.",
            trend
        ),
        Severity::High => format!(
            "Sustained memory growth at {:.2}%/min. Schedule a rolling restart and profile allocations in the leaking code path.",
            trend
        ),
        Severity::Medium => {
            "Memory trending upward. Capture a heap profile during the next growth period and compare against baseline.".to_string()
        }
        Severity::Low => {
            "Mild memory growth observed. Keep the service under watch and re-check after the next deployment.".to_string()
        }
        Severity::None => String::new(),
    }
}
