//! Unit tests for the detector fleet: thresholds, quality gates, damping,
//! severity ladders, and score bounds.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::detectors::{
        all_detectors, CascadeFailureDetector, DeploymentBugDetector, Detector,
        ExternalFailureDetector, MemoryLeakDetector, ProblemType, ResourceExhaustionDetector,
        Severity,
    };
    use crate::features::ServiceFeatures;
    use crate::tests::test_utils::base_features;

    #[test]
    fn test_memory_leak_fires_on_sustained_growth() {
        let mut features = base_features("api");
        features.memory.mean = 68.0;
        features.memory.trend_slope = 0.3;
        features.memory.volatility = 0.05;
        features.memory.autocorrelation = 0.95;
        features.cpu_memory_corr = 0.1;

        let detection = MemoryLeakDetector.analyze(&features);
        assert!(detection.detected);
        assert!(detection.confidence > 65.0);
        assert_eq!(detection.problem_type, ProblemType::MemoryLeak);
        assert!(detection.evidence.contains_key("memory_trend"));
        assert!(detection.severity >= Severity::Medium);
    }

    #[test]
    fn test_memory_leak_quiet_on_flat_memory() {
        let mut features = base_features("api");
        features.memory.mean = 60.0;
        features.memory.trend_slope = 0.0;
        features.memory.volatility = 0.4;

        let detection = MemoryLeakDetector.analyze(&features);
        assert!(!detection.detected);
        assert!(detection.severity == Severity::None);
    }

    #[test]
    fn test_memory_leak_insufficient_data() {
        let features = ServiceFeatures::empty("api", 30);
        let detection = MemoryLeakDetector.analyze(&features);
        assert!(!detection.detected);
        assert!(detection.confidence.abs() < f64::EPSILON);
        assert_eq!(
            detection.evidence.get("reason").and_then(|v| v.as_str()),
            Some("insufficient data")
        );
    }

    #[test]
    fn test_memory_leak_damping_below_quality_gate() {
        // Only the trend signal fires, and below its stricter sub-threshold:
        // quality 0 of 2, so the 35-point total is damped to 24.5.
        let mut features = base_features("api");
        features.memory.mean = 50.0;
        features.memory.trend_slope = 0.2;
        features.memory.volatility = 0.5;
        // Memory tracks CPU, so the decoupled-growth bonus stays off.
        features.cpu_memory_corr = 0.6;

        let detection = MemoryLeakDetector.analyze(&features);
        assert!(!detection.detected);
        assert!((detection.confidence - 24.5).abs() < 1e-9);
        assert_eq!(
            detection.evidence.get("confidence_damped").and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[test]
    fn test_resource_exhaustion_both_high_is_critical() {
        let mut features = base_features("api");
        features.cpu.mean = 93.0;
        features.memory.mean = 94.0;
        features.error_rate.mean = 9.0;
        features.system_stress = 90.0;

        let detection = ResourceExhaustionDetector.analyze(&features);
        assert!(detection.detected);
        assert_eq!(detection.severity, Severity::Critical);
        assert_eq!(
            detection.evidence.get("both_resources_high").and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[test]
    fn test_resource_exhaustion_single_resource_not_critical() {
        let mut features = base_features("api");
        features.cpu.mean = 95.0;
        features.memory.mean = 40.0;
        features.error_rate.mean = 9.5;
        features.system_stress = 86.0;

        let detection = ResourceExhaustionDetector.analyze(&features);
        // cpu (30, quality) + errors (25) + stress (15, quality) = 70 > 60
        assert!(detection.detected);
        assert_ne!(detection.severity, Severity::Critical);
    }

    #[test]
    fn test_deployment_bug_needs_bursts_and_level() {
        let mut features = base_features("api");
        features.cpu.mean = 50.0;
        features.memory.mean = 55.0;
        features.error_rate.mean = 18.0;
        features.error_spikiness = 3.5;
        features.cpu_error_corr = 0.05;

        let detection = DeploymentBugDetector.analyze(&features);
        assert!(detection.detected);
        assert!(detection.confidence > 80.0);
        assert!(detection.recommendation.to_lowercase().contains("roll back"));
    }

    #[test]
    fn test_deployment_bug_smooth_errors_do_not_fire() {
        let mut features = base_features("api");
        features.error_rate.mean = 12.0;
        features.error_spikiness = 0.5;
        features.cpu_error_corr = 0.8;

        let detection = DeploymentBugDetector.analyze(&features);
        assert!(!detection.detected);
    }

    #[test]
    fn test_external_failure_pattern_amplifier_bypasses_gate() {
        let mut features = base_features("api");
        features.latency_p99 = 6000.0;
        features.latency_error_corr = 0.9;
        features.cpu.mean = 45.0;
        features.memory.mean = 50.0;
        features.error_rate.mean = 8.0;

        // Only two signals fire (quality gate wants three), but the
        // external pattern holds, so the verdict is undamped.
        let detection = ExternalFailureDetector.analyze(&features);
        assert!(detection.detected);
        assert_eq!(
            detection.evidence.get("external_pattern").and_then(|v| v.as_bool()),
            Some(true)
        );
        assert!(detection.evidence.get("confidence_damped").is_none());
    }

    #[test]
    fn test_external_failure_damped_without_pattern() {
        let mut features = base_features("api");
        features.latency_p99 = 3500.0;
        features.latency_error_corr = 0.2;
        features.memory_error_corr = 0.5;
        features.error_rate.mean = 11.0;
        features.cpu.mean = 50.0;
        features.memory.mean = 55.0;

        // tail latency (35) + quiet-resource errors (20) = 55, quality 1 of
        // 3 and no external pattern: damped to 35.75.
        let detection = ExternalFailureDetector.analyze(&features);
        assert!(!detection.detected);
        assert!((detection.confidence - 35.75).abs() < 1e-9);
    }

    #[test]
    fn test_cascade_requires_three_degraded_metrics() {
        let mut features = base_features("api");
        features.cpu.mean = 90.0;
        features.memory.mean = 92.0;
        features.error_rate.mean = 10.0;
        features.latency_p95 = 1500.0;
        features.system_stress = 95.0;
        features.health_score = 20.0;

        // Two degraded metrics only: the structural gate fails and the
        // damped total cannot cross the threshold.
        let detection = CascadeFailureDetector.analyze(&features);
        assert!(!detection.detected);
    }

    #[test]
    fn test_cascade_critical_with_four_degraded() {
        let mut features = base_features("api");
        features.cpu.mean = 92.0;
        features.memory.mean = 93.0;
        features.error_rate.mean = 28.0;
        features.latency_p95 = 2600.0;
        features.system_stress = 96.0;
        features.health_score = 5.0;
        features.stability_index = 1.0;
        features.cpu.trend_slope = 1.5;
        features.memory.trend_slope = 1.2;
        features.error_rate.trend_slope = 0.8;

        let detection = CascadeFailureDetector.analyze(&features);
        assert!(detection.detected);
        assert_eq!(detection.severity, Severity::Critical);
        assert_eq!(
            detection.evidence.get("degraded_count").and_then(|v| v.as_u64()),
            Some(4)
        );
    }

    #[test]
    fn test_monotone_severity_in_confidence() {
        // Holding the amplifier fixed, pushing a detector's confidence up
        // through the ladder never lowers the severity.
        let mut features = base_features("api");
        features.cpu.mean = 93.0;
        features.memory.mean = 94.0;
        let mut last = Severity::None;
        for err_mean in [0.0, 9.0, 16.0] {
            features.error_rate.mean = err_mean;
            features.system_stress = 80.0 + err_mean;
            let detection = ResourceExhaustionDetector.analyze(&features);
            assert!(
                detection.severity >= last,
                "severity regressed from {last:?} to {:?} at err_mean {err_mean}",
                detection.severity
            );
            last = detection.severity;
        }
    }

    proptest! {
        /// Score bounds hold for arbitrary (even absurd) fingerprints.
        #[test]
        fn detector_outputs_stay_bounded(
            cpu_mean in 0.0_f64..120.0,
            mem_mean in 0.0_f64..120.0,
            err_mean in 0.0_f64..200.0,
            lat_p99 in 0.0_f64..20_000.0,
            spikiness in 0.0_f64..10.0,
            corr in -1.0_f64..1.0,
            trend in -5.0_f64..5.0,
            volatility in 0.0_f64..3.0,
        ) {
            let mut features = base_features("api");
            features.cpu.mean = cpu_mean;
            features.memory.mean = mem_mean;
            features.memory.trend_slope = trend;
            features.memory.volatility = volatility;
            features.error_rate.mean = err_mean;
            features.error_spikiness = spikiness;
            features.latency_p99 = lat_p99;
            features.latency_p95 = lat_p99 * 0.8;
            features.cpu_memory_corr = corr;
            features.cpu_error_corr = corr;
            features.latency_error_corr = corr;
            features.memory_error_corr = corr;
            features.system_stress = ((cpu_mean + mem_mean + 10.0 * err_mean) / 3.0).clamp(0.0, 100.0);
            features.health_score = (100.0 - cpu_mean * 0.3 - err_mean).max(0.0);
            features.stability_index = (10.0 * (1.0 - volatility.min(1.0))).max(0.0);

            for detector in all_detectors() {
                let detection = detector.analyze(&features);
                prop_assert!((0.0..=100.0).contains(&detection.confidence));
                if detection.detected {
                    prop_assert!(detection.severity >= Severity::Low);
                } else {
                    prop_assert_eq!(detection.severity, Severity::None);
                }
            }
        }
    }
}
