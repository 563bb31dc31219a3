//! Impact, priority, time-to-impact, and blast radius scoring.
//!
//! All closed-form: deterministic functions of the fused detections and the
//! extracted features, so two diagnoses over an unchanged store produce the
//! same numbers.

use crate::detectors::{Detection, ProblemType, Severity};
use crate::engine::diagnosis::{BlastRadius, RiskLevel};
use crate::features::ServiceFeatures;

/// Severity weights shared by impact and health scoring.
#[must_use]
pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::None => 0.0,
        Severity::Low => 10.0,
        Severity::Medium => 30.0,
        Severity::High => 60.0,
        Severity::Critical => 100.0,
    }
}

fn impact_multiplier(problem_type: ProblemType) -> f64 {
    match problem_type {
        ProblemType::CascadingFailure => 1.5,
        ProblemType::ResourceExhaustion => 1.3,
        ProblemType::MemoryLeak => 1.2,
        ProblemType::DeploymentBug => 1.1,
        ProblemType::ExternalFailure | ProblemType::Healthy => 1.0,
    }
}

fn urgency_multiplier(problem_type: ProblemType) -> f64 {
    match problem_type {
        ProblemType::CascadingFailure => 1.4,
        ProblemType::ResourceExhaustion => 1.3,
        ProblemType::DeploymentBug => 1.2,
        ProblemType::MemoryLeak => 1.1,
        ProblemType::ExternalFailure | ProblemType::Healthy => 1.0,
    }
}

fn priority_severity_points(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 40.0,
        Severity::High => 30.0,
        Severity::Medium => 15.0,
        Severity::Low => 5.0,
        Severity::None => 0.0,
    }
}

/// Impact score in [0, 100] for the primary detection.
///
/// `additional_problems` counts high-confidence detections beyond the
/// primary.
#[must_use]
pub fn impact_score(primary: &Detection, additional_problems: usize) -> f64 {
    if primary.problem_type == ProblemType::Healthy {
        return 0.0;
    }
    let base = 0.4 * primary.confidence
        + 0.3 * severity_weight(primary.severity)
        + 10.0 * additional_problems as f64;
    (base * impact_multiplier(primary.problem_type)).clamp(0.0, 100.0)
}

/// Priority score in [0, 100].
#[must_use]
pub fn priority_score(primary: &Detection, additional_problems: usize) -> f64 {
    if primary.problem_type == ProblemType::Healthy {
        return 0.0;
    }
    let base = priority_severity_points(primary.severity)
        + 0.2 * primary.confidence
        + 5.0 * additional_problems as f64;
    (base * urgency_multiplier(primary.problem_type)).min(100.0)
}

/// Service health after a diagnosis:
/// `100 - severity_deduction * (confidence / 100) - 10 * extra_problems`,
/// floored at 0.
#[must_use]
pub fn health_after_diagnosis(primary: &Detection, additional_problems: usize) -> f64 {
    let deduction = severity_weight(primary.severity) * (primary.confidence / 100.0)
        + 10.0 * additional_problems as f64;
    (100.0 - deduction).max(0.0)
}

/// Bucketed minutes until a resource crosses its ceiling, predicted from
/// current trends; falls back to a risk-level bucket when nothing trends.
#[must_use]
pub fn time_to_impact(features: &ServiceFeatures, risk: RiskLevel) -> String {
    let mut minutes: Option<f64> = None;

    if features.memory.trend_slope > 0.5 && features.memory.mean < 100.0 {
        let mins = (100.0 - features.memory.mean) / features.memory.trend_slope;
        minutes = Some(mins);
    }
    if features.cpu.trend_slope > 1.0 && features.cpu.mean < 100.0 {
        let mins = (100.0 - features.cpu.mean) / features.cpu.trend_slope;
        minutes = Some(minutes.map_or(mins, |m| m.min(mins)));
    }

    if let Some(mins) = minutes {
        if mins < 5.0 {
            return "IMMEDIATE (<5 min)".to_string();
        }
        if mins < 15.0 {
            return "CRITICAL (<15 min)".to_string();
        }
        if mins < 60.0 {
            return "HIGH (<60 min)".to_string();
        }
    }

    match risk {
        RiskLevel::Critical => "HIGH (<60 min)".to_string(),
        RiskLevel::High => "ELEVATED (hours)".to_string(),
        RiskLevel::Medium => "LOW (days)".to_string(),
        RiskLevel::Low | RiskLevel::Normal => "NONE".to_string(),
    }
}

/// Risk ladder from primary severity and composite scores.
#[must_use]
pub fn risk_level(primary_severity: Severity, features: &ServiceFeatures) -> RiskLevel {
    let health = features.health_score;
    let stress = features.system_stress;
    if primary_severity == Severity::Critical || health < 30.0 {
        RiskLevel::Critical
    } else if primary_severity == Severity::High || health < 50.0 || stress > 80.0 {
        RiskLevel::High
    } else if primary_severity == Severity::Medium || health < 70.0 {
        RiskLevel::Medium
    } else if primary_severity == Severity::Low {
        RiskLevel::Low
    } else {
        RiskLevel::Normal
    }
}

/// Blast radius from problem class, health, and stress.
#[must_use]
pub fn blast_radius(primary: &Detection, features: &ServiceFeatures) -> BlastRadius {
    if primary.problem_type == ProblemType::CascadingFailure
        || (features.system_stress > 85.0 && features.health_score < 30.0)
    {
        BlastRadius::Cluster
    } else if features.system_stress > 70.0 || features.health_score < 50.0 {
        BlastRadius::Namespace
    } else {
        BlastRadius::Service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn detection(problem_type: ProblemType, severity: Severity, confidence: f64) -> Detection {
        Detection {
            problem_type,
            service: "cart".to_string(),
            detected: problem_type != ProblemType::Healthy,
            confidence,
            severity,
            evidence: Map::new(),
            recommendation: String::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_impact_bounds() {
        let d = detection(ProblemType::CascadingFailure, Severity::Critical, 100.0);
        let score = impact_score(&d, 4);
        assert!((0.0..=100.0).contains(&score));
        assert!((score - 100.0).abs() < f64::EPSILON);

        let healthy = detection(ProblemType::Healthy, Severity::None, 95.0);
        assert!(impact_score(&healthy, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_priority_urgency_ordering() {
        let cascade = detection(ProblemType::CascadingFailure, Severity::High, 80.0);
        let external = detection(ProblemType::ExternalFailure, Severity::High, 80.0);
        assert!(priority_score(&cascade, 0) > priority_score(&external, 0));
    }

    #[test]
    fn test_health_floor() {
        let d = detection(ProblemType::ResourceExhaustion, Severity::Critical, 100.0);
        assert!(health_after_diagnosis(&d, 3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_time_to_impact_memory_trend() {
        let mut features = crate::features::ServiceFeatures::empty("cart", 30);
        features.memory.mean = 88.0;
        features.memory.trend_slope = 1.0;
        // 12 minutes to full memory
        let tti = time_to_impact(&features, RiskLevel::High);
        assert_eq!(tti, "CRITICAL (<15 min)");
    }

    #[test]
    fn test_time_to_impact_falls_back_to_risk() {
        let features = crate::features::ServiceFeatures::empty("cart", 30);
        assert_eq!(time_to_impact(&features, RiskLevel::Critical), "HIGH (<60 min)");
        assert_eq!(time_to_impact(&features, RiskLevel::Normal), "NONE");
    }

    #[test]
    fn test_risk_ladder() {
        let mut features = crate::features::ServiceFeatures::empty("cart", 30);
        features.health_score = 90.0;
        features.system_stress = 20.0;
        assert_eq!(risk_level(Severity::None, &features), RiskLevel::Normal);
        assert_eq!(risk_level(Severity::Low, &features), RiskLevel::Low);
        assert_eq!(risk_level(Severity::Medium, &features), RiskLevel::Medium);
        assert_eq!(risk_level(Severity::High, &features), RiskLevel::High);
        assert_eq!(risk_level(Severity::Critical, &features), RiskLevel::Critical);

        features.health_score = 25.0;
        assert_eq!(risk_level(Severity::None, &features), RiskLevel::Critical);
    }
}
