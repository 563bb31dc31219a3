//! # Detector System
//!
//! This module defines the shared shape of the five statistical detectors.
//! Each detector is a stateless, pure classifier over an extracted
//! [`ServiceFeatures`] fingerprint: it accumulates weighted signal scores,
//! counts how many signals cleared a stricter quality sub-threshold, applies
//! the quality gate (with confidence damping when the gate fails), and maps
//! the result onto the severity ladder.
//!
//! ## Detection rule
//!
//! - `detected = confidence > base_threshold`, where confidence is the raw
//!   signal total when the quality gate holds and the damped total when it
//!   does not.
//! - The quality gate holds when `signal_quality >= q_min` or the detector's
//!   amplifier clause is true (e.g. both resources high).
//!
//! Detectors hold no references to the engine or the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::features::ServiceFeatures;

/// The problem classes the detector fleet can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProblemType {
    #[serde(rename = "MEMORY_LEAK")]
    MemoryLeak,
    #[serde(rename = "RESOURCE_EXHAUSTION")]
    ResourceExhaustion,
    #[serde(rename = "DEPLOYMENT_BUG")]
    DeploymentBug,
    #[serde(rename = "EXTERNAL_FAILURE")]
    ExternalFailure,
    #[serde(rename = "CASCADING_FAILURE")]
    CascadingFailure,
    #[serde(rename = "HEALTHY")]
    Healthy,
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProblemType::MemoryLeak => "MEMORY_LEAK",
            ProblemType::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            ProblemType::DeploymentBug => "DEPLOYMENT_BUG",
            ProblemType::ExternalFailure => "EXTERNAL_FAILURE",
            ProblemType::CascadingFailure => "CASCADING_FAILURE",
            ProblemType::Healthy => "HEALTHY",
        };
        write!(f, "{name}")
    }
}

/// Severity ladder shared by detections and persisted records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{name}")
    }
}

/// One detector's verdict for one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub problem_type: ProblemType,
    pub service: String,
    pub detected: bool,
    /// 0-100
    pub confidence: f64,
    pub severity: Severity,
    pub evidence: Map<String, Value>,
    pub recommendation: String,
    pub timestamp: DateTime<Utc>,
}

impl Detection {
    /// Neutral non-detection, used for insufficient data and detector
    /// failures so that one bad detector never blocks the diagnosis.
    #[must_use]
    pub fn not_detected(problem_type: ProblemType, service: &str, reason: &str) -> Detection {
        let mut evidence = Map::new();
        evidence.insert("reason".to_string(), json!(reason));
        Detection {
            problem_type,
            service: service.to_string(),
            detected: false,
            confidence: 0.0,
            severity: Severity::None,
            evidence,
            recommendation: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Healthy verdict carrying the extracted health score as confidence.
    #[must_use]
    pub fn healthy(service: &str, health_score: f64, reason: Option<&str>) -> Detection {
        let mut evidence = Map::new();
        evidence.insert("health_score".to_string(), json!(round2(health_score)));
        if let Some(reason) = reason {
            evidence.insert("reason".to_string(), json!(reason));
        }
        Detection {
            problem_type: ProblemType::Healthy,
            service: service.to_string(),
            detected: false,
            confidence: health_score.clamp(0.0, 100.0),
            severity: Severity::None,
            evidence,
            recommendation: "Service operating within normal parameters".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Accumulates weighted signal contributions and the quality count.
#[derive(Debug, Default)]
pub struct SignalTally {
    signals: Map<String, Value>,
    total: f64,
    quality: usize,
}

impl SignalTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a firing signal. `high_quality` marks signals that also
    /// cleared their stricter sub-threshold and therefore count toward the
    /// quality gate.
    pub fn add(&mut self, name: &str, weight: f64, high_quality: bool) {
        self.signals.insert(name.to_string(), json!(round2(weight)));
        self.total += weight;
        if high_quality {
            self.quality += 1;
        }
    }

    /// Record a bonus contribution that never counts toward quality.
    pub fn bonus(&mut self, name: &str, weight: f64) {
        self.signals.insert(name.to_string(), json!(round2(weight)));
        self.total += weight;
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.total
    }

    #[must_use]
    pub fn quality(&self) -> usize {
        self.quality
    }

    #[must_use]
    pub fn signals(&self) -> &Map<String, Value> {
        &self.signals
    }

    pub fn into_signals(self) -> Map<String, Value> {
        self.signals
    }
}

/// Outcome of applying the quality gate to a signal tally.
#[derive(Debug, Clone, Copy)]
pub struct GateOutcome {
    pub confidence: f64,
    pub detected: bool,
    pub damped: bool,
}

/// Apply the shared detection rule.
///
/// When the quality gate fails (quality below `q_min` and no amplifier) the
/// raw total is multiplied by `damping` before the threshold comparison, so
/// detection stays reachable only for totals above `base_threshold / damping`.
#[must_use]
pub fn apply_gate(
    total: f64,
    base_threshold: f64,
    quality: usize,
    q_min: usize,
    amplifier: bool,
    damping: f64,
) -> GateOutcome {
    let gate_holds = quality >= q_min || amplifier;
    let confidence = if gate_holds { total } else { total * damping };
    let confidence = confidence.clamp(0.0, 100.0);
    GateOutcome {
        confidence,
        detected: confidence > base_threshold,
        damped: !gate_holds,
    }
}

/// Map damped confidence onto the severity ladder. `critical_threshold` and
/// the amplifier clause vary per detector modality.
#[must_use]
pub fn severity_ladder(
    detected: bool,
    confidence: f64,
    critical_threshold: f64,
    amplifier: bool,
) -> Severity {
    if !detected {
        return Severity::None;
    }
    if confidence > critical_threshold && amplifier {
        Severity::Critical
    } else if confidence > 75.0 {
        Severity::High
    } else if confidence > 65.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Round to two decimals for evidence readability.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The uniform capability every detector implements.
///
/// Implementations are pure over the extracted features: no I/O, no shared
/// state, no panics across the fan-in boundary.
pub trait Detector: Send + Sync {
    /// Stable lowercase name, used in logs and evidence
    fn name(&self) -> &'static str;

    /// The problem class this detector reports
    fn problem_type(&self) -> ProblemType;

    /// Score the fingerprint and produce a verdict
    fn analyze(&self, features: &ServiceFeatures) -> Detection;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_holds_with_quality() {
        let outcome = apply_gate(70.0, 65.0, 2, 2, false, 0.7);
        assert!(outcome.detected);
        assert!(!outcome.damped);
        assert!((outcome.confidence - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gate_fails_damps_confidence() {
        let outcome = apply_gate(70.0, 65.0, 1, 2, false, 0.7);
        assert!(outcome.damped);
        assert!((outcome.confidence - 49.0).abs() < 1e-9);
        assert!(!outcome.detected);
    }

    #[test]
    fn test_amplifier_bypasses_gate() {
        let outcome = apply_gate(70.0, 65.0, 0, 2, true, 0.7);
        assert!(!outcome.damped);
        assert!(outcome.detected);
    }

    #[test]
    fn test_damped_detection_reachable_above_ratio() {
        // 95 * 0.75 = 71.25 > 60: detection survives the damping.
        let outcome = apply_gate(95.0, 60.0, 0, 2, false, 0.75);
        assert!(outcome.detected);
        assert!(outcome.damped);
    }

    #[test]
    fn test_severity_ladder_monotone() {
        let low = severity_ladder(true, 64.0, 85.0, false);
        let medium = severity_ladder(true, 70.0, 85.0, false);
        let high = severity_ladder(true, 80.0, 85.0, false);
        let critical = severity_ladder(true, 90.0, 85.0, true);
        assert_eq!(low, Severity::Low);
        assert_eq!(medium, Severity::Medium);
        assert_eq!(high, Severity::High);
        assert_eq!(critical, Severity::Critical);
        assert!(low < medium && medium < high && high < critical);
    }

    #[test]
    fn test_critical_needs_amplifier() {
        let severity = severity_ladder(true, 95.0, 85.0, false);
        assert_eq!(severity, Severity::High);
    }
}
