//! Diagnosis result types.
//!
//! Three tiers of richness: [`Diagnosis`] carries the fused detector
//! verdicts, [`AdvancedDiagnosis`] adds scoring and correlation context,
//! and [`UltimateDiagnosis`] is the full wire contract with features,
//! structured root cause, and the ordered actuator-action list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::detectors::Detection;
use crate::engine::actions::ActuatorAction;
use crate::features::ServiceFeatures;

/// Overall risk posture derived from primary severity and composite scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Normal,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::Normal => "NORMAL",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        write!(f, "{name}")
    }
}

/// Scope of impact inferred from health and stress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlastRadius {
    Service,
    Namespace,
    Cluster,
}

/// Fused verdict of one diagnosis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub service: String,
    /// Highest-confidence detected problem, or HEALTHY
    pub primary: Detection,
    /// All detector verdicts, ordered by (confidence desc, type asc)
    pub detections: Vec<Detection>,
    pub multiple_problems: bool,
    /// Detections with detected=true and confidence > 80
    pub high_confidence_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// A secondary issue contributing to the primary problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub factor: String,
    /// How the factor relates to the primary issue
    pub relationship: String,
}

/// Structured root-cause analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCauseAnalysis {
    pub primary_issue: String,
    pub contributing_factors: Vec<ContributingFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_event: Option<String>,
    pub evidence_chain: Vec<String>,
    /// Ordered problem propagation, source first
    pub propagation_path: Vec<String>,
    pub blast_radius: BlastRadius,
}

/// Quantified consequence of the diagnosed problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAssessment {
    /// 0-100
    pub impact_score: f64,
    pub description: String,
    pub affected_areas: Vec<String>,
}

/// [`Diagnosis`] plus scoring and correlation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedDiagnosis {
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
    /// One-line root cause summary
    pub root_cause_summary: String,
    /// 0-100
    pub impact_score: f64,
    /// Per-metric trend notes keyed by metric name
    pub trend_analysis: Map<String, Value>,
    /// Cross-detector correlation notes
    pub detector_correlations: Vec<String>,
    /// 0-100
    pub priority_score: f64,
}

/// The full diagnosis wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UltimateDiagnosis {
    /// Opaque per-request id for traceability
    pub prediction_id: Uuid,
    #[serde(flatten)]
    pub advanced: AdvancedDiagnosis,
    pub features: ServiceFeatures,
    pub risk_level: RiskLevel,
    /// Closed-form forecasts derived from current trends
    pub predictive_insights: Vec<String>,
    pub root_cause: RootCauseAnalysis,
    /// Bucketed minutes until a resource crosses its failure threshold
    pub time_to_impact: String,
    pub impact: ImpactAssessment,
    /// Ordered remediation list; field names and enum values are stable
    pub actuator_actions: Vec<ActuatorAction>,
}

impl UltimateDiagnosis {
    /// The basic diagnosis view of this result.
    #[must_use]
    pub fn basic(&self) -> &Diagnosis {
        &self.advanced.diagnosis
    }
}

/// One row of the cross-service health comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceComparison {
    pub service: String,
    pub health_score: f64,
    pub requires_attention: bool,
    pub primary_problem: String,
}
