/// Deterministic actuator-action generation
pub mod actions;
/// Diagnosis result types and the risk ladder
pub mod diagnosis;
/// Detector fan-out, fusion, and annotation
pub mod engine;
/// Impact, priority, and time-to-impact scoring
pub mod impact;
/// Structured root-cause construction
pub mod root_cause;

pub use actions::{ActionPriority, ActionType, ActuatorAction};
pub use diagnosis::{
    AdvancedDiagnosis, BlastRadius, ContributingFactor, Diagnosis, ImpactAssessment, RiskLevel,
    RootCauseAnalysis, ServiceComparison, UltimateDiagnosis,
};
pub use engine::DiagnosisEngine;
