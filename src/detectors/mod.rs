/// Cascading failure detection
pub mod cascade;
/// Shared detector shape: signals, quality gate, severity ladder
pub mod detector;
/// Deployment bug detection
pub mod deployment_bug;
/// External dependency failure detection
pub mod external_failure;
/// Memory leak detection
pub mod memory_leak;
/// Resource exhaustion detection
pub mod resource_exhaustion;

use std::sync::Arc;

pub use cascade::CascadeFailureDetector;
pub use deployment_bug::DeploymentBugDetector;
pub use detector::{
    apply_gate, severity_ladder, Detection, Detector, GateOutcome, ProblemType, Severity,
    SignalTally,
};
pub use external_failure::ExternalFailureDetector;
pub use memory_leak::MemoryLeakDetector;
pub use resource_exhaustion::ResourceExhaustionDetector;

/// The full detector fleet in its canonical order.
#[must_use]
pub fn all_detectors() -> Vec<Arc<dyn Detector>> {
    vec![
        Arc::new(MemoryLeakDetector),
        Arc::new(ResourceExhaustionDetector),
        Arc::new(DeploymentBugDetector),
        Arc::new(ExternalFailureDetector),
        Arc::new(CascadeFailureDetector),
    ]
}
