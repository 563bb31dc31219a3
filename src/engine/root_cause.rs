//! Root-cause construction.
//!
//! Pattern-matches on which detectors fired to produce the structured
//! root-cause analysis: primary issue, contributing factors with their
//! stated relationship, trigger event, evidence chain, and propagation
//! path. Unknown detector combinations fall through to the primary
//! detection's own recommendation.

use crate::detectors::{Detection, ProblemType};
use crate::engine::diagnosis::{ContributingFactor, RootCauseAnalysis};
use crate::engine::impact::blast_radius;
use crate::features::ServiceFeatures;

/// Fixed pairwise correlation rules: (first fired, also fired) -> summary.
const PAIR_RULES: &[(ProblemType, ProblemType, &str, &str)] = &[
    (
        ProblemType::MemoryLeak,
        ProblemType::ResourceExhaustion,
        "Memory leak driving the service into resource exhaustion",
        "leaked memory consumes the headroom the workload needs",
    ),
    (
        ProblemType::CascadingFailure,
        ProblemType::ResourceExhaustion,
        "Resource exhaustion cascading across dependent components",
        "saturated resources slow every caller in the chain",
    ),
    (
        ProblemType::CascadingFailure,
        ProblemType::ExternalFailure,
        "External dependency failure triggering a cascade",
        "upstream timeouts propagate through retries and queue buildup",
    ),
    (
        ProblemType::DeploymentBug,
        ProblemType::ExternalFailure,
        "Recent rollout amplifying external dependency failures",
        "new code path hammers a dependency that was already degraded",
    ),
    (
        ProblemType::DeploymentBug,
        ProblemType::CascadingFailure,
        "Bad rollout destabilizing downstream services",
        "regression errors overload every dependent in turn",
    ),
    (
        ProblemType::MemoryLeak,
        ProblemType::CascadingFailure,
        "Memory pressure destabilizing dependent services",
        "leak-driven slowdowns back up the callers",
    ),
    (
        ProblemType::ResourceExhaustion,
        ProblemType::ExternalFailure,
        "Resource saturation worsened by slow dependencies",
        "slow upstream calls hold connections and amplify local pressure",
    ),
];

fn relationship_for(primary: ProblemType, secondary: ProblemType) -> String {
    for (a, b, _, relationship) in PAIR_RULES {
        if (*a == primary && *b == secondary) || (*a == secondary && *b == primary) {
            return (*relationship).to_string();
        }
    }
    "degrades the same service concurrently".to_string()
}

fn primary_issue_for(primary: &Detection, fired: &[ProblemType]) -> String {
    for (a, b, summary, _) in PAIR_RULES {
        let pair_fired = fired.contains(a) && fired.contains(b);
        if pair_fired && (primary.problem_type == *a || primary.problem_type == *b) {
            return (*summary).to_string();
        }
    }
    // Unknown combination: fall through to the detection's own wording.
    format!("{} — {}", primary.problem_type, primary.recommendation)
}

fn propagation_path(primary: ProblemType, fired: &[ProblemType]) -> Vec<String> {
    let mut path = vec![primary.to_string()];
    for other in fired {
        if *other != primary {
            path.push(other.to_string());
        }
    }
    path.push("service degradation".to_string());
    path
}

/// Assemble the structured root cause from the fused detections.
#[must_use]
pub fn analyze_root_cause(
    primary: &Detection,
    detections: &[Detection],
    features: &ServiceFeatures,
) -> RootCauseAnalysis {
    if primary.problem_type == ProblemType::Healthy {
        return RootCauseAnalysis {
            primary_issue: "No problem detected".to_string(),
            contributing_factors: Vec::new(),
            trigger_event: None,
            evidence_chain: vec![format!(
                "health score {:.0} with no detector past threshold",
                features.health_score
            )],
            propagation_path: Vec::new(),
            blast_radius: blast_radius(primary, features),
        };
    }

    let fired: Vec<ProblemType> = detections
        .iter()
        .filter(|d| d.detected)
        .map(|d| d.problem_type)
        .collect();

    let contributing_factors: Vec<ContributingFactor> = detections
        .iter()
        .filter(|d| d.detected && d.problem_type != primary.problem_type)
        .map(|d| ContributingFactor {
            factor: format!("{} (confidence {:.0})", d.problem_type, d.confidence),
            relationship: relationship_for(primary.problem_type, d.problem_type),
        })
        .collect();

    // The earliest plausible trigger is the secondary with the highest
    // confidence; with nothing else fired the primary triggered itself.
    let trigger_event = detections
        .iter()
        .filter(|d| d.detected && d.problem_type != primary.problem_type)
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|d| format!("{} first exceeded its detection threshold", d.problem_type));

    let mut evidence_chain: Vec<String> = Vec::new();
    for (key, value) in &primary.evidence {
        if key == "signal_quality" || key == "confidence_damped" {
            continue;
        }
        evidence_chain.push(format!("{key}={value}"));
    }
    evidence_chain.sort();

    RootCauseAnalysis {
        primary_issue: primary_issue_for(primary, &fired),
        contributing_factors,
        trigger_event,
        evidence_chain,
        propagation_path: propagation_path(primary.problem_type, &fired),
        blast_radius: blast_radius(primary, features),
    }
}
