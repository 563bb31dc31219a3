//! Actuator-action generation.
//!
//! Deterministic mapping from the primary detection, the extracted
//! features, and the risk level onto an ordered remediation list. Each
//! action carries structured parameters sufficient for an external actuator
//! to execute without re-reading features. The engine recommends; it never
//! executes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::detectors::{Detection, ProblemType};
use crate::engine::diagnosis::RiskLevel;
use crate::features::ServiceFeatures;

/// The remediation verbs the actuator contract supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "SCALE_UP")]
    ScaleUp,
    #[serde(rename = "INCREASE_LIMITS")]
    IncreaseLimits,
    #[serde(rename = "ROLLBACK")]
    Rollback,
    #[serde(rename = "RESTART")]
    Restart,
    #[serde(rename = "MONITOR")]
    Monitor,
    #[serde(rename = "ALERT")]
    Alert,
    #[serde(rename = "CIRCUIT_BREAKER")]
    CircuitBreaker,
    #[serde(rename = "ENABLE_FALLBACK")]
    EnableFallback,
    #[serde(rename = "CONFIGURE_RETRY")]
    ConfigureRetry,
    #[serde(rename = "ENABLE_LOAD_BALANCER")]
    EnableLoadBalancer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionPriority {
    Immediate,
    High,
    Medium,
    Low,
}

/// One executable remediation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorAction {
    pub action_type: ActionType,
    pub priority: ActionPriority,
    pub target_metric: String,
    pub current_value: f64,
    pub target_value: f64,
    pub reason: String,
    /// Confidence inherited from the detection that motivated the action
    pub confidence: f64,
    pub parameters: Map<String, Value>,
}

fn params(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn priority_for(risk: RiskLevel) -> ActionPriority {
    match risk {
        RiskLevel::Critical => ActionPriority::Immediate,
        RiskLevel::High => ActionPriority::High,
        RiskLevel::Medium => ActionPriority::Medium,
        RiskLevel::Low | RiskLevel::Normal => ActionPriority::Low,
    }
}

/// Memory limit recommendation for the observed usage bracket.
fn memory_limit_for(mem_mean: f64) -> &'static str {
    if mem_mean > 94.0 {
        "2Gi"
    } else if mem_mean > 88.0 {
        "1.5Gi"
    } else {
        "1Gi"
    }
}

/// Build the ordered action list for one diagnosis.
#[must_use]
pub fn generate_actions(
    primary: &Detection,
    features: &ServiceFeatures,
    risk: RiskLevel,
) -> Vec<ActuatorAction> {
    let priority = priority_for(risk);
    let confidence = primary.confidence;
    let cpu_mean = features.cpu.mean;
    let mem_mean = features.memory.mean;

    match primary.problem_type {
        ProblemType::ResourceExhaustion => {
            let mut actions = Vec::new();
            if cpu_mean > 80.0 {
                let replicas = ((cpu_mean / 60.0).ceil() as i64).clamp(2, 10);
                actions.push(ActuatorAction {
                    action_type: ActionType::ScaleUp,
                    priority,
                    target_metric: "cpu_usage".to_string(),
                    current_value: 1.0,
                    target_value: replicas as f64,
                    reason: format!("CPU at {cpu_mean:.0}% requires horizontal scaling"),
                    confidence,
                    parameters: params(&[
                        ("replicas", json!(replicas)),
                        ("strategy", json!("horizontal")),
                    ]),
                });
            }
            if mem_mean > 80.0 {
                let limit = memory_limit_for(mem_mean);
                actions.push(ActuatorAction {
                    action_type: ActionType::IncreaseLimits,
                    priority,
                    target_metric: "memory_usage".to_string(),
                    current_value: mem_mean,
                    target_value: 70.0,
                    reason: format!("Memory at {mem_mean:.0}% needs a higher limit"),
                    confidence,
                    parameters: params(&[
                        ("resource", json!("memory")),
                        ("new_limit", json!(limit)),
                    ]),
                });
            }
            if features.cpu.volatility > 0.30 {
                actions.push(ActuatorAction {
                    action_type: ActionType::EnableLoadBalancer,
                    priority: ActionPriority::Medium,
                    target_metric: "cpu_usage".to_string(),
                    current_value: features.cpu.volatility,
                    target_value: 0.15,
                    reason: "Uneven CPU load across replicas".to_string(),
                    confidence,
                    parameters: params(&[("algorithm", json!("least_connections"))]),
                });
            }
            actions
        }

        ProblemType::MemoryLeak => vec![
            ActuatorAction {
                action_type: ActionType::Restart,
                priority,
                target_metric: "memory_usage".to_string(),
                current_value: mem_mean,
                target_value: features.memory.min,
                reason: "Reclaim leaked memory with a rolling restart".to_string(),
                confidence,
                parameters: params(&[
                    ("strategy", json!("rolling")),
                    ("max_surge", json!(1)),
                    ("grace_period_secs", json!(30)),
                ]),
            },
            ActuatorAction {
                action_type: ActionType::Alert,
                priority: ActionPriority::High,
                target_metric: "memory_usage".to_string(),
                current_value: mem_mean,
                target_value: 0.0,
                reason: "Leak needs a code-level fix; restart only buys time".to_string(),
                confidence,
                parameters: params(&[
                    ("team", json!("engineering")),
                    ("request", json!("capture heap dump and memory profile")),
                ]),
            },
        ],

        ProblemType::DeploymentBug => vec![
            ActuatorAction {
                action_type: ActionType::Rollback,
                priority: ActionPriority::Immediate,
                target_metric: "error_rate".to_string(),
                current_value: features.error_rate.mean,
                target_value: 1.0,
                reason: "Error pattern matches the latest rollout".to_string(),
                confidence,
                parameters: params(&[
                    ("target", json!("previous_stable")),
                    ("auto_forward", json!(false)),
                ]),
            },
            ActuatorAction {
                action_type: ActionType::Monitor,
                priority: ActionPriority::High,
                target_metric: "error_rate".to_string(),
                current_value: features.error_rate.mean,
                target_value: 1.0,
                reason: "Confirm the error rate recovers after rollback".to_string(),
                confidence,
                parameters: params(&[
                    ("duration_mins", json!(15)),
                    ("alert_threshold", json!(10)),
                ]),
            },
            ActuatorAction {
                action_type: ActionType::Alert,
                priority: ActionPriority::High,
                target_metric: "error_rate".to_string(),
                current_value: features.error_rate.mean,
                target_value: 0.0,
                reason: "Hold further rollouts until the regression is understood".to_string(),
                confidence,
                parameters: params(&[
                    ("team", json!("engineering")),
                    ("block_deploys", json!(true)),
                ]),
            },
        ],

        ProblemType::CascadingFailure => vec![
            ActuatorAction {
                action_type: ActionType::CircuitBreaker,
                priority: ActionPriority::Immediate,
                target_metric: "error_rate".to_string(),
                current_value: features.error_rate.mean,
                target_value: 0.0,
                reason: "Stop failure propagation through the dependency chain".to_string(),
                confidence,
                parameters: params(&[
                    ("error_threshold", json!(0.5)),
                    ("timeout_secs", json!(30)),
                    ("recovery_secs", json!(300)),
                ]),
            },
            ActuatorAction {
                action_type: ActionType::ScaleUp,
                priority,
                target_metric: "cpu_usage".to_string(),
                current_value: 1.0,
                target_value: 5.0,
                reason: "Aggressive capacity to absorb the cascade".to_string(),
                confidence,
                parameters: params(&[("replicas", json!(5)), ("mode", json!("aggressive"))]),
            },
        ],

        ProblemType::ExternalFailure => vec![
            ActuatorAction {
                action_type: ActionType::EnableFallback,
                priority,
                target_metric: "response_time".to_string(),
                current_value: features.latency_p99,
                target_value: 500.0,
                reason: "Serve cached responses while the dependency recovers".to_string(),
                confidence,
                parameters: params(&[("mode", json!("cache")), ("ttl_secs", json!(300))]),
            },
            ActuatorAction {
                action_type: ActionType::ConfigureRetry,
                priority: ActionPriority::High,
                target_metric: "error_rate".to_string(),
                current_value: features.error_rate.mean,
                target_value: 1.0,
                reason: "Absorb transient dependency failures".to_string(),
                confidence,
                parameters: params(&[
                    ("strategy", json!("exponential")),
                    ("initial_ms", json!(100)),
                    ("max_ms", json!(10_000)),
                    ("attempts", json!(3)),
                    ("jitter", json!(true)),
                ]),
            },
        ],

        ProblemType::Healthy => {
            if features.health_score < 70.0 {
                vec![ActuatorAction {
                    action_type: ActionType::Monitor,
                    priority: ActionPriority::Low,
                    target_metric: "health_score".to_string(),
                    current_value: features.health_score,
                    target_value: 80.0,
                    reason: "Health below normal without a firing detector".to_string(),
                    confidence,
                    parameters: params(&[("duration_mins", json!(30))]),
                }]
            } else {
                Vec::new()
            }
        }
    }
}
