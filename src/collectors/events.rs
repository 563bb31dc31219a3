//! Cluster event intake.
//!
//! Normalizes pod lifecycle events into the events table and folds restart
//! counts into the `restart_count` sample stream so the detectors can see
//! them alongside the scraped telemetry.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::infrastructure::store::{ClusterEvent, MetricSample, MetricStore};
use crate::utils::error::SentinelResult;
use crate::utils::structured_logging::StructuredLogger;

/// Normalized pod lifecycle event classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterEventType {
    PodRestart,
    OomKilled,
    PodPending,
    PodFailed,
    BackOff,
    Other,
}

impl ClusterEventType {
    /// Map raw reason strings from the watcher onto the normalized classes.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "restart" | "restarted" | "podrestart" | "container_restart" => {
                ClusterEventType::PodRestart
            }
            "oomkilled" | "oom_killed" | "oomkilling" => ClusterEventType::OomKilled,
            "pending" | "podpending" | "failedscheduling" => ClusterEventType::PodPending,
            "failed" | "podfailed" | "crashloopbackoff" => ClusterEventType::PodFailed,
            "backoff" | "back-off" | "imagepullbackoff" => ClusterEventType::BackOff,
            _ => ClusterEventType::Other,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterEventType::PodRestart => "POD_RESTART",
            ClusterEventType::OomKilled => "OOM_KILLED",
            ClusterEventType::PodPending => "POD_PENDING",
            ClusterEventType::PodFailed => "POD_FAILED",
            ClusterEventType::BackOff => "BACK_OFF",
            ClusterEventType::Other => "OTHER",
        }
    }
}

/// Incoming event payload before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawClusterEvent {
    pub event_type: String,
    pub pod: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub message: String,
    /// Cumulative restart count, when the watcher reports one
    #[serde(default)]
    pub restart_count: Option<f64>,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Derive the owning service name from a pod name by stripping the
/// replicaset and pod hash suffixes ("payments-7f9c4d-x2x1z" -> "payments").
#[must_use]
pub fn service_for_pod(pod: &str) -> String {
    let segments: Vec<&str> = pod.split('-').collect();
    let mut keep = segments.len();
    for segment in segments.iter().rev() {
        let hashy = segment.len() >= 4
            && segment.len() <= 10
            && segment.chars().all(|c| c.is_ascii_alphanumeric())
            && segment.chars().any(|c| c.is_ascii_digit());
        if hashy && keep > 1 {
            keep -= 1;
        } else {
            break;
        }
    }
    segments[..keep].join("-")
}

/// Writes normalized events and the derived restart-count samples.
pub struct EventIngestor {
    store: Arc<dyn MetricStore>,
}

impl EventIngestor {
    #[must_use]
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    /// Record one event. Restart counts ride along as a metric sample so
    /// the detector fleet sees them without a separate query path.
    pub async fn ingest(&self, raw: RawClusterEvent) -> SentinelResult<ClusterEvent> {
        let event_type = ClusterEventType::normalize(&raw.event_type);
        let event = ClusterEvent {
            timestamp: Utc::now(),
            event_type: event_type.as_str().to_string(),
            pod: raw.pod.clone(),
            namespace: raw.namespace.clone(),
            message: raw.message.clone(),
        };
        self.store.insert_event(&event).await?;
        StructuredLogger::log_cluster_event(event_type.as_str(), &raw.pod, &raw.namespace);

        let restart_count = match (raw.restart_count, event_type) {
            (Some(count), _) => Some(count),
            (None, ClusterEventType::PodRestart | ClusterEventType::OomKilled) => Some(1.0),
            _ => None,
        };
        if let Some(count) = restart_count {
            let service = service_for_pod(&raw.pod);
            let sample = MetricSample::new(&service, "restart_count", count, event.timestamp);
            self.store.insert_samples(&[sample]).await?;
        }
        Ok(event)
    }
}
