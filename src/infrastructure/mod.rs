/// Process-level Prometheus self-metrics
pub mod self_metrics;
/// Metric, event, and diagnosis persistence
pub mod store;

pub use store::{
    ClusterEvent, DiagnosisRecord, MemoryStore, MetricSample, MetricStore, SqliteStore,
};
