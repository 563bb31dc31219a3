#![allow(clippy::module_name_repetitions)]
//! # Service Sentinel
//!
//! An autonomous reliability analyzer for containerized services. The
//! sentinel ingests time-series telemetry (CPU, memory, requests, latency,
//! error counters) and cluster events, persists them, and periodically
//! diagnoses each service by running a fleet of statistical detectors whose
//! outputs are fused into an actionable diagnosis with confidence,
//! severity, root cause, time-to-impact, and concrete remediation actions.
//!
//! ## Architecture Overview
//!
//! - [`features`]: reduces raw metric series into a per-service fingerprint
//! - [`detectors`]: five quality-gated multi-signal classifiers
//! - [`engine`]: concurrent detector fan-out, fusion, root cause, actions
//! - [`collectors`]: Prometheus scrape worker and cluster event intake
//! - [`infrastructure`]: the metric/event/diagnosis store and self-metrics
//! - [`api`]: thin HTTP surface over the engine and the store
//! - [`utils`]: configuration, errors, numeric kernel, logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use service_sentinel::engine::DiagnosisEngine;
//! use service_sentinel::infrastructure::store::{MemoryStore, MetricStore};
//! use service_sentinel::utils::config::EngineConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
//!     let engine = DiagnosisEngine::new(store, EngineConfig::default());
//!     let diagnosis = engine.diagnose("payments").await?;
//!     println!("{}", diagnosis.basic().primary.problem_type);
//!     Ok(())
//! }
//! ```

/// HTTP surface over the engine and the store
pub mod api;
/// Telemetry collectors: Prometheus scraping and cluster events
pub mod collectors;
/// The five statistical detectors and their shared shape
pub mod detectors;
/// Diagnosis engine: fan-out, fusion, root cause, actuator actions
pub mod engine;
/// Feature extraction from stored metric series
pub mod features;
/// Persistence and process self-metrics
pub mod infrastructure;
/// Server wiring and background tasks
pub mod server;
/// Configuration, errors, numeric kernel, validation, logging
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export the most commonly used types
pub use detectors::{Detection, ProblemType, Severity};
pub use engine::{Diagnosis, DiagnosisEngine, RiskLevel, UltimateDiagnosis};
pub use features::{FeatureExtractor, ServiceFeatures};
pub use infrastructure::store::{MetricSample, MetricStore};
pub use utils::error::{SentinelError, SentinelResult};
