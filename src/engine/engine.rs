//! The diagnosis engine: concurrent detector fan-out, fusion, and
//! annotation.
//!
//! The engine owns the feature extractor and the detector fleet; the store
//! is passed in and only read during diagnosis. It is stateless and
//! re-entrant: parallel diagnoses for different services never observe each
//! other.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::task::JoinSet;
use tracing::{error, warn};
use uuid::Uuid;

use crate::detectors::{all_detectors, Detection, Detector, ProblemType};
use crate::engine::actions::generate_actions;
use crate::engine::diagnosis::{
    AdvancedDiagnosis, Diagnosis, ImpactAssessment, ServiceComparison, UltimateDiagnosis,
};
use crate::engine::impact::{
    health_after_diagnosis, impact_score, priority_score, risk_level, time_to_impact,
};
use crate::engine::root_cause::analyze_root_cause;
use crate::features::{FeatureExtractor, ServiceFeatures, TrendDirection};
use crate::infrastructure::self_metrics::{
    DIAGNOSES_TOTAL, DIAGNOSIS_DURATION, PERSISTENCE_FAILURES_TOTAL,
};
use crate::infrastructure::store::{DiagnosisRecord, MetricStore};
use crate::utils::config::EngineConfig;
use crate::utils::error::{SentinelError, SentinelResult};
use crate::utils::structured_logging::StructuredLogger;

/// Result of fusing the detector verdicts for one service.
struct Fusion {
    primary: Detection,
    detections: Vec<Detection>,
    high_confidence: Vec<Detection>,
    detector_failures: usize,
}

pub struct DiagnosisEngine {
    store: Arc<dyn MetricStore>,
    extractor: FeatureExtractor,
    detectors: Vec<Arc<dyn Detector>>,
    config: EngineConfig,
}

impl DiagnosisEngine {
    #[must_use]
    pub fn new(store: Arc<dyn MetricStore>, config: EngineConfig) -> Self {
        let extractor = FeatureExtractor::new(Arc::clone(&store));
        Self {
            store,
            extractor,
            detectors: all_detectors(),
            config,
        }
    }

    /// Full diagnosis under the configured deadline. A deadline elapse
    /// aborts in-flight detectors and performs zero writes.
    pub async fn diagnose(&self, service: &str) -> SentinelResult<UltimateDiagnosis> {
        let started = Instant::now();
        let timeout = std::time::Duration::from_secs(self.config.diagnosis_timeout_secs);
        let result = tokio::time::timeout(timeout, self.diagnose_inner(service)).await;
        match result {
            Ok(Ok(diagnosis)) => {
                DIAGNOSES_TOTAL.with_label_values(&["completed"]).inc();
                DIAGNOSIS_DURATION
                    .with_label_values(&[service])
                    .observe(started.elapsed().as_secs_f64());
                Ok(diagnosis)
            }
            Ok(Err(e)) => {
                DIAGNOSES_TOTAL.with_label_values(&["failed"]).inc();
                Err(e)
            }
            Err(_) => {
                DIAGNOSES_TOTAL.with_label_values(&["deadline"]).inc();
                Err(SentinelError::DeadlineExceeded {
                    operation: format!("diagnose {service}"),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Fused detector verdicts only, under the same deadline and
    /// persistence policy as the full diagnosis.
    pub async fn diagnose_basic(&self, service: &str) -> SentinelResult<Diagnosis> {
        let timeout = std::time::Duration::from_secs(self.config.diagnosis_timeout_secs);
        match tokio::time::timeout(timeout, self.diagnose_basic_inner(service)).await {
            Ok(result) => result,
            Err(_) => Err(SentinelError::DeadlineExceeded {
                operation: format!("diagnose_basic {service}"),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Diagnose a batch of services concurrently. Per-service failures are
    /// logged and omitted from the result map.
    pub async fn diagnose_all(&self, services: &[String]) -> HashMap<String, Diagnosis> {
        let futures = services.iter().map(|service| async move {
            (service.clone(), self.diagnose_basic(service).await)
        });
        let results = futures::future::join_all(futures).await;

        let mut map = HashMap::new();
        for (service, result) in results {
            match result {
                Ok(diagnosis) => {
                    map.insert(service, diagnosis);
                }
                Err(e) => {
                    warn!(service = %service, error = %e, "Batch diagnosis entry failed");
                }
            }
        }
        map
    }

    /// Current health score for one service (100 = fully healthy).
    pub async fn health_score(&self, service: &str) -> SentinelResult<f64> {
        let diagnosis = self.diagnose_basic(service).await?;
        let extra = diagnosis.high_confidence_count.saturating_sub(1);
        Ok(health_after_diagnosis(&diagnosis.primary, extra))
    }

    /// Compare services by health, least healthy first.
    pub async fn compare(&self, services: &[String]) -> SentinelResult<Vec<ServiceComparison>> {
        let diagnoses = self.diagnose_all(services).await;
        let mut comparisons: Vec<ServiceComparison> = diagnoses
            .into_iter()
            .map(|(service, diagnosis)| {
                let extra = diagnosis.high_confidence_count.saturating_sub(1);
                let health = health_after_diagnosis(&diagnosis.primary, extra);
                ServiceComparison {
                    service,
                    health_score: health,
                    requires_attention: health < 80.0,
                    primary_problem: diagnosis.primary.problem_type.to_string(),
                }
            })
            .collect();
        comparisons.sort_by(|a, b| {
            a.health_score
                .partial_cmp(&b.health_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.service.cmp(&b.service))
        });
        Ok(comparisons)
    }

    /// Persisted diagnosis history for a service, newest first.
    pub async fn history(
        &self,
        service: &str,
        limit: usize,
    ) -> SentinelResult<Vec<DiagnosisRecord>> {
        self.store.recent_diagnoses(service, limit).await
    }

    async fn diagnose_basic_inner(&self, service: &str) -> SentinelResult<Diagnosis> {
        let features = self
            .extractor
            .extract(service, self.feature_window())
            .await?;
        let fusion = self.fuse(service, &features).await?;
        Ok(Self::into_diagnosis(service, fusion))
    }

    async fn diagnose_inner(&self, service: &str) -> SentinelResult<UltimateDiagnosis> {
        let features = self
            .extractor
            .extract(service, self.feature_window())
            .await?;
        let fusion = self.fuse(service, &features).await?;

        let prediction_id = Uuid::new_v4();
        let detector_failures = fusion.detector_failures;
        let extra_problems = fusion.high_confidence.len().saturating_sub(1);
        let risk = risk_level(fusion.primary.severity, &features);
        let root_cause = analyze_root_cause(&fusion.primary, &fusion.detections, &features);
        let actions = generate_actions(&fusion.primary, &features, risk);
        let impact = impact_score(&fusion.primary, extra_problems);
        let priority = priority_score(&fusion.primary, extra_problems);
        let tti = time_to_impact(&features, risk);

        let diagnosis = Self::into_diagnosis(service, fusion);
        let advanced = AdvancedDiagnosis {
            root_cause_summary: root_cause.primary_issue.clone(),
            impact_score: impact,
            trend_analysis: trend_analysis(&features),
            detector_correlations: detector_correlations(&diagnosis.detections, &features),
            priority_score: priority,
            diagnosis,
        };

        StructuredLogger::log_diagnosis(
            prediction_id,
            service,
            &advanced.diagnosis.primary.problem_type.to_string(),
            advanced.diagnosis.primary.confidence,
            &advanced.diagnosis.primary.severity.to_string(),
            &risk.to_string(),
            detector_failures,
        );

        Ok(UltimateDiagnosis {
            prediction_id,
            predictive_insights: predictive_insights(&features, &tti),
            impact: ImpactAssessment {
                impact_score: impact,
                description: impact_description(&advanced.diagnosis.primary, impact),
                affected_areas: affected_areas(&features),
            },
            features,
            risk_level: risk,
            root_cause,
            time_to_impact: tti,
            actuator_actions: actions,
            advanced,
        })
    }

    fn feature_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.feature_window_mins * 60)
    }

    /// Fan the detector fleet out over the fingerprint, await all verdicts,
    /// sort, select the primary, and persist the high-confidence subset.
    async fn fuse(&self, service: &str, features: &ServiceFeatures) -> SentinelResult<Fusion> {
        let (mut detections, detector_failures) = self.run_detectors(service, features).await;

        // Stable fusion ordering so deterministic features yield a
        // deterministic primary and action list.
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.problem_type.to_string().cmp(&b.problem_type.to_string()))
        });

        let high_confidence: Vec<Detection> = detections
            .iter()
            .filter(|d| d.detected && d.confidence > self.config.persistence_confidence_threshold)
            .cloned()
            .collect();

        let primary = if detector_failures == self.detectors.len() {
            Detection::healthy(service, features.health_score, Some("no detectors succeeded"))
        } else if high_confidence.is_empty() {
            Detection::healthy(service, features.health_score, None)
        } else {
            high_confidence[0].clone()
        };

        self.persist_high_confidence(&high_confidence).await;

        Ok(Fusion {
            primary,
            detections,
            high_confidence,
            detector_failures,
        })
    }

    /// One task per detector, joined through a [`JoinSet`] so that dropping
    /// the diagnosis future (deadline or caller cancellation) aborts every
    /// outstanding detector.
    async fn run_detectors(
        &self,
        service: &str,
        features: &ServiceFeatures,
    ) -> (Vec<Detection>, usize) {
        let features = Arc::new(features.clone());
        let mut set = JoinSet::new();
        for detector in &self.detectors {
            let detector = Arc::clone(detector);
            let features = Arc::clone(&features);
            let service = service.to_string();
            set.spawn(async move {
                let verdict = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    detector.analyze(&features)
                }));
                match verdict {
                    Ok(detection) => detection,
                    Err(_) => {
                        error!(
                            detector = detector.name(),
                            service = %service,
                            "Detector panicked; contributing neutral non-detection"
                        );
                        Detection::not_detected(detector.problem_type(), &service, "detector failed")
                    }
                }
            });
        }

        let mut detections = Vec::with_capacity(self.detectors.len());
        let mut failures = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(detection) => {
                    if detection.evidence.get("reason").and_then(Value::as_str)
                        == Some("detector failed")
                    {
                        failures += 1;
                    }
                    StructuredLogger::log_detection(
                        service,
                        &detection.problem_type.to_string(),
                        detection.detected,
                        detection.confidence,
                    );
                    detections.push(detection);
                }
                Err(e) => {
                    error!(service = %service, error = %e, "Detector task failed to join");
                    failures += 1;
                }
            }
        }
        (detections, failures)
    }

    /// Write every high-confidence detection as a diagnosis record. A write
    /// failure degrades (counted and logged), it never blocks the result.
    async fn persist_high_confidence(&self, high_confidence: &[Detection]) {
        for detection in high_confidence {
            let record = DiagnosisRecord {
                id: Uuid::new_v4(),
                service: detection.service.clone(),
                problem_type: detection.problem_type.to_string(),
                confidence: detection.confidence,
                severity: detection.severity.to_string(),
                evidence: Value::Object(detection.evidence.clone()),
                recommendation: detection.recommendation.clone(),
                timestamp: Utc::now(),
            };
            match self.store.save_diagnosis(&record).await {
                Ok(()) => {
                    StructuredLogger::log_diagnosis_persisted(
                        record.id,
                        &record.service,
                        &record.problem_type,
                    );
                }
                Err(e) => {
                    PERSISTENCE_FAILURES_TOTAL
                        .with_label_values(&["save_diagnosis"])
                        .inc();
                    error!(
                        service = %record.service,
                        error = %e,
                        "Failed to persist diagnosis record"
                    );
                }
            }
        }
    }

    fn into_diagnosis(service: &str, fusion: Fusion) -> Diagnosis {
        Diagnosis {
            service: service.to_string(),
            primary: fusion.primary,
            multiple_problems: fusion.high_confidence.len() > 1,
            high_confidence_count: fusion.high_confidence.len(),
            detections: fusion.detections,
            timestamp: Utc::now(),
        }
    }
}

fn trend_note(name: &str, mean: f64, slope: f64, unit: &str) -> (String, Value) {
    let direction = if slope > 0.05 {
        format!("rising {slope:.2} {unit}/min")
    } else if slope < -0.05 {
        format!("falling {:.2} {unit}/min", slope.abs())
    } else {
        "stable".to_string()
    };
    (name.to_string(), json!(format!("{mean:.1} {unit}, {direction}")))
}

fn trend_analysis(features: &ServiceFeatures) -> Map<String, Value> {
    let mut map = Map::new();
    let entries = [
        trend_note("cpu", features.cpu.mean, features.cpu.trend_slope, "%"),
        trend_note("memory", features.memory.mean, features.memory.trend_slope, "%"),
        trend_note(
            "error_rate",
            features.error_rate.mean,
            features.error_rate.trend_slope,
            "errors",
        ),
        trend_note("latency", features.latency.mean, features.latency.trend_slope, "ms"),
    ];
    for (key, value) in entries {
        map.insert(key, value);
    }
    map.insert(
        "direction".to_string(),
        json!(features.trend_direction.to_string()),
    );
    map
}

fn detector_correlations(detections: &[Detection], features: &ServiceFeatures) -> Vec<String> {
    let mut notes = Vec::new();
    let fired: Vec<&Detection> = detections.iter().filter(|d| d.detected).collect();
    for pair in fired.windows(2) {
        notes.push(format!(
            "{} and {} fired in the same window",
            pair[0].problem_type, pair[1].problem_type
        ));
    }
    if features.cpu_memory_corr.abs() > 0.7 {
        notes.push(format!(
            "cpu and memory strongly correlated ({:.2})",
            features.cpu_memory_corr
        ));
    }
    if features.latency_error_corr.abs() > 0.6 {
        notes.push(format!(
            "latency tracks errors ({:.2})",
            features.latency_error_corr
        ));
    }
    notes
}

fn predictive_insights(features: &ServiceFeatures, tti: &str) -> Vec<String> {
    let mut insights = Vec::new();
    if features.memory.trend_slope > 0.5 && features.memory.mean < 100.0 {
        let mins = (100.0 - features.memory.mean) / features.memory.trend_slope;
        insights.push(format!(
            "Memory exhausts remaining headroom in about {mins:.0} minutes at the current trend"
        ));
    }
    if features.cpu.trend_slope > 1.0 && features.cpu.mean < 100.0 {
        let mins = (100.0 - features.cpu.mean) / features.cpu.trend_slope;
        insights.push(format!(
            "CPU reaches saturation in about {mins:.0} minutes at the current trend"
        ));
    }
    if features.error_rate.trend_slope > 1.0 {
        insights.push(format!(
            "Error rate climbing {:.1}/min",
            features.error_rate.trend_slope
        ));
    }
    if features.has_periodic_pattern {
        insights.push(format!(
            "Periodic load pattern with period {:.0}s; expect the next peak accordingly",
            features.period_length_secs
        ));
    }
    if insights.is_empty() {
        if features.trend_direction == TrendDirection::Stable {
            insights.push("No adverse trend detected over the window".to_string());
        } else {
            insights.push(format!(
                "Resource trend {} but below alerting thresholds",
                features.trend_direction
            ));
        }
    }
    insights.push(format!("Time to impact: {tti}"));
    insights
}

fn impact_description(primary: &Detection, score: f64) -> String {
    if primary.problem_type == ProblemType::Healthy {
        "No user-facing impact expected".to_string()
    } else {
        format!(
            "{} with impact score {score:.0}: request handling degrades if unaddressed",
            primary.problem_type
        )
    }
}

fn affected_areas(features: &ServiceFeatures) -> Vec<String> {
    let mut areas = Vec::new();
    if features.latency_p95 > 2000.0 {
        areas.push("request latency".to_string());
    }
    if features.error_rate.mean > 5.0 {
        areas.push("request success rate".to_string());
    }
    if features.cpu.mean > 80.0 || features.memory.mean > 85.0 {
        areas.push("compute capacity".to_string());
    }
    if areas.is_empty() {
        areas.push("none observed".to_string());
    }
    areas
}
