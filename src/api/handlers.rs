//! API request handlers: a thin read-only surface over the engine and the
//! store, plus the two ingest endpoints feeding them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::api::responses::ApiResponse;
use crate::collectors::events::RawClusterEvent;
use crate::engine::{Diagnosis, ServiceComparison, UltimateDiagnosis};
use crate::infrastructure::self_metrics::{self, SAMPLES_INGESTED_TOTAL};
use crate::infrastructure::store::{DiagnosisRecord, MetricSample};
use crate::server::AppState;
use crate::utils::error::SentinelError;
use crate::utils::validation::InputValidator;

/// Liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Prometheus self-metrics in the text exposition format
pub async fn metrics() -> (StatusCode, String) {
    (StatusCode::OK, self_metrics::render())
}

/// Services that stored samples in the last hour
pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, SentinelError> {
    let since = Utc::now() - ChronoDuration::hours(1);
    let services = state.store.services_with_data_since(since).await?;
    Ok(Json(ApiResponse::success(services)))
}

/// Full diagnosis for one service
pub async fn diagnose(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<ApiResponse<UltimateDiagnosis>>, SentinelError> {
    InputValidator::validate_service_name(&service)?;
    let diagnosis = state.engine.diagnose(&service).await?;
    Ok(Json(ApiResponse::success(diagnosis)))
}

/// Fused detector verdicts without the advanced annotation
pub async fn diagnose_basic(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<ApiResponse<Diagnosis>>, SentinelError> {
    InputValidator::validate_service_name(&service)?;
    let diagnosis = state.engine.diagnose_basic(&service).await?;
    Ok(Json(ApiResponse::success(diagnosis)))
}

#[derive(Debug, Deserialize)]
pub struct ServiceListRequest {
    pub services: Vec<String>,
}

/// Batch diagnosis over a service list
pub async fn diagnose_batch(
    State(state): State<AppState>,
    Json(request): Json<ServiceListRequest>,
) -> Result<Json<ApiResponse<HashMap<String, Diagnosis>>>, SentinelError> {
    for service in &request.services {
        InputValidator::validate_service_name(service)?;
    }
    let diagnoses = state.engine.diagnose_all(&request.services).await;
    Ok(Json(ApiResponse::success(diagnoses)))
}

#[derive(Debug, Serialize)]
pub struct HealthScoreResponse {
    pub service: String,
    pub health_score: f64,
}

pub async fn health_score(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<ApiResponse<HealthScoreResponse>>, SentinelError> {
    InputValidator::validate_service_name(&service)?;
    let score = state.engine.health_score(&service).await?;
    Ok(Json(ApiResponse::success(HealthScoreResponse {
        service,
        health_score: score,
    })))
}

/// Cross-service comparison, least healthy first
pub async fn compare(
    State(state): State<AppState>,
    Json(request): Json<ServiceListRequest>,
) -> Result<Json<ApiResponse<Vec<ServiceComparison>>>, SentinelError> {
    for service in &request.services {
        InputValidator::validate_service_name(service)?;
    }
    let comparisons = state.engine.compare(&request.services).await?;
    Ok(Json(ApiResponse::success(comparisons)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

/// Persisted diagnosis history, newest first
pub async fn history(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<DiagnosisRecord>>>, SentinelError> {
    InputValidator::validate_service_name(&service)?;
    InputValidator::validate_limit(query.limit)?;
    let records = state.engine.history(&service, query.limit).await?;
    Ok(Json(ApiResponse::success(records)))
}

/// One incoming sample; timestamp defaults to arrival time.
#[derive(Debug, Deserialize)]
pub struct SampleInput {
    pub service: String,
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub timestamp: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub inserted: usize,
}

/// Bulk sample ingest for external collectors
pub async fn ingest_samples(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<SampleInput>>,
) -> Result<Json<ApiResponse<IngestResponse>>, SentinelError> {
    let mut samples = Vec::with_capacity(inputs.len());
    for input in inputs {
        InputValidator::validate_service_name(&input.service)?;
        InputValidator::validate_metric_name(&input.metric_name)?;
        InputValidator::validate_sample_value(input.value)?;
        let mut sample = MetricSample::new(
            &input.service,
            &input.metric_name,
            input.value,
            input.timestamp.unwrap_or_else(Utc::now),
        );
        sample.labels = input.labels;
        samples.push(sample);
    }
    let inserted = state.store.insert_samples(&samples).await?;
    SAMPLES_INGESTED_TOTAL
        .with_label_values(&["api"])
        .inc_by(inserted as f64);
    Ok(Json(ApiResponse::success(IngestResponse { inserted })))
}

/// Cluster event ingest (pod lifecycle, restarts)
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(raw): Json<RawClusterEvent>,
) -> Result<Json<ApiResponse<Value>>, SentinelError> {
    let event = state.events.ingest(raw).await?;
    Ok(Json(ApiResponse::success(json!({
        "event_type": event.event_type,
        "pod": event.pod,
        "namespace": event.namespace,
    }))))
}

/// Recent cluster events, optionally filtered by pod
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub pod: Option<String>,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<ApiResponse<Vec<crate::infrastructure::store::ClusterEvent>>>, SentinelError> {
    InputValidator::validate_limit(query.limit)?;
    let events = state
        .store
        .recent_events(query.pod.as_deref(), query.limit)
        .await?;
    Ok(Json(ApiResponse::success(events)))
}
