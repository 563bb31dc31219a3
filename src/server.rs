//! Server initialization and background task management
//!
//! This module handles router setup and the background loops: the scrape
//! worker feeding the samples table and the periodic diagnosis sweep over
//! every service with recent data.

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::handlers;
use crate::collectors::events::EventIngestor;
use crate::collectors::prometheus::ScrapeWorker;
use crate::engine::DiagnosisEngine;
use crate::infrastructure::store::MetricStore;
use crate::utils::config::SentinelConfig;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Shared metric/event/diagnosis store
    pub store: Arc<dyn MetricStore>,
    /// The diagnosis engine owning the extractor and detector fleet
    pub engine: Arc<DiagnosisEngine>,
    /// Cluster event intake
    pub events: Arc<EventIngestor>,
    /// Effective configuration
    pub config: Arc<SentinelConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn MetricStore>, config: Arc<SentinelConfig>) -> Self {
        let engine = Arc::new(DiagnosisEngine::new(
            Arc::clone(&store),
            config.engine.clone(),
        ));
        let events = Arc::new(EventIngestor::new(Arc::clone(&store)));
        Self {
            store,
            engine,
            events,
            config,
        }
    }
}

/// Build the HTTP router over the application state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/services", get(handlers::list_services))
        .route("/api/diagnose/:service", get(handlers::diagnose))
        .route("/api/diagnose/:service/basic", get(handlers::diagnose_basic))
        .route("/api/diagnose/batch", post(handlers::diagnose_batch))
        .route("/api/health-score/:service", get(handlers::health_score))
        .route("/api/compare", post(handlers::compare))
        .route("/api/history/:service", get(handlers::history))
        .route("/api/events", get(handlers::recent_events))
        .route("/api/ingest/samples", post(handlers::ingest_samples))
        .route("/api/ingest/events", post(handlers::ingest_event))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start background tasks: the scrape worker and the diagnosis sweep.
pub fn start_background_tasks(state: &AppState) {
    if state.config.scraper.enabled {
        match ScrapeWorker::new(Arc::clone(&state.store), state.config.scraper.clone()) {
            Ok(worker) => {
                tokio::spawn(worker.run());
            }
            Err(e) => {
                error!(error = %e, "Failed to start scrape worker");
            }
        }
    }

    if state.config.engine.sweep_enabled {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let interval =
                std::time::Duration::from_secs(sweep_state.config.engine.sweep_interval_secs);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                run_sweep(&sweep_state).await;
            }
        });
        info!(
            interval_secs = state.config.engine.sweep_interval_secs,
            "Diagnosis sweep started"
        );
    }
}

/// One sweep: diagnose every service that stored data in the last hour.
/// High-confidence findings are persisted by the engine as part of each
/// diagnosis; the sweep itself only logs.
async fn run_sweep(state: &AppState) {
    let since = Utc::now() - ChronoDuration::hours(1);
    let services = match state.store.services_with_data_since(since).await {
        Ok(services) => services,
        Err(e) => {
            warn!(error = %e, "Sweep could not list services");
            return;
        }
    };
    if services.is_empty() {
        return;
    }
    let diagnoses = state.engine.diagnose_all(&services).await;
    for (service, diagnosis) in &diagnoses {
        if diagnosis.high_confidence_count > 0 {
            info!(
                service = %service,
                problem = %diagnosis.primary.problem_type,
                confidence = diagnosis.primary.confidence,
                "Sweep found high-confidence problem"
            );
        }
    }
}
