//! Metric, event, and diagnosis persistence.
//!
//! One append-mostly time-series table of metric samples, a cluster events
//! table, and a diagnosis log, behind the [`MetricStore`] trait. Two
//! backends: SQLite for the server and an in-memory store for tests and
//! ephemeral deployments.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::utils::error::{SentinelError, SentinelResult};

/// One telemetry observation. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl MetricSample {
    #[must_use]
    pub fn new(service: &str, metric_name: &str, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            service: service.to_string(),
            metric_name: metric_name.to_string(),
            value,
            labels: HashMap::new(),
        }
    }
}

/// A pod lifecycle event as reported by the cluster watcher or ingest API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub pod: String,
    pub namespace: String,
    pub message: String,
}

/// A persisted high-confidence diagnosis. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub id: Uuid,
    pub service: String,
    pub problem_type: String,
    pub confidence: f64,
    pub severity: String,
    pub evidence: serde_json::Value,
    pub recommendation: String,
    pub timestamp: DateTime<Utc>,
}

/// Read/write contract over the persistent telemetry store.
///
/// The diagnosis engine only reads sample data; writes come from the
/// scraper, the ingest API, and the engine's own diagnosis log.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn insert_samples(&self, samples: &[MetricSample]) -> SentinelResult<usize>;

    /// Most recent sample for (service, metric), if any
    async fn latest(&self, service: &str, metric: &str) -> SentinelResult<Option<MetricSample>>;

    /// Samples in [from, to], ordered by timestamp ascending
    async fn range(
        &self,
        service: &str,
        metric: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SentinelResult<Vec<MetricSample>>;

    /// Samples within [now - window, now], ordered ascending
    async fn recent(
        &self,
        service: &str,
        metric: &str,
        window: Duration,
    ) -> SentinelResult<Vec<MetricSample>> {
        let now = Utc::now();
        let from = now
            - ChronoDuration::from_std(window).map_err(|e| SentinelError::Domain {
                function: "recent".to_string(),
                reason: format!("window out of range: {e}"),
            })?;
        self.range(service, metric, from, now).await
    }

    /// Names of services that stored at least one sample since `since`
    async fn services_with_data_since(&self, since: DateTime<Utc>) -> SentinelResult<Vec<String>>;

    async fn insert_event(&self, event: &ClusterEvent) -> SentinelResult<()>;

    /// Latest events for a pod (or all pods when `pod` is None), newest first
    async fn recent_events(
        &self,
        pod: Option<&str>,
        limit: usize,
    ) -> SentinelResult<Vec<ClusterEvent>>;

    async fn save_diagnosis(&self, record: &DiagnosisRecord) -> SentinelResult<()>;

    /// Latest diagnosis records for a service, newest first
    async fn recent_diagnoses(
        &self,
        service: &str,
        limit: usize,
    ) -> SentinelResult<Vec<DiagnosisRecord>>;
}

fn query_err(operation: &str) -> impl FnOnce(rusqlite::Error) -> SentinelError + '_ {
    move |e| SentinelError::StoreQueryFailed {
        operation: operation.to_string(),
        reason: e.to_string(),
    }
}

/// SQLite storage implementation
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `database_path` and run schema setup.
    pub async fn open(database_path: PathBuf) -> SentinelResult<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SentinelError::StoreUnavailable {
                        reason: format!("Failed to create database directory: {e}"),
                    })?;
            }
        }

        let conn =
            Connection::open(&database_path).map_err(|e| SentinelError::StoreUnavailable {
                reason: format!("Failed to open SQLite database: {e}"),
            })?;

        Self::init_schema(&conn)?;
        info!(path = %database_path.display(), "Metric store opened");

        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-process database, used by integration tests.
    pub fn open_in_memory() -> SentinelResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| SentinelError::StoreUnavailable {
            reason: format!("Failed to open in-memory SQLite database: {e}"),
        })?;
        Self::init_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> SentinelResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metric_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                service TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                value REAL NOT NULL,
                labels TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_samples_service_metric_ts
                ON metric_samples(service, metric_name, timestamp DESC);
            CREATE TABLE IF NOT EXISTS cluster_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                pod TEXT NOT NULL,
                namespace TEXT NOT NULL,
                message TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_pod_ts
                ON cluster_events(pod, timestamp DESC);
            CREATE TABLE IF NOT EXISTS diagnoses (
                id TEXT PRIMARY KEY,
                service TEXT NOT NULL,
                problem_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                severity TEXT NOT NULL,
                evidence TEXT NOT NULL,
                recommendation TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_diagnoses_service_ts
                ON diagnoses(service, timestamp DESC);",
        )
        .map_err(|e| SentinelError::StoreUnavailable {
            reason: format!("Failed to initialize schema: {e}"),
        })
    }

    fn row_to_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, f64, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn decode_sample(
        (ts, service, metric_name, value, labels): (String, String, String, f64, String),
    ) -> SentinelResult<MetricSample> {
        let timestamp = DateTime::parse_from_rfc3339(&ts)
            .map_err(|e| SentinelError::StoreQueryFailed {
                operation: "decode_sample".to_string(),
                reason: format!("bad timestamp '{ts}': {e}"),
            })?
            .with_timezone(&Utc);
        let labels: HashMap<String, String> = serde_json::from_str(&labels).unwrap_or_default();
        Ok(MetricSample {
            timestamp,
            service,
            metric_name,
            value,
            labels,
        })
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn insert_samples(&self, samples: &[MetricSample]) -> SentinelResult<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.lock().await;
        let tx = conn.transaction().map_err(query_err("insert_samples"))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO metric_samples (timestamp, service, metric_name, value, labels)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(query_err("insert_samples"))?;
            for sample in samples {
                let labels = serde_json::to_string(&sample.labels)?;
                stmt.execute(params![
                    sample.timestamp.to_rfc3339(),
                    sample.service,
                    sample.metric_name,
                    sample.value,
                    labels
                ])
                .map_err(query_err("insert_samples"))?;
            }
        }
        tx.commit().map_err(query_err("insert_samples"))?;
        debug!(count = samples.len(), "Inserted metric samples");
        Ok(samples.len())
    }

    async fn latest(&self, service: &str, metric: &str) -> SentinelResult<Option<MetricSample>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn
            .prepare_cached(
                "SELECT timestamp, service, metric_name, value, labels
                 FROM metric_samples
                 WHERE service = ?1 AND metric_name = ?2
                 ORDER BY timestamp DESC LIMIT 1",
            )
            .map_err(query_err("latest"))?;
        let row = stmt
            .query_row(params![service, metric], Self::row_to_sample)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .map_err(query_err("latest"))?;
        row.map(Self::decode_sample).transpose()
    }

    async fn range(
        &self,
        service: &str,
        metric: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SentinelResult<Vec<MetricSample>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn
            .prepare_cached(
                "SELECT timestamp, service, metric_name, value, labels
                 FROM metric_samples
                 WHERE service = ?1 AND metric_name = ?2
                   AND timestamp >= ?3 AND timestamp <= ?4
                 ORDER BY timestamp ASC",
            )
            .map_err(query_err("range"))?;
        let rows = stmt
            .query_map(
                params![service, metric, from.to_rfc3339(), to.to_rfc3339()],
                Self::row_to_sample,
            )
            .map_err(query_err("range"))?;
        let mut samples = Vec::new();
        for row in rows {
            samples.push(Self::decode_sample(row.map_err(query_err("range"))?)?);
        }
        Ok(samples)
    }

    async fn services_with_data_since(&self, since: DateTime<Utc>) -> SentinelResult<Vec<String>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn
            .prepare_cached(
                "SELECT DISTINCT service FROM metric_samples
                 WHERE timestamp >= ?1 ORDER BY service ASC",
            )
            .map_err(query_err("services_with_data_since"))?;
        let rows = stmt
            .query_map(params![since.to_rfc3339()], |row| row.get::<_, String>(0))
            .map_err(query_err("services_with_data_since"))?;
        let mut services = Vec::new();
        for row in rows {
            services.push(row.map_err(query_err("services_with_data_since"))?);
        }
        Ok(services)
    }

    async fn insert_event(&self, event: &ClusterEvent) -> SentinelResult<()> {
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO cluster_events (timestamp, event_type, pod, namespace, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.pod,
                event.namespace,
                event.message
            ],
        )
        .map_err(query_err("insert_event"))?;
        Ok(())
    }

    async fn recent_events(
        &self,
        pod: Option<&str>,
        limit: usize,
    ) -> SentinelResult<Vec<ClusterEvent>> {
        let conn = self.connection.lock().await;
        let (sql, filter) = match pod {
            Some(p) => (
                "SELECT timestamp, event_type, pod, namespace, message FROM cluster_events
                 WHERE pod = ?1 ORDER BY timestamp DESC LIMIT ?2",
                Some(p),
            ),
            None => (
                "SELECT timestamp, event_type, pod, namespace, message FROM cluster_events
                 ORDER BY timestamp DESC LIMIT ?1",
                None,
            ),
        };
        let mut stmt = conn.prepare_cached(sql).map_err(query_err("recent_events"))?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, String, String, String)> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        };
        let rows = match filter {
            Some(p) => stmt
                .query_map(params![p, limit as i64], map_row)
                .map_err(query_err("recent_events"))?
                .collect::<Result<Vec<_>, _>>(),
            None => stmt
                .query_map(params![limit as i64], map_row)
                .map_err(query_err("recent_events"))?
                .collect::<Result<Vec<_>, _>>(),
        }
        .map_err(query_err("recent_events"))?;

        let mut events = Vec::with_capacity(rows.len());
        for (ts, event_type, pod, namespace, message) in rows {
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| SentinelError::StoreQueryFailed {
                    operation: "recent_events".to_string(),
                    reason: format!("bad timestamp '{ts}': {e}"),
                })?
                .with_timezone(&Utc);
            events.push(ClusterEvent {
                timestamp,
                event_type,
                pod,
                namespace,
                message,
            });
        }
        Ok(events)
    }

    async fn save_diagnosis(&self, record: &DiagnosisRecord) -> SentinelResult<()> {
        let evidence = serde_json::to_string(&record.evidence)?;
        let conn = self.connection.lock().await;
        conn.execute(
            "INSERT INTO diagnoses (id, service, problem_type, confidence, severity, evidence, recommendation, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.service,
                record.problem_type,
                record.confidence,
                record.severity,
                evidence,
                record.recommendation,
                record.timestamp.to_rfc3339()
            ],
        )
        .map_err(|e| SentinelError::Persistence {
            operation: "save_diagnosis".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn recent_diagnoses(
        &self,
        service: &str,
        limit: usize,
    ) -> SentinelResult<Vec<DiagnosisRecord>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, service, problem_type, confidence, severity, evidence, recommendation, timestamp
                 FROM diagnoses WHERE service = ?1
                 ORDER BY timestamp DESC LIMIT ?2",
            )
            .map_err(query_err("recent_diagnoses"))?;
        let rows = stmt
            .query_map(params![service, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(query_err("recent_diagnoses"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err("recent_diagnoses"))?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, service, problem_type, confidence, severity, evidence, recommendation, ts) in rows
        {
            let id = Uuid::parse_str(&id).map_err(|e| SentinelError::StoreQueryFailed {
                operation: "recent_diagnoses".to_string(),
                reason: format!("bad record id '{id}': {e}"),
            })?;
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| SentinelError::StoreQueryFailed {
                    operation: "recent_diagnoses".to_string(),
                    reason: format!("bad timestamp '{ts}': {e}"),
                })?
                .with_timezone(&Utc);
            records.push(DiagnosisRecord {
                id,
                service,
                problem_type,
                confidence,
                severity,
                evidence: serde_json::from_str(&evidence).unwrap_or(serde_json::Value::Null),
                recommendation,
                timestamp,
            });
        }
        Ok(records)
    }
}

/// In-memory storage implementation, keyed by (service, metric)
#[derive(Default)]
pub struct MemoryStore {
    samples: DashMap<(String, String), Vec<MetricSample>>,
    events: RwLock<Vec<ClusterEvent>>,
    diagnoses: RwLock<Vec<DiagnosisRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn insert_samples(&self, samples: &[MetricSample]) -> SentinelResult<usize> {
        for sample in samples {
            let key = (sample.service.clone(), sample.metric_name.clone());
            let mut series = self.samples.entry(key).or_default();
            series.push(sample.clone());
            series.sort_by_key(|s| s.timestamp);
        }
        Ok(samples.len())
    }

    async fn latest(&self, service: &str, metric: &str) -> SentinelResult<Option<MetricSample>> {
        Ok(self
            .samples
            .get(&(service.to_string(), metric.to_string()))
            .and_then(|series| series.last().cloned()))
    }

    async fn range(
        &self,
        service: &str,
        metric: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SentinelResult<Vec<MetricSample>> {
        Ok(self
            .samples
            .get(&(service.to_string(), metric.to_string()))
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.timestamp >= from && s.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn services_with_data_since(&self, since: DateTime<Utc>) -> SentinelResult<Vec<String>> {
        let mut services: Vec<String> = self
            .samples
            .iter()
            .filter(|entry| entry.value().iter().any(|s| s.timestamp >= since))
            .map(|entry| entry.key().0.clone())
            .collect();
        services.sort();
        services.dedup();
        Ok(services)
    }

    async fn insert_event(&self, event: &ClusterEvent) -> SentinelResult<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn recent_events(
        &self,
        pod: Option<&str>,
        limit: usize,
    ) -> SentinelResult<Vec<ClusterEvent>> {
        let events = self.events.read().await;
        let mut matched: Vec<ClusterEvent> = events
            .iter()
            .filter(|e| pod.map_or(true, |p| e.pod == p))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn save_diagnosis(&self, record: &DiagnosisRecord) -> SentinelResult<()> {
        self.diagnoses.write().await.push(record.clone());
        Ok(())
    }

    async fn recent_diagnoses(
        &self,
        service: &str,
        limit: usize,
    ) -> SentinelResult<Vec<DiagnosisRecord>> {
        let diagnoses = self.diagnoses.read().await;
        let mut matched: Vec<DiagnosisRecord> = diagnoses
            .iter()
            .filter(|d| d.service == service)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }
}
