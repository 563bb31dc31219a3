//! Store backend tests, run against both the SQLite and in-memory
//! implementations through the shared trait.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use crate::infrastructure::store::{
        ClusterEvent, DiagnosisRecord, MemoryStore, MetricSample, MetricStore, SqliteStore,
    };

    fn backends() -> Vec<(&'static str, Arc<dyn MetricStore>)> {
        let sqlite = SqliteStore::open_in_memory()
            .unwrap_or_else(|e| panic!("sqlite open failed: {e}"));
        vec![
            ("memory", Arc::new(MemoryStore::new()) as Arc<dyn MetricStore>),
            ("sqlite", Arc::new(sqlite) as Arc<dyn MetricStore>),
        ]
    }

    fn sample_at(service: &str, metric: &str, value: f64, secs_ago: i64) -> MetricSample {
        MetricSample::new(
            service,
            metric,
            value,
            Utc::now() - ChronoDuration::seconds(secs_ago),
        )
    }

    #[tokio::test]
    async fn test_range_is_ascending_and_windowed() {
        for (name, store) in backends() {
            let samples = vec![
                sample_at("api", "cpu_usage", 10.0, 300),
                sample_at("api", "cpu_usage", 20.0, 200),
                sample_at("api", "cpu_usage", 30.0, 100),
                sample_at("api", "cpu_usage", 99.0, 4000),
            ];
            store
                .insert_samples(&samples)
                .await
                .unwrap_or_else(|e| panic!("[{name}] insert failed: {e}"));

            let recent = store
                .recent("api", "cpu_usage", Duration::from_secs(600))
                .await
                .unwrap_or_else(|e| panic!("[{name}] recent failed: {e}"));
            assert_eq!(recent.len(), 3, "[{name}] old sample must be excluded");
            assert!(
                recent.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
                "[{name}] samples must be ascending"
            );
            assert!((recent[0].value - 10.0).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_latest_returns_newest() {
        for (name, store) in backends() {
            store
                .insert_samples(&[
                    sample_at("api", "memory_usage", 50.0, 120),
                    sample_at("api", "memory_usage", 60.0, 60),
                ])
                .await
                .unwrap_or_else(|e| panic!("[{name}] insert failed: {e}"));

            let latest = store
                .latest("api", "memory_usage")
                .await
                .unwrap_or_else(|e| panic!("[{name}] latest failed: {e}"));
            let latest = latest.unwrap_or_else(|| panic!("[{name}] expected a sample"));
            assert!((latest.value - 60.0).abs() < f64::EPSILON);

            let none = store
                .latest("api", "absent_metric")
                .await
                .unwrap_or_else(|e| panic!("[{name}] latest failed: {e}"));
            assert!(none.is_none());
        }
    }

    #[tokio::test]
    async fn test_services_with_data_since() {
        for (name, store) in backends() {
            store
                .insert_samples(&[
                    sample_at("api", "cpu_usage", 10.0, 60),
                    sample_at("worker", "cpu_usage", 20.0, 60),
                    sample_at("stale", "cpu_usage", 30.0, 7200),
                ])
                .await
                .unwrap_or_else(|e| panic!("[{name}] insert failed: {e}"));

            let services = store
                .services_with_data_since(Utc::now() - ChronoDuration::hours(1))
                .await
                .unwrap_or_else(|e| panic!("[{name}] query failed: {e}"));
            assert_eq!(services, vec!["api".to_string(), "worker".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_labels_survive_round_trip() {
        for (name, store) in backends() {
            let mut sample = sample_at("api", "http_requests_total", 100.0, 30);
            sample
                .labels
                .insert("method".to_string(), "GET".to_string());
            store
                .insert_samples(&[sample])
                .await
                .unwrap_or_else(|e| panic!("[{name}] insert failed: {e}"));

            let latest = store
                .latest("api", "http_requests_total")
                .await
                .unwrap_or_else(|e| panic!("[{name}] latest failed: {e}"))
                .unwrap_or_else(|| panic!("[{name}] expected a sample"));
            assert_eq!(latest.labels.get("method").map(String::as_str), Some("GET"));
        }
    }

    #[tokio::test]
    async fn test_diagnosis_log_is_append_only_newest_first() {
        for (name, store) in backends() {
            for (i, confidence) in [82.0, 91.0, 88.5].iter().enumerate() {
                let record = DiagnosisRecord {
                    id: Uuid::new_v4(),
                    service: "api".to_string(),
                    problem_type: "MEMORY_LEAK".to_string(),
                    confidence: *confidence,
                    severity: "HIGH".to_string(),
                    evidence: json!({"memory_trend": 0.24}),
                    recommendation: "restart".to_string(),
                    timestamp: Utc::now() - ChronoDuration::seconds(100 - i as i64 * 10),
                };
                store
                    .save_diagnosis(&record)
                    .await
                    .unwrap_or_else(|e| panic!("[{name}] save failed: {e}"));
            }

            let records = store
                .recent_diagnoses("api", 2)
                .await
                .unwrap_or_else(|e| panic!("[{name}] query failed: {e}"));
            assert_eq!(records.len(), 2, "[{name}] limit must apply");
            assert!(
                records[0].timestamp >= records[1].timestamp,
                "[{name}] newest first"
            );
            assert!((records[0].confidence - 88.5).abs() < f64::EPSILON);
            assert_eq!(records[0].evidence["memory_trend"], 0.24);
        }
    }

    #[tokio::test]
    async fn test_sqlite_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let path = dir.path().join("nested").join("sentinel.db");

        {
            let store = SqliteStore::open(path.clone())
                .await
                .unwrap_or_else(|e| panic!("open failed: {e}"));
            store
                .insert_samples(&[sample_at("api", "cpu_usage", 55.0, 30)])
                .await
                .unwrap_or_else(|e| panic!("insert failed: {e}"));
        }

        let reopened = SqliteStore::open(path)
            .await
            .unwrap_or_else(|e| panic!("reopen failed: {e}"));
        let latest = reopened
            .latest("api", "cpu_usage")
            .await
            .unwrap_or_else(|e| panic!("latest failed: {e}"))
            .unwrap_or_else(|| panic!("expected the persisted sample"));
        assert!((latest.value - 55.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_events_filter_by_pod() {
        for (name, store) in backends() {
            for (pod, event_type) in [
                ("payments-abc12", "POD_RESTART"),
                ("payments-abc12", "OOM_KILLED"),
                ("cart-xyz89", "POD_PENDING"),
            ] {
                store
                    .insert_event(&ClusterEvent {
                        timestamp: Utc::now(),
                        event_type: event_type.to_string(),
                        pod: pod.to_string(),
                        namespace: "prod".to_string(),
                        message: String::new(),
                    })
                    .await
                    .unwrap_or_else(|e| panic!("[{name}] insert failed: {e}"));
            }

            let all = store
                .recent_events(None, 10)
                .await
                .unwrap_or_else(|e| panic!("[{name}] query failed: {e}"));
            assert_eq!(all.len(), 3);

            let filtered = store
                .recent_events(Some("payments-abc12"), 10)
                .await
                .unwrap_or_else(|e| panic!("[{name}] query failed: {e}"));
            assert_eq!(filtered.len(), 2);
            assert!(filtered.iter().all(|e| e.pod == "payments-abc12"));
        }
    }
}
