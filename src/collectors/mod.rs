/// Cluster event intake and restart-count folding
pub mod events;
/// Prometheus exposition scraping worker
pub mod prometheus;

pub use events::{ClusterEventType, EventIngestor, RawClusterEvent};
pub use prometheus::{parse_exposition, ScrapeWorker};
