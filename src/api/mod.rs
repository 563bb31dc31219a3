/// HTTP surface over the engine and the store
///
/// This module provides the read-only diagnosis endpoints plus the two
/// ingest endpoints, with structured error handling, proper HTTP status
/// codes, and input validation.
pub mod handlers;
pub mod responses;

pub use handlers::*;
pub use responses::*;
