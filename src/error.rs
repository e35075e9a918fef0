//! Error types for pulsekit

use thiserror::Error;

/// Errors arising from the persisted sample cache.
///
/// These never cross the public store API: persistence failures are logged
/// and degraded to "no data" (read) or dropped (write), keeping the
/// in-memory collection authoritative for the running session.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}
