//! Error taxonomy of the sync core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
  /// Remote unreachable or the connection failed mid-request
  #[error("network error: {0}")]
  Network(String),

  /// Remote reachable but answered with a non-2xx status or an unreadable body
  #[error("server error ({status}): {message}")]
  Server { status: u16, message: String },

  /// Delete target unknown to the remote store
  #[error("record {0} not found on server")]
  NotFound(String),

  /// Rejected before any state change (duplicate id, mutation already in flight)
  #[error("invalid operation: {0}")]
  Validation(String),

  /// Local persistence failure. Absorbed at the cache boundary.
  #[error("cache error: {0}")]
  Cache(String),
}
