use std::fmt;

use crate::error::SyncError;

/// Degraded-mode notice for the presentation layer to show or ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
  /// Startup fetch failed, serving the local cache
  RemoteUnreachable,
  /// Startup fetch failed and no usable cache, serving seed defaults
  NoDataAvailable,
  /// Add was rejected remotely; the record stays in the local dataset
  SaveFailed,
  /// Delete was rejected remotely; the record was put back
  DeleteFailed,
}

impl Notice {
  pub fn message(&self) -> &'static str {
    match self {
      Self::RemoteUnreachable => "remote unreachable, showing cached data",
      Self::NoDataAvailable => "no data available, showing defaults",
      Self::SaveFailed => "save failed remotely; change kept locally only",
      Self::DeleteFailed => "delete failed remotely; change reverted",
    }
  }
}

impl fmt::Display for Notice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.message())
  }
}

/// Where the startup dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
  /// Fresh data from the remote store
  Remote,
  /// Remote unavailable, serving the local cache
  Cache,
  /// Remote and cache both unavailable, serving built-in defaults
  Defaults,
}

/// Result of an add once the remote leg has resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
  Synced,
  /// The remote rejected the record; it is kept locally only
  KeptLocally(SyncError),
}

/// Result of a remove once the remote leg has resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
  Synced,
  /// The remote rejected the delete; the record was restored
  Reverted(SyncError),
}
