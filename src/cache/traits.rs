//! Core traits and types for the snapshot cache.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Dataset;

/// A value that is persisted as one whole snapshot.
pub trait Snapshot: Send + Sync + Serialize + DeserializeOwned {
  /// Snapshot type name for storage organization (e.g., "dataset")
  fn snapshot_type() -> &'static str;
}

impl Snapshot for Dataset {
  fn snapshot_type() -> &'static str {
    "dataset"
  }
}

/// Raw bytes stored in a cache slot.
#[derive(Debug, Clone)]
pub struct StoredSlot {
  pub snapshot_type: String,
  pub data: Vec<u8>,
  /// When the slot was last written
  pub cached_at: DateTime<Utc>,
}

/// Identifies the single named slot a snapshot lives in.
///
/// The slot is namespaced by the remote it mirrors, so pointing the client at
/// another backend never serves the first backend's data as a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKey {
  name: String,
}

impl SlotKey {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }

  /// Slot holding the dataset mirrored from the backend at `base_url`.
  pub fn for_remote(base_url: &str) -> Self {
    Self::new(format!("dataset:{}", normalize_url(base_url)))
  }

  /// Stable, fixed-length storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.name.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> &str {
    &self.name
  }
}

/// Trims whitespace and trailing slashes, lowercases.
fn normalize_url(url: &str) -> String {
  url.trim().trim_end_matches('/').to_lowercase()
}
