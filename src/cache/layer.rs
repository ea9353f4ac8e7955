//! Local cache adapter handed to the sync core.

use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{SlotKey, Snapshot};
use crate::error::SyncError;

/// Durable mirror of the last committed snapshot.
///
/// Failures never leave this type: a failed write is logged, and a failed or
/// malformed read is reported as "no cache".
pub struct LocalCache<S: CacheStorage, T: Snapshot> {
  storage: Arc<S>,
  slot: SlotKey,
  _snapshot: PhantomData<fn() -> T>,
}

impl<S: CacheStorage, T: Snapshot> LocalCache<S, T> {
  /// Create a new cache over the given storage backend and slot.
  pub fn new(storage: S, slot: SlotKey) -> Self {
    Self {
      storage: Arc::new(storage),
      slot,
      _snapshot: PhantomData,
    }
  }

  /// Get a reference to the storage backend
  pub fn storage(&self) -> &S {
    &self.storage
  }

  pub fn slot(&self) -> &SlotKey {
    &self.slot
  }

  /// Mirror the whole snapshot into the slot.
  pub fn write(&self, value: &T) {
    if let Err(e) = self.try_write(value) {
      warn!(slot = self.slot.description(), error = %e, "cache write failed");
    }
  }

  /// Read the slot back, or `None` if it is missing, unreadable or malformed.
  pub fn read(&self) -> Option<T> {
    match self.try_read() {
      Ok(value) => value,
      Err(e) => {
        warn!(slot = self.slot.description(), error = %e, "cache read failed, treating as empty");
        None
      }
    }
  }

  /// Forget the mirrored snapshot.
  pub fn clear(&self) {
    if let Err(e) = self.storage.clear_slot(&self.slot.cache_hash()) {
      warn!(slot = self.slot.description(), error = %e, "cache clear failed");
    }
  }

  fn try_write(&self, value: &T) -> Result<(), SyncError> {
    let data = serde_json::to_vec(value)
      .map_err(|e| SyncError::Cache(format!("Failed to serialize snapshot: {}", e)))?;

    self
      .storage
      .store_slot(
        &self.slot.cache_hash(),
        self.slot.description(),
        T::snapshot_type(),
        &data,
      )
      .map_err(|e| SyncError::Cache(e.to_string()))?;

    debug!(slot = self.slot.description(), bytes = data.len(), "cache written");
    Ok(())
  }

  fn try_read(&self) -> Result<Option<T>, SyncError> {
    let stored = self
      .storage
      .load_slot(&self.slot.cache_hash())
      .map_err(|e| SyncError::Cache(e.to_string()))?;

    let Some(stored) = stored else {
      debug!(slot = self.slot.description(), "cache miss");
      return Ok(None);
    };

    if stored.snapshot_type != T::snapshot_type() {
      return Err(SyncError::Cache(format!(
        "slot holds a {} snapshot, expected {}",
        stored.snapshot_type,
        T::snapshot_type()
      )));
    }

    let value = serde_json::from_slice(&stored.data)
      .map_err(|e| SyncError::Cache(format!("Failed to deserialize snapshot: {}", e)))?;

    debug!(
      slot = self.slot.description(),
      cached_at = %stored.cached_at,
      "cache hit"
    );
    Ok(Some(value))
  }
}

impl<S: CacheStorage, T: Snapshot> Clone for LocalCache<S, T> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      slot: self.slot.clone(),
      _snapshot: PhantomData,
    }
  }
}
