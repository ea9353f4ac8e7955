//! Remote store access.
//!
//! The sync core only sees the [`RemoteStore`] trait. Each call is a single
//! attempt: failures are reported as-is and never retried here.

pub mod api_types;
mod client;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::model::{Dataset, MemoCard};

pub use client::HttpRemoteStore;

/// The authoritative backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
  /// Fetch the full dataset.
  async fn fetch_all(&self) -> Result<Dataset, SyncError>;

  /// Create a record. The backend may upsert the embedded categories.
  async fn create_record(&self, record: &MemoCard) -> Result<MemoCard, SyncError>;

  /// Delete a record. Fails with [`SyncError::NotFound`] if the id is unknown.
  async fn delete_record(&self, id: &str) -> Result<(), SyncError>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Box<T> {
  async fn fetch_all(&self) -> Result<Dataset, SyncError> {
    (**self).fetch_all().await
  }

  async fn create_record(&self, record: &MemoCard) -> Result<MemoCard, SyncError> {
    (**self).create_record(record).await
  }

  async fn delete_record(&self, id: &str) -> Result<(), SyncError> {
    (**self).delete_record(id).await
  }
}

/// A remote that is never reachable.
///
/// Used to run the client against local data only.
pub struct OfflineRemote;

#[async_trait]
impl RemoteStore for OfflineRemote {
  async fn fetch_all(&self) -> Result<Dataset, SyncError> {
    Err(offline())
  }

  async fn create_record(&self, _record: &MemoCard) -> Result<MemoCard, SyncError> {
    Err(offline())
  }

  async fn delete_record(&self, _id: &str) -> Result<(), SyncError> {
    Err(offline())
  }
}

fn offline() -> SyncError {
  SyncError::Network("offline mode".to_string())
}
