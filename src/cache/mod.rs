//! Durable local cache for offline fallback.
//!
//! This module provides a whole-snapshot cache that:
//! - Keeps one named slot per mirrored backend
//! - Replaces the slot atomically on every write
//! - Treats missing, unreadable and malformed slots alike as "no cache"

mod layer;
mod storage;
mod traits;

pub use layer::LocalCache;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{SlotKey, Snapshot, StoredSlot};
