//! Client-side synchronization of the dataset.
//!
//! The core keeps one in-memory dataset consistent with:
//! - the remote store, reached through an unreliable link
//! - the local cache, used when the remote is unreachable at startup
//! - readers, who see optimistic changes immediately
//!
//! Adds and removes are applied locally first and then forwarded. A rejected
//! add is kept locally with a notice; a rejected remove is reverted with a
//! notice. Remote failures never surface as errors from the core.

mod engine;
mod status;

pub use engine::SyncCore;
pub use status::{AddOutcome, LoadSource, Notice, RemoveOutcome};
