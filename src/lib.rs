//! Offline-tolerant synchronization core for a memo card learning app.
//!
//! [`sync::SyncCore`] owns the dataset. It is built from a [`cache::LocalCache`]
//! and any [`remote::RemoteStore`], both injected at construction.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod remote;
pub mod render;
pub mod sync;

pub use error::SyncError;
