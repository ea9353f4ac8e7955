//! Serde types for backend responses that are not domain types.
//!
//! Successful responses carry domain types directly (`Dataset`, `MemoCard`);
//! only the error envelope needs a type of its own.

use serde::Deserialize;

/// Error body returned by the backend on any non-2xx response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: String,
  /// Backend-internal detail, logged but never shown
  #[serde(default)]
  pub error: Option<String>,
}

/// Fallback messages when the error body cannot be read.
pub const FETCH_FAILED: &str = "Failed to fetch data from server";
pub const SAVE_FAILED: &str = "Failed to save memo card to server";
pub const DELETE_FAILED: &str = "Failed to delete memo card from server";
