use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::api_types::{ApiErrorBody, DELETE_FAILED, FETCH_FAILED, SAVE_FAILED};
use super::RemoteStore;
use crate::error::SyncError;
use crate::model::{Dataset, MemoCard};

/// HTTP client for the memo card backend
#[derive(Clone)]
pub struct HttpRemoteStore {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpRemoteStore {
  pub fn new(base_url: &str) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid remote URL '{}': {}", base_url, e))?;

    if base_url.cannot_be_a_base() {
      return Err(eyre!("Remote URL '{}' cannot be used as a base", base_url));
    }

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  /// Build `{base}/{segments...}`, percent-encoding each segment.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// Decode a 2xx body.
  async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    let status = response.status();
    response.json::<T>().await.map_err(|e| SyncError::Server {
      status: status.as_u16(),
      message: format!("Invalid response body: {}", e),
    })
  }

  /// Turn a non-2xx response into an error, preferring the server's message.
  async fn failure(response: Response, fallback: &str) -> SyncError {
    let status = response.status();
    let message = match response.json::<ApiErrorBody>().await {
      Ok(body) => {
        if let Some(detail) = &body.error {
          debug!(status = status.as_u16(), detail = detail.as_str(), "server error detail");
        }
        body.message
      }
      Err(_) => fallback.to_string(),
    };
    SyncError::Server {
      status: status.as_u16(),
      message,
    }
  }
}

fn transport_error(e: reqwest::Error) -> SyncError {
  SyncError::Network(e.to_string())
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
  /// Get the whole dataset
  async fn fetch_all(&self) -> Result<Dataset, SyncError> {
    let url = self.endpoint(&["data"]);
    debug!(%url, "fetching dataset");

    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(transport_error)?;

    if !response.status().is_success() {
      return Err(Self::failure(response, FETCH_FAILED).await);
    }

    Self::decode(response).await
  }

  /// Create a record; the server upserts its embedded categories
  async fn create_record(&self, record: &MemoCard) -> Result<MemoCard, SyncError> {
    let url = self.endpoint(&["records"]);
    debug!(%url, id = %record.id, "creating record");

    let response = self
      .client
      .post(url)
      .json(record)
      .send()
      .await
      .map_err(transport_error)?;

    if !response.status().is_success() {
      return Err(Self::failure(response, SAVE_FAILED).await);
    }

    Self::decode(response).await
  }

  /// Delete a record by id
  async fn delete_record(&self, id: &str) -> Result<(), SyncError> {
    let url = self.endpoint(&["records", id]);
    debug!(%url, id, "deleting record");

    let response = self
      .client
      .delete(url)
      .send()
      .await
      .map_err(transport_error)?;

    if response.status() == StatusCode::NOT_FOUND {
      warn!(id, "record unknown to server");
      return Err(SyncError::NotFound(id.to_string()));
    }

    if !response.status().is_success() {
      return Err(Self::failure(response, DELETE_FAILED).await);
    }

    Ok(())
  }
}
