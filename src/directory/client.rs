use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::DirectoryError;

use super::types::{Restaurant, Review};

/// HTTP client timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the restaurants/reviews JSON API
#[derive(Clone)]
pub struct DirectoryClient {
  http: reqwest::Client,
  base: Url,
}

impl DirectoryClient {
  pub fn new(base_url: &str) -> Result<Self> {
    // Keep the last path segment when joining endpoints onto the base
    let mut base_url = base_url.trim().to_string();
    if !base_url.ends_with('/') {
      base_url.push('/');
    }
    let base = Url::parse(&base_url).map_err(|e| eyre!("Invalid API URL {}: {}", base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Get every restaurant
  pub async fn get_restaurants(&self) -> Result<Vec<Restaurant>, DirectoryError> {
    self.get_json("restaurants").await
  }

  /// Get every review, for all restaurants
  pub async fn get_reviews(&self) -> Result<Vec<Review>, DirectoryError> {
    self.get_json("reviews/").await
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DirectoryError> {
    let url = self
      .base
      .join(path)
      .map_err(|e| DirectoryError::Transport(format!("Invalid endpoint {}: {}", path, e)))?;

    debug!(%url, "GET");
    let response = self.http.get(url.clone()).send().await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(DirectoryError::Status(status.as_u16(), body));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
      .map_err(|e| DirectoryError::Decode(format!("{} from {}", e, url)))
  }
}
