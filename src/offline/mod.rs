//! Offline asset cache.
//!
//! A fixed list of static assets is copied into a named cache bucket at
//! install time. Intercepted requests race the network against a timeout and
//! fall back to the bucket when the network loses.

mod cache;
mod source;
mod worker;

pub use cache::{AssetCache, SqliteAssetCache};
pub use source::{AssetSource, HttpAssetSource};
pub use worker::OfflineWorker;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A response body as fetched from the network or stored in a bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedResponse {
  pub url: String,
  pub status: u16,
  pub content_type: Option<String>,
  #[serde(skip)]
  pub body: Vec<u8>,
  /// SHA-256 of `body`, hex encoded
  pub digest: String,
  pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
  pub fn new(
    url: impl Into<String>,
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
  ) -> Self {
    Self {
      url: url.into(),
      status,
      content_type,
      digest: body_digest(&body),
      body,
      cached_at: Utc::now(),
    }
  }

  /// Whether the status is 2xx
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn verify(&self) -> bool {
    body_digest(&self.body) == self.digest
  }
}

fn body_digest(body: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(body);
  hex::encode(hasher.finalize())
}
