//! Install / activate / intercept lifecycle of the offline asset cache.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{AssetCache, AssetSource, CachedResponse};
use crate::config::OfflineConfig;
use crate::error::OfflineError;

/// Outcome of a per-asset install.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallManifest {
  pub bucket: String,
  /// Resolved URLs now present in the bucket
  pub cached: Vec<String>,
  pub failed: Vec<FailedAsset>,
}

impl InstallManifest {
  pub fn is_complete(&self) -> bool {
    self.failed.is_empty()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedAsset {
  pub asset: String,
  pub error: String,
}

/// How an intercepted request was answered
#[derive(Debug, Clone)]
pub enum Served {
  Network(CachedResponse),
  Cache(CachedResponse),
}

impl Served {
  pub fn response(&self) -> &CachedResponse {
    match self {
      Served::Network(r) | Served::Cache(r) => r,
    }
  }

  pub fn is_from_cache(&self) -> bool {
    matches!(self, Served::Cache(_))
  }
}

/// Background worker owning one current cache bucket.
pub struct OfflineWorker<C: AssetCache, A: AssetSource> {
  cache: Arc<C>,
  source: Arc<A>,
  cache_name: String,
  origin: Url,
  assets: Vec<String>,
  timeout: Duration,
  write_through: bool,
}

impl<C: AssetCache, A: AssetSource> OfflineWorker<C, A> {
  pub fn new(cache: C, source: A, config: &OfflineConfig) -> Result<Self, OfflineError> {
    let origin = Url::parse(&config.origin)
      .map_err(|e| OfflineError::InvalidUrl(config.origin.clone(), e))?;

    Ok(Self {
      cache: Arc::new(cache),
      source: Arc::new(source),
      cache_name: config.cache_name.clone(),
      origin,
      assets: config.assets.clone(),
      timeout: Duration::from_millis(config.timeout_ms),
      write_through: config.write_through,
    })
  }

  #[allow(dead_code)]
  pub fn cache(&self) -> &C {
    &self.cache
  }

  /// Resolve an asset path against the origin. Absolute URLs pass through.
  pub fn resolve(&self, asset: &str) -> Result<Url, OfflineError> {
    match Url::parse(asset) {
      Ok(url) => Ok(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => self
        .origin
        .join(asset)
        .map_err(|e| OfflineError::InvalidUrl(asset.to_string(), e)),
      Err(e) => Err(OfflineError::InvalidUrl(asset.to_string(), e)),
    }
  }

  /// Fetch one asset for installation; non-2xx responses count as failures.
  async fn acquire(&self, asset: &str) -> Result<CachedResponse, OfflineError> {
    let url = self.resolve(asset)?;
    let response = self.source.fetch(url.clone()).await?;
    if !response.is_ok() {
      return Err(OfflineError::Status {
        url: url.to_string(),
        status: response.status,
      });
    }
    Ok(response)
  }

  async fn acquire_all(&self) -> Vec<(String, Result<CachedResponse, OfflineError>)> {
    let fetches = self
      .assets
      .iter()
      .map(|asset| async move { (asset.clone(), self.acquire(asset).await) });
    join_all(fetches).await
  }

  /// Populate the current bucket, acquiring every asset independently.
  /// Assets that fail are listed in the manifest and do not block the rest.
  pub async fn install(&self) -> Result<InstallManifest, OfflineError> {
    self.cache.open_bucket(&self.cache_name)?;
    info!(bucket = %self.cache_name, assets = self.assets.len(), "Installing offline assets");

    let mut manifest = InstallManifest {
      bucket: self.cache_name.clone(),
      ..Default::default()
    };

    for (asset, result) in self.acquire_all().await {
      let stored = result.and_then(|response| {
        self.cache.put(&self.cache_name, &response)?;
        Ok(response.url)
      });

      match stored {
        Ok(url) => manifest.cached.push(url),
        Err(e) => {
          warn!(asset = %asset, error = %e, "Failed to cache asset");
          manifest.failed.push(FailedAsset {
            asset,
            error: e.to_string(),
          });
        }
      }
    }

    info!(
      bucket = %self.cache_name,
      cached = manifest.cached.len(),
      failed = manifest.failed.len(),
      "Install finished"
    );
    Ok(manifest)
  }

  /// All-or-nothing install: nothing is stored unless every asset fetched.
  pub async fn install_strict(&self) -> Result<InstallManifest, OfflineError> {
    let mut responses = Vec::with_capacity(self.assets.len());
    let mut failures = 0usize;

    for (asset, result) in self.acquire_all().await {
      match result {
        Ok(response) => responses.push(response),
        Err(e) => {
          warn!(asset = %asset, error = %e, "Asset failed, aborting install");
          failures += 1;
        }
      }
    }

    if failures > 0 {
      return Err(OfflineError::InstallAborted(failures));
    }

    self.cache.put_all(&self.cache_name, &responses)?;
    info!(bucket = %self.cache_name, cached = responses.len(), "Install finished");

    Ok(InstallManifest {
      bucket: self.cache_name.clone(),
      cached: responses.into_iter().map(|r| r.url).collect(),
      failed: Vec::new(),
    })
  }

  /// Delete every bucket except the current one. Returns the deleted names.
  pub fn activate(&self) -> Result<Vec<String>, OfflineError> {
    let mut deleted = Vec::new();
    for name in self.cache.bucket_names()? {
      if name != self.cache_name && self.cache.delete_bucket(&name)? {
        info!(bucket = %name, "Removed stale cache bucket");
        deleted.push(name);
      }
    }
    Ok(deleted)
  }

  /// Answer a request: network first, cache if the network errors or takes
  /// longer than the timeout. With write-through on, 2xx network responses
  /// are also added to the bucket.
  ///
  /// The network request runs in its own task and keeps going after the
  /// timeout fires; only its result is ignored.
  pub async fn intercept(&self, request: &str) -> Result<Served, OfflineError> {
    let url = self.resolve(request)?;

    let source = Arc::clone(&self.source);
    let fetch_url = url.clone();
    let network = tokio::spawn(async move { source.fetch(fetch_url).await });

    let failure = match tokio::time::timeout(self.timeout, network).await {
      Ok(Ok(Ok(response))) => {
        debug!(%url, status = response.status, "Served from network");
        if self.write_through && response.is_ok() {
          if let Err(e) = self.cache.put(&self.cache_name, &response) {
            warn!(%url, error = %e, "Failed to add response to cache");
          }
        }
        return Ok(Served::Network(response));
      }
      Ok(Ok(Err(e))) => e,
      Ok(Err(e)) => OfflineError::Network {
        url: url.to_string(),
        message: e.to_string(),
      },
      Err(_) => OfflineError::Timeout(url.to_string()),
    };

    warn!(%url, error = %failure, "Network request failed, trying cache");
    match self.cache.lookup(&self.cache_name, url.as_str())? {
      Some(response) => {
        debug!(%url, "Serving from cache");
        Ok(Served::Cache(response))
      }
      None => Err(OfflineError::NoMatch(url.to_string())),
    }
  }
}
