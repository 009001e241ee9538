use futures::future::BoxFuture;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::CachedResponse;
use crate::error::OfflineError;

/// Where assets come from when the network is used.
pub trait AssetSource: Send + Sync + 'static {
  /// Fetch `url`. Any HTTP response, whatever its status, is `Ok`; only
  /// failures to get a response are errors.
  fn fetch(&self, url: Url) -> BoxFuture<'static, Result<CachedResponse, OfflineError>>;
}

/// Asset source backed by a plain HTTP client
#[derive(Clone)]
pub struct HttpAssetSource {
  http: reqwest::Client,
}

impl HttpAssetSource {
  /// `timeout` bounds the whole request; the intercept race uses its own,
  /// shorter timer on top of it.
  pub fn new(timeout: Duration) -> Result<Self, OfflineError> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| OfflineError::Network {
        url: String::new(),
        message: e.to_string(),
      })?;
    Ok(Self { http })
  }
}

impl AssetSource for HttpAssetSource {
  fn fetch(&self, url: Url) -> BoxFuture<'static, Result<CachedResponse, OfflineError>> {
    let http = self.http.clone();

    Box::pin(async move {
      let network_error = |e: reqwest::Error| OfflineError::Network {
        url: url.to_string(),
        message: e.to_string(),
      };

      debug!(%url, "Making network request");
      let response = http.get(url.clone()).send().await.map_err(network_error)?;

      let status = response.status().as_u16();
      let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
      let body = response.bytes().await.map_err(network_error)?;

      Ok(CachedResponse::new(url.as_str(), status, content_type, body.to_vec()))
    })
  }
}
