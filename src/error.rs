//! Error types for the store, directory and offline layers.
//!
//! The binary reports these through `color_eyre`; library code keeps them
//! typed so callers can tell a missing record from a failed request.

/// Local record store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("Database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("Failed to encode record: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("Cannot open version {requested} of {name}: stored version is {current}")]
  VersionDowngrade {
    name: String,
    requested: u32,
    current: u32,
  },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Database {0} has not been opened")]
  NotOpen(String),

  #[error("Store {0} was opened read-only")]
  ReadOnly(String),

  #[error("Lock poisoned: {0}")]
  Poisoned(String),
}

/// Errors surfaced by directory reads
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Network error: {0}")]
  Transport(String),

  #[error("Server error ({0}): {1}")]
  Status(u16, String),

  #[error("Failed to decode response: {0}")]
  Decode(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl DirectoryError {
  /// True only for records missing from the directory; an endpoint answering
  /// 404 is a `Status` error.
  #[allow(dead_code)]
  pub fn is_not_found(&self) -> bool {
    matches!(self, DirectoryError::NotFound(_))
  }
}

impl From<reqwest::Error> for DirectoryError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      DirectoryError::Decode(e.to_string())
    } else {
      DirectoryError::Transport(e.to_string())
    }
  }
}

/// Offline asset cache errors
#[derive(Debug, thiserror::Error)]
pub enum OfflineError {
  #[error("Network error for {url}: {message}")]
  Network { url: String, message: String },

  #[error("Server returned {status} for {url}")]
  Status { url: String, status: u16 },

  #[error("Network request for {0} timed out")]
  Timeout(String),

  #[error("No cached response for {0}")]
  NoMatch(String),

  #[error("Invalid asset URL {0}: {1}")]
  InvalidUrl(String, url::ParseError),

  #[error("Install aborted, {0} asset(s) failed")]
  InstallAborted(usize),

  #[error(transparent)]
  Store(#[from] StoreError),
}
