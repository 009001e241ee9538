//! Core traits and types for record synchronization.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for records that are mirrored from the remote API into a local store.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Name of the local store holding this kind of record (e.g. "restaurants")
  fn store_name() -> &'static str;

  /// Logical identifier from the remote source
  fn record_id(&self) -> String;

  /// Normalize a freshly fetched record before it is stored or returned.
  /// Must be idempotent.
  fn patch(self) -> Self {
    self
  }
}

/// Records plus where they were read from.
#[derive(Debug, Clone)]
pub struct SyncResult<T> {
  pub data: T,
  pub source: SyncSource,
}

impl<T> SyncResult<T> {
  pub fn local(data: T) -> Self {
    Self {
      data,
      source: SyncSource::Local,
    }
  }

  pub fn remote(data: T) -> Self {
    Self {
      data,
      source: SyncSource::Remote,
    }
  }
}

/// Indicates where synced records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
  /// Read back from the local store
  Local,
  /// Freshly fetched from the remote API
  Remote,
}
