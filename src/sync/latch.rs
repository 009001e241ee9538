//! Per-store fetch latches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;

/// Whether a store has been refreshed from the network during this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatchState {
  #[default]
  NotFetched,
  /// A remote fetch is in flight. Only visible to the caller holding the
  /// latch; other readers wait until it settles.
  Fetching,
  /// Set after the first successful fetch; never reset
  Fetched,
}

/// Async lock guarding one store's latch. Callers hold it for the whole
/// read-or-fetch sequence, so concurrent reads of the same store queue up
/// behind a single remote fetch.
pub type FetchLatch = tokio::sync::Mutex<LatchState>;

/// Lazily populated table of latches, one per store name.
#[derive(Debug, Default)]
pub struct LatchTable {
  latches: Mutex<HashMap<&'static str, Arc<FetchLatch>>>,
}

impl LatchTable {
  pub fn get(&self, store_name: &'static str) -> Result<Arc<FetchLatch>, StoreError> {
    let mut latches = self
      .latches
      .lock()
      .map_err(|e| StoreError::Poisoned(e.to_string()))?;

    Ok(Arc::clone(latches.entry(store_name).or_default()))
  }
}
