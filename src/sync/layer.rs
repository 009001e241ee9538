//! Sync layer that pairs the local record store with remote fetching.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::latch::LatchTable;
use super::{LatchState, Record, SyncResult};
use crate::error::DirectoryError;
use crate::store::{Database, KeyValueStore, TransactionMode};

/// Makes "all records of kind T" look local regardless of whether they have
/// been pulled from the remote API yet.
///
/// Reads go to the local store first. An empty store triggers one remote
/// fetch, whose patched records are written back the first time only: the
/// per-store latch is never reset, so once a store has been filled from the
/// network, later fetches are returned without being written again.
pub struct SyncHelper<S: KeyValueStore> {
  store: Arc<S>,
  db_name: String,
  db_version: u32,
  latches: Arc<LatchTable>,
}

impl<S: KeyValueStore> SyncHelper<S> {
  /// Create a new sync helper over the given database.
  pub fn new(store: S, db_name: impl Into<String>, db_version: u32) -> Self {
    Self::with_shared_store(Arc::new(store), db_name, db_version)
  }

  pub fn with_shared_store(store: Arc<S>, db_name: impl Into<String>, db_version: u32) -> Self {
    Self {
      store,
      db_name: db_name.into(),
      db_version,
      latches: Arc::new(LatchTable::default()),
    }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Open the database with `store_name` in it.
  pub fn open(&self, store_name: &str) -> Result<Database, DirectoryError> {
    Ok(self.store.open(&self.db_name, self.db_version, store_name)?)
  }

  /// Latch state for a store once no read of it is in flight. Waits for
  /// any running fetch, so it never reports `Fetching`.
  #[allow(dead_code)]
  pub async fn latch_state<T: Record>(&self) -> Result<LatchState, DirectoryError> {
    let latch = self.latches.get(T::store_name())?;
    let state = *latch.lock().await;
    Ok(state)
  }

  /// Read every record of kind `T`, fetching from the network if the local
  /// store is empty.
  ///
  /// 1. Non-empty store: return its records unchanged, no network call
  /// 2. Empty store: call `fetcher`, patch each record
  /// 3. Write patched records back unless this store was already fetched
  /// 4. Return the fetched records (not re-read from the store)
  pub async fn get_records<T, F, Fut>(
    &self,
    fetcher: F,
  ) -> Result<SyncResult<Vec<T>>, DirectoryError>
  where
    T: Record,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, DirectoryError>>,
  {
    let store_name = T::store_name();
    let latch = self.latches.get(store_name)?;
    let mut state = latch.lock().await;

    let db = self.open(store_name)?;
    let stored = self.store.get_all(&db, store_name)?;

    if !stored.is_empty() {
      debug!(store = store_name, count = stored.len(), "Serving records from local store");
      let records = stored
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| DirectoryError::Decode(e.to_string()))?;
      return Ok(SyncResult::local(records));
    }

    let already_fetched = *state == LatchState::Fetched;
    if !already_fetched {
      *state = LatchState::Fetching;
    }

    info!(store = store_name, "Local store empty, fetching from network");
    let fetched = match fetcher().await {
      Ok(records) => records,
      Err(e) => {
        if !already_fetched {
          *state = LatchState::NotFetched;
        }
        return Err(e);
      }
    };

    let records: Vec<T> = fetched.into_iter().map(Record::patch).collect();

    if already_fetched {
      debug!(
        store = store_name,
        "Store already fetched this session, skipping write-back"
      );
    } else {
      *state = LatchState::Fetched;
      self.write_back(&db, store_name, &records);
    }

    Ok(SyncResult::remote(records))
  }

  /// Best-effort write of every record. Failures are logged and dropped, so
  /// a partial write-back is possible.
  fn write_back<T: Record>(&self, db: &Database, store_name: &str, records: &[T]) {
    let mut written = 0usize;

    for record in records {
      let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
          warn!(
            store = store_name,
            id = %record.record_id(),
            error = %e,
            "Failed to encode record"
          );
          continue;
        }
      };

      match self
        .store
        .put_record(db, store_name, TransactionMode::ReadWrite, &value)
      {
        Ok(_) => written += 1,
        Err(e) => {
          warn!(
            store = store_name,
            id = %record.record_id(),
            error = %e,
            "Failed to store record"
          );
        }
      }
    }

    info!(
      store = store_name,
      written,
      total = records.len(),
      "Wrote fetched records to local store"
    );
  }
}

impl<S: KeyValueStore> Clone for SyncHelper<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      db_name: self.db_name.clone(),
      db_version: self.db_version,
      latches: Arc::clone(&self.latches),
    }
  }
}
