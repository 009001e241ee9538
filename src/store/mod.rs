//! Versioned local record store.
//!
//! Databases are opened by name and version and hold any number of named
//! stores. Records are opaque JSON values kept under an auto-incrementing
//! key, returned in insertion order.

mod sqlite;

pub use sqlite::SqliteStore;

use serde_json::Value;

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Handle to an opened database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
  pub name: String,
  pub version: u32,
}

/// Access mode for a unit of work against a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
  ReadOnly,
  ReadWrite,
}

/// Trait for local record store backends.
pub trait KeyValueStore: Send + Sync {
  /// Open (creating on first use) database `name` at `version` and make sure
  /// `store_name` exists in it. A version newer than the stored one drops
  /// every existing store.
  fn open(&self, name: &str, version: u32, store_name: &str) -> StoreResult<Database>;

  /// Insert a record under a fresh key and return that key.
  fn put_record(
    &self,
    db: &Database,
    store_name: &str,
    mode: TransactionMode,
    record: &Value,
  ) -> StoreResult<i64>;

  /// All records in the store, in key order.
  fn get_all(&self, db: &Database, store_name: &str) -> StoreResult<Vec<Value>>;

  /// Remove every record from the store, keeping the store itself.
  fn clear(&self, db: &Database, store_name: &str) -> StoreResult<()>;

  fn count(&self, db: &Database, store_name: &str) -> StoreResult<usize> {
    Ok(self.get_all(db, store_name)?.len())
  }
}
