//! SQLite implementation of the record store.

use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{Database, KeyValueStore, StoreResult, TransactionMode};
use crate::error::StoreError;

/// Schema shared by every database file.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS object_stores (
    name TEXT PRIMARY KEY
);

-- One row per record; key order is insertion order
CREATE TABLE IF NOT EXISTS records (
    key INTEGER PRIMARY KEY AUTOINCREMENT,
    store_name TEXT NOT NULL,
    data BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_store ON records(store_name, key);
"#;

/// SQLite-backed store. Each database name maps to its own file under
/// `root`, or to a private in-memory database when no root is set.
pub struct SqliteStore {
  root: Option<PathBuf>,
  conns: Mutex<HashMap<String, Connection>>,
}

impl SqliteStore {
  /// Store whose databases live as `<name>.db` files inside `root`.
  pub fn open_at(root: impl AsRef<Path>) -> StoreResult<Self> {
    let root = root.as_ref().to_path_buf();
    std::fs::create_dir_all(&root)?;

    Ok(Self {
      root: Some(root),
      conns: Mutex::new(HashMap::new()),
    })
  }

  /// Store whose databases vanish when it is dropped.
  #[allow(dead_code)]
  pub fn open_in_memory() -> Self {
    Self {
      root: None,
      conns: Mutex::new(HashMap::new()),
    }
  }

  fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Connection>>> {
    self
      .conns
      .lock()
      .map_err(|e| StoreError::Poisoned(e.to_string()))
  }

  fn connect(&self, name: &str) -> StoreResult<Connection> {
    let conn = match &self.root {
      Some(root) => {
        let path = root.join(format!("{}.db", name));
        debug!(path = %path.display(), "Opening database file");
        Connection::open(path)?
      }
      None => Connection::open_in_memory()?,
    };
    conn.execute_batch(STORE_SCHEMA)?;
    Ok(conn)
  }

  /// Bring the database to `version`, dropping all stores on upgrade.
  fn upgrade(conn: &Connection, name: &str, version: u32) -> StoreResult<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < current {
      return Err(StoreError::VersionDowngrade {
        name: name.to_string(),
        requested: version,
        current,
      });
    }

    if version > current {
      let tx = conn.unchecked_transaction()?;
      let dropped = tx.execute("DELETE FROM records", [])?;
      tx.execute("DELETE FROM object_stores", [])?;
      tx.pragma_update(None, "user_version", version)?;
      tx.commit()?;

      if current > 0 {
        info!(
          database = name,
          from = current,
          to = version,
          dropped,
          "Database upgraded, existing stores dropped"
        );
      }
    }

    Ok(())
  }
}

/// Fetch the connection for an already opened database.
fn conn_for<'a>(conns: &'a HashMap<String, Connection>, name: &str) -> StoreResult<&'a Connection> {
  conns
    .get(name)
    .ok_or_else(|| StoreError::NotOpen(name.to_string()))
}

impl KeyValueStore for SqliteStore {
  fn open(&self, name: &str, version: u32, store_name: &str) -> StoreResult<Database> {
    let mut conns = self.lock()?;

    if !conns.contains_key(name) {
      let conn = self.connect(name)?;
      conns.insert(name.to_string(), conn);
    }
    let conn = conn_for(&conns, name)?;

    Self::upgrade(conn, name, version)?;
    conn.execute(
      "INSERT OR IGNORE INTO object_stores (name) VALUES (?)",
      params![store_name],
    )?;

    Ok(Database {
      name: name.to_string(),
      version,
    })
  }

  fn put_record(
    &self,
    db: &Database,
    store_name: &str,
    mode: TransactionMode,
    record: &Value,
  ) -> StoreResult<i64> {
    if mode == TransactionMode::ReadOnly {
      return Err(StoreError::ReadOnly(store_name.to_string()));
    }

    let conns = self.lock()?;
    let conn = conn_for(&conns, &db.name)?;
    let data = serde_json::to_vec(record)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
      "INSERT OR IGNORE INTO object_stores (name) VALUES (?)",
      params![store_name],
    )?;
    tx.execute(
      "INSERT INTO records (store_name, data) VALUES (?, ?)",
      params![store_name, data],
    )?;
    let key = tx.last_insert_rowid();
    tx.commit()?;

    debug!(store = store_name, key, "Record stored");
    Ok(key)
  }

  fn get_all(&self, db: &Database, store_name: &str) -> StoreResult<Vec<Value>> {
    let conns = self.lock()?;
    let conn = conn_for(&conns, &db.name)?;

    let mut stmt = conn.prepare("SELECT data FROM records WHERE store_name = ? ORDER BY key")?;
    let rows = stmt.query_map(params![store_name], |row| row.get::<_, Vec<u8>>(0))?;

    let mut records = Vec::new();
    for data in rows {
      records.push(serde_json::from_slice(&data?)?);
    }

    debug!(store = store_name, count = records.len(), "Read all records");
    Ok(records)
  }

  fn clear(&self, db: &Database, store_name: &str) -> StoreResult<()> {
    let conns = self.lock()?;
    let conn = conn_for(&conns, &db.name)?;
    let removed = conn.execute(
      "DELETE FROM records WHERE store_name = ?",
      params![store_name],
    )?;
    info!(store = store_name, removed, "Store cleared");
    Ok(())
  }

  fn count(&self, db: &Database, store_name: &str) -> StoreResult<usize> {
    let conns = self.lock()?;
    let conn = conn_for(&conns, &db.name)?;
    let count: i64 = conn.query_row(
      "SELECT COUNT(*) FROM records WHERE store_name = ?",
      params![store_name],
      |row| row.get(0),
    )?;
    Ok(count as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_get_all_returns_insertion_order() {
    let store = SqliteStore::open_in_memory();
    let db = store.open("restaurants-data", 1, "restaurants").unwrap();

    for id in [3, 1, 2] {
      store
        .put_record(&db, "restaurants", TransactionMode::ReadWrite, &json!({ "id": id }))
        .unwrap();
    }

    let ids: Vec<i64> = store
      .get_all(&db, "restaurants")
      .unwrap()
      .iter()
      .map(|r| r["id"].as_i64().unwrap())
      .collect();
    assert_eq!(ids, vec![3, 1, 2]);
  }

  #[test]
  fn test_keys_auto_increment() {
    let store = SqliteStore::open_in_memory();
    let db = store.open("restaurants-data", 1, "restaurants").unwrap();
    let first = store
      .put_record(&db, "restaurants", TransactionMode::ReadWrite, &json!({}))
      .unwrap();
    let second = store
      .put_record(&db, "restaurants", TransactionMode::ReadWrite, &json!({}))
      .unwrap();
    assert!(second > first);
  }

  #[test]
  fn test_stores_are_isolated() {
    let store = SqliteStore::open_in_memory();
    let db = store.open("restaurants-data", 1, "restaurants").unwrap();
    store.open("restaurants-data", 1, "reviews").unwrap();

    store
      .put_record(&db, "reviews", TransactionMode::ReadWrite, &json!({ "id": 1 }))
      .unwrap();

    assert!(store.get_all(&db, "restaurants").unwrap().is_empty());
    assert_eq!(store.count(&db, "reviews").unwrap(), 1);
  }

  #[test]
  fn test_read_only_mode_rejects_writes() {
    let store = SqliteStore::open_in_memory();
    let db = store.open("restaurants-data", 1, "restaurants").unwrap();
    let err = store
      .put_record(&db, "restaurants", TransactionMode::ReadOnly, &json!({}))
      .unwrap_err();
    assert!(matches!(err, StoreError::ReadOnly(_)));
  }

  #[test]
  fn test_version_bump_drops_existing_records() {
    let store = SqliteStore::open_in_memory();
    let db = store.open("restaurants-data", 1, "restaurants").unwrap();
    store
      .put_record(&db, "restaurants", TransactionMode::ReadWrite, &json!({ "id": 1 }))
      .unwrap();

    let db = store.open("restaurants-data", 2, "restaurants").unwrap();
    assert_eq!(db.version, 2);
    assert!(store.get_all(&db, "restaurants").unwrap().is_empty());
  }

  #[test]
  fn test_version_downgrade_is_rejected() {
    let store = SqliteStore::open_in_memory();
    store.open("restaurants-data", 2, "restaurants").unwrap();
    let err = store.open("restaurants-data", 1, "restaurants").unwrap_err();
    assert!(matches!(
      err,
      StoreError::VersionDowngrade {
        requested: 1,
        current: 2,
        ..
      }
    ));
  }

  #[test]
  fn test_clear_keeps_store_usable() {
    let store = SqliteStore::open_in_memory();
    let db = store.open("restaurants-data", 1, "restaurants").unwrap();
    store
      .put_record(&db, "restaurants", TransactionMode::ReadWrite, &json!({ "id": 1 }))
      .unwrap();
    store.clear(&db, "restaurants").unwrap();
    assert_eq!(store.count(&db, "restaurants").unwrap(), 0);

    store
      .put_record(&db, "restaurants", TransactionMode::ReadWrite, &json!({ "id": 2 }))
      .unwrap();
    assert_eq!(store.count(&db, "restaurants").unwrap(), 1);
  }

  #[test]
  fn test_file_backed_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
      let store = SqliteStore::open_at(dir.path()).unwrap();
      let db = store.open("restaurants-data", 1, "restaurants").unwrap();
      store
        .put_record(&db, "restaurants", TransactionMode::ReadWrite, &json!({ "id": 7 }))
        .unwrap();
    }

    let store = SqliteStore::open_at(dir.path()).unwrap();
    let db = store.open("restaurants-data", 1, "restaurants").unwrap();
    assert_eq!(store.get_all(&db, "restaurants").unwrap(), vec![json!({ "id": 7 })]);
    assert!(dir.path().join("restaurants-data.db").exists());
  }
}
