//! Asset cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::CachedResponse;
use crate::error::StoreError;
use crate::store::StoreResult;

/// Trait for named buckets of cached responses, keyed by exact URL.
pub trait AssetCache: Send + Sync + 'static {
  /// Create the bucket if it does not exist yet.
  fn open_bucket(&self, name: &str) -> StoreResult<()>;

  /// Store (or replace) a response in a bucket.
  fn put(&self, bucket: &str, response: &CachedResponse) -> StoreResult<()>;

  /// Store every response in one transaction: all of them or none.
  fn put_all(&self, bucket: &str, responses: &[CachedResponse]) -> StoreResult<()>;

  fn lookup(&self, bucket: &str, url: &str) -> StoreResult<Option<CachedResponse>>;

  fn bucket_names(&self) -> StoreResult<Vec<String>>;

  /// Delete a bucket and its entries. Returns whether it existed.
  fn delete_bucket(&self, name: &str) -> StoreResult<bool>;
}

/// SQLite-based asset cache.
pub struct SqliteAssetCache {
  conn: Mutex<Connection>,
}

/// Schema for asset cache tables.
const ASSET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS entries (
    bucket TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    digest TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (bucket, url),
    FOREIGN KEY (bucket) REFERENCES buckets(name) ON DELETE CASCADE
);
"#;

impl SqliteAssetCache {
  /// Open the asset cache database at `path`.
  pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    Self::from_connection(Connection::open(path)?)
  }

  #[allow(dead_code)]
  pub fn open_in_memory() -> StoreResult<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> StoreResult<Self> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(ASSET_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Poisoned(e.to_string()))
  }
}

fn insert_entry(conn: &Connection, bucket: &str, response: &CachedResponse) -> StoreResult<()> {
  conn.execute(
    "INSERT OR REPLACE INTO entries (bucket, url, status, content_type, body, digest, cached_at)
     VALUES (?, ?, ?, ?, ?, ?, ?)",
    params![
      bucket,
      response.url,
      response.status,
      response.content_type,
      response.body,
      response.digest,
      response.cached_at.to_rfc3339(),
    ],
  )?;
  Ok(())
}

impl AssetCache for SqliteAssetCache {
  fn open_bucket(&self, name: &str) -> StoreResult<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR IGNORE INTO buckets (name) VALUES (?)",
      params![name],
    )?;
    Ok(())
  }

  fn put(&self, bucket: &str, response: &CachedResponse) -> StoreResult<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR IGNORE INTO buckets (name) VALUES (?)",
      params![bucket],
    )?;
    insert_entry(&conn, bucket, response)?;
    debug!(bucket, url = %response.url, bytes = response.body.len(), "Asset cached");
    Ok(())
  }

  fn put_all(&self, bucket: &str, responses: &[CachedResponse]) -> StoreResult<()> {
    let conn = self.lock()?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
      "INSERT OR IGNORE INTO buckets (name) VALUES (?)",
      params![bucket],
    )?;
    for response in responses {
      insert_entry(&tx, bucket, response)?;
    }
    tx.commit()?;
    Ok(())
  }

  fn lookup(&self, bucket: &str, url: &str) -> StoreResult<Option<CachedResponse>> {
    let conn = self.lock()?;

    let row: Option<(u16, Option<String>, Vec<u8>, String, String)> = conn
      .query_row(
        "SELECT status, content_type, body, digest, cached_at FROM entries
         WHERE bucket = ? AND url = ?",
        params![bucket, url],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()?;

    let Some((status, content_type, body, digest, cached_at)) = row else {
      return Ok(None);
    };

    let response = CachedResponse {
      url: url.to_string(),
      status,
      content_type,
      body,
      digest,
      cached_at: parse_datetime(&cached_at),
    };

    if !response.verify() {
      warn!(bucket, url, "Cached asset failed digest check, ignoring");
      return Ok(None);
    }

    Ok(Some(response))
  }

  fn bucket_names(&self) -> StoreResult<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY name")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
  }

  fn delete_bucket(&self, name: &str) -> StoreResult<bool> {
    let conn = self.lock()?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM entries WHERE bucket = ?", params![name])?;
    let deleted = tx.execute("DELETE FROM buckets WHERE name = ?", params![name])?;
    tx.commit()?;
    Ok(deleted > 0)
  }
}

/// Parse a stored RFC 3339 timestamp. Unreadable values count as "now" so a
/// bad timestamp never hides an otherwise valid entry.
fn parse_datetime(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or_else(|e| {
      warn!(value = s, error = %e, "Failed to parse cached_at");
      Utc::now()
    })
}
