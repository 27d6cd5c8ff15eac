//! SQLite-backed key/value data provider
//!
//! The mobile app keeps its data in a flat key/value store; the purchase list
//! lives under a single key as a JSON array. This provider mirrors that layout
//! on top of SQLite so the same documents can be served from a desktop build.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::models::PurchaseRecord;

use super::{DataProvider, ProviderError};

/// Key under which the purchase list is stored
pub const RECORDS_KEY: &str = "purchases";

/// Key/value store over a single SQLite table
///
/// Uses a `Mutex` around the connection; every access runs on the blocking
/// thread pool.
#[derive(Clone)]
pub struct SqliteProvider {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProvider {
    /// Open (or create) a store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ProviderError::Read(format!("{}: {e}", parent.display())))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let provider = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "SQLite store opened");
        Ok(provider)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, ProviderError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ProviderError> {
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, ProviderError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ProviderError::Read("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| ProviderError::Read(format!("storage task failed: {e}")))?
    }

    /// Read the raw value stored under `key`
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, ProviderError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    /// Store a raw value under `key`, replacing any previous value
    pub async fn put_value(&self, key: &str, value: String) -> Result<(), ProviderError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// Replace the stored purchase list
    pub async fn store_records(&self, records: &[PurchaseRecord]) -> Result<(), ProviderError> {
        let document = serde_json::to_string(records)?;
        self.put_value(RECORDS_KEY, document).await
    }
}

/// Decode the stored purchase document one element at a time so a bad entry
/// is reported with its id instead of failing the whole parse opaquely.
fn decode_records(document: &str) -> Result<Vec<PurchaseRecord>, ProviderError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(document)?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let id = entry
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{index}"));

            serde_json::from_value::<PurchaseRecord>(entry).map_err(|e| ProviderError::Malformed {
                id,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl DataProvider for SqliteProvider {
    async fn list_records(&self) -> Result<Vec<PurchaseRecord>, ProviderError> {
        match self.get_value(RECORDS_KEY).await? {
            Some(document) => decode_records(&document),
            None => Ok(Vec::new()),
        }
    }
}
