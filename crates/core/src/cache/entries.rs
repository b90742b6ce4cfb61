//! Entry CRUD operations.
//!
//! An entry is an immutable snapshot of a 200 response captured at write
//! time, keyed by canonical URL inside one generation.

use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::digest::body_digest;
use crate::Error;
use crate::network::Response;

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Canonical request URL.
    pub key: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// SHA-256 of `body` at write time.
    pub digest: String,
    pub stored_at: String,
}

impl CacheEntry {
    /// Snapshot a response under `key`.
    pub fn from_response(key: impl Into<String>, response: &Response) -> Self {
        Self {
            key: key.into(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
            digest: body_digest(&response.body),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild the response served for a cache hit.
    pub fn to_response(&self) -> Response {
        Response {
            url: self.key.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// Whether the body still matches the digest recorded at write time.
    pub fn verify(&self) -> bool {
        body_digest(&self.body) == self.digest
    }
}

impl CacheDb {
    /// Insert or replace an entry.
    ///
    /// Creates the generation if needed. Uses UPSERT semantics so the first
    /// write fixes the key's position in `entry_keys` order.
    pub async fn upsert_entry(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        let generation = generation.to_string();
        let entry = entry.clone();
        let headers_json = serde_json::to_string(&entry.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![generation, now],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    generation, key, status, status_text, headers_json, body, digest, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(generation, key) DO UPDATE SET
                    status = excluded.status,
                    status_text = excluded.status_text,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    digest = excluded.digest,
                    stored_at = excluded.stored_at",
                    params![
                        &generation,
                        &entry.key,
                        entry.status,
                        &entry.status_text,
                        &headers_json,
                        entry.body.as_ref(),
                        &entry.digest,
                        &entry.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key.
    ///
    /// Returns None if the key or the generation doesn't exist.
    pub async fn get_entry(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, status, status_text, headers_json, body, digest, stored_at
                FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    let headers_json: String = row.get(3)?;
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        status: row.get(1)?,
                        status_text: row.get(2)?,
                        headers: serde_json::from_str(&headers_json).unwrap_or_default(),
                        body: Bytes::from(row.get::<_, Vec<u8>>(4)?),
                        digest: row.get(5)?,
                        stored_at: row.get(6)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a key has an entry.
    pub async fn has_entry(&self, generation: &str, key: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM entries WHERE generation = ?1 AND key = ?2)",
                    params![generation, key],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All keys of a generation in first-write order.
    pub async fn entry_keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE generation = ?1 ORDER BY id ASC")?;
                let keys = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
