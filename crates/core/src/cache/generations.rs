//! Generation bookkeeping.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Create a generation if it doesn't exist yet.
    pub async fn create_generation(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All generation names, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation; its entries go with it.
    ///
    /// Returns false if no such generation existed.
    pub async fn drop_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.create_generation("pjhq-cache-v3").await.unwrap();
        db.create_generation("pjhq-cache-v3").await.unwrap();
        assert_eq!(db.list_generations().await.unwrap(), vec!["pjhq-cache-v3"]);
    }

    #[tokio::test]
    async fn test_drop_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.create_generation("pjhq-cache-v2").await.unwrap();
        db.create_generation("pjhq-cache-v3").await.unwrap();

        assert!(db.drop_generation("pjhq-cache-v2").await.unwrap());
        assert!(!db.drop_generation("pjhq-cache-v2").await.unwrap());
        assert_eq!(db.list_generations().await.unwrap(), vec!["pjhq-cache-v3"]);
    }
}
