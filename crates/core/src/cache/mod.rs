//! Cache storage: named generations of request/response entries.
//!
//! The controller depends only on the [`CacheStorage`] trait. The shipped
//! implementation is [`CacheDb`], a SQLite database accessed through
//! tokio-rusqlite:
//!
//! - One row per generation, entries cascade-deleted with it
//! - Upsert on (generation, key): concurrent writers are last-write-wins
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod digest;
pub mod entries;
pub mod generations;
pub mod migrations;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;

/// Storage for cache generations.
///
/// Writing into a generation that does not exist yet creates it.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if missing.
    async fn open_generation(&self, name: &str) -> Result<(), Error>;

    /// Names of every stored generation.
    async fn generations(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation and all its entries. Returns whether it existed.
    async fn delete_generation(&self, name: &str) -> Result<bool, Error>;

    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error>;

    async fn get(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error>;

    async fn contains(&self, generation: &str, key: &str) -> Result<bool, Error>;

    /// Keys of a generation in first-write order.
    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_generation(&self, name: &str) -> Result<(), Error> {
        self.create_generation(name).await
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.list_generations().await
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        self.drop_generation(name).await
    }

    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        self.upsert_entry(generation, entry).await
    }

    async fn get(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        self.get_entry(generation, key).await
    }

    async fn contains(&self, generation: &str, key: &str) -> Result<bool, Error> {
        self.has_entry(generation, key).await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        self.entry_keys(generation).await
    }
}
