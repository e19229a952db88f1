pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::flag::FlagRecord;

pub use memory::MemoryStore;

/// Durable storage for flag records, keyed by flag key. Implementations must
/// be thread-safe.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Fetch a single record.
    async fn get(&self, key: &str) -> Result<Option<FlagRecord>>;

    /// Fetch every record, ordered by key.
    async fn get_all(&self) -> Result<Vec<FlagRecord>>;

    /// Insert or replace a record and return what was stored.
    async fn upsert(&self, record: FlagRecord) -> Result<FlagRecord>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove a record. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
