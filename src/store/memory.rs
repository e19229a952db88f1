use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::FlagStore;
use crate::error::Result;
use crate::flag::FlagRecord;

/// In-memory flag storage backed by a `RwLock<HashMap>`.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, FlagRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl FlagStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<FlagRecord>> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn get_all(&self) -> Result<Vec<FlagRecord>> {
        let data = self.data.read().await;
        let mut records: Vec<FlagRecord> = data.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn upsert(&self, record: FlagRecord) -> Result<FlagRecord> {
        let mut data = self.data.write().await;
        data.insert(record.key.clone(), record.clone());
        Ok(record)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }
}
