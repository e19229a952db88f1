use async_trait::async_trait;
use flagcache_lib::store::FlagStore;
use flagcache_lib::{Error, FlagRecord, Result};

/// Persistent flag storage backed by sled. Records are stored as JSON under
/// `flags:<key>`.
pub struct SledStore {
    db: sled::Db,
}

const PREFIX: &str = "flags:";

fn store_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Store(format!("{}: {}", context, e))
}

impl SledStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Open a sled database at the given directory path.
    pub fn open(data_dir: &str) -> std::result::Result<Self, String> {
        let db = sled::open(data_dir).map_err(|e| format!("failed to open sled db: {}", e))?;
        Ok(Self::new(db))
    }

    fn flag_key(key: &str) -> String {
        format!("{}{}", PREFIX, key)
    }

    fn decode(bytes: &[u8]) -> Result<FlagRecord> {
        serde_json::from_slice(bytes).map_err(|e| store_err("failed to decode flag", e))
    }
}

#[async_trait]
impl FlagStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<FlagRecord>> {
        match self
            .db
            .get(Self::flag_key(key))
            .map_err(|e| store_err("failed to read flag", e))?
        {
            Some(ivec) => Ok(Some(Self::decode(&ivec)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<FlagRecord>> {
        // sled iterates in key order, so the result is sorted by flag key.
        self.db
            .scan_prefix(PREFIX)
            .map(|item| {
                let (_, value) = item.map_err(|e| store_err("failed to scan flags", e))?;
                Self::decode(&value)
            })
            .collect()
    }

    async fn upsert(&self, record: FlagRecord) -> Result<FlagRecord> {
        let bytes =
            serde_json::to_vec(&record).map_err(|e| store_err("failed to encode flag", e))?;

        self.db
            .insert(Self::flag_key(&record.key), bytes)
            .map_err(|e| store_err("failed to store flag", e))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| store_err("failed to flush", e))?;

        Ok(record)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.db
            .contains_key(Self::flag_key(key))
            .map_err(|e| store_err("failed to read flag", e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.db
            .remove(Self::flag_key(key))
            .map_err(|e| store_err("failed to delete flag", e))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| store_err("failed to flush", e))?;

        Ok(())
    }
}
