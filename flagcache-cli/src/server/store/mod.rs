pub mod sled_store;

use std::sync::Arc;

use flagcache_lib::store::{FlagStore, MemoryStore};

use self::sled_store::SledStore;
use super::config::{StorageBackend, StorageConfig};

/// Open the configured flag store.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn FlagStore>, String> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory flag storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sled => {
            tracing::info!(data_dir = %config.data_dir, "using sled flag storage");
            Ok(Arc::new(SledStore::open(&config.data_dir)?))
        }
    }
}
