//! Cached boolean feature-flag evaluation.
//!
//! The server side is [`service::FlagService`]: a read-through evaluation
//! cache in front of a durable [`store::FlagStore`], invalidated on every
//! write. The SDK side is [`client::FlagClient`] (feature `client`): a bounded
//! in-process cache in front of the HTTP evaluation endpoint that falls back
//! to a caller-supplied default when the server cannot answer.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use flagcache_lib::cache::MemoryCache;
//! use flagcache_lib::store::MemoryStore;
//! use flagcache_lib::{FlagRequest, FlagService};
//!
//! # tokio_test_runtime();
//! # fn tokio_test_runtime() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let service = FlagService::new(Arc::new(MemoryStore::new()), Arc::new(MemoryCache::new()));
//! service.create_flag(&FlagRequest::new("new-checkout", true)).await.unwrap();
//!
//! assert!(service.is_enabled("new-checkout", None).await.unwrap());
//! assert!(!service.is_enabled("no-such-flag", None).await.unwrap());
//! # });
//! # }
//! ```

pub mod cache;
#[cfg(feature = "client")]
pub mod client;
pub mod error;
pub mod flag;
pub mod service;
pub mod store;

pub use cache::{EvaluationCache, MemoryCache};
pub use error::{Error, Result};
pub use flag::{FlagRecord, FlagRequest};
pub use service::{EvalSource, Evaluation, FlagService};
pub use store::{FlagStore, MemoryStore};
