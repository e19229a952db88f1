use thiserror::Error;

/// Result type alias for flag store, cache and service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The flag key was empty or whitespace only.
    #[error("flag key must not be blank")]
    BlankKey,

    /// The durable flag store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The evaluation cache backend failed.
    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    /// True for infrastructure faults (store or cache), false for caller errors.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Cache(_))
    }
}
