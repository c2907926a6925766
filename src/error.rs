use thiserror::Error;

/// Error type for cachekit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Update was called for a key that is not in the cache.
    #[error("key does not exist")]
    KeyNotFound,
}

/// Result type for cachekit.
pub type Result<T> = std::result::Result<T, Error>;
