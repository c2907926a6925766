#![deny(missing_docs)]
//! A thread-safe, generic in-memory key-value store.

pub use cache::CacheKit;
pub use error::{Error, Result};

mod cache;
mod error;
