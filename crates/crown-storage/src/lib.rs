//! Client-side persistence for the crown session.
//!
//! This crate provides:
//! - A [`KeyValueStore`] abstraction with file-backed and in-memory backends
//! - [`TokenCodec`] for JWT shape and expiry checks (no signature verification)
//! - [`TokenStore`], which only ever hands out usable tokens and purges
//!   everything auth-related on demand

mod codec;
mod file;
mod identity;
mod keys;
mod memory;
mod token_store;
mod traits;

pub use codec::{Claims, TokenCodec, TokenError};
pub use file::FileStorage;
pub use identity::UserIdentity;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use token_store::{TokenDiagnostics, TokenStore};
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure (e.g. storage unavailable)
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
