//! Error types for the chain store.

use thiserror::Error;

use plasm_core::CoreError;

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Disk write or open failure. The in-memory chain is unchanged.
    #[error("persistence failure: {0}")]
    Persistence(#[from] std::io::Error),

    /// Replay hit a record that could not be parsed.
    #[error("chain corrupt at offset {offset}")]
    Corrupt { offset: u64 },

    /// Hashing or codec failure from the core primitives.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A header's previous-header link does not match its predecessor.
    #[error("header link mismatch at index {index}")]
    HeaderLinkMismatch { index: usize },

    /// A header's same-type link does not match the prior header of its type.
    #[error("type link mismatch at index {index}")]
    TypeLinkMismatch { index: usize },

    /// A header's entry link does not match the entry's hash.
    #[error("entry link mismatch at index {index}")]
    EntryLinkMismatch { index: usize },

    /// A header's signature failed verification.
    #[error("invalid signature at index {index}")]
    SignatureInvalid { index: usize },

    /// A walk visitor asked to stop with an error.
    #[error("walk aborted: {0}")]
    WalkAborted(String),
}
