//! Error types for plasm core primitives.

use thiserror::Error;

/// Errors from hashing, signing, and canonical encoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown hash type: {0}")]
    UnknownHashType(String),

    #[error("invalid multihash: {0}")]
    InvalidMultihash(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("invalid key file: {0}")]
    InvalidKeyFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
