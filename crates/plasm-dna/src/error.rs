//! Error types for DNA documents and schemas.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, decoding, or validating application definitions.
#[derive(Debug, Error)]
pub enum DnaError {
    /// No document with a recognized extension was found.
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    #[error("unknown document format: {0}")]
    UnknownFormat(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    /// A JSON schema failed to compile.
    #[error("schema compile error: {0}")]
    SchemaCompile(String),

    #[error(transparent)]
    Core(#[from] plasm_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
