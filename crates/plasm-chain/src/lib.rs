//! # Plasm Chain
//!
//! The append-only, hash-linked log of `(header, entry)` pairs owned by a
//! single agent, persisted to a flat file.
//!
//! ## Invariants
//!
//! For every valid chain:
//! - the first header's previous-header link is the null hash, and every
//!   later header links the hash of its predecessor;
//! - every header's same-type link points at the most recent earlier header
//!   of its type (null if none);
//! - every header's entry link is the hash of its entry's canonical bytes;
//! - every header's signature verifies against the owning agent's key.
//!
//! A commit is atomic: either both header and entry land on disk and in
//! memory, or neither does.

mod chain;
mod error;
mod file;

pub use chain::{Chain, ValidateOptions};
pub use error::ChainError;
pub use file::ChainFile;
