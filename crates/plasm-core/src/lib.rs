//! # Plasm Core
//!
//! Pure primitives for the plasm substrate: hashes, entries, headers, and
//! agent identity.
//!
//! This crate contains no chain I/O, no networking, no script evaluation.
//! It is pure computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Hash`] / [`HashSpec`] - Multihash-parameterized content digests
//! - [`Entry`] - A typed value destined for a chain
//! - [`Header`] - The signed metadata linking one entry into a chain
//! - [`Agent`] - The keypair-bearing identity that owns a chain
//!
//! ## Canonicalization
//!
//! Entries and headers are encoded using deterministic CBOR so that the
//! same value produces identical bytes (and thus identical hashes) on
//! every platform. See [`canonical`].

pub mod agent;
pub mod canonical;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod hash;
pub mod header;

pub use agent::{Agent, AgentEntry, KeyType, NodeId};
pub use crypto::{Keypair, PublicKey, Signature};
pub use entry::Entry;
pub use error::CoreError;
pub use hash::{hash_type_code, Hash, HashSpec, NATURAL_LENGTH};
pub use header::Header;
