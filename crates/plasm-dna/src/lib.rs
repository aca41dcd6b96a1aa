//! # Plasm DNA
//!
//! The declarative application definition: a DNA document enumerates the
//! zomes (code modules) of an application, each carrying typed entry
//! definitions with optional JSON schemas and a nucleus type naming the
//! script evaluator that runs its code.
//!
//! DNA and Config documents are interchangeable between JSON, YAML, and
//! TOML; the canonical byte form used for hashing is format-independent.

mod config;
mod dna;
mod error;
mod format;
mod schema;

pub use config::{Config, LoggerConfig, Loggers, DEFAULT_PORT};
pub use dna::{DataFormat, Dna, EntryDef, Zome, DNA_VERSION};
pub use error::DnaError;
pub use format::{decode, encode, find_document, Format};
pub use schema::SchemaValidator;
