//! Error types for the instance engine.

use std::path::PathBuf;

use thiserror::Error;

use plasm_chain::ChainError;
use plasm_core::CoreError;
use plasm_dna::DnaError;

/// Errors surfaced at the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Dna(#[from] DnaError),

    #[error("unknown zome: {0}")]
    UnknownZome(String),

    #[error("unknown nucleus type: {0}")]
    UnknownNucleusType(String),

    #[error("no definition for entry type: {0}")]
    UnknownEntryType(String),

    /// A file the DNA references is absent during preparation.
    #[error("missing file: {0}")]
    MissingFile(PathBuf),

    /// Genesis attempted on a chain that already has its genesis entries.
    #[error("chain already started")]
    AlreadyStarted,

    /// A validator rejected the entry.
    #[error("Invalid entry: {content}")]
    InvalidEntry {
        entry_type: String,
        content: String,
    },

    /// A JSON schema rejected the entry, with the schema's diagnostic.
    #[error("schema validation failed: {0}")]
    SchemaInvalid(String),

    /// A zome's genesis callback returned false.
    #[error("genesis failed in '{0}' zome")]
    GenesisFailed(String),

    /// Compilation or runtime failure inside a nucleus.
    #[error("in '{zome}' zome: {message}")]
    Nucleus { zome: String, message: String },

    /// The nucleus demands a newer system version.
    #[error("version {required} or greater required")]
    VersionRequirement { required: i32 },

    /// The sidecar hash does not match the committed DNA entry.
    #[error("DNA hash mismatch: recorded {recorded}, computed {computed}")]
    DnaHashMismatch { recorded: String, computed: String },

    /// A nucleus was asked for a function it does not expose.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Raw failure raised inside a script evaluator; callers add zome
    /// context when wrapping.
    #[error("{0}")]
    Script(String),

    /// One harness case failed.
    #[error("test failed: {0}")]
    TestFailed(String),

    #[error("persistence failure: {0}")]
    Io(#[from] std::io::Error),
}
