//! Interchange formats for DNA and Config documents.
//!
//! A document may be authored in JSON, YAML, or TOML; the format is chosen
//! by file extension. Decoding then re-encoding in any format round-trips.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DnaError;

/// A supported document interchange format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// All formats, in discovery order.
    pub const ALL: [Format; 3] = [Format::Json, Format::Yaml, Format::Toml];

    /// The file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
        }
    }

    /// Resolve an extension to a format.
    pub fn from_extension(ext: &str) -> Result<Self, DnaError> {
        match ext {
            "json" => Ok(Format::Json),
            "yaml" => Ok(Format::Yaml),
            "toml" => Ok(Format::Toml),
            other => Err(DnaError::UnknownFormat(other.to_string())),
        }
    }
}

/// Decode a document from text.
pub fn decode<T: DeserializeOwned>(text: &str, format: Format) -> Result<T, DnaError> {
    match format {
        Format::Json => serde_json::from_str(text).map_err(|e| DnaError::Decode(e.to_string())),
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| DnaError::Decode(e.to_string())),
        Format::Toml => toml::from_str(text).map_err(|e| DnaError::Decode(e.to_string())),
    }
}

/// Encode a document to text.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<String, DnaError> {
    match format {
        Format::Json => {
            serde_json::to_string_pretty(value).map_err(|e| DnaError::Encode(e.to_string()))
        }
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| DnaError::Encode(e.to_string())),
        Format::Toml => toml::to_string(value).map_err(|e| DnaError::Encode(e.to_string())),
    }
}

/// Find `<stem>.{json|yaml|toml}` in a directory.
pub fn find_document(dir: &Path, stem: &str) -> Result<(PathBuf, Format), DnaError> {
    for format in Format::ALL {
        let candidate = dir.join(format!("{}.{}", stem, format.extension()));
        if candidate.exists() {
            return Ok((candidate, format));
        }
    }
    Err(DnaError::NotFound(dir.join(stem)))
}
