//! Compiled JSON-schema validators for entry definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::DnaError;

/// A compiled JSON schema, built once at instance preparation.
pub struct SchemaValidator {
    schema: JSONSchema,
    source: String,
}

impl SchemaValidator {
    /// Compile a schema from a JSON value.
    pub fn from_value(value: &Value, source: &str) -> Result<Self, DnaError> {
        let schema = JSONSchema::compile(value)
            .map_err(|e| DnaError::SchemaCompile(format!("{}: {}", source, e)))?;
        Ok(Self {
            schema,
            source: source.to_string(),
        })
    }

    /// Compile a schema document from disk.
    pub fn from_file(path: &Path) -> Result<Self, DnaError> {
        let text = fs::read_to_string(path)?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| DnaError::SchemaCompile(e.to_string()))?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_value(&value, &source)
    }

    /// The file the schema came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Validate an instance, returning the schema's diagnostic on failure.
    pub fn validate(&self, instance: &Value) -> Result<(), String> {
        let result = self.schema.validate(instance);
        match result {
            Ok(()) => Ok(()),
            Err(errors) => {
                let diagnostics: Vec<String> = errors.map(|e| e.to_string()).collect();
                Err(diagnostics.join("; "))
            }
        }
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaValidator({})", self.source)
    }
}
