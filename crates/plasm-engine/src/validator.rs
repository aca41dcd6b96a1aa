//! The two-stage validation pipeline run before every commit.
//!
//! Stage one applies the entry definition's compiled JSON schema (only for
//! the `json` data format; a schema reference on other formats is metadata
//! only). Stage two always runs the zome's own validation callback.

use serde_json::Value;

use plasm_core::Entry;
use plasm_dna::DataFormat;

use crate::error::EngineError;
use crate::instance::InstanceCore;

/// Opaque context passed through to the nucleus validation callback
/// (reserved for source peer information and the like).
#[derive(Debug, Clone, Default)]
pub struct ValidationProps {
    pub source: Option<String>,
}

/// Run both validation stages for a prospective commit.
///
/// The chain is untouched: a failure here means no header is ever written.
pub(crate) fn validate_commit(
    core: &InstanceCore,
    entry_type: &str,
    entry: &Entry,
    props: &ValidationProps,
) -> Result<(), EngineError> {
    let (zome, def) = {
        let dna = core.dna.read().unwrap();
        match dna.entry_def(entry_type) {
            Some((zome, def)) => (zome.clone(), def.clone()),
            None => return Err(EngineError::UnknownEntryType(entry_type.to_string())),
        }
    };

    if def.data_format == DataFormat::Json {
        if let Some(validator) = &def.validator {
            let content = entry.content_string();
            let value: Value = serde_json::from_str(&content)
                .map_err(|e| EngineError::SchemaInvalid(e.to_string()))?;
            validator
                .validate(&value)
                .map_err(EngineError::SchemaInvalid)?;
        }
    }

    let nucleus = core.make_nucleus(&zome)?;
    match nucleus.validate_entry(&def, entry, props) {
        Ok(true) => Ok(()),
        Ok(false) => Err(EngineError::InvalidEntry {
            entry_type: entry_type.to_string(),
            content: entry.content_string(),
        }),
        Err(e) => Err(EngineError::Nucleus {
            zome: zome.name.clone(),
            message: e.to_string(),
        }),
    }
}
