//! The DNA document: a declarative, hash-addressable application definition.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use plasm_core::{Hash, HashSpec};

use crate::error::DnaError;
use crate::schema::SchemaValidator;

/// Current DNA document version.
pub const DNA_VERSION: i32 = 3;

/// How an entry type's content is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFormat {
    /// Plain text.
    String,
    /// JSON text, eligible for schema validation.
    Json,
    /// The raw form of the named script evaluator.
    Raw(String),
}

impl DataFormat {
    pub fn as_string(&self) -> String {
        match self {
            DataFormat::String => "string".to_string(),
            DataFormat::Json => "json".to_string(),
            DataFormat::Raw(evaluator) => format!("raw-{evaluator}"),
        }
    }

    pub fn parse(s: &str) -> Result<Self, DnaError> {
        match s {
            "string" => Ok(DataFormat::String),
            "json" => Ok(DataFormat::Json),
            _ => match s.strip_prefix("raw-") {
                Some(evaluator) if !evaluator.is_empty() => {
                    Ok(DataFormat::Raw(evaluator.to_string()))
                }
                _ => Err(DnaError::Decode(format!("unknown data format: {s}"))),
            },
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl Serialize for DataFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for DataFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DataFormat::parse(&s).map_err(D::Error::custom)
    }
}

/// One typed entry definition within a zome.
///
/// The compiled validator is populated at instance preparation and is not
/// part of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntryDef {
    pub name: String,
    pub data_format: DataFormat,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub schema_hash: Hash,
    #[serde(skip)]
    pub validator: Option<Arc<SchemaValidator>>,
}

impl EntryDef {
    pub fn new(name: impl Into<String>, data_format: DataFormat) -> Self {
        Self {
            name: name.into(),
            data_format,
            schema: String::new(),
            schema_hash: Hash::null(),
            validator: None,
        }
    }

    /// Attach a schema file reference.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}

impl PartialEq for EntryDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.data_format == other.data_format
            && self.schema == other.schema
            && self.schema_hash == other.schema_hash
    }
}

/// A module of logically related code and entry definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Zome {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// File name of the zome code in the instance directory.
    pub code: String,
    #[serde(default)]
    pub code_hash: Hash,
    pub nucleus_type: String,
    #[serde(default)]
    pub entries: BTreeMap<String, EntryDef>,
}

impl Zome {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        nucleus_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            code: code.into(),
            code_hash: Hash::null(),
            nucleus_type: nucleus_type.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, def: EntryDef) -> Self {
        self.entries.insert(def.name.clone(), def);
        self
    }
}

/// The application definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dna {
    pub version: i32,
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub properties_schema: String,
    pub hash_type: String,
    #[serde(default)]
    pub based_on: Hash,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub zomes: BTreeMap<String, Zome>,
}

impl Dna {
    /// A fresh definition with a random id and default hash type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: DNA_VERSION,
            id: Uuid::new_v4(),
            name: name.into(),
            properties_schema: String::new(),
            hash_type: "sha2-256".to_string(),
            based_on: Hash::null(),
            properties: BTreeMap::new(),
            zomes: BTreeMap::new(),
        }
    }

    pub fn with_zome(mut self, zome: Zome) -> Self {
        self.zomes.insert(zome.name.clone(), zome);
        self
    }

    /// Format-independent canonical bytes, the content of the first chain
    /// entry. Maps are ordered, so the encoding is deterministic.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, DnaError> {
        serde_json::to_vec(self).map_err(|e| DnaError::Encode(e.to_string()))
    }

    /// Find the zome defining an entry type.
    pub fn entry_def(&self, entry_type: &str) -> Option<(&Zome, &EntryDef)> {
        self.zomes.values().find_map(|zome| {
            zome.entries
                .get(entry_type)
                .map(|def| (zome, def))
        })
    }

    /// Fill the code and schema hashes from the files in `dir`.
    ///
    /// A developer tool for finalizing a definition; not used at runtime.
    pub fn generate_hashes(&mut self, spec: &HashSpec, dir: &Path) -> Result<(), DnaError> {
        for zome in self.zomes.values_mut() {
            let code = std::fs::read(dir.join(&zome.code))?;
            zome.code_hash = Hash::sum(spec, &code)?;
            for def in zome.entries.values_mut() {
                if !def.schema.is_empty() {
                    let schema = std::fs::read(dir.join(&def.schema))?;
                    def.schema_hash = Hash::sum(spec, &schema)?;
                }
            }
        }
        Ok(())
    }
}
