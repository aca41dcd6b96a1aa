//! Instance-directory fixtures.
//!
//! [`InstanceBuilder`] lays out everything an instance needs into a temp
//! directory: DNA and config documents, agent files, zome code, schemas,
//! and harness test groups.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use plasm_core::Agent;
use plasm_dna::{encode, Config, DataFormat, Dna, EntryDef, Format, Zome};
use plasm_engine::{EngineError, Instance, TestData, CONFIG_FILE_NAME, DNA_FILE_NAME, TEST_DIR_NAME};

use crate::scripted::SCRIPTED_NUCLEUS_TYPE;

/// The profile schema used by the standard fixtures.
pub const PROFILE_SCHEMA: &str = r#"{
    "title": "Profile Schema",
    "type": "object",
    "properties": {
        "firstName": {"type": "string"},
        "lastName": {"type": "string"},
        "age": {"description": "Age in years", "type": "integer", "minimum": 0}
    },
    "required": ["firstName", "lastName"]
}"#;

/// Builds a complete instance directory.
pub struct InstanceBuilder {
    name: String,
    format: Format,
    agent_name: String,
    properties: BTreeMap<String, String>,
    config: Config,
    zomes: Vec<(Zome, String)>,
    schemas: Vec<(String, String)>,
    test_groups: Vec<(String, Vec<TestData>)>,
}

impl InstanceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: Format::Json,
            agent_name: "Herbert <h@example.com>".to_string(),
            properties: BTreeMap::new(),
            config: Config::default(),
            zomes: Vec::new(),
            schemas: Vec::new(),
            test_groups: Vec::new(),
        }
    }

    /// Interchange format for the DNA and config documents.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Add a zome together with its code text.
    pub fn zome(mut self, zome: Zome, code: impl Into<String>) -> Self {
        self.zomes.push((zome, code.into()));
        self
    }

    /// Add a schema file.
    pub fn schema(mut self, file: impl Into<String>, content: impl Into<String>) -> Self {
        self.schemas.push((file.into(), content.into()));
        self
    }

    /// Add a harness test group.
    pub fn test_group(mut self, name: impl Into<String>, cases: Vec<TestData>) -> Self {
        self.test_groups.push((name.into(), cases));
        self
    }

    /// Write everything into a fresh temp directory.
    pub fn build(self) -> Result<InstanceDir, EngineError> {
        let dir = TempDir::new()?;
        let path = dir.path();

        Agent::generate(&self.agent_name).save(path)?;

        let mut dna = Dna::new(&self.name);
        dna.properties = self.properties;
        for (zome, code) in &self.zomes {
            fs::write(path.join(&zome.code), code)?;
            dna.zomes.insert(zome.name.clone(), zome.clone());
        }
        for (file, content) in &self.schemas {
            fs::write(path.join(file), content)?;
        }

        let dna_text = encode(&dna, self.format)?;
        fs::write(
            path.join(format!("{}.{}", DNA_FILE_NAME, self.format.extension())),
            dna_text,
        )?;

        let config_text = encode(&self.config, self.format)?;
        fs::write(
            path.join(format!("{}.{}", CONFIG_FILE_NAME, self.format.extension())),
            config_text,
        )?;

        if !self.test_groups.is_empty() {
            let test_dir = path.join(TEST_DIR_NAME);
            fs::create_dir_all(&test_dir)?;
            for (name, cases) in &self.test_groups {
                let text = serde_json::to_string_pretty(cases)
                    .map_err(|e| EngineError::TestFailed(e.to_string()))?;
                fs::write(test_dir.join(format!("{name}.json")), text)?;
            }
        }

        Ok(InstanceDir { dir })
    }
}

/// A built instance directory, removed on drop.
pub struct InstanceDir {
    dir: TempDir,
}

impl InstanceDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Load an instance from this directory (factories registered first).
    pub fn load(&self) -> Result<Instance, EngineError> {
        crate::register();
        Instance::load(self.path())
    }
}

/// The standard two-zome fixture application.
///
/// `myZome` commits even numbers, primes, and schema-checked profiles;
/// `oddZome` commits odd numbers. Mirrors the developer fixtures the
/// engine's end-to-end scenarios exercise.
pub fn sample_app() -> InstanceBuilder {
    let my_zome = Zome::new("myZome", "zome_myZome.txt", SCRIPTED_NUCLEUS_TYPE)
        .with_entry(EntryDef::new(
            "myData",
            DataFormat::Raw(SCRIPTED_NUCLEUS_TYPE.into()),
        ))
        .with_entry(EntryDef::new("primes", DataFormat::Json))
        .with_entry(EntryDef::new("profile", DataFormat::Json).with_schema("schema_profile.json"));
    let my_zome_code = "\
expose addData string commit myData
expose addPrime json commit primes
expose addProfile json commit profile
expose getDNA string dnahash
expose getProperty string property
validate myData even
validate primes prime prime
validate profile accept
genesis ok
";

    let odd_zome = Zome::new("oddZome", "zome_oddZome.txt", SCRIPTED_NUCLEUS_TYPE).with_entry(
        EntryDef::new("myOdds", DataFormat::Raw(SCRIPTED_NUCLEUS_TYPE.into())),
    );
    let odd_zome_code = "\
expose addOdd string commit myOdds
validate myOdds odd
genesis ok
";

    InstanceBuilder::new("testApp")
        .property("description", "a test application")
        .property("language", "en")
        .schema("schema_profile.json", PROFILE_SCHEMA)
        .zome(my_zome, my_zome_code)
        .zome(odd_zome, odd_zome_code)
}
