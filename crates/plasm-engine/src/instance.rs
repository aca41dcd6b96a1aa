//! The instance: one application bound to one agent and one chain.
//!
//! Lifecycle: `Unloaded -> Loaded -> Prepared -> Started -> Activated`,
//! with `reset` returning to `Loaded`. Genesis commits the DNA and agent
//! entries that anchor the instance's identity.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, Weak};
use std::thread::JoinHandle;

use plasm_chain::{Chain, ValidateOptions};
use plasm_core::{Agent, Entry, Hash, HashSpec, Header, NodeId};
use plasm_dna::{decode, find_document, Config, Dna, Format, SchemaValidator, Zome};

use crate::dht::{Dht, PutReq};
use crate::error::EngineError;
use crate::nucleus::{create_nucleus, AppContext, Nucleus};
use crate::validator::{validate_commit, ValidationProps};

/// Stem of the DNA document file.
pub const DNA_FILE_NAME: &str = "dna";
/// Stem of the config document file.
pub const CONFIG_FILE_NAME: &str = "config";
/// Name of the chain persistence file.
pub const STORE_FILE_NAME: &str = "chain.dat";
/// Name of the DNA hash sidecar written after genesis.
pub const DNA_HASH_FILE_NAME: &str = "dna.hash";
/// Directory holding harness test groups.
pub const TEST_DIR_NAME: &str = "test";

/// Type of the first genesis entry.
pub const DNA_ENTRY_TYPE: &str = "%dna";
/// Type of the second genesis entry.
pub const AGENT_ENTRY_TYPE: &str = "%agent";

/// The system version nuclei may demand via `chain_requires`.
pub const SYS_VERSION: i32 = 3;

/// Reserved property names that are deprecated.
const DEPRECATED_PROPERTIES: [&str; 3] = ["id", "agent-id", "agent-name"];

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Unloaded,
    Loaded,
    Prepared,
    Started,
    Activated,
}

/// Shared state reachable from nuclei and the DHT through narrow handles.
pub(crate) struct InstanceCore {
    me: Weak<InstanceCore>,
    pub(crate) dir: PathBuf,
    pub(crate) spec: HashSpec,
    pub(crate) agent: Agent,
    pub(crate) node_id: NodeId,
    pub(crate) config: Config,
    dna_format: Format,
    pub(crate) dna: RwLock<Dna>,
    pub(crate) chain: Arc<RwLock<Chain>>,
    pub(crate) dht: RwLock<Arc<Dht>>,
    dna_hash: RwLock<Hash>,
    agent_hash: RwLock<Hash>,
}

impl InstanceCore {
    /// Upgrade to the context handle nuclei receive.
    pub(crate) fn ctx(&self) -> Arc<dyn AppContext> {
        self.me.upgrade().expect("instance core is alive")
    }

    /// Build a nucleus for a zome, reading its code from disk.
    pub(crate) fn make_nucleus(&self, zome: &Zome) -> Result<Box<dyn Nucleus>, EngineError> {
        let code_path = self.dir.join(&zome.code);
        let code = fs::read_to_string(&code_path)
            .map_err(|_| EngineError::MissingFile(code_path.clone()))?;
        create_nucleus(&zome.nucleus_type, self.ctx(), &code).map_err(|e| match e {
            e @ EngineError::UnknownNucleusType(_) => e,
            e => EngineError::Nucleus {
                zome: zome.name.clone(),
                message: e.to_string(),
            },
        })
    }

    /// Append a validated entry: sign, link, persist, then queue the DHT put.
    pub(crate) fn new_entry(
        &self,
        now: i64,
        entry_type: &str,
        entry: Entry,
    ) -> Result<(Hash, Header), EngineError> {
        let (hash, header) = {
            let mut chain = self.chain.write().unwrap();
            let (len, hash, header) =
                chain.prepare_header(now, entry_type, &entry, self.agent.keypair())?;
            chain.add_entry(len, hash, header.clone(), entry)?;
            (hash, header)
        };

        let dht = self.dht.read().unwrap().clone();
        dht.enqueue_put(PutReq {
            entry_hash: header.entry_link,
            header_hash: hash,
        });
        Ok((hash, header))
    }

    pub(crate) fn set_dna_hash(&self, hash: Hash) {
        *self.dna_hash.write().unwrap() = hash;
    }

    pub(crate) fn set_agent_hash(&self, hash: Hash) {
        *self.agent_hash.write().unwrap() = hash;
    }
}

impl AppContext for InstanceCore {
    fn commit(&self, entry_type: &str, content: &str) -> Result<Hash, EngineError> {
        let entry = Entry::App(content.to_string());
        validate_commit(self, entry_type, &entry, &ValidationProps::default())?;
        let (_, header) = self.new_entry(now_millis(), entry_type, entry)?;
        Ok(header.entry_link)
    }

    fn dna_hash(&self) -> Hash {
        *self.dna_hash.read().unwrap()
    }

    fn agent_hash(&self) -> Hash {
        *self.agent_hash.read().unwrap()
    }

    fn agent_name(&self) -> String {
        self.agent.name().to_string()
    }

    fn node_id(&self) -> String {
        self.node_id.to_string()
    }

    fn chain_top(&self) -> Hash {
        self.chain
            .read()
            .unwrap()
            .top()
            .map(|h| h.entry_link)
            .unwrap_or_else(Hash::null)
    }

    fn property(&self, name: &str) -> String {
        if DEPRECATED_PROPERTIES.contains(&name) {
            tracing::warn!(target: "plasm::app", property = name, "deprecated property");
            return String::new();
        }
        self.dna
            .read()
            .unwrap()
            .properties
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn sys_version(&self) -> i32 {
        SYS_VERSION
    }
}

/// One live application instance.
pub struct Instance {
    core: Arc<InstanceCore>,
    state: LifecycleState,
    put_handler: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("state", &self.state)
            .finish()
    }
}

impl Instance {
    /// Load an instance from its directory and prepare it to run.
    ///
    /// Discovers the DNA and config documents by extension, loads the agent
    /// from the directory or its parent, replays the chain from disk, and
    /// verifies the DNA-hash sidecar against the committed DNA entry.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let dir = dir.as_ref().to_path_buf();

        let (dna_path, dna_format) = find_document(&dir, DNA_FILE_NAME)
            .map_err(|_| EngineError::MissingFile(dir.join(DNA_FILE_NAME)))?;
        let dna: Dna = decode(&fs::read_to_string(&dna_path)?, dna_format)?;

        let (config_path, config_format) = find_document(&dir, CONFIG_FILE_NAME)
            .map_err(|_| EngineError::MissingFile(dir.join(CONFIG_FILE_NAME)))?;
        let config: Config = decode(&fs::read_to_string(&config_path)?, config_format)?;

        let agent = Agent::load_with_fallback(&dir)?;
        let node_id = agent.node_id()?;
        let spec = HashSpec::from_name(&dna.hash_type)?;

        let chain = Chain::open(spec, dir.join(STORE_FILE_NAME))?;

        let mut dna_hash = Hash::null();
        let mut agent_hash = Hash::null();
        let sidecar = dir.join(DNA_HASH_FILE_NAME);
        if sidecar.exists() {
            dna_hash = fs::read_to_string(&sidecar)?.trim().parse()?;
        }
        if let Some(first) = chain.header(0) {
            let computed = first.entry_link;
            if !dna_hash.is_null() && dna_hash != computed {
                return Err(EngineError::DnaHashMismatch {
                    recorded: dna_hash.to_string(),
                    computed: computed.to_string(),
                });
            }
            dna_hash = computed;
        }
        if let Some(second) = chain.header(1) {
            agent_hash = second.entry_link;
        }

        let chain = Arc::new(RwLock::new(chain));
        let core = Arc::new_cyclic(|me| InstanceCore {
            me: me.clone(),
            dht: RwLock::new(Arc::new(Dht::new(Arc::clone(&chain), &dir))),
            dir,
            spec,
            agent,
            node_id,
            config,
            dna_format,
            dna: RwLock::new(dna),
            chain,
            dna_hash: RwLock::new(dna_hash),
            agent_hash: RwLock::new(agent_hash),
        });

        let mut instance = Self {
            core,
            state: LifecycleState::Loaded,
            put_handler: None,
        };
        instance.prepare()?;
        Ok(instance)
    }

    /// Prepare the instance to run. Idempotent on a loaded instance.
    ///
    /// Resolves the hash type, runs each zome's `chain_requires`, verifies
    /// referenced code and schema files exist, compiles the JSON-schema
    /// validators, and constructs a fresh DHT.
    pub fn prepare(&mut self) -> Result<(), EngineError> {
        let core = &self.core;

        // Re-resolve so a definition edit cannot leave a stale spec behind.
        let dna_hash_type = core.dna.read().unwrap().hash_type.clone();
        HashSpec::from_name(&dna_hash_type)?;

        let zomes: Vec<Zome> = core.dna.read().unwrap().zomes.values().cloned().collect();
        for zome in &zomes {
            let nucleus = core.make_nucleus(zome)?;
            nucleus.chain_requires()?;

            for def in zome.entries.values() {
                if def.schema.is_empty() {
                    continue;
                }
                let schema_path = core.dir.join(&def.schema);
                if !schema_path.exists() {
                    return Err(EngineError::MissingFile(schema_path));
                }
                if def.schema.ends_with(".json") {
                    let validator = Arc::new(SchemaValidator::from_file(&schema_path)?);
                    let mut dna = core.dna.write().unwrap();
                    if let Some(zome_mut) = dna.zomes.get_mut(&zome.name) {
                        if let Some(def_mut) = zome_mut.entries.get_mut(&def.name) {
                            def_mut.validator = Some(validator);
                        }
                    }
                }
            }
        }

        *core.dht.write().unwrap() = Arc::new(Dht::new(Arc::clone(&core.chain), &core.dir));

        if self.state < LifecycleState::Prepared {
            self.state = LifecycleState::Prepared;
        }
        Ok(())
    }

    /// Commit the genesis entries: the canonical DNA document, then the
    /// agent identity record.
    ///
    /// Returns the hash of the agent entry's header. On failure the partial
    /// chain and sidecar are removed and the error surfaced; `reset` is the
    /// further recovery path.
    pub fn gen_chain(&mut self) -> Result<Hash, EngineError> {
        if self.started() {
            return Err(EngineError::AlreadyStarted);
        }
        self.prepare()?;

        match self.gen_chain_inner() {
            Ok(hash) => {
                self.state = LifecycleState::Started;
                Ok(hash)
            }
            Err(e) => {
                self.cleanup_failed_genesis();
                Err(e)
            }
        }
    }

    fn gen_chain_inner(&mut self) -> Result<Hash, EngineError> {
        let core = &self.core;

        let dna_bytes = core.dna.read().unwrap().canonical_bytes()?;
        let (_, dna_header) =
            core.new_entry(now_millis(), DNA_ENTRY_TYPE, Entry::Dna(dna_bytes))?;
        core.set_dna_hash(dna_header.entry_link);

        let agent_entry = Entry::Agent(core.agent.entry());
        let (agent_header_hash, agent_header) =
            core.new_entry(now_millis(), AGENT_ENTRY_TYPE, agent_entry)?;
        core.set_agent_hash(agent_header.entry_link);

        fs::write(
            core.dir.join(DNA_HASH_FILE_NAME),
            dna_header.entry_link.to_string(),
        )?;

        core.dht.read().unwrap().clone().setup()?;

        let zomes: Vec<Zome> = core.dna.read().unwrap().zomes.values().cloned().collect();
        for zome in &zomes {
            let nucleus = core.make_nucleus(zome)?;
            match nucleus.chain_genesis() {
                Ok(true) => {}
                Ok(false) => return Err(EngineError::GenesisFailed(zome.name.clone())),
                Err(e) => {
                    return Err(EngineError::Nucleus {
                        zome: zome.name.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }

        Ok(agent_header_hash)
    }

    /// Undo a partial genesis: close and delete the chain, drop sidecars.
    fn cleanup_failed_genesis(&mut self) {
        let core = &self.core;
        let store_path = core.dir.join(STORE_FILE_NAME);
        {
            let mut chain = core.chain.write().unwrap();
            chain.close();
            if let Err(e) = remove_if_exists(&store_path) {
                tracing::warn!(target: "plasm::app", error = %e, "genesis cleanup: chain file");
            }
            *chain = match Chain::open(core.spec, &store_path) {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!(target: "plasm::app", error = %e, "genesis cleanup: reopen");
                    Chain::new(core.spec)
                }
            };
        }
        if let Err(e) = remove_if_exists(&core.dir.join(DNA_HASH_FILE_NAME)) {
            tracing::warn!(target: "plasm::app", error = %e, "genesis cleanup: sidecar");
        }
        core.set_dna_hash(Hash::null());
        core.set_agent_hash(Hash::null());
    }

    /// Bring the node online for its configured peer modes and spawn the
    /// DHT put handler.
    pub fn activate(&mut self) -> Result<(), EngineError> {
        let core = &self.core;
        let address = format!("/ip4/127.0.0.1/tcp/{}", core.config.port);
        tracing::info!(
            target: "plasm::node",
            %address,
            node = %core.node_id,
            "node bound",
        );

        if core.config.peer_mode_dht_node {
            let dht = core.dht.read().unwrap().clone();
            dht.start()?;
            if !core.config.bootstrap_server.is_empty() {
                tracing::info!(
                    target: "plasm::dht",
                    server = %core.config.bootstrap_server,
                    "announcing to bootstrap server",
                );
            }
        }
        if core.config.peer_mode_author {
            tracing::info!(target: "plasm::node", "serving authored chain");
        }

        self.spawn_put_handler();
        self.state = LifecycleState::Activated;
        Ok(())
    }

    /// Spawn the background put handler for the current DHT.
    pub(crate) fn spawn_put_handler(&mut self) {
        let dht = self.core.dht.read().unwrap().clone();
        self.put_handler = Some(dht.spawn_put_handler());
    }

    /// Validate and commit an application entry; returns the entry hash.
    pub fn commit(&self, entry_type: &str, content: &str) -> Result<Hash, EngineError> {
        self.core.commit(entry_type, content)
    }

    /// Invoke an exposed zome function.
    pub fn call(&self, zome_name: &str, function: &str, args: &str) -> Result<String, EngineError> {
        let zome = self
            .core
            .dna
            .read()
            .unwrap()
            .zomes
            .get(zome_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownZome(zome_name.to_string()))?;
        let nucleus = self.core.make_nucleus(&zome)?;
        nucleus.call(function, args)
    }

    /// Run the validation pipeline without committing.
    pub fn validate_entry(
        &self,
        entry_type: &str,
        entry: &Entry,
        props: &ValidationProps,
    ) -> Result<(), EngineError> {
        validate_commit(&self.core, entry_type, entry, props)
    }

    /// Delete all chain and DHT data and return to the loaded state.
    ///
    /// Idempotent: resetting twice equals resetting once.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        let core = &self.core;

        let old_dht = core.dht.read().unwrap().clone();
        old_dht.close();
        if let Some(handle) = self.put_handler.take() {
            let _ = handle.join();
        }
        old_dht.remove_store()?;

        let store_path = core.dir.join(STORE_FILE_NAME);
        {
            let mut chain = core.chain.write().unwrap();
            chain.close();
            remove_if_exists(&store_path)?;
            *chain = Chain::open(core.spec, &store_path)?;
        }
        remove_if_exists(&core.dir.join(DNA_HASH_FILE_NAME))?;

        core.set_dna_hash(Hash::null());
        core.set_agent_hash(Hash::null());
        *core.dht.write().unwrap() = Arc::new(Dht::new(Arc::clone(&core.chain), &core.dir));

        self.state = LifecycleState::Loaded;
        Ok(())
    }

    /// Whether genesis has been committed.
    pub fn started(&self) -> bool {
        !self.core.dna_hash.read().unwrap().is_null()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Hash of the DNA entry, which is also the application's identity.
    pub fn dna_hash(&self) -> Hash {
        *self.core.dna_hash.read().unwrap()
    }

    /// Hash of the agent entry.
    pub fn agent_hash(&self) -> Hash {
        *self.core.agent_hash.read().unwrap()
    }

    pub fn agent(&self) -> &Agent {
        &self.core.agent
    }

    pub fn node_id(&self) -> &NodeId {
        &self.core.node_id
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn dir(&self) -> &Path {
        &self.core.dir
    }

    /// Shared handle to the chain, for reads.
    pub fn chain(&self) -> Arc<RwLock<Chain>> {
        Arc::clone(&self.core.chain)
    }

    /// The current DHT handle.
    pub fn dht(&self) -> Arc<Dht> {
        self.core.dht.read().unwrap().clone()
    }

    /// Hash of the top chain header (null when empty).
    pub fn top(&self) -> Hash {
        self.core.chain.read().unwrap().top_hash()
    }

    /// Hash of the most recent header of the given type (null if none).
    pub fn top_of_type(&self, entry_type: &str) -> Hash {
        self.core.chain.read().unwrap().top_of_type(entry_type)
    }

    /// Value of a DNA property. Deprecated reserved names log a warning
    /// and return empty.
    pub fn get_property(&self, name: &str) -> String {
        self.core.property(name)
    }

    /// Verify the whole chain against the agent's key, optionally
    /// re-hashing every entry.
    pub fn validate_chain(&self, entries_too: bool) -> Result<(), EngineError> {
        let opts = ValidateOptions {
            public_key: Some(self.core.agent.public_key()),
            entries_too,
        };
        self.core.chain.read().unwrap().validate(&opts)?;
        Ok(())
    }

    /// Write the DNA document back to its file.
    pub fn save_dna(&self, overwrite: bool) -> Result<(), EngineError> {
        let core = &self.core;
        let path = core.dir.join(format!(
            "{}.{}",
            DNA_FILE_NAME,
            core.dna_format.extension()
        ));
        if !overwrite && path.exists() {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        let text = plasm_dna::encode(&*core.dna.read().unwrap(), core.dna_format)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub(crate) fn core(&self) -> &Arc<InstanceCore> {
        &self.core
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.core.dht.read().unwrap().close();
        if let Some(handle) = self.put_handler.take() {
            let _ = handle.join();
        }
    }
}

/// Current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
