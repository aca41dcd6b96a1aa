//! The nucleus capability: the narrow surface the engine needs from a
//! script evaluator, plus the process-wide factory registry.
//!
//! A nucleus is constructed per call site from a zome's source code and a
//! context handle. It never receives the instance itself; everything it
//! may do flows through [`AppContext`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use plasm_core::{Entry, Hash};
use plasm_dna::EntryDef;

use crate::error::EngineError;
use crate::validator::ValidationProps;

/// Argument types a zome function can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Json,
}

/// One exposed zome function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub arg_type: ArgType,
}

/// The read-and-commit surface handed to nuclei (and the DHT).
///
/// Keeps lifetimes clear: app code reaches back into the instance through
/// this handle only.
pub trait AppContext: Send + Sync {
    /// Validate and commit an application entry; returns the entry hash.
    fn commit(&self, entry_type: &str, content: &str) -> Result<Hash, EngineError>;

    /// Hash of the committed DNA entry (null before genesis).
    fn dna_hash(&self) -> Hash;

    /// Hash of the committed agent entry (null before genesis).
    fn agent_hash(&self) -> Hash;

    /// The owning agent's name.
    fn agent_name(&self) -> String;

    /// Base-58 node id derived from the agent key.
    fn node_id(&self) -> String;

    /// Entry link of the current chain top (null when empty).
    fn chain_top(&self) -> Hash;

    /// DNA property lookup (reserved names excluded).
    fn property(&self, name: &str) -> String;

    /// The engine's system version, for `chain_requires` checks.
    fn sys_version(&self) -> i32;
}

/// A constructed evaluator for one zome's code.
pub trait Nucleus: Send {
    /// Check environment requirements before the chain runs.
    fn chain_requires(&self) -> Result<(), EngineError>;

    /// Run the zome's genesis callback. `false` vetoes genesis.
    fn chain_genesis(&self) -> Result<bool, EngineError>;

    /// Run the zome's validation callback for one entry.
    fn validate_entry(
        &self,
        def: &EntryDef,
        entry: &Entry,
        props: &ValidationProps,
    ) -> Result<bool, EngineError>;

    /// Dispatch an exposed function.
    fn call(&self, function: &str, args: &str) -> Result<String, EngineError>;

    /// The functions this zome exposes.
    fn interfaces(&self) -> Vec<Interface>;
}

/// A factory producing nuclei from (context, source code).
pub type NucleusFactory =
    Arc<dyn Fn(Arc<dyn AppContext>, &str) -> Result<Box<dyn Nucleus>, EngineError> + Send + Sync>;

fn registry() -> &'static RwLock<HashMap<String, NucleusFactory>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, NucleusFactory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a nucleus factory under a stable name.
///
/// Registration is first-wins and idempotent; re-registering a name is a
/// no-op, so startup code may call it unconditionally.
pub fn register_nucleus_type(name: &str, factory: NucleusFactory) {
    let mut map = registry().write().unwrap();
    map.entry(name.to_string()).or_insert(factory);
}

/// Construct a nucleus of the named type.
pub fn create_nucleus(
    nucleus_type: &str,
    ctx: Arc<dyn AppContext>,
    code: &str,
) -> Result<Box<dyn Nucleus>, EngineError> {
    let factory = {
        let map = registry().read().unwrap();
        map.get(nucleus_type).cloned()
    };
    match factory {
        Some(factory) => factory(ctx, code),
        None => Err(EngineError::UnknownNucleusType(nucleus_type.to_string())),
    }
}

/// Names of all registered nucleus types.
pub fn nucleus_types() -> Vec<String> {
    registry().read().unwrap().keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NopNucleus;

    impl Nucleus for NopNucleus {
        fn chain_requires(&self) -> Result<(), EngineError> {
            Ok(())
        }
        fn chain_genesis(&self) -> Result<bool, EngineError> {
            Ok(true)
        }
        fn validate_entry(
            &self,
            _def: &EntryDef,
            _entry: &Entry,
            _props: &ValidationProps,
        ) -> Result<bool, EngineError> {
            Ok(true)
        }
        fn call(&self, function: &str, _args: &str) -> Result<String, EngineError> {
            Err(EngineError::UnknownFunction(function.to_string()))
        }
        fn interfaces(&self) -> Vec<Interface> {
            Vec::new()
        }
    }

    struct NopContext;

    impl AppContext for NopContext {
        fn commit(&self, _entry_type: &str, _content: &str) -> Result<Hash, EngineError> {
            Ok(Hash::null())
        }
        fn dna_hash(&self) -> Hash {
            Hash::null()
        }
        fn agent_hash(&self) -> Hash {
            Hash::null()
        }
        fn agent_name(&self) -> String {
            String::new()
        }
        fn node_id(&self) -> String {
            String::new()
        }
        fn chain_top(&self) -> Hash {
            Hash::null()
        }
        fn property(&self, _name: &str) -> String {
            String::new()
        }
        fn sys_version(&self) -> i32 {
            crate::instance::SYS_VERSION
        }
    }

    #[test]
    fn test_register_and_create() {
        register_nucleus_type("nop", Arc::new(|_ctx, _code| Ok(Box::new(NopNucleus))));

        let nucleus = create_nucleus("nop", Arc::new(NopContext), "").unwrap();
        assert!(nucleus.chain_genesis().unwrap());
    }

    #[test]
    fn test_unknown_type() {
        let result = create_nucleus("no-such-evaluator", Arc::new(NopContext), "");
        assert!(matches!(result, Err(EngineError::UnknownNucleusType(_))));
    }

    #[test]
    fn test_registration_idempotent() {
        register_nucleus_type("nop2", Arc::new(|_ctx, _code| Ok(Box::new(NopNucleus))));
        register_nucleus_type("nop2", Arc::new(|_ctx, _code| Ok(Box::new(NopNucleus))));
        assert_eq!(
            nucleus_types().iter().filter(|n| *n == "nop2").count(),
            1
        );
    }
}
