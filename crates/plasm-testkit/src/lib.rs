//! # Plasm Testkit
//!
//! Fixtures for exercising the engine without a real script interpreter:
//! a "scripted" nucleus whose behavior is a small directive table, plus a
//! builder that lays out a complete instance directory in a temp dir.

mod fixtures;
mod scripted;

pub use fixtures::{sample_app, InstanceBuilder, InstanceDir, PROFILE_SCHEMA};
pub use scripted::{ScriptedNucleus, SCRIPTED_NUCLEUS_TYPE};

use std::sync::Arc;

use plasm_engine::{register_nucleus_type, Nucleus, NucleusFactory};

/// Register the testkit's nucleus factory (and the engine's process-wide
/// pieces). Idempotent; call at the top of any test.
pub fn register() {
    plasm_engine::register();
    let factory: NucleusFactory = Arc::new(|ctx, code| {
        let nucleus = ScriptedNucleus::parse(ctx, code)?;
        Ok(Box::new(nucleus) as Box<dyn Nucleus>)
    });
    register_nucleus_type(SCRIPTED_NUCLEUS_TYPE, factory);
}
