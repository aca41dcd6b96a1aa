//! # Plasm Engine
//!
//! The application engine: it binds a DNA, an agent, a chain, validators,
//! and a DHT into one running instance, and drives the instance lifecycle
//! from load through genesis to activation.
//!
//! Script evaluators ("nuclei") and the network transport are capabilities
//! consumed through narrow traits; see [`nucleus`] and [`dht`].
//!
//! ## Startup
//!
//! Call [`register`] once before constructing instances. It is idempotent
//! and installs the process-wide pieces: the default logging sink and any
//! built-in nucleus factories.

mod dht;
mod error;
mod harness;
mod instance;
mod nucleus;
mod validator;

pub use dht::{Dht, PutReq, DHT_STORE_FILE_NAME};
pub use error::EngineError;
pub use harness::{load_test_data, TestData};
pub use instance::{
    Instance, LifecycleState, AGENT_ENTRY_TYPE, CONFIG_FILE_NAME, DNA_ENTRY_TYPE,
    DNA_FILE_NAME, DNA_HASH_FILE_NAME, STORE_FILE_NAME, SYS_VERSION, TEST_DIR_NAME,
};
pub use nucleus::{
    create_nucleus, nucleus_types, register_nucleus_type, AppContext, ArgType, Interface,
    Nucleus, NucleusFactory,
};
pub use validator::ValidationProps;

use std::sync::OnceLock;

/// Process-wide startup side effects. Call once before constructing any
/// instance; further calls are no-ops.
pub fn register() {
    static REGISTERED: OnceLock<()> = OnceLock::new();
    REGISTERED.get_or_init(|| {
        // The host application may have installed its own subscriber.
        let _ = tracing_subscriber::fmt().with_target(true).try_init();
    });
}
