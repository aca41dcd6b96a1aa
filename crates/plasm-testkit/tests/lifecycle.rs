//! Instance lifecycle: load, prepare, genesis, reset, activate, reload.

use plasm_core::Entry;
use plasm_dna::Format;
use plasm_engine::{
    EngineError, Instance, LifecycleState, AGENT_ENTRY_TYPE, DNA_ENTRY_TYPE, DNA_HASH_FILE_NAME,
};
use plasm_testkit::{sample_app, InstanceBuilder, SCRIPTED_NUCLEUS_TYPE};

use plasm_dna::{DataFormat, EntryDef, Zome};

#[test]
fn genesis_commits_dna_then_agent() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    assert!(!instance.started());

    instance.gen_chain().unwrap();
    assert!(instance.started());
    assert_eq!(instance.state(), LifecycleState::Started);

    let chain = instance.chain();
    let chain = chain.read().unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.header(0).unwrap().entry_type, DNA_ENTRY_TYPE);
    assert_eq!(chain.header(1).unwrap().entry_type, AGENT_ENTRY_TYPE);

    // The agent entry carries this agent's marshalled key.
    match chain.entry(1).unwrap() {
        Entry::Agent(agent_entry) => {
            assert_eq!(agent_entry.name, instance.agent().name());
            assert_eq!(
                agent_entry.key,
                instance.agent().public_key().as_ref().to_vec()
            );
        }
        other => panic!("expected agent entry, got {other:?}"),
    }

    assert_eq!(instance.dna_hash(), chain.header(0).unwrap().entry_link);
    assert_eq!(instance.agent_hash(), chain.header(1).unwrap().entry_link);
}

#[test]
fn genesis_writes_sidecar_and_anchors_dht() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let sidecar = built.path().join(DNA_HASH_FILE_NAME);
    let recorded = std::fs::read_to_string(&sidecar).unwrap();
    assert_eq!(recorded, instance.dna_hash().to_string());

    // Both genesis commits queued puts; the sim drain handles them.
    let dht = instance.dht();
    assert_eq!(dht.sim_handle_put_reqs(), 2);
    assert!(dht.holds(&instance.dna_hash()));
}

#[test]
fn gen_chain_twice_is_already_started() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let before = instance.top();
    let err = instance.gen_chain().unwrap_err();
    assert!(matches!(err, EngineError::AlreadyStarted));
    assert_eq!(instance.top(), before);
}

#[test]
fn prepare_is_idempotent() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.prepare().unwrap();
    instance.prepare().unwrap();
    assert_eq!(instance.state(), LifecycleState::Prepared);
}

#[test]
fn reset_clears_everything_and_is_idempotent() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();
    instance.call("myZome", "addData", "2").unwrap();

    instance.reset().unwrap();
    instance.reset().unwrap();

    assert!(!instance.started());
    assert!(instance.dna_hash().is_null());
    assert!(instance.agent_hash().is_null());
    assert_eq!(instance.chain().read().unwrap().len(), 0);
    assert!(!built.path().join(DNA_HASH_FILE_NAME).exists());

    // The instance can gen again after a reset.
    instance.gen_chain().unwrap();
    assert!(instance.started());
}

#[test]
fn reload_recovers_started_state() {
    let built = sample_app().build().unwrap();
    let dna_hash;
    let top;
    {
        let mut instance = built.load().unwrap();
        instance.gen_chain().unwrap();
        instance.call("myZome", "addData", "2").unwrap();
        dna_hash = instance.dna_hash();
        top = instance.top();
    }

    let reloaded = built.load().unwrap();
    assert!(reloaded.started());
    assert_eq!(reloaded.dna_hash(), dna_hash);
    assert_eq!(reloaded.top(), top);
    assert_eq!(reloaded.chain().read().unwrap().len(), 3);
    reloaded.validate_chain(true).unwrap();
}

#[test]
fn tampered_sidecar_fails_reload() {
    let built = sample_app().build().unwrap();
    let agent_hash;
    {
        let mut instance = built.load().unwrap();
        instance.gen_chain().unwrap();
        agent_hash = instance.agent_hash();
    }

    // Record a different (but well-formed) hash in the sidecar.
    std::fs::write(
        built.path().join(DNA_HASH_FILE_NAME),
        agent_hash.to_string(),
    )
    .unwrap();

    let err = built.load().unwrap_err();
    assert!(matches!(err, EngineError::DnaHashMismatch { .. }));
}

#[test]
fn failed_genesis_cleans_up() {
    let zome = Zome::new("vetoZome", "zome_veto.txt", SCRIPTED_NUCLEUS_TYPE).with_entry(
        EntryDef::new("stuff", DataFormat::Raw(SCRIPTED_NUCLEUS_TYPE.into())),
    );
    let built = InstanceBuilder::new("vetoApp")
        .zome(zome, "validate stuff accept\ngenesis fail\n")
        .build()
        .unwrap();

    let mut instance = built.load().unwrap();
    let err = instance.gen_chain().unwrap_err();
    assert!(matches!(err, EngineError::GenesisFailed(ref zome) if zome == "vetoZome"));

    // The partial chain and sidecar are gone, hashes null.
    assert!(!instance.started());
    assert!(instance.dna_hash().is_null());
    assert_eq!(instance.chain().read().unwrap().len(), 0);
    assert!(!built.path().join(DNA_HASH_FILE_NAME).exists());
}

#[test]
fn version_requirement_blocks_load() {
    let zome = Zome::new("futureZome", "zome_future.txt", SCRIPTED_NUCLEUS_TYPE).with_entry(
        EntryDef::new("stuff", DataFormat::Raw(SCRIPTED_NUCLEUS_TYPE.into())),
    );
    let built = InstanceBuilder::new("futureApp")
        .zome(zome, "requires 9999\ngenesis ok\n")
        .build()
        .unwrap();

    let err = built.load().unwrap_err();
    assert!(matches!(
        err,
        EngineError::VersionRequirement { required: 9999 }
    ));
}

#[test]
fn missing_schema_file_blocks_load() {
    let zome = Zome::new("schemaZome", "zome_schema.txt", SCRIPTED_NUCLEUS_TYPE).with_entry(
        EntryDef::new("profile", DataFormat::Json).with_schema("schema_absent.json"),
    );
    let built = InstanceBuilder::new("schemaApp")
        .zome(zome, "validate profile accept\ngenesis ok\n")
        .build()
        .unwrap();

    let err = built.load().unwrap_err();
    match err {
        EngineError::MissingFile(path) => {
            assert!(path.ends_with("schema_absent.json"));
        }
        other => panic!("expected missing file, got {other}"),
    }
}

#[test]
fn unknown_hash_type_blocks_load() {
    let built = sample_app().build().unwrap();
    // Rewrite the DNA with a bogus hash type.
    let dna_path = built.path().join("dna.json");
    let text = std::fs::read_to_string(&dna_path).unwrap();
    let text = text.replace("sha2-256", "md5");
    std::fs::write(&dna_path, text).unwrap();

    let err = built.load().unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(plasm_core::CoreError::UnknownHashType(_))
    ));
}

#[test]
fn activate_spawns_node_and_handler() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();
    instance.activate().unwrap();
    assert_eq!(instance.state(), LifecycleState::Activated);
    instance.reset().unwrap();
}

#[test]
fn loads_yaml_and_toml_documents() {
    for format in [Format::Yaml, Format::Toml] {
        let built = sample_app().format(format).build().unwrap();
        let mut instance = built.load().unwrap();
        instance.gen_chain().unwrap();
        assert!(instance.started());
    }
}

#[test]
fn instance_without_dna_document_fails() {
    let built = sample_app().build().unwrap();
    std::fs::remove_file(built.path().join("dna.json")).unwrap();
    let err = Instance::load(built.path()).unwrap_err();
    assert!(matches!(err, EngineError::MissingFile(_)));
}
