//! End-to-end commit and harness scenarios against the sample application.

use plasm_engine::{EngineError, TestData, DNA_HASH_FILE_NAME};
use plasm_testkit::sample_app;

#[test]
fn even_validator_gates_commits() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let before = instance.top();
    let hash = instance.call("myZome", "addData", "2").unwrap();
    assert!(!hash.is_empty());
    let after = instance.top();
    assert_ne!(before, after, "top should advance on a valid commit");

    let err = instance.call("myZome", "addData", "5").unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidEntry { ref entry_type, ref content }
            if entry_type == "myData" && content == "5"
    ));
    assert_eq!(err.to_string(), "Invalid entry: 5");
    assert_eq!(instance.top(), after, "top unchanged on rejected commit");
}

#[test]
fn prime_validator_gates_json_commits() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let result = instance.call("myZome", "addPrime", "{\"prime\":7}").unwrap();
    // JSON functions return a JSON string value.
    assert!(result.starts_with('"') && result.ends_with('"'));

    let err = instance
        .call("myZome", "addPrime", "{\"prime\":4}")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidEntry { ref entry_type, .. } if entry_type == "primes"
    ));
}

#[test]
fn get_dna_matches_sidecar() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let from_call = instance.call("myZome", "getDNA", "").unwrap();
    assert_eq!(from_call, instance.dna_hash().to_string());

    let sidecar = std::fs::read_to_string(built.path().join(DNA_HASH_FILE_NAME)).unwrap();
    assert_eq!(from_call, sidecar);
}

#[test]
fn schema_gates_profile_commits() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    instance
        .call(
            "myZome",
            "addProfile",
            r#"{"firstName":"Art","lastName":"Brock"}"#,
        )
        .unwrap();

    let err = instance
        .call("myZome", "addProfile", r#"{"firstName":"Art"}"#)
        .unwrap_err();
    match err {
        EngineError::SchemaInvalid(diagnostic) => {
            assert!(diagnostic.contains("lastName"), "diagnostic: {diagnostic}");
        }
        other => panic!("expected schema failure, got {other}"),
    }
}

#[test]
fn harness_group_accumulates_zero_errors() {
    let built = sample_app()
        .test_group(
            "odds",
            vec![
                TestData {
                    zome: "oddZome".into(),
                    fn_name: "addOdd".into(),
                    input: "7".into(),
                    output: "%h%".into(),
                    ..Default::default()
                },
                TestData {
                    zome: "oddZome".into(),
                    fn_name: "addOdd".into(),
                    input: "2".into(),
                    err: "Invalid entry: 2".into(),
                    ..Default::default()
                },
            ],
        )
        .build()
        .unwrap();

    let mut instance = built.load().unwrap();
    let failures = instance.test();
    assert!(failures.is_empty(), "failures: {failures:?}");
    // The harness resets after each group.
    assert!(!instance.started());
}

#[test]
fn harness_reports_mismatches() {
    let built = sample_app()
        .test_group(
            "bad",
            vec![TestData {
                zome: "oddZome".into(),
                fn_name: "addOdd".into(),
                input: "7".into(),
                output: "not-the-hash".into(),
                ..Default::default()
            }],
        )
        .build()
        .unwrap();

    let mut instance = built.load().unwrap();
    let failures = instance.test();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], EngineError::TestFailed(_)));
}

#[test]
fn harness_substitutions_and_regexp() {
    let built = sample_app()
        .test_group(
            "subs",
            vec![
                TestData {
                    zome: "myZome".into(),
                    fn_name: "getDNA".into(),
                    input: "".into(),
                    output: "%dna%".into(),
                    ..Default::default()
                },
                TestData {
                    zome: "myZome".into(),
                    fn_name: "getDNA".into(),
                    input: "".into(),
                    // The previous result was the DNA hash.
                    output: "%r1%".into(),
                    ..Default::default()
                },
                TestData {
                    zome: "myZome".into(),
                    fn_name: "getProperty".into(),
                    input: "language".into(),
                    regexp: "^en$".into(),
                    ..Default::default()
                },
            ],
        )
        .build()
        .unwrap();

    let mut instance = built.load().unwrap();
    let failures = instance.test();
    assert!(failures.is_empty(), "failures: {failures:?}");
}

#[test]
fn harness_refuses_started_chain() {
    let built = sample_app()
        .test_group(
            "noop",
            vec![TestData {
                zome: "myZome".into(),
                fn_name: "getDNA".into(),
                input: "".into(),
                regexp: ".*".into(),
                ..Default::default()
            }],
        )
        .build()
        .unwrap();

    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let failures = instance.test();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], EngineError::AlreadyStarted));
}

#[test]
fn top_of_type_tracks_last_of_each_type() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    instance.call("myZome", "addData", "2").unwrap();
    instance.call("myZome", "addData", "4").unwrap();
    instance.call("oddZome", "addOdd", "7").unwrap();

    let chain = instance.chain();
    let chain = chain.read().unwrap();
    // Indices: 0 dna, 1 agent, 2 and 3 myData, 4 myOdds.
    assert_eq!(chain.len(), 5);
    assert_eq!(chain.top_of_type("myData"), chain.hash(3).unwrap());
    assert_eq!(chain.top_of_type("myOdds"), chain.hash(4).unwrap());
}

#[test]
fn unknown_zome_and_entry_type() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let err = instance.call("nope", "f", "").unwrap_err();
    assert!(matches!(err, EngineError::UnknownZome(ref z) if z == "nope"));

    let before = instance.chain().read().unwrap().len();
    let err = instance
        .validate_entry(
            "nosuchtype",
            &plasm_core::Entry::App("x".into()),
            &plasm_engine::ValidationProps::default(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownEntryType(_)));
    assert_eq!(instance.chain().read().unwrap().len(), before);
}

#[test]
fn deprecated_properties_return_empty() {
    let built = sample_app().build().unwrap();
    let instance = built.load().unwrap();

    assert_eq!(instance.get_property("language"), "en");
    assert_eq!(instance.get_property("id"), "");
    assert_eq!(instance.get_property("agent-id"), "");
    assert_eq!(instance.get_property("agent-name"), "");
    assert_eq!(instance.get_property("unset"), "");
}

#[test]
fn commits_flow_to_dht_queue() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();

    let dht = instance.dht();
    dht.sim_handle_put_reqs();

    let hash = instance.call("myZome", "addData", "2").unwrap();
    assert_eq!(dht.sim_handle_put_reqs(), 1);
    assert!(dht.holds(&hash.parse().unwrap()));
}

#[test]
fn whole_chain_validates_after_activity() {
    let built = sample_app().build().unwrap();
    let mut instance = built.load().unwrap();
    instance.gen_chain().unwrap();
    instance.call("myZome", "addData", "2").unwrap();
    instance
        .call("myZome", "addPrime", "{\"prime\":13}")
        .unwrap();

    instance.validate_chain(false).unwrap();
    instance.validate_chain(true).unwrap();
}
