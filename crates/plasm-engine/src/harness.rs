//! The test harness: replay zome-function cases against a reproducible
//! chain state.
//!
//! Each `test/*.json` file in the instance directory is a group of cases.
//! A group runs against a freshly reset and re-gened chain; results roll
//! through `%r1%..%r3%` substitutions; failures accumulate rather than
//! aborting the group.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use plasm_core::Hash;
use plasm_dna::LoggerConfig;

use crate::error::EngineError;
use crate::instance::{Instance, TEST_DIR_NAME};

/// One harness case: call a zome function and check the outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TestData {
    pub zome: String,
    pub fn_name: String,
    pub input: String,
    pub output: String,
    pub err: String,
    pub regexp: String,
}

/// Read all test groups: every `*.json` under `dir`, keyed by file stem.
pub fn load_test_data(dir: &Path) -> Result<BTreeMap<String, Vec<TestData>>, EngineError> {
    let entries = fs::read_dir(dir).map_err(|_| EngineError::MissingFile(dir.to_path_buf()))?;

    let mut groups = BTreeMap::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let text = fs::read_to_string(&path)?;
        let cases: Vec<TestData> = serde_json::from_str(&text)
            .map_err(|e| EngineError::TestFailed(format!("{}: {}", path.display(), e)))?;
        groups.insert(stem.to_string(), cases);
    }

    if groups.is_empty() {
        return Err(EngineError::MissingFile(dir.to_path_buf()));
    }
    Ok(groups)
}

impl Instance {
    /// Run every test group and return the accumulated failures.
    ///
    /// Only meaningful while developing an application; refuses to run on a
    /// chain that already has genesis entries.
    pub fn test(&mut self) -> Vec<EngineError> {
        if self.started() {
            return vec![EngineError::AlreadyStarted];
        }

        let groups = match load_test_data(&self.dir().join(TEST_DIR_NAME)) {
            Ok(groups) => groups,
            Err(e) => return vec![e],
        };

        let loggers = self.config().loggers.clone();
        let mut failures = Vec::new();

        for (name, cases) in groups {
            log_info(&loggers.test_info, &format!("Test: '{}' starting...", name));

            if let Err(e) = self.reset() {
                failures.push(e);
                continue;
            }
            if let Err(e) = self.gen_chain() {
                failures.push(e);
                continue;
            }
            self.spawn_put_handler();

            // Last three results, most recent first.
            let mut last_results: [String; 3] = Default::default();

            for (i, case) in cases.iter().enumerate() {
                let test_id = format!("{}:{}", name, i);
                let r1 = strip_quotes(&last_results[0]).to_string();
                let r2 = strip_quotes(&last_results[1]).to_string();
                let r3 = strip_quotes(&last_results[2]).to_string();

                let input = self.test_string_replacements(&case.input, &r1, &r2, &r3);
                let result = self.call(&case.zome, &case.fn_name, &input);

                last_results[2] = std::mem::take(&mut last_results[1]);
                last_results[1] = std::mem::take(&mut last_results[0]);
                if let Ok(value) = &result {
                    last_results[0] = value.clone();
                }

                match self.check_case(&test_id, case, &result, &r1, &r2, &r3) {
                    Ok(()) => log_info(&loggers.test_passed, "passed! \u{2714}"),
                    Err(msg) => {
                        log_failed(&loggers.test_failed, &msg);
                        failures.push(EngineError::TestFailed(msg));
                    }
                }
            }

            if let Err(e) = self.reset() {
                failures.push(e);
            }
        }

        if failures.is_empty() {
            log_info(&loggers.test_passed, "all tests passed");
        } else {
            log_failed(
                &loggers.test_failed,
                &format!("{} test(s) failed", failures.len()),
            );
        }
        failures
    }

    fn check_case(
        &self,
        test_id: &str,
        case: &TestData,
        result: &Result<String, EngineError>,
        r1: &str,
        r2: &str,
        r3: &str,
    ) -> Result<(), String> {
        if !case.err.is_empty() {
            return match result {
                Err(actual) if actual.to_string() == case.err => Ok(()),
                Err(actual) => Err(format!(
                    "{}: expected error {:?}, got error {:?}",
                    test_id,
                    case.err,
                    actual.to_string()
                )),
                Ok(value) => Err(format!(
                    "{}: expected error {:?}, got result {:?}",
                    test_id, case.err, value
                )),
            };
        }

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                return Err(format!(
                    "{}: expected {:?}, got error {:?}",
                    test_id,
                    case.output,
                    e.to_string()
                ))
            }
        };

        if !case.regexp.is_empty() {
            let pattern = self.test_string_replacements(&case.regexp, r1, r2, r3);
            let re = Regex::new(&pattern)
                .map_err(|e| format!("{}: bad regexp {:?}: {}", test_id, pattern, e))?;
            return if re.is_match(value) {
                Ok(())
            } else {
                Err(format!(
                    "{}: expected match for {:?}, got {:?}",
                    test_id, pattern, value
                ))
            };
        }

        let expected = self.test_string_replacements(&case.output, r1, r2, r3);
        if *value == expected {
            Ok(())
        } else {
            Err(format!(
                "{}: expected {:?}, got {:?}",
                test_id, expected, value
            ))
        }
    }

    /// Apply the harness substitution table to a string.
    pub fn test_string_replacements(&self, input: &str, r1: &str, r2: &str, r3: &str) -> String {
        let core = self.core();
        let top = core
            .chain
            .read()
            .unwrap()
            .top()
            .map(|h| h.entry_link)
            .unwrap_or_else(Hash::null);

        input
            .replace("%h%", &top.to_string())
            .replace("%r1%", r1)
            .replace("%r2%", r2)
            .replace("%r3%", r3)
            .replace("%dna%", &self.dna_hash().to_string())
            .replace("%agent%", &self.agent_hash().to_string())
            .replace("%agentstr%", self.agent().name())
            .replace("%key%", &self.node_id().to_string())
    }
}

/// Strip one layer of surrounding double quotes, as rolled results do.
fn strip_quotes(s: &str) -> &str {
    s.trim_matches('"')
}

fn log_info(logger: &LoggerConfig, message: &str) {
    if logger.enabled {
        tracing::info!(target: "plasm::test", "{message}");
    }
}

fn log_failed(logger: &LoggerConfig, message: &str) {
    if logger.enabled {
        tracing::warn!(target: "plasm::test", "{message}");
    }
}
