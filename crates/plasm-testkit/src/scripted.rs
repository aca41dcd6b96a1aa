//! A nucleus whose "code" is a table of directives.
//!
//! This stands in for a real script evaluator in tests: expressive enough
//! for commit-and-validate scenarios, with none of an interpreter's weight.
//!
//! Directive format, one per line (`#` comments and blank lines ignored):
//!
//! ```text
//! expose <fn> <string|json> commit <entryType>
//! expose <fn> <string|json> dnahash
//! expose <fn> <string|json> property
//! expose <fn> <string|json> echo
//! validate <entryType> <even|odd|accept|reject|prime <field>>
//! genesis <ok|fail|error <message>>
//! requires <version>
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use plasm_core::Entry;
use plasm_dna::EntryDef;
use plasm_engine::{
    AppContext, ArgType, EngineError, Interface, Nucleus, ValidationProps,
};

/// The registry name of this nucleus flavor.
pub const SCRIPTED_NUCLEUS_TYPE: &str = "scripted";

#[derive(Debug, Clone)]
enum Action {
    Commit(String),
    DnaHash,
    Property,
    Echo,
}

#[derive(Debug, Clone)]
struct ExposedFn {
    name: String,
    arg_type: ArgType,
    action: Action,
}

#[derive(Debug, Clone)]
enum Rule {
    Even,
    Odd,
    Prime(String),
    Accept,
    Reject,
}

#[derive(Debug, Clone)]
enum Genesis {
    Ok,
    Fail,
    Error(String),
}

/// A directive-table evaluator for one zome.
pub struct ScriptedNucleus {
    ctx: Arc<dyn AppContext>,
    exposed: Vec<ExposedFn>,
    rules: HashMap<String, Rule>,
    genesis: Genesis,
    requires: Option<i32>,
}

impl ScriptedNucleus {
    /// Parse the directive table. Unknown directives are syntax errors.
    pub fn parse(ctx: Arc<dyn AppContext>, code: &str) -> Result<Self, EngineError> {
        let mut exposed = Vec::new();
        let mut rules = HashMap::new();
        let mut genesis = Genesis::Ok;
        let mut requires = None;

        for (line_no, line) in code.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |msg: &str| {
                EngineError::Script(format!("line {}: {}", line_no + 1, msg))
            };
            let words: Vec<&str> = line.split_whitespace().collect();
            match words[0] {
                "expose" => {
                    if words.len() < 4 {
                        return Err(err("expose needs: <fn> <argtype> <action>"));
                    }
                    let arg_type = match words[2] {
                        "string" => ArgType::String,
                        "json" => ArgType::Json,
                        other => return Err(err(&format!("unknown arg type: {other}"))),
                    };
                    let action = match words[3] {
                        "commit" => match words.get(4) {
                            Some(entry_type) => Action::Commit(entry_type.to_string()),
                            None => return Err(err("commit needs an entry type")),
                        },
                        "dnahash" => Action::DnaHash,
                        "property" => Action::Property,
                        "echo" => Action::Echo,
                        other => return Err(err(&format!("unknown action: {other}"))),
                    };
                    exposed.push(ExposedFn {
                        name: words[1].to_string(),
                        arg_type,
                        action,
                    });
                }
                "validate" => {
                    if words.len() < 3 {
                        return Err(err("validate needs: <entryType> <rule>"));
                    }
                    let rule = match words[2] {
                        "even" => Rule::Even,
                        "odd" => Rule::Odd,
                        "accept" => Rule::Accept,
                        "reject" => Rule::Reject,
                        "prime" => match words.get(3) {
                            Some(field) => Rule::Prime(field.to_string()),
                            None => return Err(err("prime needs a field name")),
                        },
                        other => return Err(err(&format!("unknown rule: {other}"))),
                    };
                    rules.insert(words[1].to_string(), rule);
                }
                "genesis" => {
                    genesis = match words.get(1) {
                        Some(&"ok") => Genesis::Ok,
                        Some(&"fail") => Genesis::Fail,
                        Some(&"error") => Genesis::Error(words[2..].join(" ")),
                        _ => return Err(err("genesis needs: ok | fail | error <msg>")),
                    };
                }
                "requires" => {
                    let version = words
                        .get(1)
                        .and_then(|w| w.parse().ok())
                        .ok_or_else(|| err("requires needs a version number"))?;
                    requires = Some(version);
                }
                other => return Err(err(&format!("unknown directive: {other}"))),
            }
        }

        Ok(Self {
            ctx,
            exposed,
            rules,
            genesis,
            requires,
        })
    }
}

impl Nucleus for ScriptedNucleus {
    fn chain_requires(&self) -> Result<(), EngineError> {
        if let Some(required) = self.requires {
            if required > self.ctx.sys_version() {
                return Err(EngineError::VersionRequirement { required });
            }
        }
        Ok(())
    }

    fn chain_genesis(&self) -> Result<bool, EngineError> {
        match &self.genesis {
            Genesis::Ok => Ok(true),
            Genesis::Fail => Ok(false),
            Genesis::Error(message) => Err(EngineError::Script(message.clone())),
        }
    }

    fn validate_entry(
        &self,
        def: &EntryDef,
        entry: &Entry,
        _props: &ValidationProps,
    ) -> Result<bool, EngineError> {
        let content = entry.content_string();
        let rule = match self.rules.get(&def.name) {
            Some(rule) => rule,
            None => return Ok(false),
        };
        Ok(match rule {
            Rule::Even => content.trim().parse::<i64>().is_ok_and(|n| n % 2 == 0),
            Rule::Odd => content.trim().parse::<i64>().is_ok_and(|n| n % 2 != 0),
            Rule::Prime(field) => serde_json::from_str::<serde_json::Value>(&content)
                .ok()
                .and_then(|v| v.get(field).and_then(|f| f.as_u64()))
                .is_some_and(is_prime),
            Rule::Accept => true,
            Rule::Reject => false,
        })
    }

    fn call(&self, function: &str, args: &str) -> Result<String, EngineError> {
        let exposed = self
            .exposed
            .iter()
            .find(|f| f.name == function)
            .ok_or_else(|| EngineError::UnknownFunction(function.to_string()))?;

        match &exposed.action {
            Action::Commit(entry_type) => {
                let hash = self.ctx.commit(entry_type, args)?;
                Ok(match exposed.arg_type {
                    // JSON functions return a JSON string value.
                    ArgType::Json => format!("\"{hash}\""),
                    ArgType::String => hash.to_string(),
                })
            }
            Action::DnaHash => Ok(self.ctx.dna_hash().to_string()),
            Action::Property => Ok(self.ctx.property(args)),
            Action::Echo => Ok(args.to_string()),
        }
    }

    fn interfaces(&self) -> Vec<Interface> {
        self.exposed
            .iter()
            .map(|f| Interface {
                name: f.name.clone(),
                arg_type: f.arg_type,
            })
            .collect()
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasm_core::Hash;

    struct StubContext;

    impl AppContext for StubContext {
        fn commit(&self, _entry_type: &str, content: &str) -> Result<Hash, EngineError> {
            let spec = plasm_core::HashSpec::from_name("sha2-256").unwrap();
            Ok(Hash::sum(&spec, content.as_bytes()).unwrap())
        }
        fn dna_hash(&self) -> Hash {
            Hash::null()
        }
        fn agent_hash(&self) -> Hash {
            Hash::null()
        }
        fn agent_name(&self) -> String {
            "stub".into()
        }
        fn node_id(&self) -> String {
            "stub-node".into()
        }
        fn chain_top(&self) -> Hash {
            Hash::null()
        }
        fn property(&self, name: &str) -> String {
            format!("value-of-{name}")
        }
        fn sys_version(&self) -> i32 {
            plasm_engine::SYS_VERSION
        }
    }

    fn nucleus(code: &str) -> ScriptedNucleus {
        ScriptedNucleus::parse(Arc::new(StubContext), code).unwrap()
    }

    fn def(name: &str) -> EntryDef {
        EntryDef::new(name, plasm_dna::DataFormat::String)
    }

    #[test]
    fn test_parse_rejects_unknown_directive() {
        let result = ScriptedNucleus::parse(Arc::new(StubContext), "launch missiles");
        assert!(matches!(result, Err(EngineError::Script(_))));
    }

    #[test]
    fn test_even_odd_rules() {
        let n = nucleus("validate myData even\nvalidate myOdds odd");
        let props = ValidationProps::default();

        assert!(n
            .validate_entry(&def("myData"), &Entry::App("2".into()), &props)
            .unwrap());
        assert!(!n
            .validate_entry(&def("myData"), &Entry::App("5".into()), &props)
            .unwrap());
        assert!(n
            .validate_entry(&def("myOdds"), &Entry::App("7".into()), &props)
            .unwrap());
        assert!(!n
            .validate_entry(&def("myOdds"), &Entry::App("2".into()), &props)
            .unwrap());
        // Types with no rule are invalid.
        assert!(!n
            .validate_entry(&def("stranger"), &Entry::App("1".into()), &props)
            .unwrap());
    }

    #[test]
    fn test_prime_rule() {
        let n = nucleus("validate primes prime prime");
        let props = ValidationProps::default();

        assert!(n
            .validate_entry(&def("primes"), &Entry::App("{\"prime\":7}".into()), &props)
            .unwrap());
        assert!(!n
            .validate_entry(&def("primes"), &Entry::App("{\"prime\":4}".into()), &props)
            .unwrap());
        assert!(!n
            .validate_entry(&def("primes"), &Entry::App("not json".into()), &props)
            .unwrap());
    }

    #[test]
    fn test_call_dispatch() {
        let n = nucleus(
            "expose greet string echo\nexpose getProperty string property",
        );
        assert_eq!(n.call("greet", "hello").unwrap(), "hello");
        assert_eq!(
            n.call("getProperty", "language").unwrap(),
            "value-of-language"
        );
        assert!(matches!(
            n.call("missing", ""),
            Err(EngineError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_json_commit_result_is_quoted() {
        let n = nucleus("expose addPrime json commit primes\nexpose addData string commit myData");
        let json_result = n.call("addPrime", "{\"prime\":7}").unwrap();
        assert!(json_result.starts_with('"') && json_result.ends_with('"'));

        let string_result = n.call("addData", "2").unwrap();
        assert!(!string_result.starts_with('"'));
    }

    #[test]
    fn test_genesis_modes() {
        assert!(nucleus("genesis ok").chain_genesis().unwrap());
        assert!(!nucleus("genesis fail").chain_genesis().unwrap());
        assert!(nucleus("genesis error boom").chain_genesis().is_err());
    }

    #[test]
    fn test_requires_version() {
        assert!(nucleus("requires 1").chain_requires().is_ok());
        let demanding = nucleus("requires 9999");
        assert!(matches!(
            demanding.chain_requires(),
            Err(EngineError::VersionRequirement { required: 9999 })
        ));
    }

    #[test]
    fn test_interfaces() {
        let n = nucleus("expose addData string commit myData\nexpose addPrime json commit primes");
        let interfaces = n.interfaces();
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].name, "addData");
        assert_eq!(interfaces[0].arg_type, ArgType::String);
        assert_eq!(interfaces[1].arg_type, ArgType::Json);
    }

    #[test]
    fn test_is_prime() {
        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(is_prime(2));
        assert!(is_prime(7));
        assert!(!is_prime(9));
        assert!(is_prime(97));
    }
}
