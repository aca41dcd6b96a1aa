//! Entry: a typed value committed to a chain.
//!
//! The entry's type string is resolved against the application definition
//! by higher layers; this module only knows how to encode an entry to
//! canonical bytes and hash it.

use ciborium::value::Value;

use crate::agent::{AgentEntry, KeyType};
use crate::canonical::{decode_value, encode_value, expect_bytes, expect_int, expect_text, map_get};
use crate::error::CoreError;
use crate::hash::{Hash, HashSpec};

/// Map keys for the canonical entry encoding.
mod keys {
    pub const KIND: u64 = 0;
    pub const BODY: u64 = 1;

    pub const AGENT_NAME: u64 = 0;
    pub const AGENT_KEY_TYPE: u64 = 1;
    pub const AGENT_KEY: u64 = 2;
}

/// Kind tags for the canonical entry encoding.
mod kind {
    pub const APP: u64 = 0;
    pub const DNA: u64 = 1;
    pub const AGENT: u64 = 2;
}

/// A value destined for the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Opaque application content: string, JSON text, or raw script form.
    App(String),
    /// Canonical application-definition bytes (the first chain entry).
    Dna(Vec<u8>),
    /// Agent identity record (the second chain entry).
    Agent(AgentEntry),
}

impl Entry {
    /// Canonical bytes of this entry.
    pub fn encode(&self) -> Vec<u8> {
        let (tag, body) = match self {
            Entry::App(content) => (kind::APP, Value::Text(content.clone())),
            Entry::Dna(bytes) => (kind::DNA, Value::Bytes(bytes.clone())),
            Entry::Agent(agent) => (
                kind::AGENT,
                Value::Map(vec![
                    (
                        Value::Integer(keys::AGENT_NAME.into()),
                        Value::Text(agent.name.clone()),
                    ),
                    (
                        Value::Integer(keys::AGENT_KEY_TYPE.into()),
                        Value::Text(agent.key_type.as_str().to_string()),
                    ),
                    (
                        Value::Integer(keys::AGENT_KEY.into()),
                        Value::Bytes(agent.key.clone()),
                    ),
                ]),
            ),
        };
        let value = Value::Map(vec![
            (Value::Integer(keys::KIND.into()), Value::Integer(tag.into())),
            (Value::Integer(keys::BODY.into()), body),
        ]);
        encode_value(&value)
    }

    /// Decode an entry from canonical bytes. Bitwise round-trip with
    /// [`Entry::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = match &value {
            Value::Map(m) => m,
            _ => return Err(CoreError::MalformedEntry("expected map".into())),
        };

        let tag = expect_int(map_get(map, keys::KIND), "entry kind")? as u64;
        let body = map_get(map, keys::BODY);

        match tag {
            kind::APP => Ok(Entry::App(expect_text(body, "app content")?)),
            kind::DNA => Ok(Entry::Dna(expect_bytes(body, "dna bytes")?)),
            kind::AGENT => {
                let inner = match body {
                    Some(Value::Map(m)) => m,
                    _ => return Err(CoreError::MalformedEntry("agent body".into())),
                };
                let name = expect_text(map_get(inner, keys::AGENT_NAME), "agent name")?;
                let key_type_str =
                    expect_text(map_get(inner, keys::AGENT_KEY_TYPE), "agent key type")?;
                let key_type = KeyType::from_str_name(&key_type_str)
                    .ok_or_else(|| CoreError::MalformedEntry("agent key type".into()))?;
                let key = expect_bytes(map_get(inner, keys::AGENT_KEY), "agent key")?;
                Ok(Entry::Agent(AgentEntry {
                    name,
                    key_type,
                    key,
                }))
            }
            other => Err(CoreError::MalformedEntry(format!(
                "unknown entry kind: {other}"
            ))),
        }
    }

    /// Hash of the canonical bytes under the given spec.
    pub fn hash(&self, spec: &HashSpec) -> Result<Hash, CoreError> {
        Hash::sum(spec, &self.encode())
    }

    /// The application content, if this is an app entry.
    pub fn as_app(&self) -> Option<&str> {
        match self {
            Entry::App(content) => Some(content),
            _ => None,
        }
    }

    /// Human-readable content form, used in validation diagnostics.
    pub fn content_string(&self) -> String {
        match self {
            Entry::App(content) => content.clone(),
            Entry::Dna(bytes) => format!("<dna {} bytes>", bytes.len()),
            Entry::Agent(agent) => format!("<agent {}>", agent.name),
        }
    }
}
