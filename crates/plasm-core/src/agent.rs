//! Agent identity: the keypair that owns an instance's chain.
//!
//! An agent is loaded from two files in the instance directory (or its
//! parent, so several instances can share one identity): `agent.txt` holds
//! the name, `agent.key` the hex-encoded Ed25519 seed.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::crypto::{Keypair, PublicKey};
use crate::error::CoreError;
use crate::hash::{Hash, HashSpec};

/// File holding the agent name.
pub const AGENT_FILE_NAME: &str = "agent.txt";
/// File holding the hex seed of the signing key.
pub const KEY_FILE_NAME: &str = "agent.key";

/// Supported key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "ed25519" => Some(KeyType::Ed25519),
            _ => None,
        }
    }
}

/// The agent identity record committed as the second chain entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEntry {
    pub name: String,
    pub key_type: KeyType,
    /// Marshalled public key bytes.
    pub key: Vec<u8>,
}

/// A node identifier derived from an agent's public key.
///
/// This is the agent's public identity on the network: the sha2-256
/// multihash of the public key bytes, printed base-58.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeId(Hash);

impl NodeId {
    /// Derive from a public key.
    pub fn from_public_key(key: &PublicKey) -> Result<Self, CoreError> {
        let spec = HashSpec::from_name("sha2-256")?;
        Ok(Self(Hash::sum(&spec, key.as_ref())?))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named keypair. Exactly one agent per instance; the private key never
/// leaves this struct.
#[derive(Clone)]
pub struct Agent {
    name: String,
    keypair: Keypair,
}

impl Agent {
    /// Create from an existing keypair.
    pub fn new(name: impl Into<String>, keypair: Keypair) -> Self {
        Self {
            name: name.into(),
            keypair,
        }
    }

    /// Generate a fresh random identity.
    pub fn generate(name: impl Into<String>) -> Self {
        Self::new(name, Keypair::generate())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    pub fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }

    /// The network identity derived from the public key.
    pub fn node_id(&self) -> Result<NodeId, CoreError> {
        NodeId::from_public_key(&self.public_key())
    }

    /// The identity record committed at genesis.
    pub fn entry(&self) -> AgentEntry {
        AgentEntry {
            name: self.name.clone(),
            key_type: self.key_type(),
            key: self.public_key().as_ref().to_vec(),
        }
    }

    /// Load the agent files from a directory.
    pub fn load(dir: &Path) -> Result<Self, CoreError> {
        let name = fs::read_to_string(dir.join(AGENT_FILE_NAME))?
            .trim()
            .to_string();
        let seed_hex = fs::read_to_string(dir.join(KEY_FILE_NAME))?;
        let seed_bytes = hex::decode(seed_hex.trim())
            .map_err(|e| CoreError::InvalidKeyFile(e.to_string()))?;
        let seed: [u8; 32] = seed_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidKeyFile("seed must be 32 bytes".into()))?;
        Ok(Self::new(name, Keypair::from_seed(&seed)))
    }

    /// Load from a directory, falling back to its parent.
    pub fn load_with_fallback(dir: &Path) -> Result<Self, CoreError> {
        match Self::load(dir) {
            Ok(agent) => Ok(agent),
            Err(_) => match dir.parent() {
                Some(parent) => Self::load(parent),
                None => Err(CoreError::InvalidKeyFile("no agent files found".into())),
            },
        }
    }

    /// Write the agent files into a directory.
    pub fn save(&self, dir: &Path) -> Result<(), CoreError> {
        fs::write(dir.join(AGENT_FILE_NAME), &self.name)?;
        fs::write(dir.join(KEY_FILE_NAME), hex::encode(self.keypair.seed()))?;
        Ok(())
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent({}, {:?})", self.name, self.public_key())
    }
}
