//! Header: the signed metadata linking one entry into a chain.
//!
//! A header carries the entry's type, its hash, a link to the previous
//! header, a link to the previous header of the same type, and the agent's
//! signature over the canonical pre-image (everything but the signature).

use ciborium::value::Value;

use crate::canonical::{decode_value, encode_value, expect_bytes, expect_int, expect_text, map_get};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::entry::Entry;
use crate::error::CoreError;
use crate::hash::{Hash, HashSpec};

/// Map keys for the canonical header encoding.
mod keys {
    pub const TIME: u64 = 0;
    pub const TYPE: u64 = 1;
    pub const ENTRY_LINK: u64 = 2;
    pub const HEADER_LINK: u64 = 3;
    pub const TYPE_LINK: u64 = 4;
    pub const SIGNATURE: u64 = 5;
}

/// The metadata record for one chain entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Wall-clock timestamp supplied at creation (Unix milliseconds).
    pub time: i64,
    /// Entry type string.
    pub entry_type: String,
    /// Hash of the entry's canonical bytes.
    pub entry_link: Hash,
    /// Hash of the immediately previous header (null for the first).
    pub header_link: Hash,
    /// Hash of the most recent prior header of the same type (null if none).
    pub type_link: Hash,
    /// Signature over the canonical pre-image.
    pub signature: Signature,
}

impl Header {
    /// Build and sign a header for `entry`.
    ///
    /// `prev` is the hash of the current chain top, `prev_of_type` the hash
    /// of the current top of the same type; both null when absent.
    pub fn new(
        spec: &HashSpec,
        time: i64,
        entry_type: &str,
        entry: &Entry,
        keypair: &Keypair,
        prev: Hash,
        prev_of_type: Hash,
    ) -> Result<Self, CoreError> {
        let entry_link = entry.hash(spec)?;
        let mut header = Self {
            time,
            entry_type: entry_type.to_string(),
            entry_link,
            header_link: prev,
            type_link: prev_of_type,
            signature: Signature::from_bytes([0; 64]),
        };
        header.signature = keypair.sign(&header.preimage());
        Ok(header)
    }

    /// Canonical bytes of the header without its signature.
    ///
    /// This is both the signed message and the hashed content.
    pub fn preimage(&self) -> Vec<u8> {
        encode_value(&self.to_value(false))
    }

    /// Hash of the header content (excluding the signature).
    pub fn sum(&self, spec: &HashSpec) -> Result<Hash, CoreError> {
        Hash::sum(spec, &self.preimage())
    }

    /// Recompute the pre-image and check the signature.
    pub fn verify(&self, public_key: &PublicKey) -> Result<(), CoreError> {
        public_key.verify(&self.preimage(), &self.signature)
    }

    /// Canonical bytes of the full header, signature included.
    pub fn encode(&self) -> Vec<u8> {
        encode_value(&self.to_value(true))
    }

    /// Decode a header from canonical bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_value(bytes)?;
        let map = match &value {
            Value::Map(m) => m,
            _ => return Err(CoreError::MalformedHeader("expected map".into())),
        };

        let time = expect_int(map_get(map, keys::TIME), "time")? as i64;
        let entry_type = expect_text(map_get(map, keys::TYPE), "entry type")?;
        let entry_link = Hash::from_bytes(&expect_bytes(map_get(map, keys::ENTRY_LINK), "entry link")?)?;
        let header_link =
            Hash::from_bytes(&expect_bytes(map_get(map, keys::HEADER_LINK), "header link")?)?;
        let type_link = Hash::from_bytes(&expect_bytes(map_get(map, keys::TYPE_LINK), "type link")?)?;
        let signature =
            Signature::from_slice(&expect_bytes(map_get(map, keys::SIGNATURE), "signature")?)?;

        Ok(Self {
            time,
            entry_type,
            entry_link,
            header_link,
            type_link,
            signature,
        })
    }

    fn to_value(&self, with_signature: bool) -> Value {
        let mut entries = vec![
            (
                Value::Integer(keys::TIME.into()),
                Value::Integer(self.time.into()),
            ),
            (
                Value::Integer(keys::TYPE.into()),
                Value::Text(self.entry_type.clone()),
            ),
            (
                Value::Integer(keys::ENTRY_LINK.into()),
                Value::Bytes(self.entry_link.to_bytes()),
            ),
            (
                Value::Integer(keys::HEADER_LINK.into()),
                Value::Bytes(self.header_link.to_bytes()),
            ),
            (
                Value::Integer(keys::TYPE_LINK.into()),
                Value::Bytes(self.type_link.to_bytes()),
            ),
        ];
        if with_signature {
            entries.push((
                Value::Integer(keys::SIGNATURE.into()),
                Value::Bytes(self.signature.as_ref().to_vec()),
            ));
        }
        Value::Map(entries)
    }
}
