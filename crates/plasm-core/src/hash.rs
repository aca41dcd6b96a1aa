//! Multihash-parameterized content digests.
//!
//! Every digest in the system is produced through a [`HashSpec`] so that an
//! application can choose its hash function declaratively. The string form
//! of a hash is base-58 of its multihash bytes; the null hash prints as the
//! empty string.

use std::fmt;
use std::str::FromStr;

use multihash::Multihash;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};

use crate::error::CoreError;

/// Multihash codes for the digest functions we know how to compute.
const SHA2_256: u64 = 0x12;
const SHA2_512: u64 = 0x13;
const BLAKE3: u64 = 0x1e;

/// Spec length meaning "natural digest length for the code".
pub const NATURAL_LENGTH: i32 = -1;

/// Maximum multihash size we ever produce (sha2-512 digest + prefix).
const MAX_HASH_SIZE: usize = 64;

/// Resolve a hash type name to its multihash code.
pub fn hash_type_code(name: &str) -> Result<u64, CoreError> {
    match name {
        "sha2-256" => Ok(SHA2_256),
        "sha2-512" => Ok(SHA2_512),
        "blake3" => Ok(BLAKE3),
        _ => Err(CoreError::UnknownHashType(name.to_string())),
    }
}

/// Parameters for producing digests: a multihash code and a length.
///
/// A length of [`NATURAL_LENGTH`] means the code's full digest length;
/// anything else truncates the digest to that many bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSpec {
    pub code: u64,
    pub length: i32,
}

impl HashSpec {
    /// Spec for a code at its natural length.
    pub fn new(code: u64) -> Self {
        Self {
            code,
            length: NATURAL_LENGTH,
        }
    }

    /// Resolve a hash type name into a spec.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Ok(Self::new(hash_type_code(name)?))
    }
}

/// An opaque digest plus its multihash code.
///
/// Two hashes are equal iff their codes and digest bytes match.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash(Multihash<MAX_HASH_SIZE>);

impl Hash {
    /// Compute the digest of `data` under the given spec.
    pub fn sum(spec: &HashSpec, data: &[u8]) -> Result<Self, CoreError> {
        let full = digest(spec.code, data)?;
        let truncated = if spec.length >= 0 {
            let n = (spec.length as usize).min(full.len());
            &full[..n]
        } else {
            &full[..]
        };
        let mh = Multihash::wrap(spec.code, truncated)
            .map_err(|e| CoreError::InvalidMultihash(e.to_string()))?;
        Ok(Self(mh))
    }

    /// The distinguished null hash (identity code, empty digest).
    pub fn null() -> Self {
        Self(Multihash::wrap(0, &[]).expect("empty identity multihash"))
    }

    /// Whether this is the null hash.
    pub fn is_null(&self) -> bool {
        self.0.code() == 0 && self.0.digest().is_empty()
    }

    /// The multihash code.
    pub fn code(&self) -> u64 {
        self.0.code()
    }

    /// The raw digest bytes (without the multihash prefix).
    pub fn digest(&self) -> &[u8] {
        self.0.digest()
    }

    /// The full multihash bytes (prefix + digest).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// Parse from multihash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mh = Multihash::from_bytes(bytes)
            .map_err(|e| CoreError::InvalidMultihash(e.to_string()))?;
        Ok(Self(mh))
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::null()
    }
}

fn digest(code: u64, data: &[u8]) -> Result<Vec<u8>, CoreError> {
    match code {
        SHA2_256 => Ok(Sha256::digest(data).to_vec()),
        SHA2_512 => Ok(Sha512::digest(data).to_vec()),
        BLAKE3 => Ok(blake3::hash(data).as_bytes().to_vec()),
        _ => Err(CoreError::UnknownHashType(format!("code {:#x}", code))),
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return Ok(());
        }
        write!(f, "{}", bs58::encode(self.to_bytes()).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Hash(null)");
        }
        let s = self.to_string();
        write!(f, "Hash({})", &s[..s.len().min(16)])
    }
}

impl FromStr for Hash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::null());
        }
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CoreError::InvalidMultihash(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_type_codes() {
        assert_eq!(hash_type_code("sha2-256").unwrap(), 0x12);
        assert_eq!(hash_type_code("sha2-512").unwrap(), 0x13);
        assert_eq!(hash_type_code("blake3").unwrap(), 0x1e);
        assert!(matches!(
            hash_type_code("md5"),
            Err(CoreError::UnknownHashType(_))
        ));
    }

    #[test]
    fn test_sum_deterministic() {
        let spec = HashSpec::from_name("sha2-256").unwrap();
        let h1 = Hash::sum(&spec, b"some data").unwrap();
        let h2 = Hash::sum(&spec, b"some data").unwrap();
        assert_eq!(h1, h2);

        let h3 = Hash::sum(&spec, b"other data").unwrap();
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_codes_distinguish() {
        let data = b"same input";
        let a = Hash::sum(&HashSpec::new(SHA2_256), data).unwrap();
        let b = Hash::sum(&HashSpec::new(BLAKE3), data).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncated_length() {
        let spec = HashSpec {
            code: SHA2_256,
            length: 20,
        };
        let h = Hash::sum(&spec, b"x").unwrap();
        assert_eq!(h.digest().len(), 20);
    }

    #[test]
    fn test_null_hash() {
        let null = Hash::null();
        assert!(null.is_null());
        assert_eq!(null.to_string(), "");
        assert_eq!("".parse::<Hash>().unwrap(), null);
    }

    #[test]
    fn test_string_roundtrip() {
        let spec = HashSpec::from_name("sha2-256").unwrap();
        let h = Hash::sum(&spec, b"round trip").unwrap();
        let s = h.to_string();
        assert!(!s.is_empty());
        let back: Hash = s.parse().unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let spec = HashSpec::from_name("blake3").unwrap();
        let h = Hash::sum(&spec, b"bytes").unwrap();
        let back = Hash::from_bytes(&h.to_bytes()).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn test_serde_as_base58_string() {
        let spec = HashSpec::from_name("sha2-256").unwrap();
        let h = Hash::sum(&spec, b"serde").unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
