//! The chain proper: ordered `(header, entry)` pairs plus derived indices.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use plasm_core::{Entry, Hash, HashSpec, Header, Keypair, PublicKey};

use crate::error::ChainError;
use crate::file::{record_len, scan_records, ChainFile};

/// What `Chain::validate` should check beyond the link structure.
#[derive(Debug, Default, Clone)]
pub struct ValidateOptions {
    /// Verify every header signature against this key.
    pub public_key: Option<PublicKey>,
    /// Re-hash every entry against its header's entry link.
    pub entries_too: bool,
}

/// An append-only, hash-linked log owned by a single agent.
///
/// The chain maintains two derived indices: the hash of every header, and
/// the index of the most recent header of each entry type.
pub struct Chain {
    spec: HashSpec,
    headers: Vec<Header>,
    entries: Vec<Entry>,
    hashes: Vec<Hash>,
    tops_by_type: HashMap<String, usize>,
    file: Option<ChainFile>,
}

impl Chain {
    /// A fresh, memory-only chain.
    pub fn new(spec: HashSpec) -> Self {
        Self {
            spec,
            headers: Vec::new(),
            entries: Vec::new(),
            hashes: Vec::new(),
            tops_by_type: HashMap::new(),
            file: None,
        }
    }

    /// Open a chain backed by `path`, replaying any existing records.
    ///
    /// A record that cannot be parsed fails with the offset it began at.
    pub fn open(spec: HashSpec, path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let mut chain = Self::new(spec);

        if path.exists() {
            for (header, entry) in scan_records(path)? {
                chain.push_record(header, entry)?;
            }
        }

        chain.file = Some(ChainFile::open(path)?);
        Ok(chain)
    }

    /// The hash spec all digests in this chain use.
    pub fn spec(&self) -> &HashSpec {
        &self.spec
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Hash of the top header, or null for an empty chain.
    pub fn top_hash(&self) -> Hash {
        self.hashes.last().copied().unwrap_or_else(Hash::null)
    }

    /// The top header, if any.
    pub fn top(&self) -> Option<&Header> {
        self.headers.last()
    }

    /// Hash of the most recent header of the given type, or null.
    pub fn top_of_type(&self, entry_type: &str) -> Hash {
        self.tops_by_type
            .get(entry_type)
            .map(|&i| self.hashes[i])
            .unwrap_or_else(Hash::null)
    }

    /// The record at index `i`.
    pub fn get(&self, i: usize) -> Option<(&Header, &Entry)> {
        Some((self.headers.get(i)?, self.entries.get(i)?))
    }

    pub fn header(&self, i: usize) -> Option<&Header> {
        self.headers.get(i)
    }

    pub fn entry(&self, i: usize) -> Option<&Entry> {
        self.entries.get(i)
    }

    pub fn hash(&self, i: usize) -> Option<Hash> {
        self.hashes.get(i).copied()
    }

    /// Compute the next header for `entry`, signed and linked to the
    /// current top and current top-of-type.
    ///
    /// Returns the serialized record length, the header's hash, and the
    /// header itself. Nothing is committed until [`Chain::add_entry`].
    pub fn prepare_header(
        &self,
        now: i64,
        entry_type: &str,
        entry: &Entry,
        keypair: &Keypair,
    ) -> Result<(usize, Hash, Header), ChainError> {
        let header = Header::new(
            &self.spec,
            now,
            entry_type,
            entry,
            keypair,
            self.top_hash(),
            self.top_of_type(entry_type),
        )?;
        let hash = header.sum(&self.spec)?;
        let len = record_len(&header.encode(), &entry.encode());
        Ok((len, hash, header))
    }

    /// Atomically append a prepared record.
    ///
    /// The record is written to disk first; only if that succeeds is the
    /// in-memory state updated, so a persistence failure leaves the chain
    /// exactly as it was.
    pub fn add_entry(
        &mut self,
        len: usize,
        hash: Hash,
        header: Header,
        entry: Entry,
    ) -> Result<(), ChainError> {
        let header_bytes = header.encode();
        let entry_bytes = entry.encode();
        debug_assert_eq!(len, record_len(&header_bytes, &entry_bytes));

        if let Some(file) = &mut self.file {
            file.append_record(&header_bytes, &entry_bytes)?;
        }

        let index = self.headers.len();
        self.tops_by_type.insert(header.entry_type.clone(), index);
        self.headers.push(header);
        self.entries.push(entry);
        self.hashes.push(hash);
        Ok(())
    }

    /// Iterate records from index 0 upward.
    ///
    /// The visitor receives each header's hash, the header, and the entry
    /// when `with_entries` is set. A visitor error stops the walk.
    pub fn walk<F>(&self, with_entries: bool, mut visitor: F) -> Result<(), ChainError>
    where
        F: FnMut(&Hash, &Header, Option<&Entry>) -> Result<(), ChainError>,
    {
        for i in 0..self.headers.len() {
            let entry = if with_entries {
                Some(&self.entries[i])
            } else {
                None
            };
            visitor(&self.hashes[i], &self.headers[i], entry)?;
        }
        Ok(())
    }

    /// Check the link structure of the whole chain.
    ///
    /// Always checks previous-header and same-type links. Signatures are
    /// only verified when a public key is supplied, and entries are only
    /// re-hashed when `entries_too` is set.
    pub fn validate(&self, opts: &ValidateOptions) -> Result<(), ChainError> {
        let mut last_of_type: HashMap<&str, Hash> = HashMap::new();
        let mut prev = Hash::null();

        for (i, header) in self.headers.iter().enumerate() {
            if header.header_link != prev {
                return Err(ChainError::HeaderLinkMismatch { index: i });
            }

            let expected_type_link = last_of_type
                .get(header.entry_type.as_str())
                .copied()
                .unwrap_or_else(Hash::null);
            if header.type_link != expected_type_link {
                return Err(ChainError::TypeLinkMismatch { index: i });
            }

            if opts.entries_too {
                let entry_hash = self.entries[i].hash(&self.spec)?;
                if header.entry_link != entry_hash {
                    return Err(ChainError::EntryLinkMismatch { index: i });
                }
            }

            if let Some(key) = &opts.public_key {
                header
                    .verify(key)
                    .map_err(|_| ChainError::SignatureInvalid { index: i })?;
            }

            let header_hash = header.sum(&self.spec)?;
            last_of_type.insert(header.entry_type.as_str(), header_hash);
            prev = header_hash;
        }
        Ok(())
    }

    /// Drop the persistence file handle. Required before deleting the file.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Whether a persistence file is attached.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// The persistence path, if attached.
    pub fn path(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|f| f.path().to_path_buf())
    }

    /// Append a replayed record, rebuilding indices. Memory only.
    fn push_record(&mut self, header: Header, entry: Entry) -> Result<(), ChainError> {
        let hash = header.sum(&self.spec)?;
        let index = self.headers.len();
        self.tops_by_type.insert(header.entry_type.clone(), index);
        self.headers.push(header);
        self.entries.push(entry);
        self.hashes.push(hash);
        Ok(())
    }
}
