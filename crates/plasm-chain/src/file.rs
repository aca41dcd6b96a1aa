//! Flat-file persistence for the chain.
//!
//! Each record is `[u32-le header-len][header][u32-le entry-len][entry]`.
//! The file is append-only and recoverable by a single linear scan; a
//! record that cannot be read in full reports the offset where it began.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use plasm_core::{Entry, Header};

use crate::error::ChainError;

/// An open chain persistence file.
pub struct ChainFile {
    file: File,
    path: PathBuf,
}

impl ChainFile {
    /// Open (or create) the file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// The path this file lives at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single write.
    pub fn append_record(&mut self, header_bytes: &[u8], entry_bytes: &[u8]) -> Result<(), ChainError> {
        let record = frame_record(header_bytes, entry_bytes);
        self.file.write_all(&record)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Frame a record for appending.
pub(crate) fn frame_record(header_bytes: &[u8], entry_bytes: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(8 + header_bytes.len() + entry_bytes.len());
    record.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    record.extend_from_slice(header_bytes);
    record.extend_from_slice(&(entry_bytes.len() as u32).to_le_bytes());
    record.extend_from_slice(entry_bytes);
    record
}

/// The serialized length of one record for the given header and entry.
pub(crate) fn record_len(header_bytes: &[u8], entry_bytes: &[u8]) -> usize {
    8 + header_bytes.len() + entry_bytes.len()
}

/// Read back all records by linear scan until EOF.
pub(crate) fn scan_records(path: &Path) -> Result<Vec<(Header, Entry)>, ChainError> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let mut records = Vec::new();
    let mut pos: usize = 0;
    while pos < data.len() {
        let record_start = pos as u64;
        let (header_bytes, next) = read_block(&data, pos, record_start)?;
        let (entry_bytes, next) = read_block(&data, next, record_start)?;

        let header = Header::decode(header_bytes).map_err(|_| ChainError::Corrupt {
            offset: record_start,
        })?;
        let entry = Entry::decode(entry_bytes).map_err(|_| ChainError::Corrupt {
            offset: record_start,
        })?;

        records.push((header, entry));
        pos = next;
    }
    Ok(records)
}

/// Read one length-prefixed block; corrupt records report the record start.
fn read_block(data: &[u8], pos: usize, record_start: u64) -> Result<(&[u8], usize), ChainError> {
    let corrupt = || ChainError::Corrupt {
        offset: record_start,
    };

    let len_end = pos.checked_add(4).ok_or_else(corrupt)?;
    let len_bytes: [u8; 4] = data
        .get(pos..len_end)
        .ok_or_else(corrupt)?
        .try_into()
        .map_err(|_| corrupt())?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    let end = len_end.checked_add(len).ok_or_else(corrupt)?;
    let block = data.get(len_end..end).ok_or_else(corrupt)?;
    Ok((block, end))
}
