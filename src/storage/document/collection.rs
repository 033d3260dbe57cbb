//! Journaled collection
//!
//! An in-memory, `_id`-ordered map of documents whose every change is first
//! appended to a journal file. Opening a collection replays its journal.
//!
//! ## Journal Entry Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Len (4)  │ CRC (4)  │  bincode(JournalEntry)      │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! Integers are little-endian; the CRC32 covers the payload only.
//!
//! Replay stops at the first entry that is cut short or fails its checksum.
//! Everything from there on is discarded and the file is truncated, so
//! later appends follow the last good entry.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Frame header: 4 bytes length + 4 bytes CRC
pub const FRAME_HEADER_SIZE: usize = 8;

/// A document with a primary key
pub trait Document: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &str;
}

#[derive(Debug, Serialize, Deserialize)]
enum JournalEntry<T> {
    Put(T),
    Remove(String),
}

/// Outcome of replaying a journal on open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Entries applied
    pub entries: u64,

    /// Bytes dropped after the last good entry
    pub discarded_bytes: u64,
}

/// A named set of documents persisted through an append-only journal
pub struct Collection<T> {
    name: String,
    path: PathBuf,
    docs: BTreeMap<String, T>,
    journal: File,
    report: ReplayReport,
}

impl<T: Document> Collection<T> {
    /// Open `{dir}/{name}.journal`, replaying it unless `drop_existing` is set, in
    /// which case the collection starts empty
    pub fn open(dir: &Path, name: &str, drop_existing: bool) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.journal", name));

        if drop_existing && path.exists() {
            tracing::info!("Dropping collection {}", name);
            fs::remove_file(&path)?;
        }

        let (docs, report) = if path.exists() {
            Self::replay(&path, name)?
        } else {
            (BTreeMap::new(), ReplayReport::default())
        };

        let journal = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            name: name.to_string(),
            path,
            docs,
            journal,
            report,
        })
    }

    fn replay(path: &Path, name: &str) -> Result<(BTreeMap<String, T>, ReplayReport)> {
        let bytes = fs::read(path)?;
        let mut docs = BTreeMap::new();
        let mut report = ReplayReport::default();
        let mut offset = 0;

        while offset < bytes.len() {
            match decode_frame::<T>(&bytes[offset..]) {
                Ok((entry, consumed)) => {
                    match entry {
                        JournalEntry::Put(doc) => {
                            docs.insert(doc.id().to_string(), doc);
                        }
                        JournalEntry::Remove(id) => {
                            docs.remove(&id);
                        }
                    }
                    offset += consumed;
                    report.entries += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Collection {}: discarding journal tail at offset {}: {}",
                        name,
                        offset,
                        e
                    );
                    break;
                }
            }
        }

        if offset < bytes.len() {
            report.discarded_bytes = (bytes.len() - offset) as u64;
            OpenOptions::new()
                .write(true)
                .open(path)?
                .set_len(offset as u64)?;
        }

        tracing::debug!(
            "Collection {}: replayed {} entries, {} documents",
            name,
            report.entries,
            docs.len()
        );
        Ok((docs, report))
    }

    fn append(&mut self, entry: &JournalEntry<&T>) -> Result<()> {
        let frame = encode_frame(entry)?;
        self.journal.write_all(&frame)?;
        Ok(())
    }

    /// Add a new document; fails if its id is taken
    pub fn insert(&mut self, doc: T) -> Result<()> {
        if self.docs.contains_key(doc.id()) {
            return Err(VaultError::DuplicateKey {
                collection: self.name.clone(),
                key: doc.id().to_string(),
            });
        }
        self.append(&JournalEntry::Put(&doc))?;
        self.docs.insert(doc.id().to_string(), doc);
        Ok(())
    }

    /// Replace an existing document; `false` if its id is unknown
    pub fn replace(&mut self, doc: T) -> Result<bool> {
        if !self.docs.contains_key(doc.id()) {
            return Ok(false);
        }
        self.append(&JournalEntry::Put(&doc))?;
        self.docs.insert(doc.id().to_string(), doc);
        Ok(true)
    }

    /// Remove and return the document with `id`
    pub fn remove(&mut self, id: &str) -> Result<Option<T>> {
        if !self.docs.contains_key(id) {
            return Ok(None);
        }
        self.append(&JournalEntry::Remove(id.to_string()))?;
        Ok(self.docs.remove(id))
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.docs.get(id)
    }

    /// Documents in `_id` order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.docs.values()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What the journal replay on open found
    pub fn replay_report(&self) -> ReplayReport {
        self.report
    }
}

fn encode_frame<E: Serialize>(entry: &E) -> Result<Vec<u8>> {
    let payload =
        bincode::serialize(entry).map_err(|e| VaultError::Serialization(e.to_string()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one frame from the front of `bytes`
///
/// Returns the entry and the number of bytes it occupied.
fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<(JournalEntry<T>, usize)> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(VaultError::JournalCorruption(format!(
            "torn header: {} of {} bytes",
            bytes.len(),
            FRAME_HEADER_SIZE
        )));
    }

    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

    let end = FRAME_HEADER_SIZE + len;
    if bytes.len() < end {
        return Err(VaultError::JournalCorruption(format!(
            "torn payload: {} of {} bytes",
            bytes.len() - FRAME_HEADER_SIZE,
            len
        )));
    }

    let payload = &bytes[FRAME_HEADER_SIZE..end];
    if crc32fast::hash(payload) != crc {
        return Err(VaultError::JournalCorruption("checksum mismatch".to_string()));
    }

    let entry =
        bincode::deserialize(payload).map_err(|e| VaultError::JournalCorruption(e.to_string()))?;
    Ok((entry, end))
}
