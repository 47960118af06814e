//! Per-block progress record, so an interrupted run can resume.
//!
//! Entries are keyed `<device>/<block>` and are only recorded after the
//! collaborator confirmed the step. Every update rewrites the whole file
//! through a temporary sibling and a rename.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use plcnet_core::InterfaceSection;
use plcnet_xml::Document;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of an encoded document.
pub fn digest(document: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Checkpoint key of a block.
pub fn key(device: &str, block: &str) -> String {
    format!("{device}/{block}")
}

/// What is known about one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Entry {
    /// The encoded document with this digest was imported.
    Imported { digest: String },
    /// The block was materialized from a source; its interface is cached.
    Sourced { sections: Vec<InterfaceSection> },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    entries: BTreeMap<String, Entry>,
}

/// Progress of a generation run, optionally persisted to disk.
#[derive(Debug, Default)]
pub struct Checkpoint {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Entry>,
}

impl Checkpoint {
    /// A checkpoint that is never written.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// An empty checkpoint that overwrites `path` as it fills.
    pub fn fresh(path: impl Into<PathBuf>) -> Self {
        Checkpoint {
            path: Some(path.into()),
            entries: BTreeMap::new(),
        }
    }

    /// Resume from `path`; a missing file is an empty checkpoint.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => {
                let file: CheckpointFile = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                file.entries
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        debug!("checkpoint {}: {} entr(ies)", path.display(), entries.len());
        Ok(Checkpoint {
            path: Some(path),
            entries,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Whether the document with `digest` was already imported under `key`.
    pub fn is_imported(&self, key: &str, digest: &str) -> bool {
        matches!(self.entries.get(key), Some(Entry::Imported { digest: d }) if d == digest)
    }

    pub fn sourced(&self, key: &str) -> Option<&[InterfaceSection]> {
        match self.entries.get(key) {
            Some(Entry::Sourced { sections }) => Some(sections),
            _ => None,
        }
    }

    /// Record `entry` and persist the checkpoint.
    pub fn record(&mut self, key: String, entry: Entry) -> io::Result<()> {
        self.entries.insert(key, entry);
        self.save()
    }

    fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = CheckpointFile {
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, path)
    }
}
