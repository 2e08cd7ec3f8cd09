//! Durable storage for the ledger
//!
//! The on-disk format is a pretty-printed JSON array of block objects. Every save
//! rewrites the whole file through a temporary sibling that is renamed over the
//! target, so a crash mid-write leaves the previous file intact.

use crate::blockchain::Block;
use crate::error::LedgerError;
use std::io::Write;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Abstraction for persistence backends. `load` returns `Ok(None)` when nothing
/// has been stored yet.
pub trait Persistence: Send + Sync {
    fn load(&self) -> Result<Option<Vec<Block>>, LedgerError>;
    fn save(&self, blocks: &[Block]) -> Result<(), LedgerError>;
    fn describe(&self) -> String;
}

/// JSON file backend.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Prepares the backend, creating the parent directory when needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::Storage(format!(
                        "Failed to create data dir {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl Persistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<Vec<Block>>, LedgerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            LedgerError::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let blocks: Vec<Block> = serde_json::from_str(&raw).map_err(|e| {
            LedgerError::Corruption(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        if blocks.is_empty() {
            return Err(LedgerError::Corruption(format!(
                "{} contains no blocks",
                self.path.display()
            )));
        }
        Ok(Some(blocks))
    }

    fn save(&self, blocks: &[Block]) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(blocks)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize chain: {}", e)))?;

        // Temp file in the same directory so the rename stays on one filesystem.
        let mut temp_file = NamedTempFile::new_in(self.parent_dir())
            .map_err(|e| LedgerError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp_file
            .write_all(json.as_bytes())
            .and_then(|_| temp_file.as_file().sync_all())
            .map_err(|e| LedgerError::Storage(format!("Failed to write temp file: {}", e)))?;
        temp_file.persist(&self.path).map_err(|e| {
            LedgerError::Storage(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
/// Clones share the same storage, which lets tests model several ledger
/// instances over one backing store.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    pub blocks: Arc<Mutex<Option<Vec<Block>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn load(&self) -> Result<Option<Vec<Block>>, LedgerError> {
        Ok(self.blocks.lock().clone())
    }

    fn save(&self, blocks: &[Block]) -> Result<(), LedgerError> {
        *self.blocks.lock() = Some(blocks.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
