//! File-per-neuron JSON storage backend.

use super::{NeuronRecord, Storage, StorageError};
use crate::entity::NeuronId;
use std::path::{Path, PathBuf};

/// Flat-directory JSON store: one `<id>.json` per neuron.
///
/// A reference backend for hosts without their own persistence; the format is
/// owned here, not by the engine core.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, id: NeuronId) -> PathBuf {
        self.dir.join(format!("{}.json", id.0))
    }
}

impl Storage for JsonStore {
    fn load(&self, id: NeuronId) -> Result<NeuronRecord, StorageError> {
        let path = self.path(id);
        if !path.exists() {
            return Err(StorageError::NotFound(id));
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
            id,
            reason: e.to_string(),
        })
    }

    fn save(&self, id: NeuronId, record: &NeuronRecord) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(record)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        // Write-then-rename so a crash mid-save never corrupts the record.
        let tmp = self.dir.join(format!("{}.json.tmp", id.0));
        std::fs::write(&tmp, text)?;
        std::fs::rename(tmp, self.path(id))?;
        Ok(())
    }

    fn delete(&self, id: NeuronId) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, id: NeuronId) -> bool {
        self.path(id).exists()
    }
}
