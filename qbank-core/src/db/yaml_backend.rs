//! YAML file storage backend
//!
//! This backend stores the whole catalog in a single YAML file, using the
//! Storage implementation with file locking support.

use std::path::{Path, PathBuf};

use super::traits::{BackendType, QuestionBackend};
use crate::error::BankError;
use crate::models::QuestionBank;
use crate::storage::Storage;

/// YAML file backend implementation
///
/// This wraps the Storage class to implement the QuestionBackend trait. The
/// transaction boundary is the exclusive file lock: the whole
/// load-apply-save cycle runs under it, and the file is only rewritten
/// (via temp file + rename) when the closure succeeds.
pub struct YamlBackend {
    storage: Storage,
    path: PathBuf,
}

impl YamlBackend {
    /// Creates a new YAML backend for the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            storage: Storage::new(&path),
            path,
        }
    }

    /// Gets a reference to the underlying Storage
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl QuestionBackend for YamlBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Yaml
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<QuestionBank, BankError> {
        Ok(self.storage.load()?)
    }

    fn save(&self, bank: &QuestionBank) -> Result<(), BankError> {
        Ok(self.storage.save(bank)?)
    }

    fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut QuestionBank) -> Result<(), BankError>,
    ) -> Result<QuestionBank, BankError> {
        self.storage.update_atomically(update_fn)
    }
}
