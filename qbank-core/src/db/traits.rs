//! Database abstraction traits
//!
//! This module defines the core trait that all storage backends must
//! implement, including the catalog's public mutating operations.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::BankError;
use crate::models::{Question, QuestionBank, QuestionDraft, QuestionPatch, QuestionSource};

/// Types of database backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// YAML file storage (single file)
    Yaml,
    /// SQLite database storage
    Sqlite,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Yaml => write!(f, "YAML"),
            BackendType::Sqlite => write!(f, "SQLite"),
        }
    }
}

/// Configuration for database backends
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database file
    pub path: PathBuf,
    /// Backend type
    pub backend_type: BackendType,
    /// Whether to enable write-ahead logging (SQLite only)
    pub wal_mode: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("qbank.yaml"),
            backend_type: BackendType::Yaml,
            wal_mode: true,
        }
    }
}

/// Core trait for question storage backends
///
/// `load()` and `save()` move whole catalog snapshots; `update_atomically()`
/// is the transaction boundary every mutation goes through. The catalog
/// operations are provided as default implementations on top of those three,
/// so a backend only has to supply an atomic read-modify-write primitive to
/// get correct insert/update/delete/clone semantics.
pub trait QuestionBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path to the database file
    fn path(&self) -> &std::path::Path;

    /// Loads the entire catalog from the database
    fn load(&self) -> Result<QuestionBank, BankError>;

    /// Saves the entire catalog to the database
    fn save(&self, bank: &QuestionBank) -> Result<(), BankError>;

    /// Performs an atomic read-modify-write against the store
    ///
    /// The closure sees the latest committed catalog. If it returns an
    /// error, or any staged write fails, nothing is applied and the store
    /// is left exactly as it was; on success every staged write is durably
    /// applied together.
    fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut QuestionBank) -> Result<(), BankError>,
    ) -> Result<QuestionBank, BankError>;

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Inserts a batch of drafts, assigning each the next sequential code
    ///
    /// The whole batch is validated up front and persisted atomically;
    /// codes are derived from the committed count inside the transaction
    /// boundary, so concurrent inserts cannot collide.
    fn insert_many(
        &self,
        drafts: &[QuestionDraft],
        source: QuestionSource,
    ) -> Result<Vec<Question>, BankError> {
        if drafts.is_empty() {
            return Err(BankError::Validation(
                "insert requires at least one draft".to_string(),
            ));
        }
        for draft in drafts {
            draft.validate()?;
        }

        let mut inserted = Vec::new();
        self.update_atomically(&mut |bank| {
            inserted = bank.insert_drafts(drafts, source);
            Ok(())
        })?;

        info!(count = inserted.len(), source = %source, "inserted questions");
        Ok(inserted)
    }

    /// Returns all questions; order is unspecified
    fn find_all(&self) -> Result<Vec<Question>, BankError> {
        Ok(self.load()?.questions)
    }

    /// Gets a question by its code
    fn find_by_code(&self, code: &str) -> Result<Option<Question>, BankError> {
        let bank = self.load()?;
        Ok(bank.get_by_code(code).cloned())
    }

    /// Applies a typed content patch to the question with the given code
    ///
    /// The code itself is not reachable through the patch type.
    fn update_by_code(
        &self,
        code: &str,
        patch: &QuestionPatch,
    ) -> Result<Question, BankError> {
        let mut updated = None;
        self.update_atomically(&mut |bank| {
            updated = Some(bank.apply_patch(code, patch)?);
            Ok(())
        })?;

        updated.ok_or_else(|| {
            BankError::Storage(anyhow::anyhow!("update committed without a record"))
        })
    }

    /// Deletes the question with the given code and renumbers the survivors
    /// in the same transaction
    ///
    /// Either the delete and every renumber write land together, or none
    /// do and the caller gets `OperationFailed` with the cause.
    fn delete_by_code(&self, code: &str) -> Result<(), BankError> {
        let result = self.update_atomically(&mut |bank| {
            bank.remove_by_code(code)?;
            let rewritten = bank.renumber();
            debug!(code, rewritten, "renumbered after delete");
            Ok(())
        });

        match result {
            Ok(_) => {
                info!(code, "deleted question");
                Ok(())
            }
            Err(e @ (BankError::NotFound(_) | BankError::Validation(_))) => Err(e),
            Err(e) => Err(BankError::operation_failed(e)),
        }
    }

    /// Clones the question with the given code onto the end of the catalog
    fn clone_question(&self, code: &str) -> Result<Question, BankError> {
        let mut clone = None;
        self.update_atomically(&mut |bank| {
            clone = Some(bank.clone_question(code)?);
            Ok(())
        })?;

        let clone = clone.ok_or_else(|| {
            BankError::Storage(anyhow::anyhow!("clone committed without a record"))
        })?;
        info!(source = code, clone = %clone.code, "cloned question");
        Ok(clone)
    }

    /// Number of questions in the catalog
    fn count(&self) -> Result<usize, BankError> {
        Ok(self.load()?.questions.len())
    }

    // =========================================================================
    // Utility Operations
    // =========================================================================

    /// Returns true if the database file exists
    fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Creates the database with an empty catalog if it doesn't exist
    fn create_if_not_exists(&self) -> Result<(), BankError> {
        if !self.exists() {
            self.save(&QuestionBank::new())?;
        }
        Ok(())
    }

    /// Returns statistics about the database
    fn stats(&self) -> Result<BankStats, BankError> {
        let bank = self.load()?;
        Ok(BankStats {
            question_count: bank.questions.len(),
            backend_type: self.backend_type(),
        })
    }
}

/// Statistics about a database
#[derive(Debug, Clone)]
pub struct BankStats {
    pub question_count: usize,
    pub backend_type: BackendType,
}
