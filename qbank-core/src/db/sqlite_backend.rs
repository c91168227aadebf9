//! SQLite database storage backend
//!
//! This backend stores the catalog in a SQLite database file, providing
//! real multi-statement transactions for the delete+renumber write set and
//! a UNIQUE constraint on `code` as a backstop for the density invariant.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use super::traits::{BackendType, QuestionBackend};
use crate::error::BankError;
use crate::models::{Question, QuestionBank, QuestionMetadata, QuestionSource};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite backend implementation
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Creates a new SQLite backend
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        // WAL for better concurrent access; bounded wait on a busy writer
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )?;

        let backend = Self {
            path,
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        let current_version: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        if current_version == 0 {
            conn.execute_batch(include_str!("schema.sql"))?;
        } else if current_version < SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is outdated, expected {}",
                current_version,
                SCHEMA_VERSION
            );
        }

        Ok(())
    }

    /// Serializes the options list to JSON for storage
    fn options_to_json(options: &[String]) -> Result<String> {
        serde_json::to_string(options).context("Failed to serialize options to JSON")
    }

    /// Deserializes the options list from JSON storage
    fn options_from_json(json: &str) -> Vec<String> {
        serde_json::from_str(json).unwrap_or_default()
    }

    /// Converts a QuestionSource to a string for storage
    fn source_to_str(source: QuestionSource) -> &'static str {
        match source {
            QuestionSource::Manual => "manual",
            QuestionSource::Excel => "excel",
            QuestionSource::Regenerated => "regenerated",
        }
    }

    /// Parses a QuestionSource from a string
    fn str_to_source(s: &str) -> QuestionSource {
        QuestionSource::from_str(s).unwrap_or(QuestionSource::Manual)
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Builds a Question from one result row
    fn question_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Question> {
        let id_str: String = row.get(0)?;
        let code: String = row.get(1)?;
        let question_type: String = row.get(2)?;
        let topic: String = row.get(3)?;
        let question: String = row.get(4)?;
        let answer: String = row.get(5)?;
        let difficulty: String = row.get(6)?;
        let level: String = row.get(7)?;
        let options_json: String = row.get(8)?;
        let explanation: String = row.get(9)?;
        let source_str: String = row.get(10)?;
        let meta_created_at_str: String = row.get(11)?;
        let created_at_str: String = row.get(12)?;
        let updated_at_str: String = row.get(13)?;

        Ok(Question {
            id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
            code,
            question_type,
            topic,
            question,
            answer,
            difficulty,
            level,
            options: Self::options_from_json(&options_json),
            explanation,
            metadata: QuestionMetadata {
                source: Self::str_to_source(&source_str),
                created_at: Self::parse_timestamp(&meta_created_at_str),
            },
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
        })
    }

    /// Load questions from database
    fn load_questions(conn: &Connection) -> Result<Vec<Question>> {
        let mut stmt = conn.prepare(
            "SELECT id, code, question_type, topic, question, answer, difficulty, level,
                    options, explanation, source, meta_created_at, created_at, updated_at
             FROM questions ORDER BY created_at",
        )?;

        let rows = stmt.query_map([], Self::question_from_row)?;

        let mut questions = Vec::new();
        for row_result in rows {
            questions.push(row_result?);
        }

        Ok(questions)
    }

    /// Save a question to the database
    fn save_question(conn: &Connection, q: &Question) -> Result<()> {
        conn.execute(
            "INSERT INTO questions
             (id, code, question_type, topic, question, answer, difficulty, level,
              options, explanation, source, meta_created_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                q.id.to_string(),
                q.code,
                q.question_type,
                q.topic,
                q.question,
                q.answer,
                q.difficulty,
                q.level,
                Self::options_to_json(&q.options)?,
                q.explanation,
                Self::source_to_str(q.metadata.source),
                q.metadata.created_at.to_rfc3339(),
                q.created_at.to_rfc3339(),
                q.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Replaces the stored catalog with the given one inside an open
    /// transaction. The UNIQUE constraint on `code` rejects any snapshot
    /// that would break the density invariant.
    fn write_bank(conn: &Connection, bank: &QuestionBank) -> Result<()> {
        conn.execute("DELETE FROM questions", [])?;
        for q in &bank.questions {
            Self::save_question(conn, q)?;
        }
        Ok(())
    }
}

impl QuestionBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<QuestionBank, BankError> {
        let conn = self.conn.lock().unwrap();
        let questions = Self::load_questions(&conn)?;
        Ok(QuestionBank { questions })
    }

    fn save(&self, bank: &QuestionBank) -> Result<(), BankError> {
        let mut conn = self.conn.lock().unwrap();

        let tx = conn.transaction()?;
        Self::write_bank(&tx, bank)?;
        tx.commit()?;
        Ok(())
    }

    fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut QuestionBank) -> Result<(), BankError>,
    ) -> Result<QuestionBank, BankError> {
        let mut conn = self.conn.lock().unwrap();

        // IMMEDIATE takes the write lock up front, so the count read and
        // the writes derived from it happen against the same state.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut bank = QuestionBank {
            questions: Self::load_questions(&tx)?,
        };

        // A closure error drops the transaction, rolling everything back.
        update_fn(&mut bank)?;

        Self::write_bank(&tx, &bank)?;
        tx.commit()?;

        Ok(bank)
    }

    // Overrides for more efficient single-question operations

    fn find_by_code(&self, code: &str) -> Result<Option<Question>, BankError> {
        let conn = self.conn.lock().unwrap();

        let result = conn
            .query_row(
                "SELECT id, code, question_type, topic, question, answer, difficulty, level,
                        options, explanation, source, meta_created_at, created_at, updated_at
                 FROM questions WHERE code = ?1",
                [code],
                Self::question_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn count(&self) -> Result<usize, BankError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionDraft;
    use tempfile::NamedTempFile;

    fn draft(topic: &str) -> QuestionDraft {
        QuestionDraft {
            question_type: "multiple-choice".into(),
            topic: topic.into(),
            question: format!("A question about {}", topic),
            answer: "C".into(),
            difficulty: "hard".into(),
            level: "advanced".into(),
            options: vec!["A".into(), "B".into(), "C".into()],
            explanation: String::new(),
        }
    }

    #[test]
    fn test_sqlite_backend_create_and_load() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        let bank = backend.load().unwrap();
        assert!(bank.questions.is_empty());
        assert_eq!(backend.count().unwrap(), 0);
    }

    #[test]
    fn test_sqlite_backend_insert_and_find() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        let inserted = backend
            .insert_many(&[draft("a"), draft("b")], QuestionSource::Manual)
            .unwrap();
        assert_eq!(inserted[0].code, "Q-001");
        assert_eq!(inserted[1].code, "Q-002");

        let found = backend.find_by_code("Q-002").unwrap().unwrap();
        assert_eq!(found.topic, "b");
        assert_eq!(found.options, vec!["A", "B", "C"]);
        assert!(backend.find_by_code("Q-003").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_backend_delete_renumbers_in_one_transaction() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        backend
            .insert_many(&[draft("a"), draft("b"), draft("c")], QuestionSource::Manual)
            .unwrap();
        backend.delete_by_code("Q-002").unwrap();

        let bank = backend.load().unwrap();
        assert_eq!(bank.count(), 2);
        assert!(bank.codes_are_dense());
        assert_eq!(bank.get_by_code("Q-002").unwrap().topic, "c");
    }

    #[test]
    fn test_sqlite_backend_update_by_code() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        backend.insert_many(&[draft("a")], QuestionSource::Manual).unwrap();

        let patch = crate::models::QuestionPatch {
            topic: Some("Algebra".into()),
            ..Default::default()
        };
        let updated = backend.update_by_code("Q-001", &patch).unwrap();
        assert_eq!(updated.topic, "Algebra");
        assert_eq!(updated.code, "Q-001");

        let result = backend.update_by_code("Q-042", &patch);
        assert!(matches!(result, Err(BankError::NotFound(_))));
    }

    #[test]
    fn test_sqlite_backend_aborted_update_rolls_back() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        backend
            .insert_many(
                &[draft("a"), draft("b"), draft("c"), draft("d"), draft("e")],
                QuestionSource::Manual,
            )
            .unwrap();

        // Failure injected after the delete and renumber are staged: the
        // transaction must roll back to the 5-question state.
        let result = backend.update_atomically(&mut |bank| {
            bank.remove_by_code("Q-001")?;
            bank.renumber();
            Err(BankError::Storage(anyhow::anyhow!("injected failure")))
        });
        assert!(result.is_err());

        let bank = backend.load().unwrap();
        assert_eq!(bank.count(), 5);
        assert_eq!(bank.get_by_code("Q-001").unwrap().topic, "a");
        assert!(bank.codes_are_dense());
    }

    #[test]
    fn test_sqlite_backend_unique_code_constraint() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        let mut bank = QuestionBank::new();
        bank.insert_drafts(&[draft("a"), draft("b")], QuestionSource::Manual);
        bank.questions[1].code = "Q-001".into();

        let result = backend.save(&bank);
        assert!(result.is_err());

        // The failed save must not have left partial rows behind.
        assert_eq!(backend.count().unwrap(), 0);
    }

    #[test]
    fn test_sqlite_backend_clone_question() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        backend
            .insert_many(&[draft("a"), draft("b")], QuestionSource::Excel)
            .unwrap();

        let clone = backend.clone_question("Q-001").unwrap();
        assert_eq!(clone.code, "Q-003");
        assert_eq!(clone.metadata.source, QuestionSource::Regenerated);

        let stored = backend.find_by_code("Q-003").unwrap().unwrap();
        assert_eq!(stored.topic, "a");
    }
}
