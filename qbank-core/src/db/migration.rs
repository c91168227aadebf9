//! Migration utilities for converting between storage backends
//!
//! This module provides functions to migrate the catalog between YAML and
//! SQLite backends, as well as JSON export and draft import for
//! interoperability.

use anyhow::{Context, Result};
use std::path::Path;

use super::traits::QuestionBackend;
use super::{SqliteBackend, YamlBackend};
use crate::models::{QuestionBank, QuestionDraft};

/// Migrates the catalog from a YAML file to a SQLite database
///
/// Codes travel as-is: the source is a consistent catalog, so its code set
/// stays valid in the destination.
///
/// # Returns
/// The number of questions migrated
pub fn migrate_yaml_to_sqlite<P1: AsRef<Path>, P2: AsRef<Path>>(
    yaml_path: P1,
    sqlite_path: P2,
) -> Result<usize> {
    let yaml_backend = YamlBackend::new(yaml_path);
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;

    let bank = yaml_backend.load().context("Failed to load YAML catalog")?;

    let count = bank.count();

    sqlite_backend
        .save(&bank)
        .context("Failed to save to SQLite database")?;

    Ok(count)
}

/// Migrates the catalog from a SQLite database to a YAML file
///
/// # Returns
/// The number of questions migrated
pub fn migrate_sqlite_to_yaml<P1: AsRef<Path>, P2: AsRef<Path>>(
    sqlite_path: P1,
    yaml_path: P2,
) -> Result<usize> {
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    let yaml_backend = YamlBackend::new(yaml_path);

    let bank = sqlite_backend
        .load()
        .context("Failed to load SQLite catalog")?;

    let count = bank.count();

    yaml_backend
        .save(&bank)
        .context("Failed to save to YAML file")?;

    Ok(count)
}

/// Exports the catalog to a JSON file
pub fn export_to_json<P: AsRef<Path>>(bank: &QuestionBank, json_path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(bank).context("Failed to serialize to JSON")?;

    std::fs::write(json_path, json).context("Failed to write JSON file")?;

    Ok(())
}

/// Imports question drafts from a JSON file
///
/// The file holds content drafts, not full records: codes and identity are
/// assigned by the store at insertion time, never trusted from the file.
pub fn import_drafts_from_json<P: AsRef<Path>>(json_path: P) -> Result<Vec<QuestionDraft>> {
    let json = std::fs::read_to_string(&json_path)
        .with_context(|| format!("Failed to read JSON file: {:?}", json_path.as_ref()))?;

    let drafts: Vec<QuestionDraft> =
        serde_json::from_str(&json).context("Failed to parse JSON drafts")?;

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionSource;
    use tempfile::{NamedTempFile, TempDir};

    fn draft(topic: &str) -> QuestionDraft {
        QuestionDraft {
            question_type: "multiple-choice".into(),
            topic: topic.into(),
            question: format!("A question about {}", topic),
            answer: "A".into(),
            difficulty: "easy".into(),
            level: "primary".into(),
            options: vec!["A".into(), "B".into()],
            explanation: String::new(),
        }
    }

    #[test]
    fn test_yaml_to_sqlite_migration() {
        let temp_dir = TempDir::new().unwrap();
        let yaml_path = temp_dir.path().join("bank.yaml");
        let sqlite_file = NamedTempFile::with_suffix(".db").unwrap();

        let yaml_backend = YamlBackend::new(&yaml_path);
        yaml_backend
            .insert_many(&[draft("a"), draft("b")], QuestionSource::Manual)
            .unwrap();

        let count = migrate_yaml_to_sqlite(&yaml_path, sqlite_file.path()).unwrap();
        assert_eq!(count, 2);

        let sqlite_backend = SqliteBackend::new(sqlite_file.path()).unwrap();
        let bank = sqlite_backend.load().unwrap();
        assert_eq!(bank.count(), 2);
        assert_eq!(bank.get_by_code("Q-002").unwrap().topic, "b");
        assert!(bank.codes_are_dense());
    }

    #[test]
    fn test_sqlite_to_yaml_migration() {
        let temp_dir = TempDir::new().unwrap();
        let sqlite_file = NamedTempFile::with_suffix(".db").unwrap();
        let yaml_path = temp_dir.path().join("bank.yaml");

        let sqlite_backend = SqliteBackend::new(sqlite_file.path()).unwrap();
        sqlite_backend
            .insert_many(&[draft("a")], QuestionSource::Excel)
            .unwrap();

        let count = migrate_sqlite_to_yaml(sqlite_file.path(), &yaml_path).unwrap();
        assert_eq!(count, 1);

        let yaml_backend = YamlBackend::new(&yaml_path);
        let bank = yaml_backend.load().unwrap();
        assert_eq!(bank.get_by_code("Q-001").unwrap().metadata.source, QuestionSource::Excel);
    }

    #[test]
    fn test_json_draft_import() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("drafts.json");

        let drafts = vec![draft("a"), draft("b")];
        std::fs::write(&json_path, serde_json::to_string(&drafts).unwrap()).unwrap();

        let imported = import_drafts_from_json(&json_path).unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[1].topic, "b");
    }

    #[test]
    fn test_json_export() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("export.json");

        let mut bank = QuestionBank::new();
        bank.insert_drafts(&[draft("a")], QuestionSource::Manual);
        export_to_json(&bank, &json_path).unwrap();

        let content = std::fs::read_to_string(&json_path).unwrap();
        assert!(content.contains("Q-001"));
        assert!(content.contains(r#""type": "multiple-choice""#));
    }
}
