pub mod code;
pub mod db;
pub mod error;
pub mod models;
pub mod storage;

// Re-export commonly used types
pub use code::{code_for, parse_ordinal};
pub use db::{
    create_backend, export_to_json, import_drafts_from_json, migrate_sqlite_to_yaml,
    migrate_yaml_to_sqlite, open_or_create, BackendType, BankStats, DatabaseConfig,
    QuestionBackend, SqliteBackend, YamlBackend,
};
pub use error::BankError;
pub use models::{
    Question, QuestionBank, QuestionDraft, QuestionMetadata, QuestionPatch, QuestionSource,
};
pub use storage::Storage;
