mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};

use qbank_core::{
    export_to_json, import_drafts_from_json, migrate_sqlite_to_yaml, migrate_yaml_to_sqlite,
    open_or_create, parse_ordinal, Question, QuestionBackend, QuestionDraft, QuestionPatch,
    QuestionSource,
};

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let bank_path = determine_bank_path(cli.file.clone())?;

    if let Command::Migrate { to } = &cli.command {
        return migrate_catalog(&bank_path, to);
    }

    let backend = open_or_create(&bank_path, None)?;

    match &cli.command {
        Command::Add {
            r#type,
            topic,
            question,
            answer,
            difficulty,
            level,
            options,
            explanation,
            interactive,
        } => {
            // Default to interactive mode if no specific arguments are provided
            let should_be_interactive = *interactive
                || (r#type.is_none()
                    && topic.is_none()
                    && question.is_none()
                    && answer.is_none()
                    && difficulty.is_none()
                    && level.is_none()
                    && options.is_none()
                    && explanation.is_none());

            if should_be_interactive {
                add_question_interactive(backend.as_ref())?;
            } else {
                add_question_cli(
                    backend.as_ref(),
                    r#type,
                    topic,
                    question,
                    answer,
                    difficulty,
                    level,
                    options,
                    explanation,
                )?;
            }
        }
        Command::Import { file, source } => {
            import_questions(backend.as_ref(), file, source)?;
        }
        Command::List { topic, difficulty } => {
            list_questions(backend.as_ref(), topic, difficulty)?;
        }
        Command::Show { code } => {
            show_question(backend.as_ref(), code)?;
        }
        Command::Edit {
            code,
            r#type,
            topic,
            question,
            answer,
            difficulty,
            level,
            options,
            explanation,
        } => {
            edit_question(
                backend.as_ref(),
                code,
                r#type,
                topic,
                question,
                answer,
                difficulty,
                level,
                options,
                explanation,
            )?;
        }
        Command::Del { code, yes } => {
            delete_question(backend.as_ref(), code, *yes)?;
        }
        Command::Clone { code } => {
            clone_question(backend.as_ref(), code)?;
        }
        Command::Count => {
            println!("{}", backend.count()?);
        }
        Command::Export { output } => {
            export_questions(backend.as_ref(), output.as_deref())?;
        }
        Command::Migrate { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("QBANK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Determines the question bank file to use
fn determine_bank_path(file_option: Option<PathBuf>) -> Result<PathBuf> {
    // Priority 1: Use the command line option if provided
    if let Some(path) = file_option {
        return Ok(path);
    }

    // Priority 2: Use the QBANK_FILE environment variable if set
    if let Ok(env_path) = env::var("QBANK_FILE") {
        return Ok(PathBuf::from(env_path));
    }

    // Priority 3: A catalog in the current directory
    let local = PathBuf::from("qbank.yaml");
    if local.exists() {
        return Ok(local);
    }

    // Priority 4: The default location under the user data directory
    let data_dir = dirs::data_dir().context("Could not determine user data directory")?;
    Ok(data_dir.join("qbank").join("qbank.yaml"))
}

fn add_question_interactive(backend: &dyn QuestionBackend) -> Result<()> {
    let draft = prompts::prompt_new_draft()?;
    let inserted = backend.insert_many(&[draft], QuestionSource::Manual)?;

    println!("{}", "Question added successfully!".green());
    println!("Code: {}", inserted[0].code.green());

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn add_question_cli(
    backend: &dyn QuestionBackend,
    type_str: &Option<String>,
    topic: &Option<String>,
    question: &Option<String>,
    answer: &Option<String>,
    difficulty: &Option<String>,
    level: &Option<String>,
    options_str: &Option<String>,
    explanation: &Option<String>,
) -> Result<()> {
    let required = |value: &Option<String>, flag: &str| -> Result<String> {
        match value {
            Some(v) => Ok(v.clone()),
            None => anyhow::bail!("{} is required. Use --{} to specify it.", flag, flag),
        }
    };

    let draft = QuestionDraft {
        question_type: required(type_str, "type")?,
        topic: required(topic, "topic")?,
        question: required(question, "question")?,
        answer: required(answer, "answer")?,
        difficulty: required(difficulty, "difficulty")?,
        level: required(level, "level")?,
        options: prompts::split_options(options_str.as_deref().unwrap_or("")),
        explanation: explanation.clone().unwrap_or_default(),
    };

    let inserted = backend.insert_many(&[draft], QuestionSource::Manual)?;

    println!("{}", "Question added successfully!".green());
    println!("Code: {}", inserted[0].code.green());

    Ok(())
}

fn import_questions(backend: &dyn QuestionBackend, file: &Path, source_str: &str) -> Result<()> {
    let source = QuestionSource::from_str(source_str).with_context(|| {
        format!(
            "Unknown provenance tag '{}' (expected manual, excel, or regenerated)",
            source_str
        )
    })?;

    let drafts = import_drafts_from_json(file)?;
    let inserted = backend.insert_many(&drafts, source)?;

    println!(
        "{} {} questions ({} .. {})",
        "Imported".green(),
        inserted.len(),
        inserted.first().map(|q| q.code.as_str()).unwrap_or("-"),
        inserted.last().map(|q| q.code.as_str()).unwrap_or("-"),
    );

    Ok(())
}

fn list_questions(
    backend: &dyn QuestionBackend,
    topic_filter: &Option<String>,
    difficulty_filter: &Option<String>,
) -> Result<()> {
    let mut questions = backend.find_all()?;

    if let Some(topic) = topic_filter {
        questions.retain(|q| q.topic.eq_ignore_ascii_case(topic));
    }
    if let Some(difficulty) = difficulty_filter {
        questions.retain(|q| q.difficulty.eq_ignore_ascii_case(difficulty));
    }

    if questions.is_empty() {
        println!("No questions found.");
        return Ok(());
    }

    // Codes make a natural display order even though the store contract
    // leaves ordering unspecified.
    questions.sort_by_key(|q| parse_ordinal(&q.code));

    for q in &questions {
        println!(
            "{}  [{}/{}] {} - {}",
            q.code.green(),
            q.difficulty,
            q.level,
            q.topic.bold(),
            truncate(&q.question, 60),
        );
    }
    println!("\n{} question(s)", questions.len());

    Ok(())
}

fn show_question(backend: &dyn QuestionBackend, code: &str) -> Result<()> {
    let question = find_required(backend, code)?;

    println!("{}: {}", "Code".bold(), question.code.green());
    println!("{}: {}", "Type".bold(), question.question_type);
    println!("{}: {}", "Topic".bold(), question.topic);
    println!("{}: {}", "Difficulty".bold(), question.difficulty);
    println!("{}: {}", "Level".bold(), question.level);
    println!("{}: {}", "Question".bold(), question.question);
    println!("{}:", "Options".bold());
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
    println!("{}: {}", "Answer".bold(), question.answer);
    if !question.explanation.is_empty() {
        println!("{}: {}", "Explanation".bold(), question.explanation);
    }
    println!("{}: {}", "Source".bold(), question.metadata.source);
    println!("{}: {}", "Created".bold(), question.created_at.to_rfc3339());
    println!("{}: {}", "Updated".bold(), question.updated_at.to_rfc3339());

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn edit_question(
    backend: &dyn QuestionBackend,
    code: &str,
    type_str: &Option<String>,
    topic: &Option<String>,
    question: &Option<String>,
    answer: &Option<String>,
    difficulty: &Option<String>,
    level: &Option<String>,
    options_str: &Option<String>,
    explanation: &Option<String>,
) -> Result<()> {
    let patch = QuestionPatch {
        question_type: type_str.clone(),
        topic: topic.clone(),
        question: question.clone(),
        answer: answer.clone(),
        difficulty: difficulty.clone(),
        level: level.clone(),
        options: options_str.as_deref().map(prompts::split_options),
        explanation: explanation.clone(),
    };

    if patch.is_empty() {
        anyhow::bail!("Nothing to edit. Pass at least one field flag, e.g. --topic.");
    }

    let updated = backend.update_by_code(code, &patch)?;

    println!("{}", "Question updated successfully!".green());
    println!("Code: {}", updated.code.green());

    Ok(())
}

fn delete_question(backend: &dyn QuestionBackend, code: &str, yes: bool) -> Result<()> {
    // Resolve first so a typo'd code fails before the confirmation prompt.
    find_required(backend, code)?;

    if !yes && !prompts::confirm_delete(code)? {
        println!("Aborted.");
        return Ok(());
    }

    backend.delete_by_code(code)?;

    let remaining = backend.count()?;
    println!("{} {}", "Deleted".green(), code);
    println!("{} question(s) remain, codes renumbered to stay dense", remaining);

    Ok(())
}

fn clone_question(backend: &dyn QuestionBackend, code: &str) -> Result<()> {
    let clone = backend.clone_question(code)?;

    println!("{}", "Question cloned successfully!".green());
    println!("New code: {}", clone.code.green());

    Ok(())
}

fn export_questions(backend: &dyn QuestionBackend, output: Option<&Path>) -> Result<()> {
    let bank = backend.load()?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("qbank-export.json"));

    export_to_json(&bank, &output)?;

    println!("Exported {} question(s) to {:?}", bank.count(), output);

    Ok(())
}

fn migrate_catalog(from: &Path, to: &Path) -> Result<()> {
    let count = match (extension_of(from), extension_of(to)) {
        (Extension::Yaml, Extension::Sqlite) => migrate_yaml_to_sqlite(from, to)?,
        (Extension::Sqlite, Extension::Yaml) => migrate_sqlite_to_yaml(from, to)?,
        _ => anyhow::bail!(
            "Migration requires one YAML (.yaml/.yml) and one SQLite (.db/.sqlite/.sqlite3) path"
        ),
    };

    println!("Migrated {} question(s) from {:?} to {:?}", count, from, to);

    Ok(())
}

enum Extension {
    Yaml,
    Sqlite,
    Other,
}

fn extension_of(path: &Path) -> Extension {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => Extension::Yaml,
        Some("db") | Some("sqlite") | Some("sqlite3") => Extension::Sqlite,
        _ => Extension::Other,
    }
}

fn find_required(backend: &dyn QuestionBackend, code: &str) -> Result<Question> {
    backend
        .find_by_code(code)?
        .with_context(|| format!("No question with code {}", code))
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
