use anyhow::Result;
use inquire::{Confirm, Select, Text};

use qbank_core::QuestionDraft;

/// Prompts for every field of a new question draft
pub fn prompt_new_draft() -> Result<QuestionDraft> {
    let question_type = Select::new(
        "Question type:",
        vec!["multiple-choice", "true-false", "numeric", "free-response"],
    )
    .prompt()?
    .to_string();

    let topic = Text::new("Topic:").prompt()?;
    let question = Text::new("Question text:").prompt()?;

    let options_raw = Text::new("Options (comma-separated):")
        .with_help_message("At least one option is required")
        .prompt()?;
    let options = split_options(&options_raw);

    let answer = Text::new("Answer:").prompt()?;

    let difficulty = Select::new("Difficulty:", vec!["easy", "medium", "hard"])
        .prompt()?
        .to_string();

    let level = Text::new("Level:").prompt()?;

    let explanation = Text::new("Explanation (optional):")
        .with_default("")
        .prompt()?;

    Ok(QuestionDraft {
        question_type,
        topic,
        question,
        answer,
        difficulty,
        level,
        options,
        explanation,
    })
}

/// Asks for confirmation before deleting a question
pub fn confirm_delete(code: &str) -> Result<bool> {
    let confirmed = Confirm::new(&format!(
        "Delete {} and renumber the remaining questions?",
        code
    ))
    .with_default(false)
    .prompt()?;
    Ok(confirmed)
}

/// Splits a comma-separated options string, dropping blank entries
pub fn split_options(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
