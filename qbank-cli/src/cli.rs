use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "A question bank manager with dense sequential codes")]
pub struct Cli {
    /// Path to the question bank file (.yaml or .db); falls back to
    /// QBANK_FILE, then ./qbank.yaml, then the user data directory
    #[clap(long)]
    pub file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new question
    Add {
        /// Question type (e.g., multiple-choice)
        #[clap(long)]
        r#type: Option<String>,

        /// Topic the question belongs to
        #[clap(long)]
        topic: Option<String>,

        /// The question text
        #[clap(long)]
        question: Option<String>,

        /// The expected answer
        #[clap(long)]
        answer: Option<String>,

        /// Difficulty label (e.g., easy, medium, hard)
        #[clap(long)]
        difficulty: Option<String>,

        /// Target level label
        #[clap(long)]
        level: Option<String>,

        /// Answer options (comma-separated)
        #[clap(long)]
        options: Option<String>,

        /// Optional worked explanation
        #[clap(long)]
        explanation: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// Import a batch of question drafts from a JSON file
    Import {
        /// Path to a JSON file holding an array of drafts
        file: PathBuf,

        /// Provenance tag for the imported records (manual, excel, regenerated)
        #[clap(long, default_value = "excel")]
        source: String,
    },

    /// List all questions
    List {
        /// Filter by topic
        #[clap(long)]
        topic: Option<String>,

        /// Filter by difficulty
        #[clap(long)]
        difficulty: Option<String>,
    },

    /// Show details for a specific question
    Show {
        /// The code of the question to show (e.g., Q-001)
        code: String,
    },

    /// Edit content fields of an existing question
    Edit {
        /// The code of the question to edit
        code: String,

        /// New question type
        #[clap(long)]
        r#type: Option<String>,

        /// New topic
        #[clap(long)]
        topic: Option<String>,

        /// New question text
        #[clap(long)]
        question: Option<String>,

        /// New answer
        #[clap(long)]
        answer: Option<String>,

        /// New difficulty label
        #[clap(long)]
        difficulty: Option<String>,

        /// New level label
        #[clap(long)]
        level: Option<String>,

        /// New answer options (comma-separated)
        #[clap(long)]
        options: Option<String>,

        /// New explanation
        #[clap(long)]
        explanation: Option<String>,
    },

    /// Delete a question; surviving questions are renumbered to keep the
    /// code sequence dense
    Del {
        /// The code of the question to delete
        code: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Clone a question onto the end of the catalog with a fresh code
    Clone {
        /// The code of the source question
        code: String,
    },

    /// Print the number of questions in the catalog
    Count,

    /// Export the catalog to JSON
    Export {
        /// Output file path
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Migrate the catalog between YAML and SQLite storage
    Migrate {
        /// Destination file (.yaml or .db)
        #[clap(long)]
        to: PathBuf,
    },
}
