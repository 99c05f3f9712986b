//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// PropJudge - LLM-assisted review pipeline for conference proposals
///
/// Runs talk proposals through a local model for structured reviews,
/// merges them with human committee votes, and reports how well the
/// two agree.
///
/// Examples:
///   propjudge --mode review --prompt simple
///   propjudge --mode full --prompt both --model-tier quality
///   propjudge --mode merge --prompt simple --simple-review-file out/simple.csv
///   propjudge --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Operation mode: review (model reviews only), merge (merge and
    /// analyze only), or full (both)
    #[arg(long, value_enum, default_value_t = Mode::Full)]
    pub mode: Mode,

    /// Prompt variant(s) to run: simple, full, or both
    #[arg(long, value_enum, default_value_t = PromptKind::Full)]
    pub prompt: PromptKind,

    /// Model tier to use for reviews
    #[arg(long, value_enum, default_value_t = ModelTier::Fast)]
    pub model_tier: ModelTier,

    /// Ollama API endpoint URL
    #[arg(long, default_value = "http://localhost:11434", env = "OLLAMA_URL")]
    pub ollama_url: String,

    /// Proposal file path (default: from config)
    #[arg(long, value_name = "FILE")]
    pub proposal_file: Option<PathBuf>,

    /// Human vote file path (default: from config)
    #[arg(long, value_name = "FILE")]
    pub vote_file: Option<PathBuf>,

    /// Output directory (default: from config)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Simple-prompt review file (required for merge mode with the
    /// simple or both prompt selection)
    #[arg(long, value_name = "FILE")]
    pub simple_review_file: Option<PathBuf>,

    /// Complete-prompt review file (required for merge mode with the
    /// full or both prompt selection)
    #[arg(long, value_name = "FILE")]
    pub complete_review_file: Option<PathBuf>,

    /// Sleep time between retry attempts, in seconds
    #[arg(long, value_name = "SECS")]
    pub sleep_time: Option<u64>,

    /// Maximum attempts per proposal (including the first)
    #[arg(long, value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Limit the number of proposals to process
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Skip proposals already present in this review file
    #[arg(long, value_name = "FILE")]
    pub resume: Option<PathBuf>,

    /// Skip vote distribution analysis
    #[arg(long)]
    pub no_analyze: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .propjudge.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Generate a default .propjudge.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Operation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Run model reviews only
    Review,
    /// Merge and analyze existing review files only
    Merge,
    /// Reviews, then merge and analysis
    Full,
}

/// Prompt variant selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PromptKind {
    /// Short prompt with only abstract-level guidance
    Simple,
    /// Complete reviewing rubric
    Full,
    /// Run both variants
    Both,
}

impl PromptKind {
    pub fn includes_simple(&self) -> bool {
        matches!(self, PromptKind::Simple | PromptKind::Both)
    }

    pub fn includes_complete(&self) -> bool {
        matches!(self, PromptKind::Full | PromptKind::Both)
    }
}

/// Model tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelTier {
    /// Fast, cheaper model
    Fast,
    /// Slower, high-quality model
    Quality,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if !self.ollama_url.starts_with("http://") && !self.ollama_url.starts_with("https://") {
            return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(max_retries) = self.max_retries {
            if max_retries == 0 {
                return Err("Max retries must be at least 1".to_string());
            }
        }

        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err("Limit must be at least 1".to_string());
            }
        }

        if let Some(ref resume) = self.resume {
            if !resume.exists() {
                return Err(format!("Resume file does not exist: {}", resume.display()));
            }
        }

        // In merge-only mode review files are not produced by this run,
        // so the selected variants must be supplied explicitly.
        if self.mode == Mode::Merge {
            if self.prompt.includes_simple() && self.simple_review_file.is_none() {
                return Err(
                    "Merge mode with the simple prompt requires --simple-review-file".to_string(),
                );
            }
            if self.prompt.includes_complete() && self.complete_review_file.is_none() {
                return Err(
                    "Merge mode with the full prompt requires --complete-review-file".to_string(),
                );
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
