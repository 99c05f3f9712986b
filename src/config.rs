//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.propjudge.toml` files.

use crate::models::PromptVariant;
use crate::reviewer::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Review-loop settings.
    #[serde(default)]
    pub review: ReviewConfig,

    /// Default file locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model used for the fast tier.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Model used for the high-quality tier.
    #[serde(default = "default_quality_model")]
    pub quality_model: String,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            fast_model: default_fast_model(),
            quality_model: default_quality_model(),
            temperature: 0.0,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_fast_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_quality_model() -> String {
    "qwen2.5:32b".to_string()
}

fn default_timeout() -> u64 {
    120
}

/// Retry behavior of the review loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Fixed sleep between retry attempts, in seconds.
    #[serde(default = "default_sleep_seconds")]
    pub sleep_seconds: u64,

    /// Maximum attempts per proposal (including the first).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            sleep_seconds: default_sleep_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_sleep_seconds() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    6
}

/// Default file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Proposal table.
    #[serde(default = "default_proposal_file")]
    pub proposal_file: PathBuf,

    /// Raw per-voter vote table.
    #[serde(default = "default_vote_file")]
    pub vote_file: PathBuf,

    /// Directory for review, merged, and analysis outputs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding the prompt template files.
    #[serde(default = "default_prompt_dir")]
    pub prompt_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            proposal_file: default_proposal_file(),
            vote_file: default_vote_file(),
            output_dir: default_output_dir(),
            prompt_dir: default_prompt_dir(),
        }
    }
}

fn default_proposal_file() -> PathBuf {
    PathBuf::from("data/proposals.csv")
}

fn default_vote_file() -> PathBuf {
    PathBuf::from("data/votes.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_prompt_dir() -> PathBuf {
    PathBuf::from("prompts")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".propjudge.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        self.model.ollama_url = args.ollama_url.clone();

        if let Some(sleep) = args.sleep_time {
            self.review.sleep_seconds = sleep;
        }
        if let Some(max_retries) = args.max_retries {
            self.review.max_retries = max_retries;
        }

        if let Some(ref proposal_file) = args.proposal_file {
            self.paths.proposal_file = proposal_file.clone();
        }
        if let Some(ref vote_file) = args.vote_file {
            self.paths.vote_file = vote_file.clone();
        }
        if let Some(ref output_dir) = args.output_dir {
            self.paths.output_dir = output_dir.clone();
        }
    }

    /// Model name for the selected tier.
    pub fn model_name(&self, tier: crate::cli::ModelTier) -> &str {
        match tier {
            crate::cli::ModelTier::Fast => &self.model.fast_model,
            crate::cli::ModelTier::Quality => &self.model.quality_model,
        }
    }

    /// Retry policy for the review loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.review.max_retries,
            sleep: Duration::from_secs(self.review.sleep_seconds),
        }
    }

    /// Prompt template file for a variant.
    pub fn prompt_path(&self, variant: PromptVariant) -> PathBuf {
        let file = match variant {
            PromptVariant::Simple => "simple.txt",
            PromptVariant::Complete => "full.txt",
        };
        self.paths.prompt_dir.join(file)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.review.sleep_seconds, 20);
        assert_eq!(config.review.max_retries, 6);
        assert_eq!(config.model.ollama_url, "http://localhost:11434");
        assert_eq!(config.paths.prompt_dir, PathBuf::from("prompts"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[model]
fast_model = "mistral:7b"
temperature = 0.2

[review]
sleep_seconds = 5
max_retries = 3

[paths]
proposal_file = "in/proposals.csv"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.model.fast_model, "mistral:7b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.review.sleep_seconds, 5);
        assert_eq!(config.review.max_retries, 3);
        assert_eq!(
            config.paths.proposal_file,
            PathBuf::from("in/proposals.csv")
        );
        // Unspecified sections keep their defaults.
        assert_eq!(config.paths.vote_file, PathBuf::from("data/votes.csv"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = Config::default();
        config.review.sleep_seconds = 2;
        config.review.max_retries = 4;

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.sleep, Duration::from_secs(2));
    }

    #[test]
    fn test_prompt_paths_per_variant() {
        let config = Config::default();
        assert_eq!(
            config.prompt_path(PromptVariant::Simple),
            PathBuf::from("prompts/simple.txt")
        );
        assert_eq!(
            config.prompt_path(PromptVariant::Complete),
            PathBuf::from("prompts/full.txt")
        );
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[review]"));
        assert!(toml_str.contains("[paths]"));
    }
}
