//! PropJudge - LLM-assisted review pipeline for conference proposals
//!
//! A CLI tool that runs talk proposals through a local model for
//! structured reviews, merges them with human committee votes, and
//! reports agreement statistics between the two.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input file, connection failure, retry
//!       exhaustion, config error)

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod reviewer;
mod tabular;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Mode};
use config::Config;
use models::{AnalysisResults, PromptVariant, Proposal};
use reviewer::{OllamaBackend, OllamaConfig, ReviewRunner};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("PropJudge v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the pipeline
    match run_pipeline(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Pipeline failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .propjudge.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".propjudge.toml");

    if path.exists() {
        eprintln!("⚠️  .propjudge.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .propjudge.toml")?;

    println!("✅ Created .propjudge.toml with default settings.");
    println!("   Edit it to customize models, retry behavior, and file paths.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// The subscriber is installed exactly once here; every stage logs
/// through it instead of owning handler state of its own.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete pipeline for the selected mode.
async fn run_pipeline(args: Args) -> Result<()> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let date_str = Utc::now().format("%Y%m%d").to_string();
    let output_dir = config.paths.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let mut simple_output: Option<PathBuf> = None;
    let mut complete_output: Option<PathBuf> = None;

    // Step 1: Model reviews, one pass per selected prompt variant
    if matches!(args.mode, Mode::Review | Mode::Full) {
        info!("Running model review");

        let proposals = tabular::load_proposals(&config.paths.proposal_file, args.limit)?;
        let processed = match args.resume {
            Some(ref path) => tabular::load_processed_ids(path)?,
            None => HashSet::new(),
        };
        let model_name = config.model_name(args.model_tier).to_string();

        println!("🤖 Reviewing {} proposals", proposals.len());
        println!("   Model: {}", model_name);
        println!("   Ollama: {}", config.model.ollama_url);

        if args.prompt.includes_simple() {
            let path = output_dir.join(format!(
                "simple_review_{}_{}.csv",
                sanitize_for_filename(&model_name),
                date_str
            ));
            run_review(
                &config,
                &args,
                PromptVariant::Simple,
                &proposals,
                processed.clone(),
                &path,
            )
            .await?;
            simple_output = Some(path);
        }

        if args.prompt.includes_complete() {
            let path = output_dir.join(format!(
                "complete_review_{}_{}.csv",
                sanitize_for_filename(&model_name),
                date_str
            ));
            run_review(
                &config,
                &args,
                PromptVariant::Complete,
                &proposals,
                processed,
                &path,
            )
            .await?;
            complete_output = Some(path);
        }
    }

    // Step 2: Merge and analysis
    if matches!(args.mode, Mode::Merge | Mode::Full) {
        info!("Running data merge and analysis");

        // In merge-only mode the review files come from arguments.
        if args.mode == Mode::Merge {
            simple_output = args.simple_review_file.clone();
            complete_output = args.complete_review_file.clone();
        }

        run_merge_and_analyze(&config, &args, simple_output, complete_output, &date_str)?;
    }

    Ok(())
}

/// Run one review pass: solicit a model review for every proposal and
/// write the accumulated result table.
async fn run_review(
    config: &Config,
    args: &Args,
    variant: PromptVariant,
    proposals: &[Proposal],
    processed: HashSet<String>,
    output_path: &Path,
) -> Result<()> {
    info!(
        "Running {} prompt review with output to {}",
        variant,
        output_path.display()
    );

    let prompt_path = config.prompt_path(variant);
    let template = std::fs::read_to_string(&prompt_path)
        .with_context(|| format!("Failed to read prompt template: {}", prompt_path.display()))?;

    let backend = OllamaBackend::new(OllamaConfig {
        url: config.model.ollama_url.clone(),
        model_name: config.model_name(args.model_tier).to_string(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?;

    let runner = ReviewRunner::new(backend, template, config.retry_policy())
        .with_processed(processed)
        .with_progress(!args.quiet);

    let reviews = runner.run(proposals).await?;
    tabular::write_reviews(output_path, &reviews)?;

    println!(
        "✅ {} reviews ({} prompt) saved to: {}",
        reviews.len(),
        variant,
        output_path.display()
    );
    Ok(())
}

/// Merge proposals, aggregated votes, and review tables; then run the
/// best-effort agreement analysis unless it was skipped.
fn run_merge_and_analyze(
    config: &Config,
    args: &Args,
    simple_path: Option<PathBuf>,
    complete_path: Option<PathBuf>,
    date_str: &str,
) -> Result<()> {
    let proposals = tabular::load_proposals(&config.paths.proposal_file, None)?;
    let votes = tabular::load_votes(&config.paths.vote_file)?;
    let stats = analysis::aggregate_votes(&votes);

    let simple = simple_path
        .as_deref()
        .map(tabular::load_reviews)
        .transpose()?;
    let complete = complete_path
        .as_deref()
        .map(tabular::load_reviews)
        .transpose()?;

    let table = analysis::merge(proposals, stats, simple, complete);

    let merged_path = config
        .paths
        .output_dir
        .join(format!("proposals_with_reviews_{}.csv", date_str));
    tabular::write_merged(&merged_path, &table)?;
    println!("📊 Merged table saved to: {}", merged_path.display());

    if args.no_analyze {
        return Ok(());
    }

    let results = AnalysisResults {
        simple: analysis::analyze(&table, PromptVariant::Simple),
        complete: analysis::analyze(&table, PromptVariant::Complete),
    };

    if results.is_empty() {
        warn!("No review tables were joined; skipping analysis output");
        return Ok(());
    }

    let json_path = config
        .paths
        .output_dir
        .join(format!("vote_analysis_{}.json", date_str));
    let text_path = json_path.with_extension("txt");

    report::write_json_report(&json_path, &results)?;
    report::write_text_report(&text_path, &results)?;

    print!("{}", report::render_text_report(&results));
    println!("\n✅ Analysis results saved to: {}", json_path.display());
    println!("   Analysis report saved to: {}", text_path.display());

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .propjudge.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Make a model name safe to embed in an output filename.
fn sanitize_for_filename(model_name: &str) -> String {
    model_name.replace([':', '/'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_for_filename() {
        assert_eq!(sanitize_for_filename("llama3.2:latest"), "llama3.2-latest");
        assert_eq!(sanitize_for_filename("org/model:tag"), "org-model-tag");
        assert_eq!(sanitize_for_filename("plain"), "plain");
    }
}
