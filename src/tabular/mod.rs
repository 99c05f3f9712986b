//! Tabular file loading and writing.
//!
//! All durable state of the pipeline lives in flat CSV files: the
//! proposal and vote inputs, the per-variant review outputs, and the
//! merged wide table. Identifier columns are always handled as text;
//! coercing them to numbers would lose precision on large ids.

use crate::models::{
    MergedTable, ModelReview, PipelineError, Proposal, VoteRecord, VoteStats,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Load the proposal table, optionally truncating to the first `limit` rows.
pub fn load_proposals(path: &Path, limit: Option<usize>) -> Result<Vec<Proposal>> {
    info!("Loading proposal data from {}", path.display());

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open proposal file: {}", path.display()))?;

    let mut proposals = Vec::new();
    for row in reader.deserialize() {
        let proposal: Proposal = row
            .with_context(|| format!("Failed to parse proposal file: {}", path.display()))?;
        proposals.push(proposal);

        if let Some(limit) = limit {
            if proposals.len() >= limit {
                info!("Limiting to {} proposals", limit);
                break;
            }
        }
    }

    info!("Loaded {} proposals", proposals.len());
    Ok(proposals)
}

/// Raw vote row before the vote string is validated.
#[derive(Debug, Deserialize)]
struct RawVoteRow {
    proposal_id: String,
    vote: String,
}

/// Load the raw per-voter vote table.
///
/// An unparseable vote string is a fatal input-format error, not a
/// recoverable one: the vote table is the source of truth and a bad
/// row means the input file is broken.
pub fn load_votes(path: &Path) -> Result<Vec<VoteRecord>> {
    info!("Loading vote data from {}", path.display());

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open vote file: {}", path.display()))?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let raw: RawVoteRow =
            row.with_context(|| format!("Failed to parse vote file: {}", path.display()))?;
        let vote = raw.vote.parse().map_err(|_| PipelineError::InvalidVote {
            proposal_id: raw.proposal_id.clone(),
            value: raw.vote.clone(),
        })?;
        records.push(VoteRecord {
            proposal_id: raw.proposal_id,
            vote,
        });
    }

    info!("Loaded {} vote records", records.len());
    Ok(records)
}

/// Load a previously written model-review table.
pub fn load_reviews(path: &Path) -> Result<Vec<ModelReview>> {
    info!("Loading model reviews from {}", path.display());

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open review file: {}", path.display()))?;

    let mut reviews = Vec::new();
    for row in reader.deserialize() {
        let review: ModelReview =
            row.with_context(|| format!("Failed to parse review file: {}", path.display()))?;
        reviews.push(review);
    }

    Ok(reviews)
}

/// Collect the proposal ids of an existing review table, for skipping
/// already-processed proposals on a resumed run.
pub fn load_processed_ids(path: &Path) -> Result<HashSet<String>> {
    let reviews = load_reviews(path)?;
    let ids: HashSet<String> = reviews.into_iter().map(|r| r.proposal_id).collect();
    info!("Found {} already processed proposals in {}", ids.len(), path.display());
    Ok(ids)
}

/// Write accumulated model reviews to a CSV file.
///
/// Columns: summary, comment, vote, proposal_id. Re-running overwrites
/// the whole file; reviews are never updated in place.
pub fn write_reviews(path: &Path, reviews: &[ModelReview]) -> Result<()> {
    info!("Saving {} reviews to {}", reviews.len(), path.display());

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create review file: {}", path.display()))?;

    for review in reviews {
        writer.serialize(review)?;
    }
    writer.flush()?;

    info!("Reviews saved to {}", path.display());
    Ok(())
}

/// Column order of the merged wide table.
///
/// Every model-review column carries its variant tag, regardless of
/// how many review tables were joined.
const MERGED_COLUMNS: [&str; 19] = [
    "id",
    "title",
    "abstract",
    "detailed_description",
    "outline",
    "objective",
    "most_common_vote",
    "vote_counts",
    "vote_mean",
    "vote_std",
    "vote_median",
    "vote_count",
    "summary_simple",
    "comment_simple",
    "vote_simple",
    "summary_complete",
    "comment_complete",
    "vote_complete",
    "human_eval",
];

/// Write the merged wide table to a CSV file.
pub fn write_merged(path: &Path, table: &MergedTable) -> Result<()> {
    info!(
        "Saving merged table ({} rows) to {}",
        table.records.len(),
        path.display()
    );

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create merged file: {}", path.display()))?;

    writer.write_record(MERGED_COLUMNS)?;

    for record in &table.records {
        let p = &record.proposal;
        let stats = record.stats.as_ref();
        let simple = record.simple.as_ref();
        let complete = record.complete.as_ref();

        let row: [String; 19] = [
            p.id.clone(),
            p.title.clone(),
            p.abstract_text.clone(),
            p.detailed_description.clone(),
            p.outline.clone(),
            p.objective.clone(),
            stats
                .map(|s| s.most_common_vote.to_string())
                .unwrap_or_default(),
            stats.map(vote_counts_json).transpose()?.unwrap_or_default(),
            stats.map(|s| s.mean.to_string()).unwrap_or_default(),
            stats
                .and_then(|s| s.std)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            stats.map(|s| s.median.to_string()).unwrap_or_default(),
            stats.map(|s| s.count.to_string()).unwrap_or_default(),
            simple.map(|r| r.summary.clone()).unwrap_or_default(),
            simple.map(|r| r.comment.clone()).unwrap_or_default(),
            simple.map(|r| r.vote.to_string()).unwrap_or_default(),
            complete.map(|r| r.summary.clone()).unwrap_or_default(),
            complete.map(|r| r.comment.clone()).unwrap_or_default(),
            complete.map(|r| r.vote.to_string()).unwrap_or_default(),
            record.human_eval.clone(),
        ];
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!("Merged table saved to {}", path.display());
    Ok(())
}

fn vote_counts_json(stats: &VoteStats) -> Result<String> {
    serde_json::to_string(&stats.vote_counts).context("Failed to encode vote counts")
}
