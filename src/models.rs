//! Data models for the proposal review pipeline.
//!
//! This module contains all the core data structures used throughout
//! the application for representing proposals, votes, model reviews,
//! and the merged wide table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A committee vote, as cast on a proposal.
///
/// The four literal strings are the only valid values; anything else
/// is an input-format error. `+0` and `-0` both code to integer zero
/// but are distinct vote strings for distribution purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    #[serde(rename = "+1")]
    PlusOne,
    #[serde(rename = "+0")]
    PlusZero,
    #[serde(rename = "-0")]
    MinusZero,
    #[serde(rename = "-1")]
    MinusOne,
}

impl Vote {
    /// The literal vote string as it appears in the vote table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::PlusOne => "+1",
            Vote::PlusZero => "+0",
            Vote::MinusZero => "-0",
            Vote::MinusOne => "-1",
        }
    }

    /// Integer coding used for the numeric summary (mean/std/median).
    pub fn value(&self) -> i32 {
        match self {
            Vote::PlusOne => 1,
            Vote::PlusZero | Vote::MinusZero => 0,
            Vote::MinusOne => -1,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when a vote string is not one of the four literals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid vote string: {0:?} (expected one of +1, +0, -0, -1)")]
pub struct VoteParseError(pub String);

impl FromStr for Vote {
    type Err = VoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+1" => Ok(Vote::PlusOne),
            "+0" => Ok(Vote::PlusZero),
            "-0" => Ok(Vote::MinusZero),
            "-1" => Ok(Vote::MinusOne),
            other => Err(VoteParseError(other.to_string())),
        }
    }
}

/// A conference talk proposal as loaded from the proposal table.
///
/// The identifier is an opaque string and must never be coerced to a
/// number: large numeric ids would silently lose precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub detailed_description: String,
    #[serde(default)]
    pub outline: String,
    #[serde(default)]
    pub objective: String,
}

impl Proposal {
    /// Render the fixed ordered subset of textual fields that is
    /// substituted into the prompt template as `{PROPOSAL_INFO}`.
    pub fn info_block(&self) -> String {
        format!(
            "title: {}\nabstract: {}\ndetailed_description: {}\noutline: {}\nobjective: {}",
            self.title, self.abstract_text, self.detailed_description, self.outline, self.objective
        )
    }
}

/// One row of the raw per-voter vote table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal_id: String,
    pub vote: Vote,
}

/// Per-proposal statistics derived from the raw vote table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteStats {
    pub proposal_id: String,
    /// Most frequent vote string; ties broken lexicographically.
    pub most_common_vote: Vote,
    /// Occurrence count per observed vote string only.
    pub vote_counts: BTreeMap<String, usize>,
    /// Mean of the integer-coded votes.
    pub mean: f64,
    /// Sample standard deviation; `None` when only one vote exists.
    pub std: Option<f64>,
    /// Median of the integer-coded votes.
    pub median: f64,
    /// Number of votes cast on this proposal.
    pub count: usize,
}

/// The structured review a model produces for one proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReview {
    pub summary: String,
    pub comment: String,
    pub vote: Vote,
    pub proposal_id: String,
}

/// Which prompt variant a review run or a joined review table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Simple,
    Complete,
}

impl PromptVariant {
    /// Tag used to suffix this variant's columns in the merged table.
    pub fn tag(&self) -> &'static str {
        match self {
            PromptVariant::Simple => "simple",
            PromptVariant::Complete => "complete",
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One row of the merged wide table: a proposal joined with its vote
/// statistics and zero, one, or two model reviews.
///
/// Left-join semantics: the proposal side is always present, the other
/// slots are `None` when no matching row existed.
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub proposal: Proposal,
    pub stats: Option<VoteStats>,
    pub simple: Option<ModelReview>,
    pub complete: Option<ModelReview>,
    /// Always empty; reserved for later manual annotation.
    pub human_eval: String,
}

/// The merged table plus which review variants were actually joined.
///
/// The flags let the analysis stage tell "this variant was never
/// requested" apart from "requested but no row matched".
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub records: Vec<MergedRecord>,
    pub has_simple: bool,
    pub has_complete: bool,
}

/// A contingency table of model vote against human majority vote,
/// with `All` row and column margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyTable {
    /// Human vote labels, plus a trailing "All" margin column.
    pub columns: Vec<String>,
    /// One row per model vote label, plus a trailing "All" margin row.
    pub rows: Vec<ContingencyRow>,
}

/// One row of a contingency table: a model vote label and its counts
/// per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyRow {
    pub label: String,
    pub counts: Vec<usize>,
}

/// Agreement statistics between one model variant and the human
/// majority vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementReport {
    /// Normalized model-vote distribution, rounded to 3 decimals.
    pub model_distribution: BTreeMap<String, f64>,
    /// Normalized human majority-vote distribution, rounded to 3 decimals.
    pub human_distribution: BTreeMap<String, f64>,
    /// Fraction of rows where the model vote equals the human majority
    /// vote. A null on either side counts as disagreement.
    pub agreement_rate: f64,
    pub contingency: ContingencyTable,
}

/// All per-variant agreement reports produced by one run.
///
/// A `None` slot means that variant was not analyzed (not joined),
/// which is distinct from a present-but-empty report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simple: Option<AgreementReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<AgreementReport>,
}

impl AnalysisResults {
    /// Iterate present reports in insertion order (simple, complete).
    pub fn iter(&self) -> impl Iterator<Item = (PromptVariant, &AgreementReport)> {
        self.simple
            .iter()
            .map(|r| (PromptVariant::Simple, r))
            .chain(self.complete.iter().map(|r| (PromptVariant::Complete, r)))
    }

    /// True when no variant was analyzed at all.
    pub fn is_empty(&self) -> bool {
        self.simple.is_none() && self.complete.is_none()
    }
}

/// Fatal pipeline errors.
///
/// Input-format and retry-exhaustion errors abort the whole run. A
/// missing analysis column is deliberately not in this taxonomy: the
/// analysis stage degrades to a typed absence instead of failing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid vote string {value:?} for proposal {proposal_id}")]
    InvalidVote { proposal_id: String, value: String },

    #[error("max retries ({attempts}) exceeded for proposal {proposal_id}: {reason}")]
    RetriesExhausted {
        proposal_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("model invocation failed for proposal {proposal_id}: {reason}")]
    ModelFailure { proposal_id: String, reason: String },
}
