//! Wide-table merge of proposals, vote statistics, and model reviews.
//!
//! Left-join semantics keyed on proposal id: every proposal row
//! survives, and slots with no matching row stay `None`. The schema
//! is declared up front in [`MergedRecord`]; model-review columns
//! always carry their variant tag, so naming never depends on join
//! order.

use crate::models::{MergedRecord, MergedTable, ModelReview, Proposal, VoteStats};
use std::collections::HashMap;
use tracing::info;

/// Merge the proposal table with vote statistics and zero, one, or
/// two model-review tables.
pub fn merge(
    proposals: Vec<Proposal>,
    stats: Vec<VoteStats>,
    simple: Option<Vec<ModelReview>>,
    complete: Option<Vec<ModelReview>>,
) -> MergedTable {
    info!(
        "Merging {} proposals with {} vote statistics (simple reviews: {}, complete reviews: {})",
        proposals.len(),
        stats.len(),
        simple.as_ref().map(Vec::len).unwrap_or(0),
        complete.as_ref().map(Vec::len).unwrap_or(0),
    );

    let has_simple = simple.is_some();
    let has_complete = complete.is_some();

    let mut stats_by_id: HashMap<String, VoteStats> = stats
        .into_iter()
        .map(|s| (s.proposal_id.clone(), s))
        .collect();
    let mut simple_by_id = index_reviews(simple);
    let mut complete_by_id = index_reviews(complete);

    let records = proposals
        .into_iter()
        .map(|proposal| MergedRecord {
            stats: stats_by_id.remove(&proposal.id),
            simple: simple_by_id.remove(&proposal.id),
            complete: complete_by_id.remove(&proposal.id),
            human_eval: String::new(),
            proposal,
        })
        .collect();

    MergedTable {
        records,
        has_simple,
        has_complete,
    }
}

fn index_reviews(reviews: Option<Vec<ModelReview>>) -> HashMap<String, ModelReview> {
    reviews
        .unwrap_or_default()
        .into_iter()
        .map(|r| (r.proposal_id.clone(), r))
        .collect()
}
