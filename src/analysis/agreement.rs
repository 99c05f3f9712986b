//! Agreement analysis between model votes and human majority votes.
//!
//! The one place the pipeline tolerates missing data: analysis is
//! best-effort, so a variant that was never joined degrades to a
//! typed absence with a logged warning instead of aborting the run.

use crate::models::{
    AgreementReport, ContingencyRow, ContingencyTable, MergedTable, PromptVariant, Vote,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Analyze one model variant's votes against the human majority vote.
///
/// Returns `None` when the variant's review table was not part of the
/// merge; that is distinct from a report over zero matching rows.
pub fn analyze(table: &MergedTable, variant: PromptVariant) -> Option<AgreementReport> {
    let joined = match variant {
        PromptVariant::Simple => table.has_simple,
        PromptVariant::Complete => table.has_complete,
    };
    if !joined {
        warn!(
            "No {} review column in merged table; skipping agreement analysis",
            variant
        );
        return None;
    }

    info!("Analyzing vote agreement for {} prompt variant", variant);

    let pairs: Vec<(Option<Vote>, Option<Vote>)> = table
        .records
        .iter()
        .map(|record| {
            let model_vote = match variant {
                PromptVariant::Simple => record.simple.as_ref().map(|r| r.vote),
                PromptVariant::Complete => record.complete.as_ref().map(|r| r.vote),
            };
            let human_vote = record.stats.as_ref().map(|s| s.most_common_vote);
            (model_vote, human_vote)
        })
        .collect();

    let model_distribution = distribution(pairs.iter().filter_map(|(m, _)| *m));
    let human_distribution = distribution(pairs.iter().filter_map(|(_, h)| *h));
    let agreement_rate = agreement_rate(&pairs);
    let contingency = contingency(&pairs);

    Some(AgreementReport {
        model_distribution,
        human_distribution,
        agreement_rate,
        contingency,
    })
}

/// Normalized frequency distribution over the non-null votes, rounded
/// to 3 decimals.
fn distribution(votes: impl Iterator<Item = Vote>) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0usize;
    for vote in votes {
        *counts.entry(vote.to_string()).or_default() += 1;
        total += 1;
    }

    counts
        .into_iter()
        .map(|(vote, count)| (vote, round3(count as f64 / total as f64)))
        .collect()
}

/// Mean over all rows of (model vote == human vote); a null on either
/// side counts as disagreement. Zero rows yield a rate of 0.0.
fn agreement_rate(pairs: &[(Option<Vote>, Option<Vote>)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }

    let agreeing = pairs
        .iter()
        .filter(|(model, human)| matches!((model, human), (Some(m), Some(h)) if m == h))
        .count();
    agreeing as f64 / pairs.len() as f64
}

/// Contingency table over rows where both votes are present, with
/// `All` margins on both axes. Labels are sorted lexicographically.
fn contingency(pairs: &[(Option<Vote>, Option<Vote>)]) -> ContingencyTable {
    let mut cells: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    let mut human_labels: Vec<String> = Vec::new();

    for (model, human) in pairs {
        let (Some(model), Some(human)) = (model, human) else {
            continue;
        };
        *cells
            .entry(model.to_string())
            .or_default()
            .entry(human.to_string())
            .or_default() += 1;
        if !human_labels.contains(&human.to_string()) {
            human_labels.push(human.to_string());
        }
    }
    human_labels.sort();

    let mut columns = human_labels.clone();
    columns.push("All".to_string());

    let mut rows = Vec::new();
    let mut column_totals = vec![0usize; human_labels.len()];
    for (model_label, row_cells) in &cells {
        let mut counts: Vec<usize> = human_labels
            .iter()
            .map(|h| row_cells.get(h).copied().unwrap_or(0))
            .collect();
        for (i, &c) in counts.iter().enumerate() {
            column_totals[i] += c;
        }
        counts.push(counts.iter().sum());
        rows.push(ContingencyRow {
            label: model_label.clone(),
            counts,
        });
    }

    let grand_total: usize = column_totals.iter().sum();
    let mut all_counts = column_totals;
    all_counts.push(grand_total);
    rows.push(ContingencyRow {
        label: "All".to_string(),
        counts: all_counts,
    });

    ContingencyTable { columns, rows }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
