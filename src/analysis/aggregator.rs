//! Vote aggregation and statistics.
//!
//! This module reduces the raw per-voter vote table into one
//! statistics row per proposal.

use crate::models::{Vote, VoteRecord, VoteStats};
use std::collections::BTreeMap;
use tracing::info;

/// Aggregate raw vote records into exactly one [`VoteStats`] per
/// distinct proposal id, ordered by proposal id.
pub fn aggregate_votes(records: &[VoteRecord]) -> Vec<VoteStats> {
    info!("Calculating vote statistics for {} records", records.len());

    let mut groups: BTreeMap<&str, Vec<Vote>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.proposal_id.as_str())
            .or_default()
            .push(record.vote);
    }

    groups
        .into_iter()
        .map(|(proposal_id, votes)| stats_for_group(proposal_id, &votes))
        .collect()
}

fn stats_for_group(proposal_id: &str, votes: &[Vote]) -> VoteStats {
    let vote_counts = count_votes(votes);
    let values: Vec<i32> = votes.iter().map(Vote::value).collect();
    let count = values.len();
    let mean = values.iter().sum::<i32>() as f64 / count as f64;

    VoteStats {
        proposal_id: proposal_id.to_string(),
        most_common_vote: most_common(&vote_counts),
        vote_counts,
        mean,
        std: sample_std(&values, mean),
        median: median(&values),
        count,
    }
}

/// Occurrence count per vote string, covering observed strings only.
fn count_votes(votes: &[Vote]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for vote in votes {
        *counts.entry(vote.to_string()).or_default() += 1;
    }
    counts
}

/// Most frequent vote string. Ties are broken lexicographically
/// among the tied strings, so the result is stable across runs.
fn most_common(counts: &BTreeMap<String, usize>) -> Vote {
    let mut best: Option<(&str, usize)> = None;
    for (vote, &count) in counts {
        // BTreeMap iterates in lexicographic order, so a strictly
        // greater count is required to displace an earlier candidate.
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((vote, count));
        }
    }

    // Groups are built from at least one record, and keys come from
    // parsed votes, so both steps are infallible here.
    best.and_then(|(vote, _)| vote.parse().ok())
        .unwrap_or(Vote::PlusZero)
}

/// Sample standard deviation (n - 1 denominator); undefined for a
/// single vote.
fn sample_std(values: &[i32], mean: f64) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let sum_sq: f64 = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum();
    Some((sum_sq / (n - 1) as f64).sqrt())
}

fn median(values: &[i32]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(proposal_id: &str, vote: &str) -> VoteRecord {
        VoteRecord {
            proposal_id: proposal_id.to_string(),
            vote: vote.parse().unwrap(),
        }
    }

    #[test]
    fn test_one_stats_row_per_proposal() {
        let records = vec![
            record("1", "+1"),
            record("2", "-1"),
            record("1", "+0"),
            record("3", "+1"),
            record("2", "-0"),
        ];

        let stats = aggregate_votes(&records);

        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].proposal_id, "1");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[1].count, 2);
        assert_eq!(stats[2].count, 1);
    }

    #[test]
    fn test_majority_vote_scenario() {
        let records = vec![record("1", "+1"), record("1", "+1"), record("1", "-1")];

        let stats = aggregate_votes(&records);

        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!(s.most_common_vote, Vote::PlusOne);
        assert_eq!(s.vote_counts.get("+1"), Some(&2));
        assert_eq!(s.vote_counts.get("-1"), Some(&1));
        assert_eq!(s.vote_counts.len(), 2);
        assert!((s.mean - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.count, 3);
        assert_eq!(s.median, 1.0);
    }

    #[test]
    fn test_mode_tie_breaks_lexicographically() {
        // "+1" and "-1" tie at two each; "+1" sorts first.
        let records = vec![
            record("1", "-1"),
            record("1", "+1"),
            record("1", "-1"),
            record("1", "+1"),
        ];

        let stats = aggregate_votes(&records);
        assert_eq!(stats[0].most_common_vote, Vote::PlusOne);
    }

    #[test]
    fn test_single_vote_has_no_std() {
        let records = vec![record("1", "+1")];

        let stats = aggregate_votes(&records);

        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].std, None);
        assert_eq!(stats[0].mean, 1.0);
        assert_eq!(stats[0].median, 1.0);
    }

    #[test]
    fn test_sample_std_matches_hand_computation() {
        // Values 1, 1, -1: mean 1/3, sample variance 4/3.
        let records = vec![record("1", "+1"), record("1", "+1"), record("1", "-1")];

        let stats = aggregate_votes(&records);
        let std = stats[0].std.unwrap();
        assert!((std - (4.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_median_even_count() {
        let records = vec![
            record("1", "-1"),
            record("1", "+0"),
            record("1", "+1"),
            record("1", "+1"),
        ];

        let stats = aggregate_votes(&records);
        // Sorted values -1, 0, 1, 1 -> median 0.5.
        assert_eq!(stats[0].median, 0.5);
    }

    #[test]
    fn test_plus_zero_and_minus_zero_counted_separately() {
        let records = vec![record("1", "+0"), record("1", "-0"), record("1", "-0")];

        let stats = aggregate_votes(&records);
        assert_eq!(stats[0].vote_counts.get("+0"), Some(&1));
        assert_eq!(stats[0].vote_counts.get("-0"), Some(&2));
        assert_eq!(stats[0].most_common_vote, Vote::MinusZero);
        assert_eq!(stats[0].mean, 0.0);
    }
}
