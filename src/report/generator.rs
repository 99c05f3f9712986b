//! Agreement report generation.
//!
//! This module renders the per-variant agreement reports in two
//! forms: a machine-readable JSON dump and a plain-text report with
//! aligned contingency tables.

use crate::models::{AnalysisResults, ContingencyTable};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Generate the plain-text report, iterating variants in insertion
/// order (simple, then complete).
pub fn render_text_report(results: &AnalysisResults) -> String {
    let mut output = String::new();

    if results.is_empty() {
        output.push_str("No analysis results available.\n");
        return output;
    }

    for (variant, report) in results.iter() {
        output.push_str(&format!("\n=== {} Prompt Analysis ===\n", capitalize(variant.tag())));

        output.push_str("\nModel Vote Distribution:\n");
        for (vote, proportion) in &report.model_distribution {
            output.push_str(&format!("{}: {:.3}\n", vote, proportion));
        }

        output.push_str("\nHuman Vote Distribution:\n");
        for (vote, proportion) in &report.human_distribution {
            output.push_str(&format!("{}: {:.3}\n", vote, proportion));
        }

        output.push_str(&format!(
            "\nOverall Agreement Rate: {:.3}\n",
            report.agreement_rate
        ));

        output.push_str("\nContingency Table (model vote x human vote):\n");
        output.push_str(&render_contingency(&report.contingency));
        output.push('\n');
    }

    output
}

/// Render a contingency table as an aligned text table.
///
/// The first column holds model vote labels; the header row holds
/// human vote labels plus the `All` margin.
fn render_contingency(table: &ContingencyTable) -> String {
    let label_width = table
        .rows
        .iter()
        .map(|r| r.label.len())
        .max()
        .unwrap_or(0)
        .max(5);
    let cell_width = table
        .columns
        .iter()
        .map(String::len)
        .chain(
            table
                .rows
                .iter()
                .flat_map(|r| r.counts.iter().map(|c| c.to_string().len())),
        )
        .max()
        .unwrap_or(1);

    let mut out = String::new();

    out.push_str(&format!("{:<label_width$}", ""));
    for column in &table.columns {
        out.push_str(&format!("  {:>cell_width$}", column));
    }
    out.push('\n');

    for row in &table.rows {
        out.push_str(&format!("{:<label_width$}", row.label));
        for count in &row.counts {
            out.push_str(&format!("  {:>cell_width$}", count));
        }
        out.push('\n');
    }

    out
}

/// Write the machine-readable JSON dump of all per-variant reports.
pub fn write_json_report(path: &Path, results: &AnalysisResults) -> Result<()> {
    info!("Saving analysis results to {}", path.display());

    let content = serde_json::to_string_pretty(results)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write analysis results to {}", path.display()))?;

    Ok(())
}

/// Write the human-readable text report.
pub fn write_text_report(path: &Path, results: &AnalysisResults) -> Result<()> {
    info!("Saving analysis report to {}", path.display());

    let content = render_text_report(results);
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write analysis report to {}", path.display()))?;

    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgreementReport, ContingencyRow};
    use std::collections::BTreeMap;

    fn sample_report() -> AgreementReport {
        AgreementReport {
            model_distribution: BTreeMap::from([("+1".to_string(), 0.667), ("-1".to_string(), 0.333)]),
            human_distribution: BTreeMap::from([("+1".to_string(), 1.0)]),
            agreement_rate: 0.5,
            contingency: ContingencyTable {
                columns: vec!["+1".to_string(), "All".to_string()],
                rows: vec![
                    ContingencyRow {
                        label: "+1".to_string(),
                        counts: vec![2, 2],
                    },
                    ContingencyRow {
                        label: "All".to_string(),
                        counts: vec![2, 2],
                    },
                ],
            },
        }
    }

    #[test]
    fn test_text_report_formats_proportions_to_three_decimals() {
        let results = AnalysisResults {
            simple: Some(sample_report()),
            complete: None,
        };

        let text = render_text_report(&results);

        assert!(text.contains("=== Simple Prompt Analysis ==="));
        assert!(text.contains("+1: 0.667"));
        assert!(text.contains("-1: 0.333"));
        assert!(text.contains("Overall Agreement Rate: 0.500"));
    }

    #[test]
    fn test_text_report_orders_variants() {
        let results = AnalysisResults {
            simple: Some(sample_report()),
            complete: Some(sample_report()),
        };

        let text = render_text_report(&results);
        let simple_pos = text.find("Simple Prompt Analysis").unwrap();
        let complete_pos = text.find("Complete Prompt Analysis").unwrap();
        assert!(simple_pos < complete_pos);
    }

    #[test]
    fn test_empty_results_render_placeholder() {
        let text = render_text_report(&AnalysisResults::default());
        assert!(text.contains("No analysis results available."));
    }

    #[test]
    fn test_contingency_rows_align() {
        let table = ContingencyTable {
            columns: vec!["+1".to_string(), "-1".to_string(), "All".to_string()],
            rows: vec![
                ContingencyRow {
                    label: "+1".to_string(),
                    counts: vec![10, 0, 10],
                },
                ContingencyRow {
                    label: "All".to_string(),
                    counts: vec![10, 0, 10],
                },
            ],
        };

        let rendered = render_contingency(&table);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
        assert!(lines[0].contains("All"));
    }

    #[test]
    fn test_json_dump_omits_absent_variants() {
        let results = AnalysisResults {
            simple: Some(sample_report()),
            complete: None,
        };

        let json = serde_json::to_string(&results).unwrap();
        assert!(json.contains("\"simple\""));
        assert!(!json.contains("\"complete\""));
        assert!(json.contains("\"agreement_rate\":0.5"));
    }
}
