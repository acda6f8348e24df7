//! Pure reduction of a labeled record set into per-label summary rows.

use indexmap::IndexMap;

use crate::data::{Record, SummaryRow};
use crate::types::Label;

/// Group records by label and compute count, percentage, and mean score.
///
/// Non-mutating: records without a label are ignored (percentages are over
/// labeled records only). Rows come out in first-seen label order with a
/// pending rationale, to be filled by a later oracle pass.
pub fn summarize_by_label(records: &[Record]) -> Vec<SummaryRow> {
    let mut groups: IndexMap<&Label, (usize, f64, usize)> = IndexMap::new();
    for record in records {
        let Some(label) = record.label.as_ref() else {
            continue;
        };
        let entry = groups.entry(label).or_insert((0, 0.0, 0));
        entry.0 += 1;
        if let Some(score) = record.score {
            entry.1 += f64::from(score.value());
            entry.2 += 1;
        }
    }

    let total: usize = groups.values().map(|(count, _, _)| count).sum();
    groups
        .into_iter()
        .map(|(label, (count, score_sum, score_count))| SummaryRow {
            label: label.clone(),
            count,
            percentage: count as f64 / total as f64,
            mean_score: (score_count > 0).then(|| score_sum / score_count as f64),
            rationale: None,
        })
        .collect()
}
