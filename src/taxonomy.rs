//! The closed, ordered label set that classification output is drawn from.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::constants::taxonomy::FALLBACK_LABEL;
use crate::types::Label;

/// Ordered set of category labels, always terminated by the fallback label.
///
/// Built once per pipeline run, either from an oracle summarization pass or
/// from a human-reviewed list; classification windows validate membership
/// against it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    labels: IndexSet<Label>,
}

impl Taxonomy {
    /// Build a taxonomy from labels, deduplicating in first-seen order and
    /// appending the fallback label.
    pub fn new<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = Label>,
    {
        let mut set: IndexSet<Label> = labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();
        set.insert(FALLBACK_LABEL.to_string());
        Self { labels: set }
    }

    /// Parse an oracle's proposed label list.
    ///
    /// Items arrive as a numbered list (`1.noise`, `2.smell`, ...) split
    /// across any of the grammar's separators; the item-number prefix and
    /// any section header before the first item are stripped.
    pub fn from_numbered_list(response: &str, grammar: &crate::grammar::ResponseGrammar) -> Self {
        let mut labels = Vec::new();
        for section in grammar.decode_sections(response) {
            for value in grammar.decode(&section) {
                for item in grammar.decode_list(&value) {
                    if let Some(label) = strip_item_number(&item) {
                        labels.push(label.to_string());
                    }
                }
            }
        }
        Self::new(labels)
    }

    /// Labels in order, fallback last.
    pub fn labels(&self) -> Vec<Label> {
        self.labels.iter().cloned().collect()
    }

    /// Exact membership test.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// The terminal fallback label.
    pub fn fallback(&self) -> &str {
        FALLBACK_LABEL
    }

    /// Number of labels, fallback included.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the taxonomy holds only the fallback label.
    pub fn is_empty(&self) -> bool {
        self.labels.len() <= 1
    }
}

/// Text after the last `N.`-style item-number prefix, or `None` when the
/// item carries no number (headers without items are dropped that way).
fn strip_item_number(item: &str) -> Option<&str> {
    let bytes = item.as_bytes();
    let mut label_start = None;
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index].is_ascii_digit() {
            let digits_start = index;
            while index < bytes.len() && bytes[index].is_ascii_digit() {
                index += 1;
            }
            if index < bytes.len() && (bytes[index] == b'.' || bytes[index] == b')') {
                label_start = Some(index + 1);
                index += 1;
                continue;
            }
            index = digits_start + 1;
        } else {
            index += 1;
        }
    }
    let start = label_start?;
    let label = item[start..].trim();
    (!label.is_empty()).then_some(label)
}

/// Source of the taxonomy consumed by classification.
#[derive(Clone, Debug)]
pub enum TaxonomyProvider {
    /// Derive the label set from an oracle summarization pass over the
    /// per-cluster findings.
    LlmDerived,
    /// Use a human-reviewed label list as-is (fallback still appended).
    HumanReviewed(Vec<Label>),
}

impl Default for TaxonomyProvider {
    fn default() -> Self {
        Self::LlmDerived
    }
}
