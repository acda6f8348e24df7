use serde::{Deserialize, Serialize};

use crate::constants::score::{NEGATIVE_CEILING, NEUTRAL_CEILING, SCORE_MAX};

pub use crate::types::{ClusterId, Keyword, Label};

/// Sentiment band derived from a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SentimentBand {
    /// Scores 0 through 3.
    Negative,
    /// Scores 4 through 6.
    Neutral,
    /// Scores 7 through 10.
    Positive,
}

/// Integer sentiment score in `0..=10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score(u8);

impl Score {
    /// Build a score, rejecting values above the admissible maximum.
    pub fn new(value: u8) -> Option<Self> {
        (value <= SCORE_MAX).then_some(Self(value))
    }

    /// Raw integer value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Band this score falls into.
    pub fn band(self) -> SentimentBand {
        match self.0 {
            0..=NEGATIVE_CEILING => SentimentBand::Negative,
            v if v <= NEUTRAL_CEILING => SentimentBand::Neutral,
            _ => SentimentBand::Positive,
        }
    }

    /// Whether the score sits at or below the given ceiling.
    pub fn is_at_most(self, ceiling: u8) -> bool {
        self.0 <= ceiling
    }
}

/// One unit of corpus text with its annotation fields.
///
/// A `None` field is pending and is the sole resumability signal; a written
/// field is never re-validated or overwritten by a later pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    /// The raw free text being annotated.
    pub text: String,
    /// Sentiment score assigned by the scoring pass.
    pub score: Option<Score>,
    /// Category label assigned by the classification pass.
    pub label: Option<Label>,
    /// Cluster id assigned by the pre-classifier.
    pub cluster: Option<ClusterId>,
}

impl Record {
    /// Build an unannotated record from its text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score: None,
            label: None,
            cluster: None,
        }
    }
}

/// One row of the per-label summary table handed to downstream summarization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummaryRow {
    /// The category label this row aggregates.
    pub label: Label,
    /// Number of records carrying the label.
    pub count: usize,
    /// Share of labeled records carrying the label, in `0.0..=1.0`.
    pub percentage: f64,
    /// Mean sentiment score over the label's records, when scores exist.
    pub mean_score: Option<f64>,
    /// Narrative rationale filled in by a later oracle pass (`None` = pending).
    pub rationale: Option<String>,
}

/// Per-cluster digest emitted by the pre-classifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterDigest {
    /// Cluster id this digest describes.
    pub cluster: ClusterId,
    /// Top-weighted TF-IDF terms of the cluster centroid.
    pub keywords: Vec<Keyword>,
    /// A handful of representative member texts.
    pub sample_cases: Vec<String>,
    /// Number of records assigned to the cluster.
    pub count: usize,
    /// Share of clustered records in this cluster, in `0.0..=1.0`.
    pub percentage: f64,
    /// Mean sentiment score of the cluster's records, when scores exist.
    pub mean_score: Option<f64>,
    /// Problems extracted by the oracle pass (`None` = pending).
    pub problems: Option<String>,
    /// Reasoning extracted alongside the problems (`None` = pending).
    pub rationale: Option<String>,
}
