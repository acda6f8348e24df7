/// Constants defining the delimiter-based response wire format.
pub mod grammar {
    /// Separator between per-record values in a batched response.
    pub const FIELD_SEP: &str = "<sep>";
    /// Separator between items inside one listed section (problems, rationales).
    pub const LIST_SEP: &str = "<sep0>";
    /// Outer separator dividing a two-part response into its sections.
    pub const SECTION_SEP: &str = "<sep1>";
}

/// Constants used by the resumable batch scheduler.
pub mod scheduler {
    /// Default number of records submitted per oracle round-trip.
    pub const DEFAULT_BATCH_SIZE: usize = 30;
    /// Default attempt cap per window before retries are declared exhausted.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;
}

/// Constants defining the sentiment score range and its bands.
pub mod score {
    /// Highest admissible sentiment score.
    pub const SCORE_MAX: u8 = 10;
    /// Scores at or below this value are negative.
    pub const NEGATIVE_CEILING: u8 = 3;
    /// Scores above the negative ceiling and at or below this value are neutral.
    pub const NEUTRAL_CEILING: u8 = 6;
}

/// Constants used by the unsupervised pre-classifier and extraction caps.
pub mod cluster {
    /// Default upper bound on candidate cluster counts for the elbow scan.
    pub const DEFAULT_MAX_CLUSTERS: usize = 20;
    /// Default vocabulary cap for TF-IDF vectorization.
    pub const DEFAULT_MAX_VOCABULARY: usize = 1000;
    /// Top-weighted centroid terms reported per cluster digest.
    pub const KEYWORDS_PER_CLUSTER: usize = 10;
    /// Representative texts reported per cluster digest.
    pub const SAMPLE_CASES_PER_CLUSTER: usize = 5;
    /// Cap on texts submitted per cluster for problem extraction.
    pub const CLUSTER_TEXT_SAMPLE_CAP: usize = 100;
    /// Cap on texts submitted per label for rationale extraction.
    pub const LABEL_TEXT_SAMPLE_CAP: usize = 500;
    /// Lloyd iteration cap per k-means fit.
    pub const KMEANS_MAX_ITERATIONS: usize = 50;
    /// Minimum character length for a token to survive normalization.
    pub const MIN_TOKEN_CHARS: usize = 2;
}

/// Constants used by taxonomy construction.
pub mod taxonomy {
    /// Terminal fallback label appended to every taxonomy.
    pub const FALLBACK_LABEL: &str = "other";
}
