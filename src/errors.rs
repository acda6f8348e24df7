use thiserror::Error;

/// Error type for oracle, retry-exhaustion, and configuration failures.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// The oracle collaborator failed to produce a response at all.
    #[error("oracle call failed: {0}")]
    Oracle(String),
    /// A window kept failing validation until the attempt cap was reached.
    #[error("window [{start}, {end}) still failing validation after {attempts} attempts")]
    ExhaustedRetries {
        /// Start index of the exhausted window (inclusive).
        start: usize,
        /// End index of the exhausted window (exclusive).
        end: usize,
        /// Number of attempts consumed.
        attempts: u32,
    },
    /// A configuration value made the requested operation impossible.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An operation that needs text had nothing to work with.
    #[error("empty corpus: {0}")]
    EmptyCorpus(String),
}
