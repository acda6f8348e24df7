#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Pure reduction of labeled records into per-label summary rows.
pub mod aggregate;
/// Unsupervised pre-classification: tokenizer, TF-IDF, k-means, elbow detection.
pub mod cluster;
/// Scheduler, clustering, prompt, and pipeline configuration types.
pub mod config;
/// Shared constants: wire separators, scheduler and clustering defaults.
pub mod constants;
/// Record, score, and summary data types.
pub mod data;
/// Delimiter-based structured response grammar.
pub mod grammar;
/// Progress and diagnostics observer seam.
pub mod observer;
/// Oracle capability and the validated invocation loop.
pub mod oracle;
/// End-to-end annotation pipeline orchestration.
pub mod pipeline;
/// Resumable batch scheduling over pending record fields.
pub mod schedule;
/// Concrete window tasks and single-shot extraction operations.
pub mod tasks;
/// Taxonomy type and taxonomy providers.
pub mod taxonomy;
/// Shared type aliases.
pub mod types;
/// Validation rules applied to parsed oracle responses.
pub mod validate;

mod errors;

pub use aggregate::summarize_by_label;
pub use cluster::{detect_elbow, ElbowReport, PreClassification, PreClassifier};
pub use config::{ClusterConfig, PipelineConfig, PromptSet, SchedulerConfig};
pub use data::{ClusterDigest, Record, Score, SentimentBand, SummaryRow};
pub use errors::AnnotateError;
pub use grammar::{ParsedResponse, ResponseGrammar};
pub use observer::{NullObserver, Observer};
pub use oracle::{Oracle, RetryContext};
pub use pipeline::{Pipeline, PipelineOutput};
pub use schedule::{BatchScheduler, Window, WindowTask};
pub use tasks::{ClassifyTask, ClusterFindingsOp, LabelRationaleOp, SentimentTask};
pub use taxonomy::{Taxonomy, TaxonomyProvider};
pub use types::{ClusterId, Label};
pub use validate::{Rule, RuleKind, ValidationFailure};
