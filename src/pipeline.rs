//! End-to-end annotation pipeline.
//!
//! Stage order follows the hand-off chain: sentiment scoring over the full
//! corpus, negative-comment filtering, unsupervised pre-classification,
//! per-cluster findings extraction, taxonomy construction, per-record
//! classification, aggregation, and per-label rationale extraction. Each
//! stage consumes the record collection by value and returns a new one; no
//! stage writes a field another stage owns.

use tracing::debug;

use crate::aggregate::summarize_by_label;
use crate::cluster::PreClassifier;
use crate::config::PipelineConfig;
use crate::data::{ClusterDigest, Record, SummaryRow};
use crate::errors::AnnotateError;
use crate::observer::Observer;
use crate::oracle::Oracle;
use crate::schedule::BatchScheduler;
use crate::tasks::{
    derive_taxonomy, ClassifyTask, ClusterFindingsOp, LabelRationaleOp, SentimentTask,
};
use crate::taxonomy::{Taxonomy, TaxonomyProvider};

/// Everything a pipeline run produces.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// The full corpus with sentiment scores written.
    pub records: Vec<Record>,
    /// The negative subset with cluster ids and labels written.
    pub negative_records: Vec<Record>,
    /// Per-cluster digests with extracted findings.
    pub clusters: Vec<ClusterDigest>,
    /// The taxonomy classification was validated against.
    pub taxonomy: Taxonomy,
    /// Per-label summary rows with rationales, the hand-off artifact for
    /// downstream narrative summarization.
    pub summary: Vec<SummaryRow>,
}

/// Orchestrates the annotation stages over one corpus.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    /// Pipeline-wide configuration.
    pub config: PipelineConfig,
}

impl Pipeline {
    /// Build a pipeline from its configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run every stage to completion.
    ///
    /// Resumable end to end: records and summary units whose fields are
    /// already written are never re-submitted to the oracle.
    pub fn run<O: Oracle + ?Sized>(
        &self,
        records: Vec<Record>,
        oracle: &mut O,
        observer: &mut dyn Observer,
    ) -> Result<PipelineOutput, AnnotateError> {
        let config = &self.config;
        let scheduler = BatchScheduler::new(config.scheduler);

        debug!(records = records.len(), "sentiment scoring started");
        let sentiment = SentimentTask::new(config.prompts.sentiment.clone(), config.grammar.clone());
        let records = scheduler.run(records, &sentiment, oracle, observer)?;

        let negative: Vec<Record> = records
            .iter()
            .filter(|record| {
                record
                    .score
                    .is_some_and(|score| score.is_at_most(config.negative_ceiling))
            })
            .cloned()
            .collect();
        debug!(
            negative = negative.len(),
            total = records.len(),
            ceiling = config.negative_ceiling,
            "negative subset selected"
        );
        if negative.is_empty() {
            let taxonomy = match &config.taxonomy {
                TaxonomyProvider::HumanReviewed(labels) => Taxonomy::new(labels.clone()),
                TaxonomyProvider::LlmDerived => Taxonomy::new(Vec::new()),
            };
            return Ok(PipelineOutput {
                records,
                negative_records: Vec::new(),
                clusters: Vec::new(),
                taxonomy,
                summary: Vec::new(),
            });
        }

        let classifier = PreClassifier::new(config.cluster);
        let fitted = classifier.fit(negative, &config.stop_words, observer)?;
        let negative = fitted.records;
        let mut clusters = fitted.digests;
        debug!(clusters = clusters.len(), "pre-classification complete");

        ClusterFindingsOp {
            instructions: &config.prompts.cluster_findings,
            problem_marker: &config.prompts.problem_marker,
            rationale_marker: &config.prompts.rationale_marker,
            grammar: &config.grammar,
            sample_cap: config.cluster_text_sample_cap,
            max_attempts: config.scheduler.max_attempts,
            seed: config.cluster.seed,
        }
        .run(&mut clusters, &negative, oracle, observer)?;

        let taxonomy = match &config.taxonomy {
            TaxonomyProvider::HumanReviewed(labels) => Taxonomy::new(labels.clone()),
            TaxonomyProvider::LlmDerived => derive_taxonomy(
                &clusters,
                oracle,
                &config.prompts.taxonomy,
                &config.prompts.problem_marker,
                &config.prompts.rationale_marker,
                &config.grammar,
                observer,
            )?,
        };
        debug!(labels = taxonomy.len(), "taxonomy constructed");

        let classify = ClassifyTask::new(
            &config.prompts.classify,
            config.grammar.clone(),
            taxonomy.clone(),
        );
        let negative = scheduler.run(negative, &classify, oracle, observer)?;

        let mut summary = summarize_by_label(&negative);
        LabelRationaleOp {
            instructions: &config.prompts.rationale,
            problem_marker: &config.prompts.problem_marker,
            rationale_marker: &config.prompts.rationale_marker,
            grammar: &config.grammar,
            sample_cap: config.label_text_sample_cap,
            max_attempts: config.scheduler.max_attempts,
            seed: config.cluster.seed,
        }
        .run(&mut summary, &negative, oracle, observer)?;
        debug!(rows = summary.len(), "summary table complete");

        Ok(PipelineOutput {
            records,
            negative_records: negative,
            clusters,
            taxonomy,
            summary,
        })
    }
}
