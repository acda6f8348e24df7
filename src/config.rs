//! Configuration for the scheduler, the pre-classifier, and the pipeline.

use crate::constants::{cluster, scheduler, score};
use crate::grammar::ResponseGrammar;
use crate::taxonomy::TaxonomyProvider;
use crate::types::StopWordSet;

/// Batch width and retry bound for the scheduler.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Records submitted per oracle round-trip. Lowering this is the main
    /// lever when an oracle keeps failing validation on wide windows.
    pub batch_size: usize,
    /// Attempts allowed per window before retries are declared exhausted.
    pub max_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: scheduler::DEFAULT_BATCH_SIZE,
            max_attempts: scheduler::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Knobs for the unsupervised pre-classifier.
#[derive(Clone, Copy, Debug)]
pub struct ClusterConfig {
    /// Upper bound on candidate cluster counts for the elbow scan.
    pub max_clusters: usize,
    /// TF-IDF vocabulary cap.
    pub max_vocabulary: usize,
    /// Top-weighted centroid terms reported per cluster digest.
    pub keywords_per_cluster: usize,
    /// Representative texts reported per cluster digest.
    pub sample_cases_per_cluster: usize,
    /// Lloyd iteration cap per k-means fit.
    pub kmeans_max_iterations: usize,
    /// Seed for reproducible centroid initialization and sampling.
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_clusters: cluster::DEFAULT_MAX_CLUSTERS,
            max_vocabulary: cluster::DEFAULT_MAX_VOCABULARY,
            keywords_per_cluster: cluster::KEYWORDS_PER_CLUSTER,
            sample_cases_per_cluster: cluster::SAMPLE_CASES_PER_CLUSTER,
            kmeans_max_iterations: cluster::KMEANS_MAX_ITERATIONS,
            seed: 1,
        }
    }
}

/// Injected instruction wording for every oracle-facing stage.
///
/// The engine treats these as opaque text: domain vocabulary and phrasing
/// are the caller's concern, the defaults only document the expected answer
/// templates. Markers double as the section headers the completeness rule
/// checks for.
#[derive(Clone, Debug)]
pub struct PromptSet {
    /// Instructions for the sentiment scoring windows.
    pub sentiment: String,
    /// Instructions for the per-cluster problem/rationale extraction.
    pub cluster_findings: String,
    /// Instructions for merging cluster findings into a label list.
    pub taxonomy: String,
    /// Instructions for the classification windows. The allowed label set
    /// is appended at run time.
    pub classify: String,
    /// Instructions for the per-label rationale extraction.
    pub rationale: String,
    /// Section header for extracted problems.
    pub problem_marker: String,
    /// Section header for extracted reasoning.
    pub rationale_marker: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            sentiment: "You are a sentiment analysis expert. You will receive several \
                texts separated by <sep>. For each text, judge the user's sentiment and \
                answer with one integer score from 0 to 10 (0-3 negative, 4-6 neutral, \
                7-10 positive). Answer template: xx<sep>xx<sep>...<sep>xx where each xx \
                is a score and <sep> is the separator."
                .into(),
            cluster_findings: "You are an expert at diagnosing experience problems. Given \
                the texts below, infer which problems the users report and the reasoning \
                behind each one. Answer template: problem: 1.xx<sep0>2.xx<sep0>...<sep0>\
                N.xx<sep1>rationale: 1.yy<sep0>2.yy<sep0>...<sep0>N.yy where xx is a \
                short problem phrase and yy the matching evidence."
                .into(),
            taxonomy: "You are an expert at summarizing experience problems. Merge \
                similar problems from the findings below into a deduplicated list of \
                short labels. Answer template: problem: 1.xx<sep>2.xx<sep>...<sep>N.xx."
                .into(),
            classify: "You are an expert at classifying experience problems. You will \
                receive several texts separated by <sep>. Assign each text exactly one \
                label from the allowed set. Answer template: xx<sep>xx<sep>...<sep>xx \
                where each xx is a label from the set."
                .into(),
            rationale: "You are an expert at explaining experience problems. Given one \
                problem label and the texts reporting it, explain the underlying causes. \
                Answer template: rationale: 1.yy,2.yy,...,N.yy."
                .into(),
            problem_marker: "problem".into(),
            rationale_marker: "rationale".into(),
        }
    }
}

/// Everything the end-to-end pipeline needs.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Scheduler settings shared by the scoring and classification passes.
    pub scheduler: SchedulerConfig,
    /// Pre-classifier settings.
    pub cluster: ClusterConfig,
    /// Injected instruction wording.
    pub prompts: PromptSet,
    /// Wire grammar shared by every oracle exchange.
    pub grammar: ResponseGrammar,
    /// Records scoring at or below this value feed the problem analysis.
    pub negative_ceiling: u8,
    /// Cap on texts submitted per cluster for problem extraction.
    pub cluster_text_sample_cap: usize,
    /// Cap on texts submitted per label for rationale extraction.
    pub label_text_sample_cap: usize,
    /// Stop words removed during tokenization.
    pub stop_words: StopWordSet,
    /// Where the classification taxonomy comes from.
    pub taxonomy: TaxonomyProvider,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            cluster: ClusterConfig::default(),
            prompts: PromptSet::default(),
            grammar: ResponseGrammar::default(),
            negative_ceiling: score::NEGATIVE_CEILING,
            cluster_text_sample_cap: cluster::CLUSTER_TEXT_SAMPLE_CAP,
            label_text_sample_cap: cluster::LABEL_TEXT_SAMPLE_CAP,
            stop_words: StopWordSet::new(),
            taxonomy: TaxonomyProvider::default(),
        }
    }
}
