//! Unsupervised pre-classification.
//!
//! Bootstraps a label taxonomy from unlabeled text: each record's text is
//! normalized into a token corpus line, vectorized with TF-IDF under a
//! vocabulary cap, clustered with seeded k-means across a range of candidate
//! cluster counts, and the cluster count is selected by chord-residual elbow
//! detection. The selected fit assigns every record a cluster id and emits a
//! keyword digest per cluster.

use indexmap::IndexMap;
use rand::prelude::*;
use tracing::debug;

use crate::config::ClusterConfig;
use crate::constants::cluster::MIN_TOKEN_CHARS;
use crate::data::{ClusterDigest, Record};
use crate::errors::AnnotateError;
use crate::observer::Observer;
use crate::types::{ClusterId, StopWordSet};

/// Normalize one text into a whitespace-joined token corpus line.
///
/// Tokens are lowercased alphanumeric runs; runs shorter than the minimum,
/// purely numeric runs, and stop words are dropped. Unsegmented CJK runs
/// fall back to character bigrams so clustering still has features to work
/// with.
pub fn tokenize(text: &str, stop_words: &StopWordSet) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut word = String::new();
    let mut cjk = Vec::new();

    for ch in text.chars() {
        if is_cjk(ch) {
            flush_word(&mut word, stop_words, &mut tokens);
            cjk.push(ch);
        } else if ch.is_alphanumeric() {
            flush_cjk(&mut cjk, stop_words, &mut tokens);
            for lower in ch.to_lowercase() {
                word.push(lower);
            }
        } else {
            flush_word(&mut word, stop_words, &mut tokens);
            flush_cjk(&mut cjk, stop_words, &mut tokens);
        }
    }
    flush_word(&mut word, stop_words, &mut tokens);
    flush_cjk(&mut cjk, stop_words, &mut tokens);

    tokens.join(" ")
}

fn flush_word(word: &mut String, stop_words: &StopWordSet, tokens: &mut Vec<String>) {
    if word.is_empty() {
        return;
    }
    let token = std::mem::take(word);
    if token.chars().count() < MIN_TOKEN_CHARS {
        return;
    }
    if token.chars().all(|c| c.is_numeric()) {
        return;
    }
    if stop_words.contains(&token) {
        return;
    }
    tokens.push(token);
}

fn flush_cjk(run: &mut Vec<char>, stop_words: &StopWordSet, tokens: &mut Vec<String>) {
    if run.len() >= 2 {
        for pair in run.windows(2) {
            let bigram: String = pair.iter().collect();
            if !stop_words.contains(&bigram) {
                tokens.push(bigram);
            }
        }
    }
    run.clear();
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

/// TF-IDF vectorizer with a fixed maximum vocabulary size.
#[derive(Clone, Debug)]
pub struct TfIdf {
    vocabulary: IndexMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdf {
    /// Fit the vocabulary and inverse document frequencies over a corpus of
    /// token lines. The vocabulary keeps the `max_vocabulary` most frequent
    /// terms (ties broken alphabetically) in alphabetical order.
    pub fn fit(corpus: &[String], max_vocabulary: usize) -> Self {
        let mut totals: IndexMap<String, usize> = IndexMap::new();
        let mut document_frequency: IndexMap<String, usize> = IndexMap::new();

        for line in corpus {
            let mut seen: Vec<&str> = Vec::new();
            for token in line.split_whitespace() {
                *totals.entry(token.to_string()).or_insert(0) += 1;
                if !seen.contains(&token) {
                    seen.push(token);
                    *document_frequency.entry(token.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(&String, &usize)> = totals.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let mut selected: Vec<String> = ranked
            .into_iter()
            .take(max_vocabulary)
            .map(|(term, _)| term.clone())
            .collect();
        selected.sort();

        let documents = corpus.len();
        let mut vocabulary = IndexMap::with_capacity(selected.len());
        let mut idf = Vec::with_capacity(selected.len());
        for (index, term) in selected.into_iter().enumerate() {
            let df = document_frequency.get(&term).copied().unwrap_or(0);
            idf.push((((1 + documents) as f64 / (1 + df) as f64).ln()) + 1.0);
            vocabulary.insert(term, index);
        }
        Self { vocabulary, idf }
    }

    /// Transform a corpus into dense, l2-normalized TF-IDF rows.
    pub fn transform(&self, corpus: &[String]) -> Vec<Vec<f64>> {
        corpus
            .iter()
            .map(|line| {
                let mut row = vec![0.0; self.vocabulary.len()];
                for token in line.split_whitespace() {
                    if let Some(&index) = self.vocabulary.get(token) {
                        row[index] += self.idf[index];
                    }
                }
                let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for value in &mut row {
                        *value /= norm;
                    }
                }
                row
            })
            .collect()
    }

    /// Number of terms in the fitted vocabulary.
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Term text for a vocabulary index.
    pub fn term(&self, index: usize) -> Option<&str> {
        self.vocabulary
            .get_index(index)
            .map(|(term, _)| term.as_str())
    }
}

/// Result of one k-means fit.
#[derive(Clone, Debug)]
pub struct KMeansFit {
    /// Cluster id per input row.
    pub assignments: Vec<ClusterId>,
    /// Cluster centroids.
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances of every row to its centroid.
    pub inertia: f64,
}

/// Seeded k-means (k-means++ initialization, Lloyd iterations).
///
/// `k` is clamped to the number of rows; the fit is deterministic for a
/// given seed.
pub fn kmeans(rows: &[Vec<f64>], k: usize, seed: u64, max_iterations: usize) -> KMeansFit {
    let n = rows.len();
    let k = k.clamp(1, n.max(1));
    if n == 0 {
        return KMeansFit {
            assignments: Vec::new(),
            centroids: Vec::new(),
            inertia: 0.0,
        };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = init_plus_plus(rows, k, &mut rng);
    let mut assignments = vec![0; n];

    for _ in 0..max_iterations {
        let next: Vec<ClusterId> = rows
            .iter()
            .map(|row| nearest_centroid(row, &centroids).0)
            .collect();

        // Recompute centroids; an emptied cluster is reseeded with the row
        // farthest from its current centroid.
        let mut sums = vec![vec![0.0; rows[0].len()]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (row, &cluster) in rows.iter().zip(&next) {
            counts[cluster] += 1;
            for (sum, value) in sums[cluster].iter_mut().zip(row) {
                *sum += value;
            }
        }
        let mut reseeded = false;
        for (cluster, count) in counts.iter().enumerate() {
            if *count == 0 {
                reseeded = true;
                let farthest = rows
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| {
                        let da = nearest_centroid(a, &centroids).1;
                        let db = nearest_centroid(b, &centroids).1;
                        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(index, _)| index)
                    .unwrap_or(0);
                centroids[cluster] = rows[farthest].clone();
            } else {
                for (mean, sum) in centroids[cluster].iter_mut().zip(&sums[cluster]) {
                    *mean = sum / *count as f64;
                }
            }
        }

        let converged = next == assignments;
        assignments = next;
        // A reseeded centroid still needs a pass to claim its members.
        if converged && !reseeded {
            break;
        }
    }

    let inertia = rows
        .iter()
        .zip(&assignments)
        .map(|(row, &cluster)| squared_distance(row, &centroids[cluster]))
        .sum();
    KMeansFit {
        assignments,
        centroids,
        inertia,
    }
}

fn init_plus_plus(rows: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(rows[rng.random_range(0..rows.len())].clone());
    while centroids.len() < k {
        let weights: Vec<f64> = rows
            .iter()
            .map(|row| nearest_centroid(row, &centroids).1)
            .collect();
        let total: f64 = weights.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut picked = rows.len() - 1;
            for (index, weight) in weights.iter().enumerate() {
                target -= weight;
                if target <= 0.0 {
                    picked = index;
                    break;
                }
            }
            picked
        } else {
            rng.random_range(0..rows.len())
        };
        centroids.push(rows[chosen].clone());
    }
    centroids
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> (ClusterId, f64) {
    let mut best = (0, f64::INFINITY);
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(row, centroid);
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Elbow scan outcome handed to observers for visualization.
#[derive(Clone, Debug)]
pub struct ElbowReport {
    /// Candidate cluster counts, in scan order.
    pub candidates: Vec<usize>,
    /// Inertia observed per candidate.
    pub inertia: Vec<f64>,
    /// Chord values per candidate (the two-point linear fit).
    pub fitted: Vec<f64>,
    /// Slope of the chord.
    pub slope: f64,
    /// Intercept of the chord.
    pub intercept: f64,
    /// Selected cluster count: the maximum absolute residual from the chord.
    pub selected_k: usize,
}

/// Chord-residual elbow detection.
///
/// Fits a straight line through the first and last `(k, inertia)` points,
/// computes each candidate's absolute residual from that line, and selects
/// the candidate with the maximum residual. Deterministic, no threshold.
pub fn detect_elbow(candidates: &[usize], inertia: &[f64]) -> Option<ElbowReport> {
    if candidates.is_empty() || candidates.len() != inertia.len() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(ElbowReport {
            candidates: candidates.to_vec(),
            inertia: inertia.to_vec(),
            fitted: inertia.to_vec(),
            slope: 0.0,
            intercept: inertia[0],
            selected_k: candidates[0],
        });
    }

    let (x0, y0) = (candidates[0] as f64, inertia[0]);
    let (x1, y1) = (*candidates.last().unwrap() as f64, *inertia.last().unwrap());
    let slope = (y1 - y0) / (x1 - x0);
    let intercept = y0 - slope * x0;

    let fitted: Vec<f64> = candidates
        .iter()
        .map(|&k| slope * k as f64 + intercept)
        .collect();
    // First index wins residual ties.
    let mut peak = 0;
    let mut peak_residual = f64::NEG_INFINITY;
    for (index, (observed, expected)) in inertia.iter().zip(&fitted).enumerate() {
        let residual = (observed - expected).abs();
        if residual > peak_residual {
            peak = index;
            peak_residual = residual;
        }
    }

    Some(ElbowReport {
        candidates: candidates.to_vec(),
        inertia: inertia.to_vec(),
        fitted,
        slope,
        intercept,
        selected_k: candidates[peak],
    })
}

/// Output of a pre-classification fit.
#[derive(Clone, Debug)]
pub struct PreClassification {
    /// The input records with cluster ids written.
    pub records: Vec<Record>,
    /// One digest per cluster, in cluster-id order.
    pub digests: Vec<ClusterDigest>,
    /// The elbow scan behind the selected cluster count.
    pub elbow: ElbowReport,
}

/// Vectorizes, scans cluster counts, and assigns cluster ids.
#[derive(Clone, Debug, Default)]
pub struct PreClassifier {
    /// Clustering knobs (candidate range, vocabulary cap, seed).
    pub config: ClusterConfig,
}

impl PreClassifier {
    /// Build a pre-classifier from its configuration.
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Cluster the records and emit per-cluster digests.
    ///
    /// The pre-classifier is the sole writer of cluster ids. Consumes the
    /// records and returns them with every `cluster` field written.
    pub fn fit(
        &self,
        records: Vec<Record>,
        stop_words: &StopWordSet,
        observer: &mut dyn Observer,
    ) -> Result<PreClassification, AnnotateError> {
        if records.is_empty() {
            return Err(AnnotateError::EmptyCorpus(
                "no records to pre-classify".into(),
            ));
        }

        let corpus: Vec<String> = records
            .iter()
            .map(|record| tokenize(&record.text, stop_words))
            .collect();
        let tfidf = TfIdf::fit(&corpus, self.config.max_vocabulary);
        let rows = tfidf.transform(&corpus);

        let k_max = self.config.max_clusters.clamp(1, records.len());
        let candidates: Vec<usize> = (1..=k_max).collect();
        let inertia: Vec<f64> = candidates
            .iter()
            .map(|&k| self.fit_at(&rows, k).inertia)
            .collect();

        let elbow = detect_elbow(&candidates, &inertia).ok_or_else(|| {
            AnnotateError::Configuration("elbow scan produced no candidates".into())
        })?;
        debug!(
            selected_k = elbow.selected_k,
            k_max,
            vocabulary = tfidf.vocabulary_len(),
            "elbow point selected"
        );
        observer.elbow_selected(&elbow);

        let fit = self.fit_at(&rows, elbow.selected_k);
        let mut records = records;
        for (record, &cluster) in records.iter_mut().zip(&fit.assignments) {
            record.cluster = Some(cluster);
        }

        let digests = self.build_digests(&records, &fit, &tfidf);
        Ok(PreClassification {
            records,
            digests,
            elbow,
        })
    }

    fn fit_at(&self, rows: &[Vec<f64>], k: usize) -> KMeansFit {
        // Seed varies per k so the scan and the final refit agree exactly.
        kmeans(
            rows,
            k,
            self.config.seed.wrapping_add(k as u64),
            self.config.kmeans_max_iterations,
        )
    }

    fn build_digests(
        &self,
        records: &[Record],
        fit: &KMeansFit,
        tfidf: &TfIdf,
    ) -> Vec<ClusterDigest> {
        let total = records.len();
        (0..fit.centroids.len())
            .map(|cluster| {
                let members: Vec<&Record> = records
                    .iter()
                    .filter(|record| record.cluster == Some(cluster))
                    .collect();
                let scores: Vec<f64> = members
                    .iter()
                    .filter_map(|record| record.score.map(|s| f64::from(s.value())))
                    .collect();
                ClusterDigest {
                    cluster,
                    keywords: top_keywords(
                        &fit.centroids[cluster],
                        tfidf,
                        self.config.keywords_per_cluster,
                    ),
                    sample_cases: members
                        .iter()
                        .take(self.config.sample_cases_per_cluster)
                        .map(|record| record.text.clone())
                        .collect(),
                    count: members.len(),
                    percentage: members.len() as f64 / total as f64,
                    mean_score: (!scores.is_empty())
                        .then(|| scores.iter().sum::<f64>() / scores.len() as f64),
                    problems: None,
                    rationale: None,
                }
            })
            .collect()
    }
}

fn top_keywords(centroid: &[f64], tfidf: &TfIdf, limit: usize) -> Vec<String> {
    let mut weighted: Vec<(usize, f64)> = centroid
        .iter()
        .enumerate()
        .filter(|(_, weight)| **weight > 0.0)
        .map(|(index, weight)| (index, *weight))
        .collect();
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    weighted
        .into_iter()
        .take(limit)
        .filter_map(|(index, _)| tfidf.term(index).map(str::to_string))
        .collect()
}
