//! Concrete annotation tasks.
//!
//! The window tasks (sentiment scoring, label classification) plug into the
//! batch scheduler; the extraction operations (per-cluster findings, taxonomy
//! derivation, per-label rationales) drive the invocation loop one unit at a
//! time, resuming over whichever units are still pending.

use rand::prelude::*;
use tracing::debug;

use crate::data::{ClusterDigest, Record, Score, SummaryRow};
use crate::errors::AnnotateError;
use crate::grammar::ResponseGrammar;
use crate::observer::Observer;
use crate::oracle::{run_validated, Oracle};
use crate::schedule::{Window, WindowTask};
use crate::taxonomy::Taxonomy;
use crate::validate::Rule;

/// Sentiment scoring task: one integer score per record text.
#[derive(Clone, Debug)]
pub struct SentimentTask {
    instructions: String,
    grammar: ResponseGrammar,
}

impl SentimentTask {
    /// Build the task from injected instruction wording and a grammar.
    pub fn new(instructions: impl Into<String>, grammar: ResponseGrammar) -> Self {
        Self {
            instructions: instructions.into(),
            grammar,
        }
    }
}

impl WindowTask for SentimentTask {
    fn instructions(&self) -> &str {
        &self.instructions
    }

    fn grammar(&self) -> &ResponseGrammar {
        &self.grammar
    }

    fn is_pending(&self, record: &Record) -> bool {
        record.score.is_none()
    }

    fn rules(&self, input_len: usize) -> Vec<Rule> {
        vec![
            Rule::Count {
                expected: input_len,
            },
            Rule::ScoreRange,
        ]
    }

    fn accept(&self, records: &mut [Record], indices: &[usize], values: &[String]) {
        for (&index, value) in indices.iter().zip(values) {
            records[index].score = value.parse::<u8>().ok().and_then(Score::new);
        }
    }
}

/// Classification task: one taxonomy label per record text.
#[derive(Clone, Debug)]
pub struct ClassifyTask {
    instructions: String,
    grammar: ResponseGrammar,
    taxonomy: Taxonomy,
}

impl ClassifyTask {
    /// Build the task; the allowed label set is appended to the injected
    /// instruction wording so every window restates it.
    pub fn new(instructions: &str, grammar: ResponseGrammar, taxonomy: Taxonomy) -> Self {
        let instructions = format!(
            "{instructions}\n\nAllowed labels: {}",
            taxonomy.labels().join(", ")
        );
        Self {
            instructions,
            grammar,
            taxonomy,
        }
    }
}

impl WindowTask for ClassifyTask {
    fn instructions(&self) -> &str {
        &self.instructions
    }

    fn grammar(&self) -> &ResponseGrammar {
        &self.grammar
    }

    fn is_pending(&self, record: &Record) -> bool {
        record.label.is_none()
    }

    fn rules(&self, input_len: usize) -> Vec<Rule> {
        vec![
            Rule::Count {
                expected: input_len,
            },
            Rule::Membership {
                labels: self.taxonomy.labels(),
            },
        ]
    }

    fn accept(&self, records: &mut [Record], indices: &[usize], values: &[String]) {
        for (&index, value) in indices.iter().zip(values) {
            records[index].label = Some(value.clone());
        }
    }
}

/// Per-cluster problem/rationale extraction over clustered records.
#[derive(Clone, Debug)]
pub struct ClusterFindingsOp<'a> {
    /// Injected instruction wording.
    pub instructions: &'a str,
    /// Section header for the problems list.
    pub problem_marker: &'a str,
    /// Section header for the reasoning list.
    pub rationale_marker: &'a str,
    /// Wire grammar.
    pub grammar: &'a ResponseGrammar,
    /// Cap on texts submitted per cluster.
    pub sample_cap: usize,
    /// Attempt cap per cluster.
    pub max_attempts: u32,
    /// Seed for the reproducible text sample.
    pub seed: u64,
}

impl ClusterFindingsOp<'_> {
    /// Fill `problems` and `rationale` on every digest still pending.
    ///
    /// Resumable: digests that already carry findings are skipped.
    pub fn run<O: Oracle + ?Sized>(
        &self,
        digests: &mut [ClusterDigest],
        records: &[Record],
        oracle: &mut O,
        observer: &mut dyn Observer,
    ) -> Result<(), AnnotateError> {
        // Memberless digests are skipped below, so they do not count toward
        // the progress total either.
        let total = digests
            .iter()
            .filter(|d| d.problems.is_none())
            .filter(|d| records.iter().any(|r| r.cluster == Some(d.cluster)))
            .count();
        let mut completed = 0;

        for digest in digests.iter_mut().filter(|d| d.problems.is_none()) {
            let texts: Vec<&str> = records
                .iter()
                .filter(|record| record.cluster == Some(digest.cluster))
                .map(|record| record.text.as_str())
                .collect();
            if texts.is_empty() {
                continue;
            }
            let sampled = sample_capped(
                &texts,
                self.sample_cap,
                self.seed.wrapping_add(digest.cluster as u64),
            );
            if sampled.len() < texts.len() {
                debug!(
                    cluster = digest.cluster,
                    submitted = sampled.len(),
                    members = texts.len(),
                    "cluster text capped for extraction"
                );
            }
            let task_message = sampled.join("\n");
            let rules = [
                Rule::Sections {
                    markers: vec![
                        self.problem_marker.to_string(),
                        self.rationale_marker.to_string(),
                    ],
                },
                Rule::ParallelCounts,
            ];

            let parsed = run_validated(
                oracle,
                self.instructions,
                &task_message,
                self.grammar,
                &rules,
                self.max_attempts,
                Window {
                    start: digest.cluster,
                    end: digest.cluster + 1,
                },
                observer,
            )?;

            // ParallelCounts guarantees exactly two sections.
            digest.problems = Some(joined_items(
                self.grammar,
                &parsed.sections[0],
                self.problem_marker,
            ));
            digest.rationale = Some(joined_items(
                self.grammar,
                &parsed.sections[1],
                self.rationale_marker,
            ));

            completed += 1;
            observer.progress(completed, total);
        }
        Ok(())
    }
}

/// Derive the classification taxonomy from the per-cluster findings.
///
/// Sends one summarization prompt over the findings and parses the proposed
/// numbered label list; the fallback label is always appended.
pub fn derive_taxonomy<O: Oracle + ?Sized>(
    digests: &[ClusterDigest],
    oracle: &mut O,
    instructions: &str,
    problem_marker: &str,
    rationale_marker: &str,
    grammar: &ResponseGrammar,
    observer: &mut dyn Observer,
) -> Result<Taxonomy, AnnotateError> {
    let task_message = digests
        .iter()
        .map(|digest| {
            format!(
                "{problem_marker}: {} {rationale_marker}: {}",
                digest.problems.as_deref().unwrap_or_default(),
                digest.rationale.as_deref().unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    // The proposal is free-form; parsing is tolerant and the fallback label
    // guarantees a usable taxonomy, so no validation rules are declared.
    let parsed = run_validated(
        oracle,
        instructions,
        &task_message,
        grammar,
        &[],
        1,
        Window {
            start: 0,
            end: digests.len(),
        },
        observer,
    )?;
    Ok(Taxonomy::from_numbered_list(&parsed.raw, grammar))
}

/// Per-label rationale extraction over the summary table.
#[derive(Clone, Debug)]
pub struct LabelRationaleOp<'a> {
    /// Injected instruction wording.
    pub instructions: &'a str,
    /// Header naming the problem label in the composed message.
    pub problem_marker: &'a str,
    /// Section header the response must contain.
    pub rationale_marker: &'a str,
    /// Wire grammar.
    pub grammar: &'a ResponseGrammar,
    /// Cap on texts submitted per label.
    pub sample_cap: usize,
    /// Attempt cap per row.
    pub max_attempts: u32,
    /// Seed for the reproducible text sample.
    pub seed: u64,
}

impl LabelRationaleOp<'_> {
    /// Fill `rationale` on every summary row still pending.
    ///
    /// Resumable: rows that already carry a rationale are skipped.
    pub fn run<O: Oracle + ?Sized>(
        &self,
        rows: &mut [SummaryRow],
        records: &[Record],
        oracle: &mut O,
        observer: &mut dyn Observer,
    ) -> Result<(), AnnotateError> {
        // Rows whose label has no member texts are skipped below, so they do
        // not count toward the progress total either.
        let total = rows
            .iter()
            .filter(|row| row.rationale.is_none())
            .filter(|row| {
                records
                    .iter()
                    .any(|r| r.label.as_deref() == Some(row.label.as_str()))
            })
            .count();
        let mut completed = 0;

        for (row_index, row) in rows
            .iter_mut()
            .enumerate()
            .filter(|(_, row)| row.rationale.is_none())
        {
            let texts: Vec<&str> = records
                .iter()
                .filter(|record| record.label.as_deref() == Some(row.label.as_str()))
                .map(|record| record.text.as_str())
                .collect();
            if texts.is_empty() {
                continue;
            }
            let sampled = sample_capped(
                &texts,
                self.sample_cap,
                self.seed.wrapping_add(row_index as u64),
            );
            let task_message = format!(
                "{}: {}\n{}",
                self.problem_marker,
                row.label,
                sampled.join("\n")
            );
            let rules = [Rule::Sections {
                markers: vec![self.rationale_marker.to_string()],
            }];

            let parsed = run_validated(
                oracle,
                self.instructions,
                &task_message,
                self.grammar,
                &rules,
                self.max_attempts,
                Window {
                    start: row_index,
                    end: row_index + 1,
                },
                observer,
            )?;
            row.rationale = Some(marker_body(&parsed.raw, self.rationale_marker));

            completed += 1;
            observer.progress(completed, total);
        }
        Ok(())
    }
}

/// Reproducible sample of at most `cap` texts, kept in corpus order.
fn sample_capped<'a>(texts: &[&'a str], cap: usize, seed: u64) -> Vec<&'a str> {
    if texts.len() <= cap || cap == 0 {
        return texts.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, texts.len(), cap).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|index| texts[index]).collect()
}

/// Text after the marker (and an optional colon), or the whole section when
/// the marker is absent.
fn marker_body(section: &str, marker: &str) -> String {
    let body = match section.find(marker) {
        Some(position) => &section[position + marker.len()..],
        None => section,
    };
    body.trim_start_matches([':', '：']).trim().to_string()
}

fn joined_items(grammar: &ResponseGrammar, section: &str, marker: &str) -> String {
    let body = marker_body(section, marker);
    grammar.decode_list(&body).join(", ")
}
