//! Resumable batch scheduling over pending record fields.
//!
//! The scheduler computes the span of records whose target field is still
//! pending, tiles it into fixed-width windows, and drives the oracle
//! invocation loop once per window, strictly in increasing index order.
//! Re-running against a partially annotated record set only re-processes
//! windows that still contain a pending cell; written fields are never
//! revisited.

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::data::Record;
use crate::errors::AnnotateError;
use crate::grammar::ResponseGrammar;
use crate::observer::Observer;
use crate::oracle::{run_validated, Oracle};
use crate::validate::Rule;

/// A contiguous, end-exclusive index range processed as one oracle
/// round-trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// First index covered (inclusive).
    pub start: usize,
    /// One past the last index covered.
    pub end: usize,
}

impl Window {
    /// Number of indices covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the window covers nothing.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// One field-annotation task driven window by window.
///
/// Implementations bind the injected instruction wording, the wire grammar,
/// the validation rules, and the write of accepted values into their field.
pub trait WindowTask {
    /// Instruction wording sent ahead of every window.
    fn instructions(&self) -> &str;

    /// Grammar used to encode inputs and parse responses.
    fn grammar(&self) -> &ResponseGrammar;

    /// Whether the task's target field is still pending on a record.
    fn is_pending(&self, record: &Record) -> bool;

    /// Validation rules for a window of `input_len` submitted texts.
    fn rules(&self, input_len: usize) -> Vec<Rule>;

    /// Write accepted values into the records at `indices`, in order.
    /// Called only with `values.len() == indices.len()`.
    fn accept(&self, records: &mut [Record], indices: &[usize], values: &[String]);
}

/// Span `[min pending index, max pending index + 1)`, or `None` when no
/// record has the field pending.
pub fn pending_span<F>(records: &[Record], is_pending: F) -> Option<Window>
where
    F: Fn(&Record) -> bool,
{
    let start = records.iter().position(&is_pending)?;
    let end = records.iter().rposition(&is_pending)? + 1;
    Some(Window { start, end })
}

/// Tile `span` into consecutive windows of at most `width`, last one
/// truncated. Returns nothing for a zero width or an empty span.
pub fn tile(span: Window, width: usize) -> Vec<Window> {
    if width == 0 || span.is_empty() {
        return Vec::new();
    }
    let mut windows = Vec::with_capacity(span.len().div_ceil(width));
    let mut start = span.start;
    while start < span.end {
        let end = (start + width).min(span.end);
        windows.push(Window { start, end });
        start = end;
    }
    windows
}

/// Drives a [`WindowTask`] over every pending record, window by window.
pub struct BatchScheduler {
    /// Batch width and attempt cap.
    pub config: SchedulerConfig,
}

impl BatchScheduler {
    /// Build a scheduler from its configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Run the task to completion over the record set.
    ///
    /// Consumes the records and returns them with the task's field written
    /// for every previously pending row. With nothing pending this performs
    /// zero oracle invocations and returns the input unchanged.
    pub fn run<T, O>(
        &self,
        mut records: Vec<Record>,
        task: &T,
        oracle: &mut O,
        observer: &mut dyn Observer,
    ) -> Result<Vec<Record>, AnnotateError>
    where
        T: WindowTask + ?Sized,
        O: Oracle + ?Sized,
    {
        if self.config.batch_size == 0 {
            return Err(AnnotateError::Configuration(
                "batch_size must be at least 1".into(),
            ));
        }
        let Some(span) = pending_span(&records, |record| task.is_pending(record)) else {
            return Ok(records);
        };

        let total = records.iter().filter(|r| task.is_pending(r)).count();
        let mut completed = 0;
        debug!(
            start = span.start,
            end = span.end,
            pending = total,
            batch_size = self.config.batch_size,
            "scheduler pass started"
        );

        for window in tile(span, self.config.batch_size) {
            // Completed cells inside the window are skipped, not resubmitted.
            let indices: Vec<usize> = (window.start..window.end)
                .filter(|&i| task.is_pending(&records[i]))
                .collect();
            if indices.is_empty() {
                continue;
            }
            let texts: Vec<&str> = indices.iter().map(|&i| records[i].text.as_str()).collect();
            let task_message = task.grammar().encode(&texts);
            let rules = task.rules(indices.len());

            let parsed = run_validated(
                oracle,
                task.instructions(),
                &task_message,
                task.grammar(),
                &rules,
                self.config.max_attempts,
                window,
                observer,
            )?;
            task.accept(&mut records, &indices, &parsed.values);

            completed += indices.len();
            observer.progress(completed, total);
            debug!(
                start = window.start,
                end = window.end,
                completed,
                total,
                "window accepted"
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_score(text: &str, score: Option<u8>) -> Record {
        let mut record = Record::new(text);
        record.score = score.and_then(crate::data::Score::new);
        record
    }

    #[test]
    fn pending_span_brackets_the_pending_rows() {
        let records = vec![
            record_with_score("a", Some(5)),
            record_with_score("b", None),
            record_with_score("c", Some(2)),
            record_with_score("d", None),
            record_with_score("e", Some(9)),
        ];
        let span = pending_span(&records, |r| r.score.is_none()).unwrap();
        assert_eq!(span, Window { start: 1, end: 4 });
    }

    #[test]
    fn pending_span_is_none_when_everything_is_written() {
        let records = vec![record_with_score("a", Some(5))];
        assert!(pending_span(&records, |r| r.score.is_none()).is_none());
    }

    #[test]
    fn tiling_covers_the_span_without_gaps_or_overlaps() {
        for width in 1..=9 {
            for len in 0..=25 {
                let span = Window {
                    start: 3,
                    end: 3 + len,
                };
                let windows = tile(span, width);
                let mut expected_start = span.start;
                for window in &windows {
                    assert_eq!(window.start, expected_start);
                    assert!(window.len() <= width);
                    assert!(!window.is_empty());
                    expected_start = window.end;
                }
                if span.is_empty() {
                    assert!(windows.is_empty());
                } else {
                    assert_eq!(expected_start, span.end);
                    assert_eq!(windows.last().unwrap().end, span.end);
                }
            }
        }
    }

    #[test]
    fn tiling_with_zero_width_yields_nothing() {
        assert!(tile(Window { start: 0, end: 10 }, 0).is_empty());
    }
}
