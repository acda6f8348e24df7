use std::collections::VecDeque;

use annotator::{
    AnnotateError, BatchScheduler, Oracle, Record, ResponseGrammar, RuleKind, SchedulerConfig,
    Score, SentimentTask, Taxonomy, ClassifyTask, Observer, Window, ValidationFailure,
};

/// Oracle that replays a fixed script and records every prompt it receives.
struct ScriptedOracle {
    responses: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedOracle {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&mut self, prompt: &str) -> Result<String, AnnotateError> {
        self.prompts.push(prompt.to_string());
        self.responses
            .pop_front()
            .ok_or_else(|| AnnotateError::Oracle("script exhausted".into()))
    }
}

/// Observer that records progress counters and validation diagnostics.
#[derive(Default)]
struct RecordingObserver {
    progress: Vec<(usize, usize)>,
    failures: Vec<(Window, RuleKind, Option<String>, String)>,
}

impl Observer for RecordingObserver {
    fn progress(&mut self, completed: usize, total: usize) {
        self.progress.push((completed, total));
    }

    fn validation_failed(&mut self, window: Window, failure: &ValidationFailure, response: &str) {
        self.failures
            .push((window, failure.rule, failure.offending.clone(), response.to_string()));
    }
}

fn build_records(texts: &[&str]) -> Vec<Record> {
    texts.iter().map(|text| Record::new(*text)).collect()
}

fn scheduler(batch_size: usize) -> BatchScheduler {
    BatchScheduler::new(SchedulerConfig {
        batch_size,
        max_attempts: 4,
    })
}

fn sentiment_task() -> SentimentTask {
    SentimentTask::new("score each text", ResponseGrammar::default())
}

fn scores(records: &[Record]) -> Vec<Option<u8>> {
    records.iter().map(|r| r.score.map(Score::value)).collect()
}

#[test]
fn empty_pending_set_performs_zero_invocations() {
    let mut records = build_records(&["a", "b"]);
    records[0].score = Score::new(5);
    records[1].score = Score::new(7);
    let before = scores(&records);

    let mut oracle = ScriptedOracle::new(&[]);
    let result = scheduler(3)
        .run(records, &sentiment_task(), &mut oracle, &mut RecordingObserver::default())
        .unwrap();

    assert!(oracle.prompts.is_empty());
    assert_eq!(scores(&result), before);
}

#[test]
fn sentiment_batch_rejects_short_response_then_accepts() {
    let records = build_records(&["great stay", "terrible service", "ok room"]);
    let mut oracle = ScriptedOracle::new(&["9<sep>1", "9<sep>1<sep>5"]);
    let mut observer = RecordingObserver::default();

    let result = scheduler(3)
        .run(records, &sentiment_task(), &mut oracle, &mut observer)
        .unwrap();

    assert_eq!(scores(&result), vec![Some(9), Some(1), Some(5)]);
    assert_eq!(oracle.prompts.len(), 2);

    // The count rule rejected the two-value reply and its corrective
    // fragment reached the second prompt.
    assert_eq!(observer.failures.len(), 1);
    let (window, rule, _, response) = &observer.failures[0];
    assert_eq!(*window, Window { start: 0, end: 3 });
    assert_eq!(*rule, RuleKind::Count);
    assert_eq!(response, "9<sep>1");
    assert!(oracle.prompts[1].contains("2 values for 3 inputs"));

    assert_eq!(observer.progress, vec![(3, 3)]);
}

#[test]
fn membership_rejection_reaches_the_diagnostics_sink() {
    let taxonomy = Taxonomy::new(vec!["noise".to_string(), "cleanliness".to_string()]);
    let task = ClassifyTask::new("classify each text", ResponseGrammar::default(), taxonomy);

    let records = build_records(&["loud hallway", "dusty desk"]);
    let mut oracle = ScriptedOracle::new(&["noise<sep>pricing", "noise<sep>cleanliness"]);
    let mut observer = RecordingObserver::default();

    let result = scheduler(5)
        .run(records, &task, &mut oracle, &mut observer)
        .unwrap();

    let labels: Vec<&str> = result.iter().filter_map(|r| r.label.as_deref()).collect();
    assert_eq!(labels, vec!["noise", "cleanliness"]);

    let (_, rule, offending, response) = &observer.failures[0];
    assert_eq!(*rule, RuleKind::Membership);
    assert_eq!(offending.as_deref(), Some("pricing"));
    assert_eq!(response, "noise<sep>pricing");
}

#[test]
fn resuming_a_partial_run_matches_an_uncut_run() {
    let texts = ["t0", "t1", "t2", "t3", "t4", "t5"];

    let mut full_oracle = ScriptedOracle::new(&["1<sep>2", "3<sep>4", "5<sep>6"]);
    let uncut = scheduler(2)
        .run(
            build_records(&texts),
            &sentiment_task(),
            &mut full_oracle,
            &mut RecordingObserver::default(),
        )
        .unwrap();

    // Same corpus, interrupted after the first two windows.
    let mut partial = build_records(&texts);
    for (index, value) in [1u8, 2, 3, 4].iter().enumerate() {
        partial[index].score = Score::new(*value);
    }
    let mut resume_oracle = ScriptedOracle::new(&["5<sep>6"]);
    let resumed = scheduler(2)
        .run(
            partial,
            &sentiment_task(),
            &mut resume_oracle,
            &mut RecordingObserver::default(),
        )
        .unwrap();

    assert_eq!(scores(&resumed), scores(&uncut));
    // Only the still-pending window went back to the oracle.
    assert_eq!(resume_oracle.prompts.len(), 1);
    assert!(resume_oracle.prompts[0].contains("t4<sep>t5"));
}

#[test]
fn completed_cells_inside_the_pending_span_are_skipped() {
    let mut records = build_records(&["r0", "r1", "r2", "r3", "r4"]);
    records[2].score = Score::new(7);

    let mut oracle = ScriptedOracle::new(&["1<sep>2<sep>4<sep>5"]);
    let result = scheduler(5)
        .run(records, &sentiment_task(), &mut oracle, &mut RecordingObserver::default())
        .unwrap();

    // The written cell kept its value and was never resubmitted.
    assert_eq!(
        scores(&result),
        vec![Some(1), Some(2), Some(7), Some(4), Some(5)]
    );
    assert!(!oracle.prompts[0].contains("r2"));
    assert!(oracle.prompts[0].contains("r1<sep>r3"));
}

#[test]
fn exhausted_retries_surface_as_a_distinct_error() {
    let records = build_records(&["a", "b"]);
    let mut oracle = ScriptedOracle::new(&["nope", "still nope", "never", "no"]);
    let scheduler = BatchScheduler::new(SchedulerConfig {
        batch_size: 2,
        max_attempts: 3,
    });

    let err = scheduler
        .run(records, &sentiment_task(), &mut oracle, &mut RecordingObserver::default())
        .unwrap_err();
    match err {
        AnnotateError::ExhaustedRetries { start, end, attempts } => {
            assert_eq!((start, end), (0, 2));
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(oracle.prompts.len(), 3);
}

#[test]
fn progress_is_cumulative_across_windows() {
    let records = build_records(&["a", "b", "c", "d", "e"]);
    let mut oracle = ScriptedOracle::new(&["1<sep>2", "3<sep>4", "5"]);
    let mut observer = RecordingObserver::default();

    scheduler(2)
        .run(records, &sentiment_task(), &mut oracle, &mut observer)
        .unwrap();
    assert_eq!(observer.progress, vec![(2, 5), (4, 5), (5, 5)]);
}
