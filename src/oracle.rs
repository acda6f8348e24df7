//! Oracle capability and the validated invocation loop.
//!
//! The loop is a per-window state machine: COMPOSE a prompt (task message
//! plus any corrective fragment from the previous round), INVOKE the oracle,
//! PARSE the response with the grammar, VALIDATE it against the task's rules,
//! and either ACCEPT or go around again. Invoking the oracle is the only
//! blocking operation in the whole pipeline.

use tracing::warn;

use crate::errors::AnnotateError;
use crate::grammar::{ParsedResponse, ResponseGrammar};
use crate::observer::Observer;
use crate::schedule::Window;
use crate::types::{PromptText, ResponseText};
use crate::validate::Rule;

/// Capability to answer one composed prompt with free text.
///
/// Any `Prompt → Text` function qualifies; transport concerns (timeouts,
/// backoff, model configuration) belong to the implementation.
pub trait Oracle {
    /// Answer a single composed prompt.
    fn complete(&mut self, prompt: &str) -> Result<ResponseText, AnnotateError>;
}

/// Wrap a closure as an [`Oracle`].
pub fn from_fn<F>(f: F) -> FnOracle<F>
where
    F: FnMut(&str) -> Result<ResponseText, AnnotateError>,
{
    FnOracle(f)
}

/// Closure-backed oracle returned by [`from_fn`].
pub struct FnOracle<F>(F);

impl<F> Oracle for FnOracle<F>
where
    F: FnMut(&str) -> Result<ResponseText, AnnotateError>,
{
    fn complete(&mut self, prompt: &str) -> Result<ResponseText, AnnotateError> {
        (self.0)(prompt)
    }
}

/// Per-window retry state, threaded functionally through the loop.
///
/// The corrective fragment is replaced each round, not accumulated: each
/// validator restates everything the oracle needs to fix its reply.
#[derive(Clone, Debug, Default)]
pub struct RetryContext {
    /// Number of attempts already made on this window.
    pub attempt: u32,
    /// Corrective instruction produced by the last failed attempt.
    pub corrective: Option<String>,
}

impl RetryContext {
    /// Context for the next round after a failure.
    pub fn next(self, corrective: String) -> Self {
        Self {
            attempt: self.attempt + 1,
            corrective: Some(corrective),
        }
    }

    /// COMPOSE step: instructions, corrective fragment (if any), and the
    /// task message, joined by blank lines.
    pub fn compose(&self, instructions: &str, task_message: &str) -> PromptText {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if !instructions.is_empty() {
            parts.push(instructions);
        }
        if let Some(fragment) = self.corrective.as_deref() {
            parts.push(fragment);
        }
        parts.push(task_message);
        parts.join("\n\n")
    }
}

/// Run the invocation loop for one window until the response validates or
/// the attempt cap is reached.
///
/// Returns the parsed accepted response. Every rejection is logged and
/// reported to the observer together with the offending response text.
pub fn run_validated<O: Oracle + ?Sized>(
    oracle: &mut O,
    instructions: &str,
    task_message: &str,
    grammar: &ResponseGrammar,
    rules: &[Rule],
    max_attempts: u32,
    window: Window,
    observer: &mut dyn Observer,
) -> Result<ParsedResponse, AnnotateError> {
    let mut ctx = RetryContext::default();
    loop {
        let prompt = ctx.compose(instructions, task_message);
        let response = oracle.complete(&prompt)?;
        let parsed = grammar.parse(&response);
        match Rule::check_all(rules, grammar, &parsed) {
            Ok(()) => return Ok(parsed),
            Err(failure) => {
                warn!(
                    start = window.start,
                    end = window.end,
                    attempt = ctx.attempt,
                    rule = ?failure.rule,
                    offending = failure.offending.as_deref(),
                    "window response failed validation, retrying"
                );
                observer.validation_failed(window, &failure, &response);
                ctx = ctx.next(failure.corrective.clone());
                if ctx.attempt >= max_attempts {
                    return Err(AnnotateError::ExhaustedRetries {
                        start: window.start,
                        end: window.end,
                        attempts: ctx.attempt,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;

    #[test]
    fn compose_orders_instructions_fragment_and_task() {
        let ctx = RetryContext::default();
        assert_eq!(ctx.compose("sys", "a<sep>b"), "sys\n\na<sep>b");

        let ctx = ctx.next("fix the count".into());
        assert_eq!(ctx.attempt, 1);
        assert_eq!(
            ctx.compose("sys", "a<sep>b"),
            "sys\n\nfix the count\n\na<sep>b"
        );
    }

    #[test]
    fn loop_accepts_once_rules_pass() {
        let grammar = ResponseGrammar::default();
        let mut responses = vec!["9<sep>1", "9<sep>1<sep>5"].into_iter();
        let mut oracle = from_fn(move |_prompt| Ok(responses.next().unwrap().to_string()));

        let parsed = run_validated(
            &mut oracle,
            "score these",
            "a<sep>b<sep>c",
            &grammar,
            &[Rule::Count { expected: 3 }, Rule::ScoreRange],
            4,
            Window { start: 0, end: 3 },
            &mut NullObserver,
        )
        .unwrap();
        assert_eq!(parsed.values, vec!["9", "1", "5"]);
    }

    #[test]
    fn loop_reports_exhaustion_with_the_window_span() {
        let grammar = ResponseGrammar::default();
        let mut oracle = from_fn(|_prompt| Ok("not a score".to_string()));

        let err = run_validated(
            &mut oracle,
            "",
            "a",
            &grammar,
            &[Rule::ScoreRange],
            3,
            Window { start: 4, end: 5 },
            &mut NullObserver,
        )
        .unwrap_err();
        match err {
            AnnotateError::ExhaustedRetries {
                start,
                end,
                attempts,
            } => {
                assert_eq!((start, end), (4, 5));
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn corrective_fragment_reaches_the_next_prompt() {
        let grammar = ResponseGrammar::default();
        let mut prompts: Vec<String> = Vec::new();
        let mut responses = vec!["9", "9<sep>1"].into_iter();
        let result = {
            let mut oracle = from_fn(|prompt: &str| {
                prompts.push(prompt.to_string());
                Ok(responses.next().unwrap().to_string())
            });
            run_validated(
                &mut oracle,
                "score these",
                "a<sep>b",
                &grammar,
                &[Rule::Count { expected: 2 }],
                4,
                Window { start: 0, end: 2 },
                &mut NullObserver,
            )
        };
        assert!(result.is_ok());
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("previous reply"));
        assert!(prompts[1].contains("previous reply"));
    }
}
