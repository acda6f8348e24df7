//! Validation rules applied to parsed oracle responses.
//!
//! Rules are checked in declaration order and a response is accepted only
//! when every rule passes. The first failing rule supplies the corrective
//! fragment carried into the next invocation round; earlier fragments are
//! replaced, never accumulated.

use crate::constants::score::SCORE_MAX;
use crate::grammar::{ParsedResponse, ResponseGrammar};
use crate::types::Label;

/// Identifies which rule rejected a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    /// Parsed value count did not match the submitted input count.
    Count,
    /// A value fell outside the score grammar.
    ScoreRange,
    /// A value was not a member of the closed label set.
    Membership,
    /// A required section marker was missing.
    Sections,
    /// The two outer sections disagreed in shape or item count.
    ParallelCounts,
}

/// A failed validation: the corrective fragment for the next round plus
/// diagnostics for the observer.
#[derive(Clone, Debug)]
pub struct ValidationFailure {
    /// Which rule rejected the response.
    pub rule: RuleKind,
    /// Natural-language instruction prepended to the next prompt.
    pub corrective: String,
    /// The offending value, when a single value caused the rejection.
    pub offending: Option<String>,
}

/// One pluggable validation predicate over a parsed response.
#[derive(Clone, Debug)]
pub enum Rule {
    /// Parsed value count must equal the number of submitted inputs.
    Count {
        /// Number of texts submitted in the window.
        expected: usize,
    },
    /// Every value must be an integer score in `0..=10`: a single digit or
    /// the two characters `10`. Zero-padded forms like `07` are rejected.
    ScoreRange,
    /// Every value must be an exact member of the closed label set.
    Membership {
        /// The taxonomy's labels, in order.
        labels: Vec<Label>,
    },
    /// The raw response must contain every named section marker.
    Sections {
        /// Required marker strings (e.g. the problem and rationale headers).
        markers: Vec<String>,
    },
    /// The response must split into exactly two outer sections whose listed
    /// items line up one to one.
    ParallelCounts,
}

impl Rule {
    /// Check one rule against a parsed response.
    pub fn check(
        &self,
        grammar: &ResponseGrammar,
        parsed: &ParsedResponse,
    ) -> Result<(), ValidationFailure> {
        match self {
            Rule::Count { expected } => check_count(grammar, parsed, *expected),
            Rule::ScoreRange => check_score_range(grammar, parsed),
            Rule::Membership { labels } => check_membership(grammar, parsed, labels),
            Rule::Sections { markers } => check_sections(parsed, markers),
            Rule::ParallelCounts => check_parallel_counts(grammar, parsed),
        }
    }

    /// Check rules in declaration order; the first failure wins.
    pub fn check_all(
        rules: &[Rule],
        grammar: &ResponseGrammar,
        parsed: &ParsedResponse,
    ) -> Result<(), ValidationFailure> {
        for rule in rules {
            rule.check(grammar, parsed)?;
        }
        Ok(())
    }
}

fn check_count(
    grammar: &ResponseGrammar,
    parsed: &ParsedResponse,
    expected: usize,
) -> Result<(), ValidationFailure> {
    let observed = parsed.values.len();
    if observed == expected {
        return Ok(());
    }
    Err(ValidationFailure {
        rule: RuleKind::Count,
        corrective: format!(
            "The previous reply contained {observed} values for {expected} inputs. \
             Separate every value with {sep} and reply with exactly {expected} values, \
             one per input text, in input order.",
            sep = grammar.field_sep,
        ),
        offending: None,
    })
}

fn check_score_range(
    grammar: &ResponseGrammar,
    parsed: &ParsedResponse,
) -> Result<(), ValidationFailure> {
    match parsed.values.iter().find(|v| !is_score_field(v)) {
        None => Ok(()),
        Some(bad) => Err(ValidationFailure {
            rule: RuleKind::ScoreRange,
            corrective: format!(
                "The previous reply did not match the answer template. Reply as \
                 xx{sep}xx{sep}...{sep}xx where each xx is an integer score from 0 to {max}.",
                sep = grammar.field_sep,
                max = SCORE_MAX,
            ),
            offending: Some(bad.clone()),
        }),
    }
}

fn check_membership(
    grammar: &ResponseGrammar,
    parsed: &ParsedResponse,
    labels: &[Label],
) -> Result<(), ValidationFailure> {
    match parsed
        .values
        .iter()
        .find(|v| !labels.iter().any(|label| label == *v))
    {
        None => Ok(()),
        Some(bad) => Err(ValidationFailure {
            rule: RuleKind::Membership,
            corrective: format!(
                "The previous reply used the label \"{bad}\", which is not in the \
                 allowed set. Every value must be exactly one of: {set}. Reply as \
                 xx{sep}xx{sep}...{sep}xx.",
                set = labels.join(", "),
                sep = grammar.field_sep,
            ),
            offending: Some(bad.clone()),
        }),
    }
}

fn check_sections(parsed: &ParsedResponse, markers: &[String]) -> Result<(), ValidationFailure> {
    match markers.iter().find(|marker| !parsed.raw.contains(*marker)) {
        None => Ok(()),
        Some(missing) => Err(ValidationFailure {
            rule: RuleKind::Sections,
            corrective: format!(
                "The previous reply was missing the required \"{missing}\" section. \
                 Reply with every section of the answer template, completely."
            ),
            offending: Some(missing.clone()),
        }),
    }
}

fn check_parallel_counts(
    grammar: &ResponseGrammar,
    parsed: &ParsedResponse,
) -> Result<(), ValidationFailure> {
    if parsed.sections.len() != 2 {
        return Err(ValidationFailure {
            rule: RuleKind::ParallelCounts,
            corrective: format!(
                "The previous reply did not use the outer separator correctly. Divide \
                 the reply into exactly two sections with a single {outer} between them.",
                outer = grammar.section_sep,
            ),
            offending: None,
        });
    }
    let first = grammar.decode_list(&parsed.sections[0]).len();
    let second = grammar.decode_list(&parsed.sections[1]).len();
    if first != second {
        return Err(ValidationFailure {
            rule: RuleKind::ParallelCounts,
            corrective: format!(
                "The two sections of the previous reply listed {first} and {second} \
                 items. Separate items with {inner} and list the same number of items \
                 in both sections, matched one to one.",
                inner = grammar.list_sep,
            ),
            offending: None,
        });
    }
    Ok(())
}

/// A score field is a single ASCII digit or exactly `10`.
fn is_score_field(value: &str) -> bool {
    value == "10" || (value.len() == 1 && value.as_bytes()[0].is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(response: &str) -> ParsedResponse {
        ResponseGrammar::default().parse(response)
    }

    #[test]
    fn count_rule_reports_required_versus_observed() {
        let grammar = ResponseGrammar::default();
        let rule = Rule::Count { expected: 3 };
        assert!(rule.check(&grammar, &parsed("9<sep>1<sep>5")).is_ok());

        let failure = rule.check(&grammar, &parsed("9<sep>1")).unwrap_err();
        assert_eq!(failure.rule, RuleKind::Count);
        assert!(failure.corrective.contains('2'));
        assert!(failure.corrective.contains('3'));
    }

    #[test]
    fn score_rule_accepts_only_digits_and_ten() {
        let grammar = ResponseGrammar::default();
        assert!(Rule::ScoreRange
            .check(&grammar, &parsed("0<sep>10<sep>7"))
            .is_ok());

        for bad in ["11", "07", "-1", "ten", "9.5"] {
            let failure = Rule::ScoreRange.check(&grammar, &parsed(bad)).unwrap_err();
            assert_eq!(failure.rule, RuleKind::ScoreRange);
            assert_eq!(failure.offending.as_deref(), Some(bad));
        }
    }

    #[test]
    fn membership_rule_names_the_offending_label() {
        let grammar = ResponseGrammar::default();
        let rule = Rule::Membership {
            labels: vec!["noise".into(), "cleanliness".into(), "other".into()],
        };
        assert!(rule.check(&grammar, &parsed("noise<sep>other")).is_ok());

        let failure = rule
            .check(&grammar, &parsed("noise<sep>pricing"))
            .unwrap_err();
        assert_eq!(failure.rule, RuleKind::Membership);
        assert_eq!(failure.offending.as_deref(), Some("pricing"));
        assert!(failure.corrective.contains("cleanliness"));
    }

    #[test]
    fn sections_rule_asks_for_the_missing_marker() {
        let grammar = ResponseGrammar::default();
        let rule = Rule::Sections {
            markers: vec!["problem".into(), "rationale".into()],
        };
        assert!(rule
            .check(&grammar, &parsed("problem: 1.x<sep1>rationale: 1.y"))
            .is_ok());

        let failure = rule.check(&grammar, &parsed("problem: 1.x")).unwrap_err();
        assert_eq!(failure.rule, RuleKind::Sections);
        assert_eq!(failure.offending.as_deref(), Some("rationale"));
    }

    #[test]
    fn parallel_counts_rule_rejects_shape_and_count_mismatches() {
        let grammar = ResponseGrammar::default();
        let rule = Rule::ParallelCounts;
        assert!(rule
            .check(&grammar, &parsed("p: 1.a<sep0>2.b<sep1>r: 1.c<sep0>2.d"))
            .is_ok());

        // No outer separator at all.
        let failure = rule.check(&grammar, &parsed("p: 1.a<sep0>2.b")).unwrap_err();
        assert_eq!(failure.rule, RuleKind::ParallelCounts);

        // Two sections, uneven item counts.
        let failure = rule
            .check(&grammar, &parsed("p: 1.a<sep0>2.b<sep1>r: 1.c"))
            .unwrap_err();
        assert_eq!(failure.rule, RuleKind::ParallelCounts);
    }

    #[test]
    fn conjunction_stops_at_the_first_failing_rule() {
        let grammar = ResponseGrammar::default();
        let rules = [Rule::Count { expected: 2 }, Rule::ScoreRange];

        // Both rules would fail; the count rule is declared first.
        let failure = Rule::check_all(&rules, &grammar, &parsed("banana")).unwrap_err();
        assert_eq!(failure.rule, RuleKind::Count);

        // Count passes, score range is the one that rejects.
        let failure = Rule::check_all(&rules, &grammar, &parsed("9<sep>banana")).unwrap_err();
        assert_eq!(failure.rule, RuleKind::ScoreRange);

        assert!(Rule::check_all(&rules, &grammar, &parsed("9<sep>10")).is_ok());
    }
}
