//! Delimiter-based structured response grammar.
//!
//! Encoding joins N ordered values with the field separator; two-part
//! responses use an outer section separator dividing the text into parallel
//! lists. Decoding is best-effort and never fails on malformed input; the
//! validation rules are solely responsible for rejecting a parse.

use std::borrow::Cow;

use crate::constants::grammar::{FIELD_SEP, LIST_SEP, SECTION_SEP};

/// Separator set for the oracle wire format.
///
/// Kept as an explicit type (rather than ad hoc pattern matching) so adding
/// another separator level stays a localized change.
#[derive(Clone, Debug)]
pub struct ResponseGrammar {
    /// Separator between per-record values.
    pub field_sep: Cow<'static, str>,
    /// Separator between items inside one listed section.
    pub list_sep: Cow<'static, str>,
    /// Outer separator dividing a two-part response into sections.
    pub section_sep: Cow<'static, str>,
}

impl Default for ResponseGrammar {
    fn default() -> Self {
        Self {
            field_sep: FIELD_SEP.into(),
            list_sep: LIST_SEP.into(),
            section_sep: SECTION_SEP.into(),
        }
    }
}

/// Best-effort parse of a raw oracle response.
#[derive(Clone, Debug)]
pub struct ParsedResponse {
    /// The raw response text, untouched.
    pub raw: String,
    /// Field-separated values after trimming.
    pub values: Vec<String>,
    /// Outer sections after trimming (one element when no outer separator).
    pub sections: Vec<String>,
}

impl ResponseGrammar {
    /// Encode N ordered values as `v1<sep>v2<sep>...<sep>vN`.
    pub fn encode<S: AsRef<str>>(&self, values: &[S]) -> String {
        values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join(self.field_sep.as_ref())
    }

    /// Split on the field separator after trimming whitespace and stray
    /// leading/trailing separators. An empty trailing segment never becomes
    /// an extra value.
    pub fn decode(&self, response: &str) -> Vec<String> {
        split_trimmed(response, &self.field_sep)
    }

    /// Split on the outer section separator with the same trimming rules.
    pub fn decode_sections(&self, response: &str) -> Vec<String> {
        split_trimmed(response, &self.section_sep)
    }

    /// Split one section's body on the list-item separator.
    pub fn decode_list(&self, segment: &str) -> Vec<String> {
        split_trimmed(segment, &self.list_sep)
    }

    /// Parse a raw response into both views at once.
    pub fn parse(&self, response: &str) -> ParsedResponse {
        ParsedResponse {
            raw: response.to_string(),
            values: self.decode(response),
            sections: self.decode_sections(response),
        }
    }
}

fn split_trimmed(text: &str, sep: &str) -> Vec<String> {
    let trimmed = trim_separators(text.trim(), sep);
    if trimmed.is_empty() {
        return Vec::new();
    }
    // An empty separator cannot split anything.
    if sep.is_empty() {
        return vec![trimmed.to_string()];
    }
    trimmed
        .split(sep)
        .map(|part| part.trim().to_string())
        .collect()
}

fn trim_separators<'a>(mut text: &'a str, sep: &str) -> &'a str {
    if sep.is_empty() {
        return text;
    }
    loop {
        let mut progressed = false;
        if let Some(rest) = text.strip_prefix(sep) {
            text = rest.trim_start();
            progressed = true;
        }
        if let Some(rest) = text.strip_suffix(sep) {
            text = rest.trim_end();
            progressed = true;
        }
        if !progressed {
            return text;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_returns_the_original_values() {
        let grammar = ResponseGrammar::default();
        let values = ["9", "1", "5"];
        let wire = grammar.encode(&values);
        assert_eq!(wire, "9<sep>1<sep>5");
        assert_eq!(grammar.decode(&wire), vec!["9", "1", "5"]);
    }

    #[test]
    fn decode_trims_whitespace_and_stray_separators() {
        let grammar = ResponseGrammar::default();
        assert_eq!(grammar.decode("  <sep>9<sep>1<sep> "), vec!["9", "1"]);
        assert_eq!(grammar.decode("<sep><sep>9<sep>1<sep><sep>"), vec!["9", "1"]);
    }

    #[test]
    fn trailing_separator_does_not_create_an_extra_value() {
        let grammar = ResponseGrammar::default();
        assert_eq!(grammar.decode("9<sep>1<sep>").len(), 2);
    }

    #[test]
    fn decode_of_empty_input_is_empty() {
        let grammar = ResponseGrammar::default();
        assert!(grammar.decode("").is_empty());
        assert!(grammar.decode("  <sep> ").is_empty());
    }

    #[test]
    fn an_empty_separator_yields_the_whole_text_as_one_value() {
        let grammar = ResponseGrammar {
            field_sep: "".into(),
            ..ResponseGrammar::default()
        };
        assert_eq!(grammar.decode("9 1"), vec!["9 1"]);
        assert!(grammar.decode("").is_empty());
    }

    #[test]
    fn two_part_responses_split_into_parallel_sections() {
        let grammar = ResponseGrammar::default();
        let wire = "problem: 1.noise<sep0>2.smell<sep1>rationale: 1.loud street<sep0>2.stale air";
        let sections = grammar.decode_sections(wire);
        assert_eq!(sections.len(), 2);
        assert_eq!(
            grammar.decode_list(&sections[0]),
            vec!["problem: 1.noise", "2.smell"]
        );
        assert_eq!(grammar.decode_list(&sections[1]).len(), 2);
    }

    #[test]
    fn malformed_input_still_parses_best_effort() {
        let grammar = ResponseGrammar::default();
        let parsed = grammar.parse("free text with no separators at all");
        assert_eq!(parsed.values.len(), 1);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.raw, "free text with no separators at all");
    }
}
