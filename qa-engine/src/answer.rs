//! Robust parsing of the LLM's tagged answer format.
//!
//! The model is asked for `<answer>`, `<missing>`, and `<citations>`
//! blocks. Tags are matched case-insensitively with whitespace tolerance;
//! when the answer tag is absent the whole response (minus any other known
//! tags) is the answer. The client never sees a raw tag.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::types::Citation;

#[derive(Debug, Clone, Default)]
pub struct ParsedAnswer {
    pub answer: String,
    pub missing: Vec<String>,
    pub citations: Vec<Citation>,
}

fn tag_regex(tag: &str) -> Regex {
    // case-insensitive, whitespace-tolerant, non-greedy body
    Regex::new(&format!(
        r"(?is)<\s*{tag}\s*>(.*?)<\s*/\s*{tag}\s*>"
    ))
    .expect("tag regex")
}

fn regexes() -> &'static (Regex, Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            tag_regex("answer"),
            tag_regex("missing"),
            tag_regex("citations"),
            Regex::new(r"(?i)<\s*/?\s*(?:answer|missing|citations)\s*>").expect("strip regex"),
        )
    })
}

/// Parse one LLM response into its parts.
pub fn parse_response(raw: &str) -> ParsedAnswer {
    let (re_answer, re_missing, re_citations, re_strip) = regexes();

    let answer = match re_answer.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        // tag-absent fallback: whole response, with stray tags and other
        // blocks removed
        None => {
            let without_missing = re_missing.replace_all(raw, "");
            let without_citations = re_citations.replace_all(&without_missing, "");
            re_strip
                .replace_all(&without_citations, "")
                .trim()
                .to_string()
        }
    };

    let missing = re_missing
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| split_gaps(m.as_str()))
        .unwrap_or_default();

    let citations = re_citations
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| parse_citations(m.as_str()))
        .unwrap_or_default();

    ParsedAnswer {
        answer,
        missing,
        citations,
    }
}

/// Gap lines: one per line or semicolon-separated.
fn split_gaps(block: &str) -> Vec<String> {
    block
        .split(['\n', ';'])
        .map(|s| s.trim().trim_start_matches('-').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Citations block: JSON array preferred, plain lines accepted.
fn parse_citations(block: &str) -> Vec<Citation> {
    #[derive(Deserialize)]
    struct Wire {
        path: String,
        #[serde(default)]
        line_start: Option<u32>,
        #[serde(default)]
        line_end: Option<u32>,
    }

    let trimmed = block.trim();
    if let Ok(wire) = serde_json::from_str::<Vec<Wire>>(trimmed) {
        return wire
            .into_iter()
            .map(|w| Citation {
                path: w.path,
                line_start: w.line_start,
                line_end: w.line_end,
            })
            .collect();
    }
    // fallback: one path per line, optional `:start-end`
    trimmed
        .lines()
        .map(|l| l.trim().trim_start_matches('-').trim())
        .filter(|l| !l.is_empty())
        .map(|l| match l.rsplit_once(':') {
            Some((path, range)) if range.contains('-') => {
                let mut parts = range.splitn(2, '-');
                let start = parts.next().and_then(|s| s.trim().parse().ok());
                let end = parts.next().and_then(|s| s.trim().parse().ok());
                Citation {
                    path: path.trim().to_string(),
                    line_start: start,
                    line_end: end,
                }
            }
            _ => Citation {
                path: l.to_string(),
                line_start: None,
                line_end: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tags_parse() {
        let p = parse_response(
            "<answer>The cache is keyed by fingerprint.</answer><citations>[{\"path\": \"api/cache.py\"}]</citations>",
        );
        assert_eq!(p.answer, "The cache is keyed by fingerprint.");
        assert_eq!(p.citations.len(), 1);
        assert_eq!(p.citations[0].path, "api/cache.py");
        assert!(!p.answer.contains("<answer>"));
    }

    #[test]
    fn case_and_whitespace_tolerant() {
        let p = parse_response("< Answer >\n  ok then \n</ ANSWER >");
        assert_eq!(p.answer, "ok then");
    }

    #[test]
    fn absent_tags_mean_whole_text() {
        let p = parse_response("Just a plain reply with no tags.");
        assert_eq!(p.answer, "Just a plain reply with no tags.");
        assert!(p.missing.is_empty());
    }

    #[test]
    fn missing_block_splits_into_gaps() {
        let p = parse_response(
            "<answer>partial</answer>\n<missing>\n- implementation of get_notes_service in api/routers/notes.py\nschema of notes table\n</missing>",
        );
        assert_eq!(p.missing.len(), 2);
        assert!(p.missing[0].contains("get_notes_service"));
    }

    #[test]
    fn stray_tags_never_leak_into_answer() {
        let p = parse_response("some text <missing>gap one</missing> more text");
        assert!(!p.answer.contains("<missing>"));
        assert!(!p.answer.contains("gap one"));
        assert_eq!(p.missing, vec!["gap one"]);
    }

    #[test]
    fn citation_lines_with_ranges() {
        let p = parse_response("<answer>x</answer><citations>api/deps.py:10-25\napi/main.py</citations>");
        assert_eq!(p.citations[0].path, "api/deps.py");
        assert_eq!(p.citations[0].line_start, Some(10));
        assert_eq!(p.citations[1].path, "api/main.py");
    }
}
