//! Error-anchor extraction for diagnostic questions.
//!
//! Pulls exception types, quoted (or colon-trailing) error messages, file
//! paths, and `in <function>` names out of the question text.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticAnchors {
    pub exception_types: Vec<String>,
    pub error_strings: Vec<String>,
    pub file_paths: Vec<String>,
    pub function_names: Vec<String>,
}

impl DiagnosticAnchors {
    pub fn is_empty(&self) -> bool {
        self.exception_types.is_empty()
            && self.error_strings.is_empty()
            && self.file_paths.is_empty()
            && self.function_names.is_empty()
    }
}

fn regexes() -> &'static (Regex, Regex, Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            // (module.)Name(Error|Exception)
            Regex::new(r"\b(?:[A-Za-z_][A-Za-z0-9_]*\.)?[A-Z][A-Za-z0-9_]*(?:Error|Exception)\b")
                .expect("exception regex"),
            // quoted strings of 5+ chars
            Regex::new(r#""([^"]{5,})"|'([^']{5,})'"#).expect("quoted regex"),
            // message after `SomeError: ...` up to sentence end
            Regex::new(r"(?:Error|Exception):\s*([^?.!\n]{5,})").expect("colon-message regex"),
            // file paths with a known source extension
            Regex::new(r"\b[\w./-]*\w\.(?:py|rs|ts|tsx|js|jsx)\b").expect("path regex"),
            // `in function_name` / `in function_name()`
            Regex::new(r"\bin\s+([a-z_][A-Za-z0-9_]*)(?:\(\))?").expect("function regex"),
        )
    })
}

/// Extract all anchors from a question.
pub fn extract_anchors(question: &str) -> DiagnosticAnchors {
    let (re_exc, re_quoted, re_colon, re_path, re_func) = regexes();
    let mut out = DiagnosticAnchors::default();

    for m in re_exc.find_iter(question) {
        push_unique(&mut out.exception_types, m.as_str().to_string());
    }
    for c in re_quoted.captures_iter(question) {
        if let Some(s) = c.get(1).or_else(|| c.get(2)) {
            push_unique(&mut out.error_strings, s.as_str().trim().to_string());
        }
    }
    for c in re_colon.captures_iter(question) {
        if let Some(s) = c.get(1) {
            push_unique(&mut out.error_strings, s.as_str().trim().to_string());
        }
    }
    for m in re_path.find_iter(question) {
        push_unique(&mut out.file_paths, m.as_str().to_string());
    }
    for c in re_func.captures_iter(question) {
        if let Some(s) = c.get(1) {
            let name = s.as_str().to_string();
            // common prose words after "in" are not function names
            if !matches!(name.as_str(), "the" | "a" | "an" | "my" | "this" | "that" | "our") {
                push_unique(&mut out.function_names, name);
            }
        }
    }
    out
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_b_question() {
        let a = extract_anchors("Why am I getting sqlite3.OperationalError: readonly database?");
        assert_eq!(a.exception_types, vec!["sqlite3.OperationalError"]);
        assert_eq!(a.error_strings, vec!["readonly database"]);
    }

    #[test]
    fn quoted_strings_and_paths() {
        let a = extract_anchors(
            "The call in get_db of api/deps.py fails with \"database is locked\"",
        );
        assert!(a.error_strings.contains(&"database is locked".to_string()));
        assert_eq!(a.file_paths, vec!["api/deps.py"]);
        assert_eq!(a.function_names, vec!["get_db"]);
    }

    #[test]
    fn short_quotes_are_ignored() {
        let a = extract_anchors("it says 'bad' somewhere");
        assert!(a.error_strings.is_empty());
    }

    #[test]
    fn prose_after_in_is_not_a_function() {
        let a = extract_anchors("why is login failing in the session layer");
        assert!(a.function_names.is_empty());
    }
}
