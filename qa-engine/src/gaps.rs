//! Gap resolution: turn a free-text gap description into concrete context.
//!
//! Direct lookup against the code index comes first (file+symbol, then
//! file, then symbol); hybrid search on the raw gap text is the fallback.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use code_index::{CodeIndex, IndexEntry};

/// File/symbol references pulled out of a gap description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapRef {
    pub file: Option<String>,
    pub symbol: Option<String>,
}

fn regexes() -> &'static (Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            // `X in path/to/file.ext`
            Regex::new(r"\b([A-Za-z_][A-Za-z0-9_.]*)\s+in\s+([\w./-]+\.\w+)")
                .expect("symbol-in-file regex"),
            // `func()`
            Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\(\)").expect("call regex"),
            // bare file name like `deps.py`
            Regex::new(r"\b([\w./-]*\w\.(?:py|rs|ts|tsx|js|jsx))\b").expect("file regex"),
        )
    })
}

/// Extract the best file/symbol reference from a gap description.
pub fn extract_gap_ref(gap: &str) -> GapRef {
    let (re_in, re_call, re_file) = regexes();

    if let Some(c) = re_in.captures(gap) {
        let symbol = c.get(1).map(|m| m.as_str().to_string());
        let file = c.get(2).map(|m| m.as_str().to_string());
        // "implementation of X in file" style: X may be prose like
        // "implementation", prefer an explicit call-form symbol if present
        let symbol = match re_call.captures(gap).and_then(|c| c.get(1)) {
            Some(m) => Some(m.as_str().to_string()),
            None => symbol.filter(|s| !is_prose_word(s)),
        };
        return GapRef { file, symbol };
    }

    let symbol = re_call
        .captures(gap)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let file = re_file
        .captures(gap)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    if symbol.is_none() && file.is_none() {
        // last resort: a lone snake_case word reads as a symbol name
        let word = gap
            .split_whitespace()
            .find(|w| w.contains('_') && w.chars().all(|c| c.is_alphanumeric() || c == '_'));
        return GapRef {
            file: None,
            symbol: word.map(str::to_string),
        };
    }
    GapRef { file, symbol }
}

fn is_prose_word(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "implementation" | "definition" | "code" | "body" | "contents" | "details" | "of"
    )
}

/// Direct lookup: file+symbol, then file, then symbol. Returns matched
/// entries, empty when nothing hit.
pub fn direct_lookup(index: &CodeIndex, gap_ref: &GapRef) -> Vec<IndexEntry> {
    let result = match (&gap_ref.file, &gap_ref.symbol) {
        (Some(file), Some(symbol)) => {
            let hits = index.find_by_file_and_symbol(file, symbol).unwrap_or_default();
            if !hits.is_empty() {
                hits
            } else {
                let by_file = index.find_by_file(file).unwrap_or_default();
                if !by_file.is_empty() {
                    by_file
                } else {
                    index.find_by_symbol(symbol).unwrap_or_default()
                }
            }
        }
        (Some(file), None) => index.find_by_file(file).unwrap_or_default(),
        (None, Some(symbol)) => index.find_by_symbol(symbol).unwrap_or_default(),
        (None, None) => Vec::new(),
    };
    debug!(hits = result.len(), "gap direct lookup");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{parse_file, LanguageKind};

    #[test]
    fn scenario_e_gap_text() {
        let r = extract_gap_ref("implementation of get_notes_service in api/routers/notes.py");
        assert_eq!(r.file.as_deref(), Some("api/routers/notes.py"));
        assert_eq!(r.symbol.as_deref(), Some("get_notes_service"));
    }

    #[test]
    fn call_form_symbol() {
        let r = extract_gap_ref("what does get_db() return");
        assert_eq!(r.symbol.as_deref(), Some("get_db"));
        assert!(r.file.is_none());
    }

    #[test]
    fn bare_file_reference() {
        let r = extract_gap_ref("the contents of deps.py");
        assert_eq!(r.file.as_deref(), Some("deps.py"));
    }

    #[test]
    fn lone_snake_case_word_is_symbol() {
        let r = extract_gap_ref("details about save_session behavior");
        assert_eq!(r.symbol.as_deref(), Some("save_session"));
    }

    #[test]
    fn lookup_order_file_and_symbol_first() {
        let notes = parse_file(
            "api/routers/notes.py",
            "def get_notes_service():\n    return 1\n",
            LanguageKind::Python,
        )
        .unwrap();
        let mut index = CodeIndex::open_in_memory().unwrap();
        index.build(&[notes], "h").unwrap();

        let hits = direct_lookup(
            &index,
            &GapRef {
                file: Some("api/routers/notes.py".into()),
                symbol: Some("get_notes_service".into()),
            },
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol_name, "get_notes_service");

        // wrong file still falls back to the symbol
        let hits = direct_lookup(
            &index,
            &GapRef {
                file: Some("zzz/nope.py".into()),
                symbol: Some("get_notes_service".into()),
            },
        );
        assert_eq!(hits.len(), 1);
    }
}
