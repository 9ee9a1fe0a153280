//! Call-site synopsis selection.
//!
//! When a file's own documentation has no usage example, the next best
//! synopsis is a real snippet from a caller. Candidate callers are sorted
//! by `(caller_file, line)` and the first non-test caller wins; test code
//! is used only when nothing else calls the symbol.

use std::collections::HashMap;

use code_index::CodeIndex;
use tracing::debug;

use source_analyzer::ParsedFile;

/// A chosen call-site snippet plus the other callers worth listing.
#[derive(Debug, Clone)]
pub struct CallSiteSynopsis {
    pub caller_file: String,
    pub caller_symbol: String,
    pub line_start: u32,
    pub line_end: u32,
    pub snippet: String,
    /// `file::symbol` of other callers, capped by config.
    pub other_callers: Vec<String>,
    pub from_test: bool,
}

/// Pick the best call site for any symbol defined in `file_path`.
pub fn choose_call_site(
    index: &CodeIndex,
    file_path: &str,
    files_by_path: &HashMap<String, &ParsedFile>,
    max_other_callers: usize,
) -> Option<CallSiteSynopsis> {
    // candidate callers of any indexable symbol in this file
    let mut candidates: Vec<(String, String, u32, u32)> = Vec::new();
    let own = index.find_by_file(file_path).ok()?;
    for entry in own.iter().filter(|e| e.file_path == file_path) {
        let callers = index.callers(entry.short_name()).ok()?;
        for c in callers {
            if c.file_path == file_path {
                continue;
            }
            candidates.push((c.file_path, c.symbol_name, c.line_start, c.line_end));
        }
    }
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| (&a.0, a.2).cmp(&(&b.0, b.2)));
    candidates.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);

    // production code preferred; tests only as fallback
    let pick = candidates
        .iter()
        .position(|(file, _, _, _)| !is_test_path(file))
        .unwrap_or(0);
    let (caller_file, caller_symbol, line_start, line_end) = candidates[pick].clone();

    let snippet = files_by_path
        .get(caller_file.as_str())
        .map(|f| slice_lines(&f.content, line_start, line_end))
        .filter(|s| !s.trim().is_empty())?;

    let other_callers = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != pick)
        .take(max_other_callers)
        .map(|(_, (file, sym, _, _))| format!("{file}::{sym}"))
        .collect();

    debug!(
        file = file_path,
        caller = %format!("{caller_file}::{caller_symbol}"),
        "call-site synopsis chosen"
    );

    Some(CallSiteSynopsis {
        from_test: is_test_path(&caller_file),
        caller_file,
        caller_symbol,
        line_start,
        line_end,
        snippet,
        other_callers,
    })
}

pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("test") || lower.contains("spec")
}

fn slice_lines(src: &str, start: u32, end: u32) -> String {
    let mut out = String::new();
    for (i, line) in src.lines().enumerate() {
        let ln = (i + 1) as u32;
        if ln >= start && ln <= end {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{parse_file, LanguageKind};

    fn setup() -> (CodeIndex, Vec<ParsedFile>) {
        let deps = parse_file(
            "api/deps.py",
            "def get_db(name):\n    return name\n",
            LanguageKind::Python,
        )
        .unwrap();
        let test_caller = parse_file(
            "tests/test_deps.py",
            "def test_get_db():\n    get_db(\"x\")\n",
            LanguageKind::Python,
        )
        .unwrap();
        let prod_caller = parse_file(
            "api/notes.py",
            "def get_notes_service():\n    return get_db(\"notes\")\n",
            LanguageKind::Python,
        )
        .unwrap();
        let files = vec![deps, test_caller, prod_caller];
        let mut index = CodeIndex::open_in_memory().unwrap();
        index.build(&files, "h").unwrap();
        (index, files)
    }

    #[test]
    fn prefers_non_test_caller() {
        let (index, files) = setup();
        let by_path: HashMap<String, &ParsedFile> =
            files.iter().map(|f| (f.path.clone(), f)).collect();
        let synopsis = choose_call_site(&index, "api/deps.py", &by_path, 5).unwrap();
        assert_eq!(synopsis.caller_file, "api/notes.py");
        assert!(!synopsis.from_test);
        assert!(synopsis.snippet.contains("get_db(\"notes\")"));
        assert!(synopsis
            .other_callers
            .iter()
            .any(|c| c.starts_with("tests/test_deps.py")));
    }

    #[test]
    fn falls_back_to_test_caller_when_alone() {
        let deps = parse_file(
            "api/deps.py",
            "def get_db(name):\n    return name\n",
            LanguageKind::Python,
        )
        .unwrap();
        let test_caller = parse_file(
            "tests/test_deps.py",
            "def test_get_db():\n    get_db(\"x\")\n",
            LanguageKind::Python,
        )
        .unwrap();
        let files = vec![deps, test_caller];
        let mut index = CodeIndex::open_in_memory().unwrap();
        index.build(&files, "h").unwrap();
        let by_path: HashMap<String, &ParsedFile> =
            files.iter().map(|f| (f.path.clone(), f)).collect();

        let synopsis = choose_call_site(&index, "api/deps.py", &by_path, 5).unwrap();
        assert!(synopsis.from_test);
    }

    #[test]
    fn uncalled_file_has_no_synopsis() {
        let lone = parse_file("lone.py", "def f():\n    pass\n", LanguageKind::Python).unwrap();
        let files = vec![lone];
        let mut index = CodeIndex::open_in_memory().unwrap();
        index.build(&files, "h").unwrap();
        let by_path: HashMap<String, &ParsedFile> =
            files.iter().map(|f| (f.path.clone(), f)).collect();
        assert!(choose_call_site(&index, "lone.py", &by_path, 5).is_none());
    }
}
