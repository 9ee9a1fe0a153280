//! Analytical retriever: structural facts for architecture questions.
//!
//! Pulls every index entry under the question's scope, flags god
//! functions (fan-out above threshold) and hotspots (fan-in above
//! threshold), and folds in pre-computed issues from the file-summary
//! pipeline filtered to the same scope.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use code_index::{CodeIndex, IndexEntry};

use crate::retrievers::{ContextBlock, RetrievedContext};
use crate::types::IssueRef;

const GOD_FUNCTION_FAN_OUT: usize = 15;
const HOTSPOT_FAN_IN: usize = 20;
const MAX_FLAGGED: usize = 10;

fn regexes() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"(?i)\bflaws?\s+in\s+(?:the\s+)?([\w./-]+)").expect("flaws regex"),
            Regex::new(r"(?i)\b([\w./-]+)\s+architecture\b").expect("arch-of regex"),
            Regex::new(r"(?i)\barchitecture\s+of\s+(?:the\s+)?([\w./-]+)").expect("arch regex"),
        ]
    })
}

/// Extract the scope (path fragment or subsystem name) from the question.
pub fn extract_scope(question: &str) -> Option<String> {
    for re in regexes() {
        if let Some(c) = re.captures(question) {
            if let Some(m) = c.get(1) {
                let scope = m.as_str().trim().trim_end_matches('.');
                if !scope.is_empty() && scope != "the" {
                    return Some(scope.to_string());
                }
            }
        }
    }
    None
}

pub fn retrieve(
    index: &CodeIndex,
    issues: &[IssueRef],
    question: &str,
    scope_hint: Option<&str>,
) -> RetrievedContext {
    let scope = extract_scope(question).or_else(|| scope_hint.map(str::to_string));
    let mut ctx = RetrievedContext {
        used_code_index: true,
        ..Default::default()
    };

    let entries: Vec<IndexEntry> = match &scope {
        Some(s) => index.find_by_file(s).unwrap_or_default(),
        None => index.all_entries().unwrap_or_default(),
    };
    ctx.results_found = entries.len();
    if entries.is_empty() {
        return ctx;
    }

    let mut god_functions: Vec<&IndexEntry> = entries
        .iter()
        .filter(|e| e.calls.len() > GOD_FUNCTION_FAN_OUT)
        .collect();
    god_functions.sort_by_key(|e| std::cmp::Reverse(e.calls.len()));
    god_functions.truncate(MAX_FLAGGED);

    let mut hotspots: Vec<&IndexEntry> = entries
        .iter()
        .filter(|e| e.called_by.len() > HOTSPOT_FAN_IN)
        .collect();
    hotspots.sort_by_key(|e| std::cmp::Reverse(e.called_by.len()));
    hotspots.truncate(MAX_FLAGGED);

    let scope_label = scope.as_deref().unwrap_or("the whole repository");
    let mut overview = format!(
        "Structural overview of {scope_label}: {} indexed symbols.\n",
        entries.len()
    );
    for g in &god_functions {
        overview.push_str(&format!(
            "god function: {} in {} calls {} distinct names\n",
            g.symbol_name,
            g.file_path,
            g.calls.len()
        ));
    }
    for h in &hotspots {
        overview.push_str(&format!(
            "hotspot: {} in {} has {} callers\n",
            h.symbol_name,
            h.file_path,
            h.called_by.len()
        ));
    }
    if god_functions.is_empty() && hotspots.is_empty() {
        overview.push_str("No god functions or hotspots above thresholds.\n");
    }
    ctx.blocks.push(ContextBlock {
        origin: "code-index".into(),
        source_path: scope.clone(),
        line_start: None,
        line_end: None,
        text: overview,
    });

    // pre-computed issues, scope-filtered
    let scoped_issues: Vec<&IssueRef> = issues
        .iter()
        .filter(|i| match &scope {
            Some(s) => i.file_path.contains(s.as_str()),
            None => true,
        })
        .collect();
    if !scoped_issues.is_empty() {
        let mut text = String::from("Known issues from generated summaries:\n");
        for i in scoped_issues.iter().take(MAX_FLAGGED) {
            text.push_str(&format!(
                "- [{}] {} ({}): {}\n",
                i.severity, i.title, i.file_path, i.description
            ));
        }
        ctx.blocks.push(ContextBlock {
            origin: "issues".into(),
            source_path: None,
            line_start: None,
            line_end: None,
            text,
        });
    }

    debug!(
        scope = scope.as_deref().unwrap_or(""),
        god_functions = god_functions.len(),
        hotspots = hotspots.len(),
        "analytical retrieval complete"
    );
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{parse_file, LanguageKind};

    #[test]
    fn scope_extraction() {
        assert_eq!(
            extract_scope("what are the flaws in the api layer").as_deref(),
            Some("api")
        );
        assert_eq!(
            extract_scope("describe the storage architecture").as_deref(),
            Some("storage")
        );
        assert_eq!(
            extract_scope("architecture of the retrieval engine").as_deref(),
            Some("retrieval")
        );
        assert!(extract_scope("how do I install this").is_none());
    }

    #[test]
    fn flags_god_functions() {
        // a function calling 16 distinct helpers
        let calls: String = (0..16).map(|i| format!("    helper_{i}()\n")).collect();
        let src = format!("def omnibus():\n{calls}");
        let f = parse_file("core/omnibus.py", &src, LanguageKind::Python).unwrap();
        let mut index = CodeIndex::open_in_memory().unwrap();
        index.build(&[f], "h").unwrap();

        let ctx = retrieve(&index, &[], "flaws in the core module", None);
        assert!(ctx.blocks[0].text.contains("god function: omnibus"));
    }

    #[test]
    fn issues_are_scope_filtered() {
        let f = parse_file("api/deps.py", "def get_db():\n    pass\n", LanguageKind::Python)
            .unwrap();
        let mut index = CodeIndex::open_in_memory().unwrap();
        index.build(&[f], "h").unwrap();

        let issues = vec![
            IssueRef {
                file_path: "api/deps.py".into(),
                severity: "problem".into(),
                title: "Unbounded cache".into(),
                description: "never evicts".into(),
            },
            IssueRef {
                file_path: "web/ui.ts".into(),
                severity: "suggestion".into(),
                title: "Elsewhere".into(),
                description: String::new(),
            },
        ];
        let ctx = retrieve(&index, &issues, "flaws in the api layer", None);
        let issue_block = ctx.blocks.iter().find(|b| b.origin == "issues").unwrap();
        assert!(issue_block.text.contains("Unbounded cache"));
        assert!(!issue_block.text.contains("Elsewhere"));
    }
}
