//! Exploratory retriever: find the flow's entry point, walk forward.
//!
//! The trace subject comes from phrasing patterns (`trace the X`,
//! `X flow`, `how does X work`). Entry points are matched by symbol name
//! with functions preferred over methods, then the call graph is walked
//! forward to a bounded depth with bounded branching, producing an
//! indented flow text.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use code_graph::CodeGraph;

use crate::retrievers::{ContextBlock, RetrievedContext};

const MAX_DEPTH: usize = 3;
const MAX_BRANCH: usize = 3;

fn regexes() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"(?i)\btrace\s+(?:the\s+)?([\w\s-]+?)(?:\s+flow)?\s*[?.!]?$")
                .expect("trace regex"),
            Regex::new(r"(?i)\b([\w-]+)\s+flow\b").expect("flow regex"),
            Regex::new(r"(?i)\bhow\s+does\s+([\w\s-]+?)\s+work\b").expect("how regex"),
        ]
    })
}

/// Extract the thing to trace from the question.
pub fn extract_subject(question: &str) -> Option<String> {
    for re in regexes() {
        if let Some(c) = re.captures(question) {
            if let Some(m) = c.get(1) {
                let subject = m.as_str().trim().trim_end_matches("flow").trim();
                if !subject.is_empty() {
                    return Some(subject.to_string());
                }
            }
        }
    }
    None
}

pub fn retrieve(graph: &CodeGraph, question: &str, min_confidence: f32) -> RetrievedContext {
    let mut ctx = RetrievedContext::default();
    let Some(subject) = extract_subject(question) else {
        return ctx;
    };

    let Some(entry) = find_entry_point(graph, &subject) else {
        debug!(subject, "no entry point found for trace");
        return ctx;
    };

    let mut lines = Vec::new();
    let mut visited = Vec::new();
    walk(graph, &entry, 0, min_confidence, &mut visited, &mut lines);
    ctx.results_found = lines.len();

    let flow_text = lines.join("\n");
    let node = graph.node(&entry);
    ctx.blocks.push(ContextBlock {
        origin: "graph-trace".into(),
        source_path: node.map(|n| n.file_path.clone()),
        line_start: node.map(|n| n.line_start),
        line_end: node.map(|n| n.line_end),
        text: format!("Call flow for `{subject}` starting at {entry}:\n{flow_text}\n"),
    });
    ctx
}

/// Best-matching node for the subject: exact name first, then substring;
/// route handlers beat plain functions, which beat methods.
fn find_entry_point(graph: &CodeGraph, subject: &str) -> Option<String> {
    let needle = subject.to_ascii_lowercase().replace(' ', "_");
    let mut candidates: Vec<(u8, u8, String)> = Vec::new();
    for node in graph.nodes_sorted() {
        if node.kind != "function" && node.kind != "method" {
            continue;
        }
        let name = node.name.to_ascii_lowercase();
        let short = name.rsplit('.').next().unwrap_or(&name);
        let name_rank = if short == needle {
            0u8
        } else if short.contains(&needle) || needle.contains(short) {
            1
        } else {
            continue;
        };
        let kind_rank = if looks_like_route_handler(&node.file_path, short) {
            0u8
        } else if node.kind == "function" {
            1
        } else {
            2
        };
        candidates.push((name_rank, kind_rank, node.id.clone()));
    }
    candidates.sort();
    candidates.into_iter().next().map(|(_, _, id)| id)
}

fn looks_like_route_handler(file_path: &str, name: &str) -> bool {
    let path = file_path.to_ascii_lowercase();
    path.contains("router")
        || path.contains("routes")
        || path.contains("handlers")
        || name.starts_with("handle_")
}

fn walk(
    graph: &CodeGraph,
    id: &str,
    depth: usize,
    min_confidence: f32,
    visited: &mut Vec<String>,
    out: &mut Vec<String>,
) {
    if depth > MAX_DEPTH || visited.iter().any(|v| v == id) {
        return;
    }
    visited.push(id.to_string());

    let label = graph
        .node(id)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| id.to_string());
    out.push(format!("{}{label}", "  ".repeat(depth)));

    let mut edges = graph.callees(id);
    edges.retain(|(_, e)| e.confidence >= min_confidence);
    edges.sort_by(|a, b| {
        b.1.confidence
            .partial_cmp(&a.1.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.id.cmp(&b.0.id))
    });
    for (node, _) in edges.into_iter().take(MAX_BRANCH) {
        walk(graph, &node.id, depth + 1, min_confidence, visited, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{RefKind, ResolvedReference};

    fn reference(s: &str, t: &str, confidence: f32) -> ResolvedReference {
        ResolvedReference {
            source: s.into(),
            target: t.into(),
            kind: RefKind::Calls,
            confidence,
            line: 1,
        }
    }

    /// Scenario C graph: login -> verify_token -> {get_user, save_session},
    /// get_user -> db_query at low confidence.
    fn scenario_graph() -> CodeGraph {
        let src = r#"
def db_query(q):
    return q

def get_user(token):
    return token

def save_session(user):
    return user

def verify_token(token):
    return token

def login(token):
    return token
"#;
        let f = source_analyzer::parse_file("auth.py", src, source_analyzer::LanguageKind::Python)
            .unwrap();
        let refs = vec![
            reference("auth.py::login", "auth.py::verify_token", 0.9),
            reference("auth.py::verify_token", "auth.py::get_user", 0.8),
            reference("auth.py::verify_token", "auth.py::save_session", 0.7),
            reference("auth.py::get_user", "auth.py::db_query", 0.6),
        ];
        CodeGraph::build(&[f], &refs)
    }

    #[test]
    fn subject_extraction_patterns() {
        assert_eq!(extract_subject("Trace the login flow.").as_deref(), Some("login"));
        assert_eq!(extract_subject("what about the auth flow").as_deref(), Some("auth"));
        assert_eq!(
            extract_subject("How does verify_token work?").as_deref(),
            Some("verify_token")
        );
        assert!(extract_subject("list all files").is_none());
    }

    #[test]
    fn scenario_c_trace() {
        let graph = scenario_graph();
        let ctx = retrieve(&graph, "Trace the login flow.", 0.7);
        assert_eq!(ctx.blocks.len(), 1);
        let flow = &ctx.blocks[0].text;

        assert!(flow.contains("\nlogin"), "depth-0 entry: {flow}");
        assert!(flow.contains("\n  verify_token"), "depth 1: {flow}");
        assert!(flow.contains("\n    get_user"), "depth 2: {flow}");
        assert!(flow.contains("\n    save_session"), "depth 2: {flow}");
        assert!(
            !flow.contains("db_query"),
            "0.6 edge must be cut at min_confidence=0.7: {flow}"
        );
    }

    #[test]
    fn lower_floor_includes_weak_edge() {
        let graph = scenario_graph();
        let ctx = retrieve(&graph, "Trace the login flow.", 0.5);
        assert!(ctx.blocks[0].text.contains("db_query"));
    }
}
