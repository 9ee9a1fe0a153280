//! Source fetcher: exact line ranges under a token budget.
//!
//! Retrievers describe code by reference; this is the single place that
//! reads the actual bytes. Snippets over budget are cut at a line boundary
//! with a visible truncation marker.

use std::path::PathBuf;

use tracing::debug;

use wiki_rag::estimate_tokens;

pub const TRUNCATION_MARKER: &str = "... [snippet truncated]";

/// A fetched source range.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub text: String,
    pub truncated: bool,
}

pub struct SourceFetcher {
    repo_root: PathBuf,
    /// Per-snippet token budget.
    pub snippet_budget: usize,
}

impl SourceFetcher {
    pub fn new(repo_root: PathBuf, snippet_budget: usize) -> Self {
        Self {
            repo_root,
            snippet_budget,
        }
    }

    /// Read the inclusive 1-indexed range `[line_start, line_end]` of a
    /// repo-relative file. Returns `None` when the file is unreadable.
    pub fn fetch(&self, rel_path: &str, line_start: u32, line_end: u32) -> Option<Snippet> {
        let content = std::fs::read_to_string(self.repo_root.join(rel_path)).ok()?;
        let mut text = String::new();
        let mut truncated = false;
        let mut last_line = line_start;

        for (i, line) in content.lines().enumerate() {
            let ln = (i + 1) as u32;
            if ln < line_start {
                continue;
            }
            if ln > line_end {
                break;
            }
            let candidate_len = estimate_tokens(&text) + estimate_tokens(line);
            if candidate_len > self.snippet_budget && !text.is_empty() {
                truncated = true;
                break;
            }
            text.push_str(line);
            text.push('\n');
            last_line = ln;
        }

        if text.is_empty() {
            return None;
        }
        if truncated {
            text.push_str(TRUNCATION_MARKER);
            text.push('\n');
        }
        debug!(
            path = rel_path,
            line_start, line_end, truncated, "snippet fetched"
        );
        Some(Snippet {
            path: rel_path.to_string(),
            line_start,
            line_end: last_line,
            text,
            truncated,
        })
    }
}
