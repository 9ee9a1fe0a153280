//! Diagnostic retriever: error anchors -> code index -> one hop back.
//!
//! Anchors from the question query the index (`find_by_raises`,
//! `find_by_error_string`, `find_by_symbol`, `find_by_file`), the top
//! error sites are kept, then the call graph is walked one hop backward
//! through `called_by`, preferring callers that mutate state. No semantic
//! search happens here; the index answers first.

use std::collections::HashSet;

use tracing::debug;

use code_index::{CodeIndex, IndexEntry};

use crate::anchors::extract_anchors;
use crate::fetch::SourceFetcher;
use crate::retrievers::{ContextBlock, RetrievedContext};

const MAX_ERROR_SITES: usize = 5;
const MAX_SITES_IN_CONTEXT: usize = 3;
const MAX_CALLERS_IN_CONTEXT: usize = 3;

pub fn retrieve(
    index: &CodeIndex,
    fetcher: &SourceFetcher,
    question: &str,
) -> RetrievedContext {
    let anchors = extract_anchors(question);
    let mut ctx = RetrievedContext {
        used_code_index: true,
        ..Default::default()
    };

    // anchor queries, deduplicated by (file_path, symbol_name)
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut error_sites: Vec<IndexEntry> = Vec::new();
    let mut push = |entries: Vec<IndexEntry>, sites: &mut Vec<IndexEntry>| {
        for e in entries {
            if seen.insert((e.file_path.clone(), e.symbol_name.clone())) {
                sites.push(e);
            }
        }
    };

    for exc in &anchors.exception_types {
        push(index.find_by_raises(exc).unwrap_or_default(), &mut error_sites);
    }
    for s in &anchors.error_strings {
        push(
            index.find_by_error_string(s).unwrap_or_default(),
            &mut error_sites,
        );
    }
    for f in &anchors.function_names {
        push(index.find_by_symbol(f).unwrap_or_default(), &mut error_sites);
    }
    for p in &anchors.file_paths {
        push(index.find_by_file(p).unwrap_or_default(), &mut error_sites);
    }
    error_sites.truncate(MAX_ERROR_SITES);
    ctx.results_found = error_sites.len();

    // one hop backward, state-mutating callers first
    let mut callers: Vec<IndexEntry> = Vec::new();
    let mut caller_seen: HashSet<(String, String)> = HashSet::new();
    for site in &error_sites {
        for c in index.callers(site.short_name()).unwrap_or_default() {
            let key = (c.file_path.clone(), c.symbol_name.clone());
            if seen.contains(&key) || !caller_seen.insert(key) {
                continue;
            }
            callers.push(c);
        }
    }
    callers.sort_by(|a, b| {
        let mutating = |e: &IndexEntry| usize::from(e.mutates.is_empty());
        (mutating(a), &a.file_path, a.line_start).cmp(&(mutating(b), &b.file_path, b.line_start))
    });

    for site in error_sites.iter().take(MAX_SITES_IN_CONTEXT) {
        ctx.blocks.push(entry_block(site, fetcher, "error site"));
    }
    for caller in callers.iter().take(MAX_CALLERS_IN_CONTEXT) {
        ctx.blocks.push(entry_block(caller, fetcher, "caller"));
    }

    debug!(
        sites = error_sites.len(),
        callers = callers.len(),
        "diagnostic retrieval complete"
    );
    ctx
}

fn entry_block(entry: &IndexEntry, fetcher: &SourceFetcher, role: &str) -> ContextBlock {
    let mut text = format!(
        "{role}: {} in {} (lines {}-{})\n",
        entry.symbol_name, entry.file_path, entry.line_start, entry.line_end
    );
    if let Some(sig) = &entry.signature {
        text.push_str(&format!("signature: {sig}\n"));
    }
    if !entry.raises.is_empty() {
        text.push_str(&format!("raises: {}\n", entry.raises.join(", ")));
    }
    if !entry.mutates.is_empty() {
        text.push_str(&format!("mutates: {}\n", entry.mutates.join(", ")));
    }
    if !entry.error_strings.is_empty() {
        text.push_str(&format!("error strings: {}\n", entry.error_strings.join(" | ")));
    }

    // the actual source range, budget-bounded
    match fetcher.fetch(&entry.file_path, entry.line_start, entry.line_end) {
        Some(snippet) => {
            text.push_str("source:\n");
            text.push_str(&snippet.text);
        }
        None => text.push_str("source: (unavailable)\n"),
    }

    ContextBlock {
        origin: "code-index".into(),
        source_path: Some(entry.file_path.clone()),
        line_start: Some(entry.line_start),
        line_end: Some(entry.line_end),
        text,
    }
}
