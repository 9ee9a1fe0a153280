//! Analyze phase: parallel parsing, resolution, graph, code index.
//!
//! Parsing is CPU-bound Tree-sitter work, so it runs on the blocking pool
//! up to the CPU count while the cooperative loop stays responsive.

use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
use tracing::{info, warn};

use code_graph::{persist, CodeGraph};
use code_index::CodeIndex;
use source_analyzer::{
    parse_file, resolve, scan_repo, IgnoreSpec, ParsedFile, ResolutionStats, ResolvedReference,
    ScanOutcome,
};

use crate::cancel::CancelToken;
use crate::errors::GenError;

/// Everything the later phases need from analysis.
pub struct AnalysisOutput {
    pub files: Vec<ParsedFile>,
    pub references: Vec<ResolvedReference>,
    pub stats: ResolutionStats,
    pub graph: CodeGraph,
    /// Hash over the sorted per-file content hashes.
    pub repo_hash: String,
    pub scan: ScanOutcome,
}

impl AnalysisOutput {
    pub fn files_by_path(&self) -> HashMap<String, &ParsedFile> {
        self.files.iter().map(|f| (f.path.clone(), f)).collect()
    }
}

/// Run discovery + analysis and persist graph and code index.
pub async fn run_analysis(
    repo_root: &Path,
    ignore: &IgnoreSpec,
    graph_dir: &Path,
    code_index: &mut CodeIndex,
    cancel: &CancelToken,
) -> Result<AnalysisOutput, GenError> {
    cancel.check()?;
    let scan = scan_repo(repo_root, ignore)?;

    // parallel parse on the blocking pool, bounded by CPU count
    let limit = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let mut files: Vec<ParsedFile> = Vec::new();
    let mut join: JoinSet<Option<ParsedFile>> = JoinSet::new();
    let mut pending = scan
        .files
        .iter()
        .filter_map(|f| f.language.map(|lang| (f.abs_path.clone(), f.rel_path.clone(), lang)))
        .collect::<Vec<_>>()
        .into_iter();

    loop {
        cancel.check()?;
        while join.len() < limit {
            let Some((abs, rel, lang)) = pending.next() else {
                break;
            };
            join.spawn_blocking(move || {
                let content = match std::fs::read_to_string(&abs) {
                    Ok(c) => c,
                    Err(err) => {
                        warn!("analysis: unreadable file {rel}: {err}");
                        return None;
                    }
                };
                match parse_file(&rel, &content, lang) {
                    Ok(parsed) => Some(parsed),
                    Err(err) => {
                        warn!("analysis: parse failed for {rel}: {err}");
                        None
                    }
                }
            });
        }
        match join.join_next().await {
            Some(res) => {
                if let Ok(Some(parsed)) = res {
                    files.push(parsed);
                }
            }
            None => break,
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!(parsed = files.len(), "analysis: parsing complete");

    cancel.check()?;
    let resolved = resolve(&files);

    let graph = CodeGraph::build(&files, &resolved.references);
    let repo_hash = repo_content_hash(&files);
    persist::save(&graph, graph_dir, &repo_hash)?;

    code_index.build(&files, &repo_hash)?;

    Ok(AnalysisOutput {
        files,
        references: resolved.references,
        stats: resolved.stats,
        graph,
        repo_hash,
        scan,
    })
}

fn repo_content_hash(files: &[ParsedFile]) -> String {
    let mut hashes: Vec<&str> = files.iter().map(|f| f.source_hash.as_str()).collect();
    hashes.sort_unstable();
    let mut hasher = Sha256::new();
    for h in hashes {
        hasher.update(h.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    let mut s = String::with_capacity(64);
    use std::fmt::Write;
    for b in digest {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    #[tokio::test]
    async fn analysis_produces_graph_and_index() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "api/deps.py",
            "def get_db(name):\n    return name\n",
        );
        write(
            dir.path(),
            "api/notes.py",
            "from api.deps import get_db\n\ndef get_notes_service():\n    return get_db(\"n\")\n",
        );

        let graph_dir = dir.path().join("graph");
        let mut index = CodeIndex::open_in_memory().unwrap();
        let out = run_analysis(
            dir.path(),
            &IgnoreSpec::default(),
            &graph_dir,
            &mut index,
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(out.files.len(), 2);
        assert!(out.graph.node("api/deps.py::get_db").is_some());
        assert!(graph_dir.join("nodes.json").exists());
        assert!(graph_dir.join("edges.json").exists());
        assert!(graph_dir.join("metadata.json").exists());
        assert!(!index.is_empty().unwrap());
        assert_eq!(out.repo_hash.len(), 64);
    }

    #[tokio::test]
    async fn zero_source_files_completes() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = CodeIndex::open_in_memory().unwrap();
        let out = run_analysis(
            dir.path(),
            &IgnoreSpec::default(),
            &dir.path().join("graph"),
            &mut index,
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert!(out.files.is_empty());
        assert_eq!(out.graph.node_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = CodeIndex::open_in_memory().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = run_analysis(
            dir.path(),
            &IgnoreSpec::default(),
            &dir.path().join("graph"),
            &mut index,
            &cancel,
        )
        .await;
        assert!(matches!(out, Err(GenError::Cancelled)));
    }
}
