//! Generation configuration and the per-repo path layout.

use std::path::{Path, PathBuf};

use llm_service::RetryPolicy;
use source_analyzer::IgnoreSpec;
use wiki_rag::ChunkerConfig;

/// Tunables for a generation run. Environment overrides are tolerant:
/// unparseable values fall back to defaults.
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Concurrent LLM calls in the files phase. Keep small for local
    /// models (2), larger for cloud APIs (10).
    pub parallel_file_limit: usize,
    /// Char budget for a single generation prompt.
    pub max_prompt_chars: usize,
    /// Breadcrumbs deeper than this are truncated with an ellipsis.
    pub breadcrumb_max_depth: usize,
    /// Other callers listed next to the chosen call-site synopsis.
    pub max_other_callers: usize,
    pub ignore: IgnoreSpec,
    pub chunker: ChunkerConfig,
    pub retry: RetryPolicy,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            parallel_file_limit: 2,
            max_prompt_chars: 24_000,
            breadcrumb_max_depth: 4,
            max_other_callers: 5,
            ignore: IgnoreSpec::default(),
            chunker: ChunkerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl GenConfig {
    /// Apply `OYA_*` environment overrides on top of defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_usize("OYA_PARALLEL_FILE_LIMIT") {
            cfg.parallel_file_limit = v.max(1);
        }
        if let Some(v) = env_usize("OYA_MAX_PROMPT_CHARS") {
            cfg.max_prompt_chars = v;
        }
        if let Some(v) = env_usize("OYA_MAX_FILE_BYTES") {
            cfg.ignore.max_file_bytes = v as u64;
        }
        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
}

/// Filesystem layout of one repository's data directory.
///
/// ```text
/// <data>/source/                    git clone, untouched
/// <data>/meta/.oyawiki/wiki/        generated markdown (live)
/// <data>/meta/.oyawiki/staging/     in-progress run output
/// <data>/meta/.oyawiki/meta/        signatures.db, code_index.db, chunks/
/// <data>/graph/                     nodes.json, edges.json, metadata.json
/// ```
#[derive(Debug, Clone)]
pub struct WikiPaths {
    pub repo_root: PathBuf,
    pub wiki_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub graph_dir: PathBuf,
}

impl WikiPaths {
    /// Standard layout under a per-repo data directory.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        let oyawiki = data_dir.join("meta").join(".oyawiki");
        Self {
            repo_root: data_dir.join("source"),
            wiki_dir: oyawiki.join("wiki"),
            staging_dir: oyawiki.join("staging"),
            meta_dir: oyawiki.join("meta"),
            graph_dir: data_dir.join("graph"),
        }
    }

    pub fn signatures_db(&self) -> PathBuf {
        self.meta_dir.join("signatures.db")
    }

    pub fn code_index_db(&self) -> PathBuf {
        self.meta_dir.join("code_index.db")
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.meta_dir.join("chunks")
    }

    pub fn oyaignore(&self) -> PathBuf {
        self.repo_root
            .parent()
            .map(|p| p.join(".oyaignore"))
            .unwrap_or_else(|| PathBuf::from(".oyaignore"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_contract() {
        let p = WikiPaths::for_data_dir(Path::new("/data/repo1"));
        assert_eq!(p.repo_root, Path::new("/data/repo1/source"));
        assert_eq!(p.wiki_dir, Path::new("/data/repo1/meta/.oyawiki/wiki"));
        assert_eq!(
            p.signatures_db(),
            Path::new("/data/repo1/meta/.oyawiki/meta/signatures.db")
        );
        assert_eq!(
            p.code_index_db(),
            Path::new("/data/repo1/meta/.oyawiki/meta/code_index.db")
        );
        assert_eq!(p.graph_dir, Path::new("/data/repo1/graph"));
    }
}
