//! Engine facade: wires the per-repo state layout, the LLM profiles, and
//! the generation/Q&A engines together for whatever shell sits on top.
//!
//! The facade owns nothing long-lived except the LLM profile handle; a
//! generation run constructs its mutable stores for the duration of the
//! run, and each Q&A engine opens the promoted stores read-only.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use code_index::CodeIndex;
use llm_service::{config::profile_from_env, LlmProfiles};
use qa_engine::{IssueRef, QaConfig, QaEngine, SourceFetcher};
use wiki_gen::{CancelToken, CorrectionNotes, GenConfig, GenerationEngine, GenerationReport, WikiPaths};
use wiki_rag::{FtsStore, SemanticConfig, SemanticStore};

pub use qa_engine::{QaRequest, QaResponse};
pub use wiki_gen::GenerationReport as Report;

/// Install the global tracing subscriber with env-filter support.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Top-level configuration, resolved from the environment.
pub struct EngineConfig {
    /// Per-repo data directory holding `source/`, `meta/`, `graph/`.
    pub data_dir: PathBuf,
    pub r#gen: GenConfig,
    pub qa: QaConfig,
    /// Optional Qdrant connection; absent means FTS-only retrieval.
    pub semantic: Option<SemanticConfig>,
}

impl EngineConfig {
    /// Build from `OYA_DATA_DIR`, `OYA_QDRANT_URL`, and the `OYA_*` knobs.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("OYA_DATA_DIR")
            .context("OYA_DATA_DIR is not set")?
            .into();
        let semantic = std::env::var("OYA_QDRANT_URL").ok().map(|url| SemanticConfig {
            url,
            api_key: std::env::var("OYA_QDRANT_API_KEY").ok(),
            collection: std::env::var("OYA_QDRANT_COLLECTION")
                .unwrap_or_else(|_| "oyawiki_chunks".to_string()),
            dim: std::env::var("OYA_EMBEDDING_DIM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
        });
        Ok(Self {
            data_dir,
            r#gen: GenConfig::from_env(),
            qa: QaConfig::default(),
            semantic,
        })
    }
}

/// One repository's engine handle.
pub struct Engine {
    config: EngineConfig,
    paths: WikiPaths,
    llm: Arc<LlmProfiles>,
}

impl Engine {
    /// Construct from config plus the `OYA_LLM_{FAST,SLOW,EMBED}_*` env
    /// profiles. `SLOW` is optional and falls back to `FAST`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let fast = profile_from_env("FAST")?;
        let slow = profile_from_env("SLOW").ok();
        let embed = profile_from_env("EMBED")?;
        let llm = Arc::new(LlmProfiles::new(fast, slow, embed)?);
        let paths = WikiPaths::for_data_dir(&config.data_dir);
        Ok(Self { config, paths, llm })
    }

    pub fn paths(&self) -> &WikiPaths {
        &self.paths
    }

    pub fn llm(&self) -> Arc<LlmProfiles> {
        Arc::clone(&self.llm)
    }

    /// Run one full generation pass over the repository.
    pub async fn generate(
        &self,
        notes: CorrectionNotes,
        cancel: CancelToken,
    ) -> Result<GenerationReport> {
        let semantic = self.open_semantic().await;
        let fts = FtsStore::open(&self.paths.chunks_dir().join("fts.db"))?;

        let mut engine = GenerationEngine {
            paths: self.paths.clone(),
            config: self.config.r#gen.clone(),
            llm: Arc::new(self.llm.slow_generator()),
            embedder: self.llm(),
            semantic,
            fts: Some(fts),
            notes,
        };
        let report = engine.run(cancel).await?;
        info!(
            files_generated = report.files_generated,
            files_reused = report.files_reused,
            "generation finished"
        );
        Ok(report)
    }

    /// Open a read-only Q&A engine over the promoted stores.
    pub async fn qa(&self) -> Result<QaEngine> {
        let index = CodeIndex::open(&self.paths.code_index_db())?;
        let graph = match code_graph::persist::load(&self.paths.graph_dir) {
            Ok((graph, _meta)) => graph,
            Err(e) => {
                warn!("no persisted graph, starting empty: {e}");
                code_graph::CodeGraph::build(&[], &[])
            }
        };
        let fts = FtsStore::open(&self.paths.chunks_dir().join("fts.db")).ok();
        let semantic = self.open_semantic().await;
        let issues = load_issues(&self.paths);

        Ok(QaEngine::new(
            index,
            graph,
            semantic,
            fts,
            Arc::new(self.llm.fast_generator()),
            self.llm(),
            SourceFetcher::new(
                self.paths.repo_root.clone(),
                self.config.qa.per_snippet_tokens,
            ),
            issues,
            self.config.qa.clone(),
        ))
    }

    async fn open_semantic(&self) -> Option<SemanticStore> {
        let cfg = self.config.semantic.as_ref()?;
        match SemanticStore::new(cfg) {
            Ok(store) => {
                if let Err(e) = store.ensure_collection().await {
                    warn!("semantic store unavailable, degrading: {e}");
                    return None;
                }
                Some(store)
            }
            Err(e) => {
                warn!("semantic store misconfigured, degrading: {e}");
                None
            }
        }
    }
}

/// Pull pre-computed issues out of the promoted wiki's front-matter for
/// the analytical retriever.
fn load_issues(paths: &WikiPaths) -> Vec<IssueRef> {
    let mut out = Vec::new();
    let mut stack = vec![paths.wiki_dir.clone()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(markdown) = fs::read_to_string(&path) else {
                continue;
            };
            let rel = path
                .strip_prefix(&paths.wiki_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .trim_end_matches(".md")
                .to_string();
            if let Some(summary) = wiki_gen::summary::parse_file_summary(&markdown, &rel) {
                for issue in summary.issues {
                    out.push(IssueRef {
                        file_path: summary.file_path.clone(),
                        severity: format!("{:?}", issue.severity).to_lowercase(),
                        title: issue.title,
                        description: issue.description,
                    });
                }
            }
        }
    }
    out.sort_by(|a, b| (&a.file_path, &a.title).cmp(&(&b.file_path, &b.title)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_load_from_wiki_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WikiPaths::for_data_dir(dir.path());
        fs::create_dir_all(paths.wiki_dir.join("api")).unwrap();
        fs::write(
            paths.wiki_dir.join("api/deps.py.md"),
            "---\nfile_summary:\n  purpose: Helpers.\n  layer: api\n  issues:\n    - category: reliability\n      severity: problem\n      title: Unbounded cache\n      description: never evicts\n---\n\n# api/deps.py\n",
        )
        .unwrap();

        let issues = load_issues(&paths);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].file_path, "api/deps.py");
        assert_eq!(issues[0].title, "Unbounded cache");
        assert_eq!(issues[0].severity, "problem");
    }

    #[test]
    fn engine_config_requires_data_dir() {
        unsafe { std::env::remove_var("OYA_DATA_DIR") };
        assert!(EngineConfig::from_env().is_err());
    }
}
