//! The generation engine: phase sequencing, signature gating, staging.
//!
//! Phase order: discover+analyze, file pages (bounded LLM fan-out),
//! directory pages (bottom-up, one depth at a time), synthesis, indexing,
//! then atomic promotion (delete-then-move) and signature commit. A
//! cancelled run leaves staging on disk and promotes nothing.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use code_index::CodeIndex;
use llm_service::{EmbeddingsProvider, TextGenerator};
use source_analyzer::SymbolKind;
use wiki_rag::{ChunkKind, FtsStore, MetadataExtractor, PageInput, SemanticStore, WikiIndexer};

use crate::analysis::{run_analysis, AnalysisOutput};
use crate::callsite::choose_call_site;
use crate::cancel::CancelToken;
use crate::config::{GenConfig, WikiPaths};
use crate::errors::GenError;
use crate::notes::CorrectionNotes;
use crate::pages;
use crate::prompts;
use crate::report::GenerationReport;
use crate::signature::{dir_signature, file_signature, SigKind, SignatureStore};
use crate::summary::{
    parse_directory_summary, parse_file_summary, DirectorySummary, FileSummary,
};

pub struct GenerationEngine {
    pub paths: WikiPaths,
    pub config: GenConfig,
    pub llm: Arc<dyn TextGenerator>,
    pub embedder: Arc<dyn EmbeddingsProvider>,
    /// Vector store; absent in FTS-only deployments.
    pub semantic: Option<SemanticStore>,
    /// Full-text store; absent in vector-only deployments.
    pub fts: Option<FtsStore>,
    pub notes: CorrectionNotes,
}

struct FileOutcome {
    page: String,
    summary: FileSummary,
    reused: bool,
    failed: bool,
    llm_calls: usize,
}

impl GenerationEngine {
    /// Run the full pipeline once.
    pub async fn run(&mut self, cancel: CancelToken) -> Result<GenerationReport, GenError> {
        let started = Instant::now();
        let mut report = GenerationReport::default();
        let mut signatures: Vec<(SigKind, String, String)> = Vec::new();

        // fresh staging directory
        if self.paths.staging_dir.exists() {
            fs::remove_dir_all(&self.paths.staging_dir)?;
        }
        fs::create_dir_all(&self.paths.staging_dir)?;

        let mut sig_store = SignatureStore::open(&self.paths.signatures_db())?;
        let mut code_index = CodeIndex::open(&self.paths.code_index_db())?;

        // Phase 1+2: discover and analyze
        let ignore = self
            .config
            .ignore
            .clone()
            .with_ignore_file(&self.paths.oyaignore());
        let analysis = run_analysis(
            &self.paths.repo_root,
            &ignore,
            &self.paths.graph_dir,
            &mut code_index,
            &cancel,
        )
        .await?;
        report.files_total = analysis.files.len();

        // Phase 3: file pages
        let file_summaries = self
            .files_phase(
                &analysis,
                &code_index,
                &sig_store,
                &mut signatures,
                &mut report,
                &cancel,
            )
            .await?;

        // Phase 4: directory pages, bottom-up
        let dir_summaries = self
            .directories_phase(
                &file_summaries,
                &analysis,
                &sig_store,
                &mut signatures,
                &mut report,
                &cancel,
            )
            .await?;

        // Phase 5: synthesis pages
        cancel.check()?;
        let entry_points = detect_entry_points(&analysis);
        let summaries: Vec<FileSummary> = file_summaries.values().cloned().collect();
        self.write_staging_page(
            "architecture.md",
            &pages::architecture_page(&summaries, &analysis.graph),
        )?;
        self.write_staging_page(
            "workflows.md",
            &pages::workflows_page(&entry_points, &analysis.graph),
        )?;

        // Phase 6: indexing
        cancel.check()?;
        report.chunks_indexed = self
            .index_phase(&analysis, &file_summaries, &dir_summaries, &entry_points)
            .await?;

        // Promotion: atomic delete-then-move, then commit signatures.
        cancel.check()?;
        if self.paths.wiki_dir.exists() {
            fs::remove_dir_all(&self.paths.wiki_dir)?;
        }
        if let Some(parent) = self.paths.wiki_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&self.paths.staging_dir, &self.paths.wiki_dir)?;
        sig_store.replace_all(&signatures)?;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            files_generated = report.files_generated,
            files_reused = report.files_reused,
            files_failed = report.files_failed,
            dirs_generated = report.dirs_generated,
            dirs_reused = report.dirs_reused,
            chunks_indexed = report.chunks_indexed,
            llm_calls = report.llm_calls,
            elapsed_ms = report.elapsed_ms,
            "generation run complete"
        );
        Ok(report)
    }

    async fn files_phase(
        &self,
        analysis: &AnalysisOutput,
        code_index: &CodeIndex,
        sig_store: &SignatureStore,
        signatures: &mut Vec<(SigKind, String, String)>,
        report: &mut GenerationReport,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, FileSummary>, GenError> {
        let files_by_path = analysis.files_by_path();
        let mut outcomes: HashMap<String, FileOutcome> = HashMap::new();
        let mut jobs: Vec<(String, String)> = Vec::new(); // (path, prompt)

        for f in &analysis.files {
            cancel.check()?;
            let notes = self.notes.for_file(&f.path);
            let sig = file_signature(&f.content, notes);
            signatures.push((SigKind::File, f.path.clone(), sig.clone()));

            let live_page = self.paths.wiki_dir.join(format!("{}.md", f.path));
            let stored = sig_store.get(SigKind::File, &f.path)?;
            if stored.as_deref() == Some(sig.as_str()) && live_page.exists() {
                let page = fs::read_to_string(&live_page)?;
                if let Some(summary) = parse_file_summary(&page, &f.path) {
                    outcomes.insert(
                        f.path.clone(),
                        FileOutcome {
                            page,
                            summary,
                            reused: true,
                            failed: false,
                            llm_calls: 0,
                        },
                    );
                    continue;
                }
                // unparseable live page falls through to regeneration
            }

            // call-site synopsis only matters when the file lacks its own
            let call_site = if f.synopsis.is_none() {
                choose_call_site(
                    code_index,
                    &f.path,
                    &files_by_path,
                    self.config.max_other_callers,
                )
            } else {
                None
            };
            let prompt = prompts::build_file_prompt(
                f,
                call_site.as_ref(),
                notes,
                self.config.max_prompt_chars,
            );
            jobs.push((f.path.clone(), prompt));
        }

        // bounded LLM fan-out
        let llm = Arc::clone(&self.llm);
        let retry = self.config.retry;
        let generated: Vec<(String, FileOutcome)> = stream::iter(jobs)
            .map(|(path, prompt)| {
                let llm = Arc::clone(&llm);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (
                            path.clone(),
                            FileOutcome {
                                page: String::new(),
                                summary: FileSummary::default(),
                                reused: false,
                                failed: true,
                                llm_calls: 0,
                            },
                        );
                    }
                    let mut calls = 0usize;
                    let result = retry
                        .run("file-page", || {
                            calls += 1;
                            llm.generate(&prompt, Some(prompts::FILE_PAGE_SYSTEM))
                        })
                        .await;
                    match result {
                        Ok(page) => {
                            let summary = parse_file_summary(&page, &path)
                                .unwrap_or_else(|| fallback_summary(&path));
                            (
                                path.clone(),
                                FileOutcome {
                                    page,
                                    summary,
                                    reused: false,
                                    failed: false,
                                    llm_calls: calls,
                                },
                            )
                        }
                        Err(e) => {
                            error!(file = %path, "file page generation failed permanently: {e}");
                            let page = pages::error_stub_page(&path, &e.to_string());
                            let summary = parse_file_summary(&page, &path)
                                .unwrap_or_else(|| fallback_summary(&path));
                            (
                                path.clone(),
                                FileOutcome {
                                    page,
                                    summary,
                                    reused: false,
                                    failed: true,
                                    llm_calls: calls,
                                },
                            )
                        }
                    }
                }
            })
            .buffer_unordered(self.config.parallel_file_limit.max(1))
            .collect()
            .await;

        for (path, outcome) in generated {
            outcomes.insert(path, outcome);
        }

        // write pages and tally
        let mut summaries = HashMap::new();
        for (path, outcome) in outcomes {
            self.write_staging_page(&format!("{path}.md"), &outcome.page)?;
            if outcome.reused {
                report.files_reused += 1;
            } else if outcome.failed {
                report.files_failed += 1;
            } else {
                report.files_generated += 1;
            }
            report.llm_calls += outcome.llm_calls;
            summaries.insert(path, outcome.summary);
        }
        Ok(summaries)
    }

    async fn directories_phase(
        &self,
        file_summaries: &HashMap<String, FileSummary>,
        analysis: &AnalysisOutput,
        sig_store: &SignatureStore,
        signatures: &mut Vec<(SigKind, String, String)>,
        report: &mut GenerationReport,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, DirectorySummary>, GenError> {
        // dir -> direct files; every ancestor (and the root) is a directory
        let mut files_in_dir: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut children_of: BTreeMap<String, Vec<String>> = BTreeMap::new();
        files_in_dir.entry(String::new()).or_default();
        for path in file_summaries.keys() {
            let dir = parent_dir(path);
            files_in_dir.entry(dir.clone()).or_default().push(path.clone());
            let mut current = dir;
            while !current.is_empty() {
                let parent = parent_dir(&current);
                let entry = children_of.entry(parent.clone()).or_default();
                if !entry.contains(&current) {
                    entry.push(current.clone());
                }
                files_in_dir.entry(parent.clone()).or_default();
                files_in_dir.entry(current.clone()).or_default();
                current = parent;
            }
        }

        let source_hashes: HashMap<&str, &str> = analysis
            .files
            .iter()
            .map(|f| (f.path.as_str(), f.source_hash.as_str()))
            .collect();

        // depth barrier: deepest level first, the root (depth 0) last, so a
        // parent always sees its children's fresh summaries
        let mut by_depth: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for dir in files_in_dir.keys() {
            by_depth.entry(depth_of(dir)).or_default().push(dir.clone());
        }

        let mut dir_summaries: HashMap<String, DirectorySummary> = HashMap::new();
        for (_depth, batch) in by_depth.iter().rev() {
            for dir in batch {
                cancel.check()?;
                let outcome = self
                    .render_directory(
                        dir,
                        &files_in_dir,
                        &children_of,
                        file_summaries,
                        &dir_summaries,
                        &source_hashes,
                        sig_store,
                    )
                    .await?;
                signatures.push((SigKind::Dir, dir.clone(), outcome.signature));
                if outcome.reused {
                    report.dirs_reused += 1;
                } else {
                    report.dirs_generated += 1;
                    report.llm_calls += outcome.llm_calls;
                }
                dir_summaries.insert(dir.clone(), outcome.summary);
            }
        }

        Ok(dir_summaries)
    }

    async fn render_directory(
        &self,
        dir: &str,
        files_in_dir: &BTreeMap<String, Vec<String>>,
        children_of: &BTreeMap<String, Vec<String>>,
        file_summaries: &HashMap<String, FileSummary>,
        dir_summaries: &HashMap<String, DirectorySummary>,
        source_hashes: &HashMap<&str, &str>,
        sig_store: &SignatureStore,
    ) -> Result<DirOutcome, GenError> {
        let mut direct_files: Vec<&FileSummary> = files_in_dir
            .get(dir)
            .map(|paths| paths.iter().filter_map(|p| file_summaries.get(p)).collect())
            .unwrap_or_default();
        direct_files.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let mut child_dirs: Vec<&DirectorySummary> = children_of
            .get(dir)
            .map(|dirs| dirs.iter().filter_map(|d| dir_summaries.get(d)).collect())
            .unwrap_or_default();
        child_dirs.sort_by(|a, b| a.directory_path.cmp(&b.directory_path));

        let file_parts: Vec<(String, String)> = direct_files
            .iter()
            .map(|f| {
                let name = f.file_path.rsplit('/').next().unwrap_or(&f.file_path);
                let hash = source_hashes.get(f.file_path.as_str()).copied().unwrap_or("");
                (name.to_string(), hash.to_string())
            })
            .collect();
        let dir_parts: Vec<(String, String)> = child_dirs
            .iter()
            .map(|d| (d.directory_path.clone(), d.purpose.clone()))
            .collect();
        let notes = self.notes.for_dir(dir);
        let signature = match notes {
            // notes participate in the gate the same way they do for files
            Some(n) => dir_signature(
                &file_parts
                    .iter()
                    .cloned()
                    .chain([("<notes>".to_string(), n.to_string())])
                    .collect::<Vec<_>>(),
                &dir_parts,
            ),
            None => dir_signature(&file_parts, &dir_parts),
        };

        let page_rel = if dir.is_empty() {
            "index.md".to_string()
        } else {
            format!("{dir}/index.md")
        };
        let live_page = self.paths.wiki_dir.join(&page_rel);
        let stored = sig_store.get(SigKind::Dir, dir)?;
        if stored.as_deref() == Some(signature.as_str()) && live_page.exists() {
            let page = fs::read_to_string(&live_page)?;
            if let Some(summary) = parse_directory_summary(&page, dir) {
                self.write_staging_page(&page_rel, &page)?;
                return Ok(DirOutcome {
                    summary,
                    signature,
                    reused: true,
                    llm_calls: 0,
                });
            }
        }

        // LLM summary with degraded fallback
        let prompt = prompts::build_dir_prompt(
            dir,
            &direct_files,
            &child_dirs,
            notes,
            self.config.max_prompt_chars,
        );
        let mut llm_calls = 0usize;
        let llm = Arc::clone(&self.llm);
        let generated = self
            .config
            .retry
            .run("dir-summary", || {
                llm_calls += 1;
                llm.generate(&prompt, Some(prompts::DIR_SUMMARY_SYSTEM))
            })
            .await;

        let mut summary = match generated {
            Ok(yaml) => parse_dir_yaml(&yaml, dir),
            Err(e) => {
                warn!(dir, "directory summary failed, degrading: {e}");
                None
            }
        }
        .unwrap_or_else(|| DirectorySummary {
            directory_path: dir.to_string(),
            purpose: format!(
                "Contains {} files and {} subdirectories.",
                direct_files.len(),
                child_dirs.len()
            ),
            contains: Vec::new(),
            role_in_system: String::new(),
        });
        summary.directory_path = dir.to_string();
        if summary.contains.is_empty() {
            summary.contains = direct_files
                .iter()
                .map(|f| {
                    f.file_path
                        .rsplit('/')
                        .next()
                        .unwrap_or(&f.file_path)
                        .to_string()
                })
                .chain(child_dirs.iter().map(|d| {
                    d.directory_path
                        .rsplit('/')
                        .next()
                        .unwrap_or(&d.directory_path)
                        .to_string()
                }))
                .collect();
        }

        let page = pages::directory_page(
            &summary,
            &direct_files,
            &child_dirs,
            self.config.breadcrumb_max_depth,
        );
        self.write_staging_page(&page_rel, &page)?;

        Ok(DirOutcome {
            summary,
            signature,
            reused: false,
            llm_calls,
        })
    }

    async fn index_phase(
        &mut self,
        analysis: &AnalysisOutput,
        file_summaries: &HashMap<String, FileSummary>,
        dir_summaries: &HashMap<String, DirectorySummary>,
        entry_points: &[(String, String)],
    ) -> Result<usize, GenError> {
        let mut pages: Vec<PageInput> = Vec::new();
        for (path, summary) in file_summaries {
            let doc = format!("{path}.md");
            let markdown = fs::read_to_string(self.paths.staging_dir.join(&doc))?;
            pages.push(PageInput {
                document_path: doc,
                title: summary.file_path.clone(),
                markdown,
                source_file: Some(path.clone()),
                kind: ChunkKind::Wiki,
            });
        }
        for (dir, summary) in dir_summaries {
            let doc = if dir.is_empty() {
                "index.md".to_string()
            } else {
                format!("{dir}/index.md")
            };
            let markdown = fs::read_to_string(self.paths.staging_dir.join(&doc))?;
            let title = if dir.is_empty() {
                "Repository root".to_string()
            } else {
                summary.directory_path.clone()
            };
            pages.push(PageInput {
                document_path: doc,
                title,
                markdown,
                source_file: None,
                kind: ChunkKind::Wiki,
            });
        }
        for doc in ["architecture.md", "workflows.md"] {
            let markdown = fs::read_to_string(self.paths.staging_dir.join(doc))?;
            pages.push(PageInput {
                document_path: doc.to_string(),
                title: doc.trim_end_matches(".md").to_string(),
                markdown,
                source_file: None,
                kind: ChunkKind::Wiki,
            });
        }
        pages.sort_by(|a, b| a.document_path.cmp(&b.document_path));

        // metadata extractor from this run's aggregates
        let layers = file_summaries
            .iter()
            .map(|(p, s)| (p.clone(), s.layer.as_str().to_string()))
            .collect();
        let symbols_by_file = analysis
            .files
            .iter()
            .map(|f| {
                (
                    f.path.clone(),
                    f.symbols
                        .iter()
                        .filter(|s| s.kind != SymbolKind::Variable)
                        .map(|s| s.name.clone())
                        .collect(),
                )
            })
            .collect();
        let imports_by_file = analysis
            .files
            .iter()
            .map(|f| {
                (
                    f.path.clone(),
                    f.imports.iter().map(|i| i.module.clone()).collect(),
                )
            })
            .collect();
        let mut entry_points_by_file: HashMap<String, Vec<String>> = HashMap::new();
        for (id, desc) in entry_points {
            if let Some(node) = analysis.graph.node(id) {
                entry_points_by_file
                    .entry(node.file_path.clone())
                    .or_default()
                    .push(desc.clone());
            }
        }

        let indexer = WikiIndexer::new(
            self.config.chunker.clone(),
            MetadataExtractor::new(layers, symbols_by_file, imports_by_file, entry_points_by_file),
        );
        let report = indexer
            .index_pages(
                &pages,
                self.semantic.as_ref(),
                self.fts.as_mut(),
                self.embedder.as_ref(),
            )
            .await?;
        Ok(report.indexed)
    }

    fn write_staging_page(&self, rel: &str, content: &str) -> Result<(), GenError> {
        let path: PathBuf = self.paths.staging_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

struct DirOutcome {
    summary: DirectorySummary,
    signature: String,
    reused: bool,
    llm_calls: usize,
}

fn fallback_summary(path: &str) -> FileSummary {
    FileSummary {
        file_path: path.to_string(),
        purpose: format!("Documentation for {path}."),
        ..Default::default()
    }
}

fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

fn depth_of(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.split('/').count()
    }
}

/// Parse the LLM's bare `directory_summary:` YAML.
fn parse_dir_yaml(yaml: &str, dir: &str) -> Option<DirectorySummary> {
    let trimmed = yaml.trim().trim_start_matches("```yaml").trim_start_matches("```");
    let trimmed = trimmed.trim_end_matches("```").trim();
    let wrapped = format!("---\n{trimmed}\n---\n");
    parse_directory_summary(&wrapped, dir)
}

/// Call-graph roots: symbols nobody calls that call something themselves.
fn detect_entry_points(analysis: &AnalysisOutput) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for node in analysis.graph.nodes_sorted() {
        if node.kind != "function" && node.kind != "method" {
            continue;
        }
        if !analysis.graph.callers(&node.id).is_empty() {
            continue;
        }
        if analysis.graph.callees(&node.id).is_empty() {
            continue;
        }
        out.push((node.id.clone(), format!("{} ({})", node.name, node.file_path)));
        if out.len() >= 10 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_service::{contract::BoxFuture, LlmError};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted generator: purposes carry a hash of the prompt, so any
    /// change in a file's content (or in a child's purpose) changes the
    /// extracted purpose and exercises the signature cascade.
    struct FakeLlm {
        calls: AtomicUsize,
    }

    impl FakeLlm {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn prompt_fingerprint(prompt: &str) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut h = std::collections::hash_map::DefaultHasher::new();
        prompt.hash(&mut h);
        h.finish()
    }

    impl TextGenerator for FakeLlm {
        fn generate<'a>(
            &'a self,
            prompt: &'a str,
            _system: Option<&'a str>,
        ) -> BoxFuture<'a, Result<String, LlmError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let fp = prompt_fingerprint(prompt);
                if let Some(rest) = prompt.split("File: ").nth(1) {
                    let path = rest.lines().next().unwrap_or("unknown").trim().to_string();
                    Ok(format!(
                        "---\nfile_summary:\n  purpose: Auto summary {fp:x}.\n  layer: domain\n  key_abstractions: []\n  internal_deps: []\n  external_deps: []\n---\n\n# {path}\n\n## 1. Purpose\n\nAuto summary.\n\n## 2. Synopsis\n\nExample.\n\n## 3. Public API\n\nAPI.\n\n## 4. Internal Details\n\nDetails.\n\n## 5. Dependencies\n\nNone.\n\n## 6. Usage Examples\n\nNone.\n"
                    ))
                } else {
                    // directory summary request
                    let dir = prompt
                        .split('`')
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    Ok(format!(
                        "directory_summary:\n  purpose: Groups children under {dir} ({fp:x}).\n  contains: []\n  role_in_system: Part of the system.\n"
                    ))
                }
            })
        }
    }

    struct FakeEmbedder;
    impl EmbeddingsProvider for FakeEmbedder {
        fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, LlmError>> {
            Box::pin(async { Ok(vec![0.5; 4]) })
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    fn engine(data_dir: &Path, llm: Arc<FakeLlm>) -> GenerationEngine {
        let paths = WikiPaths::for_data_dir(data_dir);
        fs::create_dir_all(&paths.repo_root).unwrap();
        GenerationEngine {
            paths,
            config: GenConfig::default(),
            llm,
            embedder: Arc::new(FakeEmbedder),
            semantic: None,
            fts: Some(FtsStore::open_in_memory().unwrap()),
            notes: CorrectionNotes::default(),
        }
    }

    #[tokio::test]
    async fn full_run_produces_wiki_and_graph() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FakeLlm::new();
        let mut engine = engine(dir.path(), Arc::clone(&llm));
        write(
            &engine.paths.repo_root,
            "src/auth/verify.py",
            "def verify_token(token):\n    return token\n",
        );
        write(
            &engine.paths.repo_root,
            "src/auth/handler.py",
            "from src.auth.verify import verify_token\n\ndef login(token):\n    return verify_token(token)\n",
        );

        let report = engine.run(CancelToken::new()).await.unwrap();
        assert_eq!(report.files_total, 2);
        assert_eq!(report.files_generated, 2);
        assert_eq!(report.files_failed, 0);
        assert!(report.dirs_generated >= 3); // src/auth, src, root
        assert!(report.chunks_indexed > 0);

        let wiki = &engine.paths.wiki_dir;
        assert!(wiki.join("src/auth/verify.py.md").exists());
        assert!(wiki.join("src/auth/index.md").exists());
        assert!(wiki.join("index.md").exists());
        assert!(wiki.join("architecture.md").exists());
        assert!(wiki.join("workflows.md").exists());
        assert!(!engine.paths.staging_dir.exists(), "staging was promoted");
        assert!(engine.paths.graph_dir.join("nodes.json").exists());
    }

    #[tokio::test]
    async fn empty_repo_yields_root_page_only() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FakeLlm::new();
        let mut engine = engine(dir.path(), Arc::clone(&llm));

        let report = engine.run(CancelToken::new()).await.unwrap();
        assert_eq!(report.files_total, 0);
        assert_eq!(report.files_generated, 0);
        assert_eq!(report.dirs_generated, 1);

        let wiki = &engine.paths.wiki_dir;
        assert!(wiki.join("index.md").exists());
        let source_pages: Vec<_> = std::fs::read_dir(wiki)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            {
                let mut v = source_pages.clone();
                v.sort();
                v
            },
            vec!["architecture.md", "index.md", "workflows.md"]
        );
    }

    #[tokio::test]
    async fn unchanged_rerun_makes_zero_llm_calls() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FakeLlm::new();
        let mut engine = engine(dir.path(), Arc::clone(&llm));
        write(
            &engine.paths.repo_root,
            "app.py",
            "def main():\n    return 1\n",
        );

        engine.run(CancelToken::new()).await.unwrap();
        let after_first = llm.call_count();
        assert!(after_first > 0);

        let report = engine.run(CancelToken::new()).await.unwrap();
        assert_eq!(llm.call_count(), after_first, "re-run must reuse everything");
        assert_eq!(report.files_generated, 0);
        assert_eq!(report.files_reused, 1);
        assert_eq!(report.dirs_generated, 0);
    }

    #[tokio::test]
    async fn signature_invalidation_cascades_but_spares_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FakeLlm::new();
        let mut engine = engine(dir.path(), Arc::clone(&llm));
        write(
            &engine.paths.repo_root,
            "src/auth/verify.py",
            "def verify_token(token):\n    return token\n",
        );
        write(
            &engine.paths.repo_root,
            "src/auth/handler.py",
            "def login(token):\n    return token\n",
        );

        engine.run(CancelToken::new()).await.unwrap();

        // edit verify.py in a way that changes its extracted purpose
        write(
            &engine.paths.repo_root,
            "src/auth/verify.py",
            "def verify_token(token):\n    # audited path\n    return token and True\n",
        );
        let report = engine.run(CancelToken::new()).await.unwrap();

        // verify.py regenerates, handler.py does not
        assert_eq!(report.files_generated, 1);
        assert_eq!(report.files_reused, 1);
        // purpose change cascades: src/auth, src, root all regenerate
        assert_eq!(report.dirs_generated, 3);
        assert_eq!(report.dirs_reused, 0);
    }

    #[tokio::test]
    async fn failing_llm_yields_error_stub_not_abort() {
        struct BrokenLlm;
        impl TextGenerator for BrokenLlm {
            fn generate<'a>(
                &'a self,
                _prompt: &'a str,
                _system: Option<&'a str>,
            ) -> BoxFuture<'a, Result<String, LlmError>> {
                Box::pin(async { Err(LlmError::Decode("scripted failure".into())) })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let paths = WikiPaths::for_data_dir(dir.path());
        fs::create_dir_all(&paths.repo_root).unwrap();
        write(&paths.repo_root, "app.py", "def main():\n    return 1\n");

        let mut engine = GenerationEngine {
            paths,
            config: GenConfig::default(),
            llm: Arc::new(BrokenLlm),
            embedder: Arc::new(FakeEmbedder),
            semantic: None,
            fts: Some(FtsStore::open_in_memory().unwrap()),
            notes: CorrectionNotes::default(),
        };

        let report = engine.run(CancelToken::new()).await.unwrap();
        assert_eq!(report.files_failed, 1);
        let page =
            fs::read_to_string(engine.paths.wiki_dir.join("app.py.md")).unwrap();
        assert!(page.contains("Generation failed"));
        // directory rendering degrades instead of failing
        assert!(engine.paths.wiki_dir.join("index.md").exists());
    }

    #[tokio::test]
    async fn cancelled_run_leaves_staging_unpromoted() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FakeLlm::new();
        let mut engine = engine(dir.path(), Arc::clone(&llm));
        write(&engine.paths.repo_root, "app.py", "def main():\n    return 1\n");

        let cancel = CancelToken::new();
        cancel.cancel();
        let out = engine.run(cancel).await;
        assert!(matches!(out, Err(GenError::Cancelled)));
        assert!(!engine.paths.wiki_dir.exists());
    }

    #[tokio::test]
    async fn correction_notes_invalidate_file_signature() {
        let dir = tempfile::tempdir().unwrap();
        let llm = FakeLlm::new();
        let mut engine = engine(dir.path(), Arc::clone(&llm));
        write(&engine.paths.repo_root, "app.py", "def main():\n    return 1\n");

        engine.run(CancelToken::new()).await.unwrap();
        let first = llm.call_count();

        engine
            .notes
            .by_file
            .insert("app.py".into(), "main is the CLI entry".into());
        let report = engine.run(CancelToken::new()).await.unwrap();
        assert!(llm.call_count() > first);
        assert_eq!(report.files_generated, 1);
    }
}
