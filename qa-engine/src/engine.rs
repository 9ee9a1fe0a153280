//! The Q&A engine handle: routing, CGRAG, quick mode, streaming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use code_graph::CodeGraph;
use code_index::CodeIndex;
use llm_service::{EmbeddingsProvider, TextGenerator};
use wiki_rag::{FtsStore, HybridSearch, SemanticStore};

use crate::answer::{parse_response, ParsedAnswer};
use crate::classify::{classify, QueryMode};
use crate::confidence::{derive, ConfidenceThresholds};
use crate::errors::QaError;
use crate::fetch::SourceFetcher;
use crate::gaps::{direct_lookup, extract_gap_ref};
use crate::prompts::{build_cgrag_prompt, render_context, ANSWER_SYSTEM};
use crate::retrievers::{
    analytical, conceptual, diagnostic, exploratory, ContextBlock, RetrievedContext,
};
use crate::session::{CgragSession, SessionStore};
use crate::types::{
    CgragStats, Citation, Confidence, IssueRef, QaEvent, QaRequest, QaResponse, SearchQuality,
};

/// Cooperative cancellation flag for Q&A requests, checked before every
/// LLM call.
#[derive(Debug, Clone, Default)]
pub struct QaCancel {
    flag: Arc<AtomicBool>,
}

impl QaCancel {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct QaConfig {
    pub top_k: usize,
    pub max_cgrag_passes: usize,
    /// Total context token budget per request.
    pub total_context_tokens: usize,
    /// Per-result token budget inside the context.
    pub per_result_tokens: usize,
    /// Per-snippet budget handed to the source fetcher.
    pub per_snippet_tokens: usize,
    /// Confidence floor for exploratory graph walks.
    pub trace_min_confidence: f32,
    pub session_timeout: Duration,
    pub thresholds: ConfidenceThresholds,
    pub max_citations: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            max_cgrag_passes: 3,
            total_context_tokens: 6000,
            per_result_tokens: 1500,
            per_snippet_tokens: 500,
            trace_min_confidence: 0.7,
            session_timeout: Duration::from_secs(120),
            thresholds: ConfidenceThresholds::default(),
            max_citations: 5,
        }
    }
}

/// Read-only Q&A over the promoted stores. The index and FTS handles sit
/// behind async mutexes because their SQLite connections are not `Sync`;
/// everything else is shared immutably.
pub struct QaEngine {
    index: Mutex<CodeIndex>,
    graph: CodeGraph,
    semantic: Option<SemanticStore>,
    fts: Option<Mutex<FtsStore>>,
    llm: Arc<dyn TextGenerator>,
    embedder: Arc<dyn EmbeddingsProvider>,
    fetcher: SourceFetcher,
    issues: Vec<IssueRef>,
    sessions: Mutex<SessionStore>,
    pub config: QaConfig,
}

impl QaEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: CodeIndex,
        graph: CodeGraph,
        semantic: Option<SemanticStore>,
        fts: Option<FtsStore>,
        llm: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingsProvider>,
        fetcher: SourceFetcher,
        issues: Vec<IssueRef>,
        config: QaConfig,
    ) -> Self {
        Self {
            index: Mutex::new(index),
            graph,
            semantic,
            fts: fts.map(Mutex::new),
            llm,
            embedder,
            fetcher,
            issues,
            sessions: Mutex::new(SessionStore::default()),
            config,
        }
    }

    /// Answer a question.
    pub async fn ask(&self, req: QaRequest) -> Result<QaResponse, QaError> {
        self.ask_inner(req, &QaCancel::new(), None).await
    }

    /// Answer with an external cancellation flag.
    pub async fn ask_cancellable(
        &self,
        req: QaRequest,
        cancel: &QaCancel,
    ) -> Result<QaResponse, QaError> {
        self.ask_inner(req, cancel, None).await
    }

    /// Streaming variant: emits `Status` events at milestones and a final
    /// `Done` (or `Error`). The token stream never carries raw tags.
    pub async fn ask_stream(&self, req: QaRequest, tx: mpsc::Sender<QaEvent>) {
        let cancel = QaCancel::new();
        match self.ask_inner(req, &cancel, Some(&tx)).await {
            Ok(response) => {
                let _ = tx.send(QaEvent::Done { response }).await;
            }
            Err(e) => {
                let _ = tx
                    .send(QaEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }

    async fn ask_inner(
        &self,
        req: QaRequest,
        cancel: &QaCancel,
        events: Option<&mpsc::Sender<QaEvent>>,
    ) -> Result<QaResponse, QaError> {
        let deadline = Instant::now() + self.config.session_timeout;
        let status = |msg: &str| {
            if let Some(tx) = events {
                let _ = tx.try_send(QaEvent::Status {
                    message: msg.to_string(),
                });
            }
        };

        // nothing generated yet: answer honestly instead of guessing
        if self.is_unindexed().await? {
            return Ok(empty_state_response(
                "No wiki has been generated for this repository yet; ask again after a \
generation run completes.",
            ));
        }

        status("classifying question");
        let classification = classify(self.llm.as_ref(), &req.question).await;
        info!(mode = ?classification.mode, "question routed");

        status("retrieving initial context");
        let ctx = self.initial_retrieval(&req, classification.mode, classification.scope.as_deref()).await?;

        // store-outage surface: both stores configured but neither answered
        let both_configured = self.semantic.is_some() && self.fts.is_some();
        let stores_silent = !ctx.semantic_searched && !ctx.fts_searched;
        if classification.mode == QueryMode::Conceptual
            && both_configured
            && stores_silent
        {
            warn!("both search stores unavailable");
            return Ok(empty_state_response(
                "Both search stores are currently unavailable; the question could not be \
grounded in the wiki.",
            ));
        }

        let confidence = derive(
            &ctx.distances,
            ctx.results_found,
            ctx.used_code_index,
            &self.config.thresholds,
        );
        let mut search_quality = SearchQuality {
            semantic_searched: ctx.semantic_searched,
            fts_searched: ctx.fts_searched,
            results_found: ctx.results_found,
            results_used: ctx.blocks.len(),
        };

        if req.quick_mode {
            status("answering (quick mode)");
            return self
                .quick_answer(&req, ctx, confidence, search_quality, cancel)
                .await;
        }

        // CGRAG: pull the session, work on a copy, write back at the end
        let (mut session, context_from_cache) = {
            let mut store = self.sessions.lock().await;
            let (s, cached) = store.get_or_create(req.session_id.as_deref());
            (s.clone(), cached)
        };
        for block in ctx.blocks {
            session.push_context(block.key(), block);
        }

        let mut parsed = ParsedAnswer::default();
        let mut timed_out = false;
        let mut gaps_identified = 0usize;
        let mut passes_used = 0usize;

        for pass in 1..=self.config.max_cgrag_passes {
            if cancel.is_cancelled() {
                break;
            }
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            status(&format!("reasoning pass {pass}"));
            passes_used = pass;
            session.passes += 1;

            let context_text = render_context(
                &session.context,
                self.config.total_context_tokens,
                self.config.per_result_tokens,
            );
            let final_pass = pass == self.config.max_cgrag_passes;
            let prompt = build_cgrag_prompt(&req.question, &context_text, final_pass);
            let raw = match self.generate(&prompt, req.temperature).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("cgrag pass failed: {e}");
                    return Ok(llm_failure_response(&e.to_string(), search_quality));
                }
            };
            parsed = parse_response(&raw);

            if parsed.missing.is_empty() || final_pass {
                for gap in parsed.missing.drain(..) {
                    session.unresolved_gaps.push(gap);
                }
                break;
            }

            status("resolving gaps");
            gaps_identified += parsed.missing.len();
            for gap in parsed.missing.drain(..) {
                let added = self.resolve_gap(&gap, &mut session).await;
                if added {
                    session.resolved_gaps.push(gap);
                } else {
                    session.unresolved_gaps.push(gap);
                }
            }
        }

        search_quality.results_used = session.context.len();
        let stats = CgragStats {
            passes_used,
            gaps_identified,
            gaps_resolved: session.resolved_gaps.len(),
            gaps_unresolved: session.unresolved_gaps.len(),
            session_id: session.id.clone(),
            context_from_cache,
        };

        let citations = self.final_citations(&parsed, &session);
        let disclaimer = if timed_out {
            Some("The answer is partial: the session timed out before all gaps were resolved.".to_string())
        } else if cancel.is_cancelled() {
            Some("The request was cancelled before the loop completed.".to_string())
        } else {
            None
        };

        // persist the session for follow-ups
        {
            let mut store = self.sessions.lock().await;
            let (slot, _) = store.get_or_create(Some(&session.id));
            *slot = session;
        }

        Ok(QaResponse {
            answer: parsed.answer,
            citations,
            confidence,
            disclaimer,
            search_quality,
            cgrag: Some(stats),
        })
    }

    async fn quick_answer(
        &self,
        req: &QaRequest,
        ctx: RetrievedContext,
        confidence: Confidence,
        search_quality: SearchQuality,
        cancel: &QaCancel,
    ) -> Result<QaResponse, QaError> {
        if cancel.is_cancelled() {
            return Ok(llm_failure_response("request cancelled", search_quality));
        }
        let context_text = render_context(
            &ctx.blocks,
            self.config.total_context_tokens,
            self.config.per_result_tokens,
        );
        let prompt = build_cgrag_prompt(&req.question, &context_text, true);
        let raw = match self.generate(&prompt, req.temperature).await {
            Ok(r) => r,
            Err(e) => return Ok(llm_failure_response(&e.to_string(), search_quality)),
        };
        let parsed = parse_response(&raw);

        let citations = if parsed.citations.is_empty() {
            synthesize_citations(&ctx.blocks, self.config.max_citations)
        } else {
            parsed.citations.clone()
        };

        Ok(QaResponse {
            answer: parsed.answer,
            citations,
            confidence,
            disclaimer: None,
            search_quality,
            cgrag: None,
        })
    }

    async fn initial_retrieval(
        &self,
        req: &QaRequest,
        mode: QueryMode,
        scope: Option<&str>,
    ) -> Result<RetrievedContext, QaError> {
        let ctx = match mode {
            QueryMode::Diagnostic => {
                let index = self.index.lock().await;
                diagnostic::retrieve(&index, &self.fetcher, &req.question)
            }
            QueryMode::Exploratory if req.use_graph => {
                exploratory::retrieve(&self.graph, &req.question, self.config.trace_min_confidence)
            }
            QueryMode::Exploratory => RetrievedContext::default(),
            QueryMode::Analytical => {
                let index = self.index.lock().await;
                analytical::retrieve(&index, &self.issues, &req.question, scope)
            }
            QueryMode::Conceptual => self.hybrid_retrieve(&req.question).await?,
        };

        // an empty mode-specific result still deserves wiki context
        if ctx.blocks.is_empty() && mode != QueryMode::Conceptual {
            debug!(?mode, "mode retriever found nothing, falling back to hybrid search");
            let mut fallback = self.hybrid_retrieve(&req.question).await?;
            fallback.used_code_index = ctx.used_code_index;
            return Ok(fallback);
        }
        Ok(ctx)
    }

    async fn hybrid_retrieve(&self, question: &str) -> Result<RetrievedContext, QaError> {
        let fts_guard = match &self.fts {
            Some(m) => Some(m.lock().await),
            None => None,
        };
        let search = HybridSearch::new(
            self.semantic.as_ref(),
            fts_guard.as_deref(),
            self.embedder.as_ref(),
        );
        Ok(conceptual::retrieve(&search, question, self.config.top_k).await?)
    }

    /// Resolve one gap: direct code-index lookup first, then semantic
    /// fallback on the raw gap text. Returns whether anything new landed
    /// in the session.
    async fn resolve_gap(&self, gap: &str, session: &mut CgragSession) -> bool {
        let gap_ref = extract_gap_ref(gap);
        let entries = {
            let index = self.index.lock().await;
            direct_lookup(&index, &gap_ref)
        };

        let mut added = false;
        for entry in entries.iter().take(3) {
            let Some(snippet) =
                self.fetcher
                    .fetch(&entry.file_path, entry.line_start, entry.line_end)
            else {
                continue;
            };
            let block = ContextBlock {
                origin: "gap-lookup".into(),
                source_path: Some(entry.file_path.clone()),
                line_start: Some(snippet.line_start),
                line_end: Some(snippet.line_end),
                text: format!(
                    "{} in {}:\n{}",
                    entry.symbol_name, entry.file_path, snippet.text
                ),
            };
            added |= session.push_context(block.key(), block);
        }
        if added {
            return true;
        }

        // semantic fallback on the gap text itself
        match self.hybrid_retrieve(gap).await {
            Ok(ctx) => {
                let mut any = false;
                for block in ctx.blocks.into_iter().take(3) {
                    any |= session.push_context(block.key(), block);
                }
                any
            }
            Err(e) => {
                warn!("gap fallback search failed: {e}");
                false
            }
        }
    }

    fn final_citations(&self, parsed: &ParsedAnswer, session: &CgragSession) -> Vec<Citation> {
        if !parsed.citations.is_empty() {
            return parsed.citations.clone();
        }
        synthesize_citations(&session.context, self.config.max_citations)
    }

    async fn generate(&self, prompt: &str, temperature: Option<f32>) -> Result<String, QaError> {
        let out = match temperature {
            Some(t) => {
                self.llm
                    .generate_with_temperature(prompt, Some(ANSWER_SYSTEM), t)
                    .await?
            }
            None => self.llm.generate(prompt, Some(ANSWER_SYSTEM)).await?,
        };
        Ok(out)
    }

    async fn is_unindexed(&self) -> Result<bool, QaError> {
        let index_empty = self.index.lock().await.is_empty()?;
        let fts_empty = match &self.fts {
            Some(m) => m.lock().await.is_empty().unwrap_or(true),
            None => true,
        };
        Ok(index_empty && fts_empty && self.semantic.is_none())
    }
}

/// Citations synthesized from the top context blocks, deduplicated by path.
fn synthesize_citations(blocks: &[ContextBlock], max: usize) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for b in blocks {
        let Some(path) = &b.source_path else {
            continue;
        };
        if !seen.insert(path.clone()) {
            continue;
        }
        out.push(Citation {
            path: path.clone(),
            line_start: b.line_start,
            line_end: b.line_end,
        });
        if out.len() >= max {
            break;
        }
    }
    out
}

fn empty_state_response(disclaimer: &str) -> QaResponse {
    QaResponse {
        answer: String::new(),
        citations: Vec::new(),
        confidence: Confidence::Low,
        disclaimer: Some(disclaimer.to_string()),
        search_quality: SearchQuality::default(),
        cgrag: None,
    }
}

fn llm_failure_response(error: &str, search_quality: SearchQuality) -> QaResponse {
    QaResponse {
        answer: String::new(),
        citations: Vec::new(),
        confidence: Confidence::Low,
        disclaimer: Some(format!("The language model call failed: {error}")),
        search_quality,
        cgrag: None,
    }
}
