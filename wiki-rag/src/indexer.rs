//! Indexing pass: pages -> chunks -> both stores.
//!
//! Stores are dropped and re-populated every pass; chunk IDs are stable,
//! so identical input rebuilds identical store contents. A chunk counts as
//! indexed only once both stores acknowledged the write.

use tracing::{info, warn};

use llm_service::EmbeddingsProvider;

use crate::chunk::{Chunk, ChunkKind};
use crate::chunker::{split_page, ChunkerConfig};
use crate::errors::RagError;
use crate::fts::FtsStore;
use crate::metadata::MetadataExtractor;
use crate::semantic::SemanticStore;

const EMBED_BATCH: usize = 32;

/// One page handed over by the generation pipeline.
#[derive(Debug, Clone)]
pub struct PageInput {
    /// Wiki-relative document path (`api/deps.py.md`).
    pub document_path: String,
    pub title: String,
    pub markdown: String,
    /// Source file behind the page, when it documents one.
    pub source_file: Option<String>,
    pub kind: ChunkKind,
}

/// Counters for one indexing pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexReport {
    pub pages: usize,
    pub chunks: usize,
    pub indexed: usize,
    pub embed_failures: usize,
}

pub struct WikiIndexer {
    pub chunker: ChunkerConfig,
    pub metadata: MetadataExtractor,
}

impl WikiIndexer {
    pub fn new(chunker: ChunkerConfig, metadata: MetadataExtractor) -> Self {
        Self { chunker, metadata }
    }

    /// Chunk every page and enrich with structural metadata.
    pub fn chunk_pages(&self, pages: &[PageInput]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            let mut page_chunks = split_page(
                &page.document_path,
                &page.title,
                &page.markdown,
                page.kind,
                &self.chunker,
            );
            for c in &mut page_chunks {
                self.metadata.enrich(c, page.source_file.as_deref());
            }
            chunks.extend(page_chunks);
        }
        chunks
    }

    /// Full re-index: reset both stores, then write every chunk to both.
    pub async fn index_pages(
        &self,
        pages: &[PageInput],
        semantic: Option<&SemanticStore>,
        fts: Option<&mut FtsStore>,
        embedder: &dyn EmbeddingsProvider,
    ) -> Result<IndexReport, RagError> {
        let chunks = self.chunk_pages(pages);
        let mut report = IndexReport {
            pages: pages.len(),
            chunks: chunks.len(),
            ..Default::default()
        };

        if let Some(store) = semantic {
            store.reset().await?;
        }
        let fts = match fts {
            Some(f) => {
                f.reset()?;
                Some(f)
            }
            None => None,
        };

        match (semantic, fts) {
            (Some(sem), Some(fts)) => {
                for batch in chunks.chunks(EMBED_BATCH) {
                    let mut embedded = Vec::with_capacity(batch.len());
                    let mut ok_chunks = Vec::with_capacity(batch.len());
                    for c in batch {
                        match embedder.embed(&c.content).await {
                            Ok(v) => {
                                embedded.push((c.clone(), v));
                                ok_chunks.push(c.clone());
                            }
                            Err(e) => {
                                report.embed_failures += 1;
                                warn!(chunk = %c.id, "embedding failed, chunk skipped: {e}");
                            }
                        }
                    }
                    // both writes must succeed before the chunks count
                    sem.upsert_chunks(embedded).await?;
                    fts.insert_chunks(&ok_chunks)?;
                    report.indexed += ok_chunks.len();
                }
            }
            (None, Some(fts)) => {
                fts.insert_chunks(&chunks)?;
                report.indexed = chunks.len();
            }
            (Some(sem), None) => {
                for batch in chunks.chunks(EMBED_BATCH) {
                    let mut embedded = Vec::with_capacity(batch.len());
                    for c in batch {
                        match embedder.embed(&c.content).await {
                            Ok(v) => embedded.push((c.clone(), v)),
                            Err(e) => {
                                report.embed_failures += 1;
                                warn!(chunk = %c.id, "embedding failed, chunk skipped: {e}");
                            }
                        }
                    }
                    report.indexed += sem.upsert_chunks(embedded).await?;
                }
            }
            (None, None) => {
                warn!("no stores configured, indexing pass is a no-op");
            }
        }

        info!(
            pages = report.pages,
            chunks = report.chunks,
            indexed = report.indexed,
            embed_failures = report.embed_failures,
            "indexing pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_service::{contract::BoxFuture, LlmError};

    struct FixedEmbedder;
    impl EmbeddingsProvider for FixedEmbedder {
        fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, LlmError>> {
            Box::pin(async { Ok(vec![0.1; 4]) })
        }
    }

    fn page(path: &str, body: &str) -> PageInput {
        PageInput {
            document_path: path.into(),
            title: path.trim_end_matches(".md").into(),
            markdown: body.into(),
            source_file: None,
            kind: ChunkKind::Wiki,
        }
    }

    #[tokio::test]
    async fn fts_only_indexing_counts_chunks() {
        let indexer = WikiIndexer::new(ChunkerConfig::default(), MetadataExtractor::default());
        let mut fts = FtsStore::open_in_memory().unwrap();
        let pages = vec![page("a.md", "## One\n\ncontent one\n\n## Two\n\ncontent two\n")];
        let report = indexer
            .index_pages(&pages, None, Some(&mut fts), &FixedEmbedder)
            .await
            .unwrap();
        assert_eq!(report.pages, 1);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.indexed, 2);
        assert_eq!(fts.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn reindex_identical_content_is_idempotent() {
        let indexer = WikiIndexer::new(ChunkerConfig::default(), MetadataExtractor::default());
        let mut fts = FtsStore::open_in_memory().unwrap();
        let pages = vec![page("a.md", "## One\n\nstable content\n")];

        indexer
            .index_pages(&pages, None, Some(&mut fts), &FixedEmbedder)
            .await
            .unwrap();
        let first: Vec<String> = fts
            .search("stable", 10)
            .unwrap()
            .into_iter()
            .map(|h| h.chunk.id)
            .collect();

        indexer
            .index_pages(&pages, None, Some(&mut fts), &FixedEmbedder)
            .await
            .unwrap();
        let second: Vec<String> = fts
            .search("stable", 10)
            .unwrap()
            .into_iter()
            .map(|h| h.chunk.id)
            .collect();

        assert_eq!(first, second);
        assert_eq!(fts.len().unwrap(), 1);
    }
}
