//! Hybrid search: query both stores, fuse, report which sides answered.

use tracing::{debug, warn};

use llm_service::EmbeddingsProvider;

use crate::chunk::Chunk;
use crate::errors::RagError;
use crate::fts::FtsStore;
use crate::fuse::rrf_merge;
use crate::semantic::SemanticStore;

/// One merged result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Fused RRF score.
    pub score: f64,
    /// Semantic distance (1 - similarity) when the vector store saw it.
    pub distance: Option<f32>,
}

/// Result envelope; reports which stores were actually consulted.
#[derive(Debug, Clone, Default)]
pub struct SearchEnvelope {
    pub results: Vec<SearchResult>,
    pub semantic_searched: bool,
    pub fts_searched: bool,
}

/// Query router over the two stores. Either store may be absent; a store
/// error degrades the query to the other side instead of failing it.
pub struct HybridSearch<'a> {
    semantic: Option<&'a SemanticStore>,
    fts: Option<&'a FtsStore>,
    embedder: &'a dyn EmbeddingsProvider,
    /// Apply the note < code < wiki pre-sort.
    pub type_priority: bool,
}

impl<'a> HybridSearch<'a> {
    pub fn new(
        semantic: Option<&'a SemanticStore>,
        fts: Option<&'a FtsStore>,
        embedder: &'a dyn EmbeddingsProvider,
    ) -> Self {
        Self {
            semantic,
            fts,
            embedder,
            type_priority: true,
        }
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<SearchEnvelope, RagError> {
        let mut envelope = SearchEnvelope::default();

        // Semantic side: embed then vector-search; failures degrade.
        let mut semantic_list = Vec::new();
        let mut distances: std::collections::HashMap<String, f32> = Default::default();
        if let Some(store) = self.semantic {
            match self.embedder.embed(query).await {
                Ok(vector) => match store.search(vector, top_k as u64, None).await {
                    Ok(hits) => {
                        envelope.semantic_searched = true;
                        for h in hits {
                            distances.insert(h.chunk.id.clone(), h.distance());
                            semantic_list.push(h.chunk);
                        }
                    }
                    Err(e) => warn!("semantic search unavailable, degrading: {e}"),
                },
                Err(e) => warn!("embedding failed, degrading to fts: {e}"),
            }
        }

        // Lexical side.
        let mut fts_list = Vec::new();
        if let Some(store) = self.fts {
            match store.search(query, top_k) {
                Ok(hits) => {
                    envelope.fts_searched = true;
                    fts_list.extend(hits.into_iter().map(|h| h.chunk));
                }
                Err(e) => warn!("fts search unavailable, degrading: {e}"),
            }
        }

        let fused = rrf_merge(semantic_list, fts_list, self.type_priority);
        envelope.results = fused
            .into_iter()
            .take(top_k)
            .map(|f| {
                let distance = distances.get(&f.chunk.id).copied();
                SearchResult {
                    chunk: f.chunk,
                    score: f.score,
                    distance,
                }
            })
            .collect();

        debug!(
            results = envelope.results.len(),
            semantic = envelope.semantic_searched,
            fts = envelope.fts_searched,
            "hybrid search complete"
        );
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkKind, ChunkMetadata};
    use llm_service::{contract::BoxFuture, LlmError};

    struct FixedEmbedder;
    impl EmbeddingsProvider for FixedEmbedder {
        fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, LlmError>> {
            Box::pin(async { Ok(vec![0.0; 4]) })
        }
    }

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.into(),
            content: content.into(),
            document_path: "wiki/x.md".into(),
            title: "x".into(),
            section_header: String::new(),
            chunk_index: 0,
            token_estimate: 2,
            kind: ChunkKind::Wiki,
            metadata: ChunkMetadata::default(),
        }
    }

    #[tokio::test]
    async fn fts_only_degradation() {
        let mut fts = FtsStore::open_in_memory().unwrap();
        fts.insert_chunks(&[chunk("a", "database pooling helpers")])
            .unwrap();
        let embedder = FixedEmbedder;
        let search = HybridSearch::new(None, Some(&fts), &embedder);

        let envelope = search.search("database", 5).await.unwrap();
        assert!(!envelope.semantic_searched);
        assert!(envelope.fts_searched);
        assert_eq!(envelope.results.len(), 1);
        assert!(envelope.results[0].distance.is_none());
    }

    #[tokio::test]
    async fn no_stores_yields_empty_envelope() {
        let embedder = FixedEmbedder;
        let search = HybridSearch::new(None, None, &embedder);
        let envelope = search.search("anything", 5).await.unwrap();
        assert!(envelope.results.is_empty());
        assert!(!envelope.semantic_searched);
        assert!(!envelope.fts_searched);
    }
}
