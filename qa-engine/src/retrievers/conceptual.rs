//! Conceptual retriever: defer to hybrid search.
//!
//! The only mode that never touches the code index; everything comes from
//! the wiki stores through RRF-merged hybrid search.

use wiki_rag::{HybridSearch, RagError};

use crate::retrievers::{ContextBlock, RetrievedContext};

pub async fn retrieve(
    search: &HybridSearch<'_>,
    question: &str,
    top_k: usize,
) -> Result<RetrievedContext, RagError> {
    let envelope = search.search(question, top_k).await?;

    let mut ctx = RetrievedContext {
        used_code_index: false,
        semantic_searched: envelope.semantic_searched,
        fts_searched: envelope.fts_searched,
        results_found: envelope.results.len(),
        ..Default::default()
    };

    for r in &envelope.results {
        if let Some(d) = r.distance {
            ctx.distances.push(d);
        }
        ctx.blocks.push(ContextBlock {
            origin: "hybrid-search".into(),
            source_path: r.chunk.metadata.source_file.clone().or_else(|| {
                Some(r.chunk.document_path.clone())
            }),
            line_start: None,
            line_end: None,
            text: r.chunk.content.clone(),
        });
    }
    Ok(ctx)
}
