//! RAG layer over the generated wiki.
//!
//! Pages come in as markdown, get split into section-sized chunks with a
//! context prefix and structural metadata, and land in two stores: a Qdrant
//! collection for vector search and a SQLite FTS5 table for lexical search.
//! Queries hit both and merge rankings with Reciprocal Rank Fusion. Either
//! store may be absent or down; the merge degrades to whichever side
//! answered.

pub mod chunk;
pub mod chunker;
pub mod errors;
pub mod fts;
pub mod fuse;
pub mod indexer;
pub mod metadata;
pub mod search;
pub mod semantic;
pub mod tokens;

pub use chunk::{Chunk, ChunkKind, ChunkMetadata};
pub use chunker::{split_page, ChunkerConfig};
pub use errors::RagError;
pub use fts::FtsStore;
pub use fuse::{rrf_merge, RankedList, DEDUP_HASH_LENGTH, MISSING_RANK, RRF_K};
pub use indexer::{IndexReport, PageInput, WikiIndexer};
pub use metadata::MetadataExtractor;
pub use search::{HybridSearch, SearchEnvelope, SearchResult};
pub use semantic::{SemanticConfig, SemanticStore};
pub use tokens::estimate_tokens;
