//! Chunk model: a retrieval-sized slice of a generated page.

use serde::{Deserialize, Serialize};

/// Origin class of a chunk, used for type-priority ordering at merge time.
/// Lower priority value sorts first, keeping human-authored notes on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Note,
    Code,
    Wiki,
}

impl ChunkKind {
    pub fn priority(&self) -> u8 {
        match self {
            ChunkKind::Note => 0,
            ChunkKind::Code => 1,
            ChunkKind::Wiki => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Note => "note",
            ChunkKind::Code => "code",
            ChunkKind::Wiki => "wiki",
        }
    }
}

/// Structural metadata attached to a chunk by the metadata extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Architectural layer of the source file, empty when unknown.
    #[serde(default)]
    pub layer: String,
    /// Symbols defined in the source file that textually appear in the body.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Imports of the source file, unfiltered.
    #[serde(default)]
    pub imports: Vec<String>,
    /// Entry-point descriptions tied to the source file.
    #[serde(default)]
    pub entry_points: Vec<String>,
    /// Source file behind the wiki page, when the page documents one.
    #[serde(default)]
    pub source_file: Option<String>,
}

/// One retrievable chunk. `content` carries the context prefix
/// `[Document: <title> | Section: <header>]` so the chunk stands alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `wiki_{document-slug}_{section-slug}[_{index}]`
    pub id: String,
    pub content: String,
    pub document_path: String,
    pub title: String,
    /// Empty for content before the first heading.
    pub section_header: String,
    /// Position within the document (sequential over all sections).
    pub chunk_index: usize,
    pub token_estimate: usize,
    pub kind: ChunkKind,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}
