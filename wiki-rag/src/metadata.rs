//! Structural metadata enrichment for chunks.
//!
//! Initialized once per indexing pass from the synthesis layer map, the
//! parsed symbols, and the per-file imports; then applied to every chunk
//! whose page documents a source file.

use std::collections::HashMap;

use crate::chunk::Chunk;

#[derive(Debug, Default)]
pub struct MetadataExtractor {
    /// source file -> architectural layer
    layers: HashMap<String, String>,
    /// source file -> symbols defined there
    symbols_by_file: HashMap<String, Vec<String>>,
    /// source file -> imports
    imports_by_file: HashMap<String, Vec<String>>,
    /// source file -> entry-point descriptions
    entry_points_by_file: HashMap<String, Vec<String>>,
}

impl MetadataExtractor {
    pub fn new(
        layers: HashMap<String, String>,
        symbols_by_file: HashMap<String, Vec<String>>,
        imports_by_file: HashMap<String, Vec<String>>,
        entry_points_by_file: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            layers,
            symbols_by_file,
            imports_by_file,
            entry_points_by_file,
        }
    }

    /// Attach layer/symbols/imports/entry points for `source_file`.
    ///
    /// Symbols are filtered to those textually present in the chunk body;
    /// imports are carried unfiltered.
    pub fn enrich(&self, chunk: &mut Chunk, source_file: Option<&str>) {
        let Some(file) = source_file else {
            return;
        };
        chunk.metadata.source_file = Some(file.to_string());
        chunk.metadata.layer = self.layers.get(file).cloned().unwrap_or_default();
        chunk.metadata.symbols = self
            .symbols_by_file
            .get(file)
            .map(|syms| {
                syms.iter()
                    .filter(|s| chunk.content.contains(s.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        chunk.metadata.imports = self.imports_by_file.get(file).cloned().unwrap_or_default();
        chunk.metadata.entry_points = self
            .entry_points_by_file
            .get(file)
            .cloned()
            .unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkKind, ChunkMetadata};

    fn chunk(content: &str) -> Chunk {
        Chunk {
            id: "wiki_x_".into(),
            content: content.into(),
            document_path: "wiki/api/deps.py.md".into(),
            title: "api/deps.py".into(),
            section_header: String::new(),
            chunk_index: 0,
            token_estimate: 0,
            kind: ChunkKind::Wiki,
            metadata: ChunkMetadata::default(),
        }
    }

    #[test]
    fn enriches_only_symbols_present_in_body() {
        let ex = MetadataExtractor::new(
            HashMap::from([("api/deps.py".into(), "infrastructure".into())]),
            HashMap::from([(
                "api/deps.py".into(),
                vec!["get_db".into(), "close_db".into()],
            )]),
            HashMap::from([("api/deps.py".into(), vec!["sqlite3".into()])]),
            HashMap::new(),
        );

        let mut c = chunk("The get_db helper opens connections.");
        ex.enrich(&mut c, Some("api/deps.py"));
        assert_eq!(c.metadata.layer, "infrastructure");
        assert_eq!(c.metadata.symbols, vec!["get_db".to_string()]);
        assert_eq!(c.metadata.imports, vec!["sqlite3".to_string()]);
        assert_eq!(c.metadata.source_file.as_deref(), Some("api/deps.py"));
    }

    #[test]
    fn no_source_file_leaves_chunk_untouched() {
        let ex = MetadataExtractor::default();
        let mut c = chunk("anything");
        ex.enrich(&mut c, None);
        assert!(c.metadata.layer.is_empty());
        assert!(c.metadata.source_file.is_none());
    }

    #[test]
    fn unknown_file_gets_empty_layer() {
        let ex = MetadataExtractor::default();
        let mut c = chunk("anything");
        ex.enrich(&mut c, Some("nowhere.py"));
        assert_eq!(c.metadata.layer, "");
        assert!(c.metadata.symbols.is_empty());
    }
}
