//! Reciprocal Rank Fusion over the two store rankings.
//!
//! Based on Cormack, Clarke, Buettcher (2009). Each chunk scores
//! `1/(k + rank_semantic + 1) + 1/(k + rank_fts + 1)` with `k = 60` and a
//! sentinel rank of 1000 for lists that missed the chunk. An optional type
//! priority pre-sort keeps human-authored content above generated pages,
//! and a content-prefix hash pass drops near-duplicates.

use std::collections::HashMap;

use crate::chunk::Chunk;

pub const RRF_K: f64 = 60.0;
/// Rank assigned to a chunk missing from one of the lists.
pub const MISSING_RANK: usize = 1000;
/// Chunks sharing this many leading content characters are duplicates.
pub const DEDUP_HASH_LENGTH: usize = 120;

/// One ranked input list (best first).
pub type RankedList = Vec<Chunk>;

/// A fused result.
#[derive(Debug, Clone)]
pub struct FusedChunk {
    pub chunk: Chunk,
    pub score: f64,
    pub semantic_rank: Option<usize>,
    pub fts_rank: Option<usize>,
}

/// Merge the two rankings, dedup, sort.
pub fn rrf_merge(semantic: RankedList, fts: RankedList, type_priority: bool) -> Vec<FusedChunk> {
    let mut by_id: HashMap<String, FusedChunk> = HashMap::new();

    for (rank, chunk) in semantic.into_iter().enumerate() {
        by_id
            .entry(chunk.id.clone())
            .or_insert(FusedChunk {
                chunk,
                score: 0.0,
                semantic_rank: None,
                fts_rank: None,
            })
            .semantic_rank = Some(rank);
    }
    for (rank, chunk) in fts.into_iter().enumerate() {
        by_id
            .entry(chunk.id.clone())
            .or_insert(FusedChunk {
                chunk,
                score: 0.0,
                semantic_rank: None,
                fts_rank: None,
            })
            .fts_rank = Some(rank);
    }

    let mut fused: Vec<FusedChunk> = by_id
        .into_values()
        .map(|mut f| {
            let sem = f.semantic_rank.unwrap_or(MISSING_RANK);
            let lex = f.fts_rank.unwrap_or(MISSING_RANK);
            f.score = 1.0 / (RRF_K + sem as f64 + 1.0) + 1.0 / (RRF_K + lex as f64 + 1.0);
            f
        })
        .collect();

    fused.sort_by(|a, b| {
        let type_key = |f: &FusedChunk| {
            if type_priority {
                f.chunk.kind.priority()
            } else {
                0
            }
        };
        type_key(a)
            .cmp(&type_key(b))
            .then(
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.chunk.id.cmp(&b.chunk.id))
    });

    dedup_by_content_prefix(fused)
}

/// Keep the higher-ranked chunk when two share a content prefix.
fn dedup_by_content_prefix(fused: Vec<FusedChunk>) -> Vec<FusedChunk> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(fused.len());
    for f in fused {
        let prefix: String = f.chunk.content.chars().take(DEDUP_HASH_LENGTH).collect();
        let digest = blake3::hash(prefix.as_bytes()).to_hex().to_string();
        if seen.insert(digest) {
            out.push(f);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkKind, ChunkMetadata};

    fn chunk(id: &str, content: &str, kind: ChunkKind) -> Chunk {
        Chunk {
            id: id.into(),
            content: content.into(),
            document_path: "wiki/x.md".into(),
            title: "x".into(),
            section_header: String::new(),
            chunk_index: 0,
            token_estimate: 1,
            kind,
            metadata: ChunkMetadata::default(),
        }
    }

    fn w(id: &str, content: &str) -> Chunk {
        chunk(id, content, ChunkKind::Wiki)
    }

    #[test]
    fn merges_overlapping_rankings() {
        // semantic [A, B, C], fts [B, A, D]
        let semantic = vec![w("A", "a"), w("B", "b"), w("C", "c")];
        let fts = vec![w("B", "b"), w("A", "a"), w("D", "d")];
        let fused = rrf_merge(semantic, fts, false);

        let score_of = |id: &str| fused.iter().find(|f| f.chunk.id == id).unwrap().score;
        let expect = |r1: usize, r2: usize| {
            1.0 / (61.0 + r1 as f64) + 1.0 / (61.0 + r2 as f64)
        };
        assert!((score_of("A") - expect(0, 1)).abs() < 1e-12);
        assert!((score_of("B") - expect(1, 0)).abs() < 1e-12);
        assert!((score_of("C") - (1.0 / 63.0 + 1.0 / 1061.0)).abs() < 1e-12);
        assert!((score_of("D") - (1.0 / 1061.0 + 1.0 / 63.0)).abs() < 1e-12);
        // A and B tie at top, then C and D
        assert!(matches!(fused[0].chunk.id.as_str(), "A" | "B"));
        assert!(matches!(fused[1].chunk.id.as_str(), "A" | "B"));
        assert!(matches!(fused[2].chunk.id.as_str(), "C" | "D"));
        assert_eq!(fused.len(), 4);
    }

    #[test]
    fn monotone_when_dominating_both_lists() {
        let semantic = vec![w("A", "a"), w("B", "b")];
        let fts = vec![w("A", "a2"), w("B", "b2")];
        let fused = rrf_merge(semantic, fts, false);
        assert_eq!(fused[0].chunk.id, "A");
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn single_list_degrades_cleanly() {
        let fused = rrf_merge(vec![w("A", "a"), w("B", "b")], vec![], false);
        assert_eq!(fused[0].chunk.id, "A");
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn type_priority_keeps_notes_on_top() {
        let semantic = vec![
            chunk("gen", "generated text", ChunkKind::Wiki),
            chunk("note", "human note", ChunkKind::Note),
        ];
        let fused = rrf_merge(semantic, vec![], true);
        assert_eq!(fused[0].chunk.id, "note");
    }

    #[test]
    fn shared_prefix_dedups_to_higher_ranked() {
        let same = "identical leading content ".repeat(20);
        let semantic = vec![w("first", &same), w("second", &same)];
        let fused = rrf_merge(semantic, vec![], false);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].chunk.id, "first");
    }
}
