//! Section-based markdown chunking.
//!
//! Pages split on level-2/3 headings; content before the first heading
//! forms a leading section with an empty header. Sections over the token
//! cap are re-split by words with overlap. Chunk IDs are pure functions of
//! `(document_path, section_header, split_index)` so re-indexing identical
//! input produces identical IDs.

use tracing::debug;

use crate::chunk::{Chunk, ChunkKind, ChunkMetadata};
use crate::tokens::estimate_tokens;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// A section at or under this estimate stays one chunk.
    pub max_section_tokens: usize,
    /// Word-split target for oversized sections.
    pub chunk_size_tokens: usize,
    /// Backlap between consecutive splits of one section.
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_section_tokens: 1000,
            chunk_size_tokens: 400,
            overlap_tokens: 50,
        }
    }
}

/// Split one markdown page into chunks (metadata enrichment happens later).
pub fn split_page(
    document_path: &str,
    title: &str,
    markdown: &str,
    kind: ChunkKind,
    cfg: &ChunkerConfig,
) -> Vec<Chunk> {
    let body = strip_front_matter(markdown);
    let sections = split_sections(body);

    let mut out = Vec::new();
    let mut chunk_index = 0usize;
    let mut used_ids = std::collections::HashSet::new();

    for (header, text) in sections {
        let text = text.trim();
        if text.is_empty() && header.is_empty() {
            continue;
        }

        let pieces = if estimate_tokens(text) <= cfg.max_section_tokens {
            vec![text.to_string()]
        } else {
            split_by_words(text, cfg.chunk_size_tokens, cfg.overlap_tokens)
        };
        let split = pieces.len() > 1;

        for (i, piece) in pieces.into_iter().enumerate() {
            let mut id = chunk_id(document_path, &header, split.then_some(i));
            // Duplicate headers within one page disambiguate deterministically.
            while !used_ids.insert(id.clone()) {
                id.push_str("_x");
            }
            let content = format!("[Document: {title} | Section: {header}]\n\n{piece}");
            let token_estimate = estimate_tokens(&content);
            out.push(Chunk {
                id,
                content,
                document_path: document_path.to_string(),
                title: title.to_string(),
                section_header: header.clone(),
                chunk_index,
                token_estimate,
                kind,
                metadata: ChunkMetadata::default(),
            });
            chunk_index += 1;
        }
    }

    debug!(
        document = document_path,
        chunks = out.len(),
        "page chunked"
    );
    out
}

/// `wiki_{slug(document_path minus .md)}_{slug(header)}[_{index}]`
pub fn chunk_id(document_path: &str, header: &str, index: Option<usize>) -> String {
    let doc = document_path.strip_suffix(".md").unwrap_or(document_path);
    let mut id = format!("wiki_{}_{}", slugify(doc), slugify(header));
    if let Some(i) = index {
        id.push_str(&format!("_{i}"));
    }
    id
}

/// Lowercase; `/` and spaces become `-`; other non-alphanumerics dropped.
pub fn slugify(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c == '/' || c == ' ' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

fn strip_front_matter(markdown: &str) -> &str {
    let Some(rest) = markdown.strip_prefix("---\n") else {
        return markdown;
    };
    match rest.find("\n---") {
        Some(end) => {
            let after = &rest[end + 4..];
            after.strip_prefix('\n').unwrap_or(after)
        }
        None => markdown,
    }
}

/// Split into `(header, body)` pairs on `##`/`###` headings.
fn split_sections(body: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut header = String::new();
    let mut current = String::new();

    for line in body.lines() {
        let trimmed = line.trim_start();
        let is_heading = (trimmed.starts_with("## ") || trimmed.starts_with("### "))
            && !trimmed.starts_with("####");
        if is_heading {
            sections.push((header.clone(), std::mem::take(&mut current)));
            header = trimmed.trim_start_matches('#').trim().to_string();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    sections.push((header, current));
    sections
}

fn split_by_words(text: &str, target_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    // token estimate ~ words * 4/3, so convert budgets back to word counts
    let words: Vec<&str> = text.split_whitespace().collect();
    let per_chunk = (target_tokens * 3 / 4).max(1);
    let overlap = (overlap_tokens * 3 / 4).min(per_chunk.saturating_sub(1));
    let step = per_chunk - overlap;

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let end = (start + per_chunk).min(words.len());
        out.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"---
file_summary:
  purpose: Database helpers.
  layer: infrastructure
---

Intro paragraph before any heading.

## Purpose

Handles database connections.

## Public API

get_db opens a connection.

### Internals

Cache keyed by name.
"#;

    #[test]
    fn splits_on_level_2_and_3_headings() {
        let chunks = split_page(
            "wiki/api/deps.py.md",
            "api/deps.py",
            PAGE,
            ChunkKind::Wiki,
            &ChunkerConfig::default(),
        );
        let headers: Vec<&str> = chunks.iter().map(|c| c.section_header.as_str()).collect();
        assert_eq!(headers, ["", "Purpose", "Public API", "Internals"]);
        // leading section has empty header and the intro text
        assert!(chunks[0].content.contains("Intro paragraph"));
        // front-matter never leaks into chunks
        assert!(!chunks[0].content.contains("file_summary"));
    }

    #[test]
    fn context_prefix_present_on_every_chunk() {
        let chunks = split_page(
            "wiki/api/deps.py.md",
            "api/deps.py",
            PAGE,
            ChunkKind::Wiki,
            &ChunkerConfig::default(),
        );
        for c in &chunks {
            assert!(
                c.content
                    .starts_with(&format!("[Document: api/deps.py | Section: {}]", c.section_header)),
                "bad prefix on {}",
                c.id
            );
        }
    }

    #[test]
    fn chunk_ids_are_deterministic() {
        let cfg = ChunkerConfig::default();
        let a = split_page("wiki/api/deps.py.md", "t", PAGE, ChunkKind::Wiki, &cfg);
        let b = split_page("wiki/api/deps.py.md", "t", PAGE, ChunkKind::Wiki, &cfg);
        let ids_a: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        assert!(ids_a.contains(&"wiki_wiki-api-depspy_purpose"));
    }

    #[test]
    fn oversized_section_splits_with_overlap() {
        let big_body = format!("## Big\n\n{}", "word ".repeat(3000));
        let cfg = ChunkerConfig {
            max_section_tokens: 1000,
            chunk_size_tokens: 400,
            overlap_tokens: 50,
        };
        let chunks = split_page("wiki/big.md", "big", &big_body, ChunkKind::Wiki, &cfg);
        assert!(chunks.len() >= 2, "expected a split, got {}", chunks.len());
        // indices sequential, ids carry the split index
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert!(c.id.ends_with(&format!("_{i}")), "id {} missing index", c.id);
        }
        // last chunk reaches the end of the section
        assert!(chunks.last().unwrap().content.trim_end().ends_with("word"));
        // consecutive chunks share overlap words
        let first_words: Vec<&str> = chunks[0].content.split_whitespace().collect();
        let tail = &first_words[first_words.len() - 5..];
        assert!(tail.iter().all(|w| chunks[1].content.contains(*w)));
    }

    #[test]
    fn heading_free_page_is_single_chunk() {
        let chunks = split_page(
            "wiki/note.md",
            "note",
            "Just one paragraph.\nNo headings here.\n",
            ChunkKind::Note,
            &ChunkerConfig::default(),
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_header, "");
        assert_eq!(chunks[0].id, "wiki_wiki-note_");
    }

    #[test]
    fn token_estimate_close_to_reference() {
        let chunks = split_page(
            "wiki/api/deps.py.md",
            "api/deps.py",
            PAGE,
            ChunkKind::Wiki,
            &ChunkerConfig::default(),
        );
        for c in &chunks {
            let reference = estimate_tokens(&c.content);
            let drift = (c.token_estimate as f64 - reference as f64).abs()
                / reference.max(1) as f64;
            assert!(drift <= 0.1);
        }
    }

    #[test]
    fn slugify_rules() {
        assert_eq!(slugify("wiki/api/deps.py"), "wiki-api-depspy");
        assert_eq!(slugify("Public API"), "public-api");
        assert_eq!(slugify("What's New?"), "whats-new");
    }
}
