//! Full-text store: SQLite FTS5 over chunk content, title, and header.
//!
//! The base table holds the full chunk (metadata as JSON) and the FTS5
//! virtual table stays in sync through triggers. Indexing passes call
//! [`FtsStore::reset`] first; the store is rebuilt from scratch each run.

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkKind, ChunkMetadata};
use crate::errors::RagError;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk_id TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    document_path TEXT NOT NULL,
    title TEXT NOT NULL,
    section_header TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    token_estimate INTEGER NOT NULL,
    kind TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_chunks_chunk_id ON chunks(chunk_id);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    content,
    title,
    section_header,
    content='chunks',
    content_rowid='id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, content, title, section_header)
    VALUES (new.id, new.content, new.title, new.section_header);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, content, title, section_header)
    VALUES('delete', old.id, old.content, old.title, old.section_header);
END;
";

/// One lexical hit.
#[derive(Debug, Clone)]
pub struct FtsHit {
    pub chunk: Chunk,
    /// Negated bm25 (higher is better), for symmetry with vector scores.
    pub score: f64,
}

pub struct FtsStore {
    conn: Connection,
}

impl FtsStore {
    pub fn open(path: &Path) -> Result<Self, RagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, RagError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Drop all rows; the triggers clear the FTS side.
    pub fn reset(&mut self) -> Result<(), RagError> {
        self.conn.execute("DELETE FROM chunks", [])?;
        info!("fts store reset");
        Ok(())
    }

    /// Insert a batch of chunks in one transaction.
    pub fn insert_chunks(&mut self, chunks: &[Chunk]) -> Result<usize, RagError> {
        let tx = self.conn.transaction()?;
        let mut n = 0usize;
        {
            // explicit delete-then-insert keeps the FTS triggers in sync
            // (REPLACE would skip the delete trigger)
            let mut del = tx.prepare("DELETE FROM chunks WHERE chunk_id = ?1")?;
            let mut stmt = tx.prepare(
                "INSERT INTO chunks \
                 (chunk_id, content, document_path, title, section_header, chunk_index, \
                  token_estimate, kind, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for c in chunks {
                del.execute(params![c.id])?;
                stmt.execute(params![
                    c.id,
                    c.content,
                    c.document_path,
                    c.title,
                    c.section_header,
                    c.chunk_index as i64,
                    c.token_estimate as i64,
                    c.kind.as_str(),
                    serde_json::to_string(&c.metadata)?,
                ])?;
                n += 1;
            }
        }
        tx.commit()?;
        debug!(inserted = n, "fts insert complete");
        Ok(n)
    }

    /// BM25-ranked lexical search.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<FtsHit>, RagError> {
        let fts_query = to_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT c.chunk_id, c.content, c.document_path, c.title, c.section_header, \
                    c.chunk_index, c.token_estimate, c.kind, c.metadata, bm25(chunks_fts) \
             FROM chunks_fts \
             JOIN chunks c ON c.id = chunks_fts.rowid \
             WHERE chunks_fts MATCH ?1 \
             ORDER BY bm25(chunks_fts) \
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![fts_query, top_k as i64], |row| {
            let metadata_raw: String = row.get(8)?;
            let kind_raw: String = row.get(7)?;
            Ok(FtsHit {
                chunk: Chunk {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    document_path: row.get(2)?,
                    title: row.get(3)?,
                    section_header: row.get(4)?,
                    chunk_index: row.get::<_, i64>(5)? as usize,
                    token_estimate: row.get::<_, i64>(6)? as usize,
                    kind: match kind_raw.as_str() {
                        "note" => ChunkKind::Note,
                        "code" => ChunkKind::Code,
                        _ => ChunkKind::Wiki,
                    },
                    metadata: serde_json::from_str::<ChunkMetadata>(&metadata_raw)
                        .unwrap_or_default(),
                },
                score: -row.get::<_, f64>(9)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<usize, RagError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool, RagError> {
        Ok(self.len()? == 0)
    }
}

/// Quote each term so user punctuation cannot break FTS5 query syntax.
fn to_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|t| {
            let clean: String = t
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            clean
        })
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.into(),
            content: content.into(),
            document_path: "wiki/api/deps.py.md".into(),
            title: "api/deps.py".into(),
            section_header: "Purpose".into(),
            chunk_index: 0,
            token_estimate: 4,
            kind: ChunkKind::Wiki,
            metadata: ChunkMetadata::default(),
        }
    }

    #[test]
    fn insert_and_search() {
        let mut store = FtsStore::open_in_memory().unwrap();
        store
            .insert_chunks(&[
                chunk("a", "database connection pooling for sqlite"),
                chunk("b", "session token verification"),
            ])
            .unwrap();

        let hits = store.search("sqlite database", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "a");
        assert!(hits[0].score.is_finite());
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = FtsStore::open_in_memory().unwrap();
        store.insert_chunks(&[chunk("a", "some text")]).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        store.reset().unwrap();
        assert!(store.is_empty().unwrap());
        assert!(store.search("text", 10).unwrap().is_empty());
    }

    #[test]
    fn double_insert_is_idempotent() {
        let mut store = FtsStore::open_in_memory().unwrap();
        store.insert_chunks(&[chunk("a", "stable content")]).unwrap();
        store.insert_chunks(&[chunk("a", "stable content")]).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn punctuation_in_query_is_harmless() {
        let store = FtsStore::open_in_memory().unwrap();
        let hits = store.search("why is get_db() failing?!", 5).unwrap();
        assert!(hits.is_empty());
    }
}
