//! The index store: build, invert calls, and point queries.
//!
//! All queries return rows ordered by `(file_path, line_start)` so results
//! are deterministic regardless of insert order.

use std::path::Path;

use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use source_analyzer::ParsedFile;

use crate::entry::{IndexEntry, DOCSTRING_MAX_CHARS};
use crate::errors::IndexError;
use crate::schema::{CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL};

const SELECT_COLUMNS: &str = "file_path, symbol_name, kind, line_start, line_end, signature, \
     docstring, calls, called_by, raises, mutates, error_strings, source_hash";

/// Handle over the SQLite-backed symbol index. Owned explicitly by the
/// orchestrator; never a process-wide singleton.
pub struct CodeIndex {
    conn: Connection,
}

impl CodeIndex {
    /// Open (or create) the index at `path`.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory index, used by tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, IndexError> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])?;
        Ok(Self { conn })
    }

    /// Stored schema version.
    pub fn schema_version(&self) -> Result<u32, IndexError> {
        let v: String = self.conn.query_row(GET_VERSION_SQL, [], |r| r.get(0))?;
        Ok(v.parse().unwrap_or(0))
    }

    /// Rebuild rows for the given files.
    ///
    /// Wipes entries for every file appearing in the new set, inserts fresh
    /// rows for indexable symbol kinds, then recomputes `called_by` across
    /// the whole table.
    pub fn build(&mut self, files: &[ParsedFile], source_hash: &str) -> Result<usize, IndexError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut wipe = tx.prepare("DELETE FROM symbols WHERE file_path = ?1")?;
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO symbols \
                 (file_path, symbol_name, kind, line_start, line_end, signature, docstring, \
                  calls, called_by, raises, mutates, error_strings, source_hash) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '[]', ?9, ?10, ?11, ?12)",
            )?;

            for f in files {
                wipe.execute(params![f.path])?;
                for s in &f.symbols {
                    if !s.kind.is_indexable() {
                        continue;
                    }
                    let docstring = s
                        .docstring
                        .as_deref()
                        .map(|d| d.chars().take(DOCSTRING_MAX_CHARS).collect::<String>());
                    insert.execute(params![
                        f.path,
                        s.qualified_name(),
                        s.kind.as_str(),
                        s.line_start,
                        s.line_end,
                        s.signature,
                        docstring,
                        serde_json::to_string(&s.facts.calls)?,
                        serde_json::to_string(&s.facts.raises)?,
                        serde_json::to_string(&s.facts.mutates)?,
                        serde_json::to_string(&s.facts.error_strings)?,
                        f.source_hash,
                    ])?;
                    inserted += 1;
                }
            }
        }
        tx.commit()?;

        self.compute_called_by()?;
        info!(inserted, files = files.len(), "code index built");
        Ok(inserted)
    }

    /// Invert `calls` into `called_by` across the whole index.
    pub fn compute_called_by(&mut self) -> Result<(), IndexError> {
        use std::collections::HashMap;

        let rows: Vec<(String, String, Vec<String>)> = {
            let mut stmt = self
                .conn
                .prepare("SELECT file_path, symbol_name, calls FROM symbols")?;
            let iter = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in iter {
                let (file, name, calls_json) = row?;
                let calls: Vec<String> = serde_json::from_str(&calls_json).unwrap_or_default();
                out.push((file, name, calls));
            }
            out
        };

        // map plain name -> qualified names of callers
        let mut called_by: HashMap<String, Vec<String>> = HashMap::new();
        for (_file, caller, calls) in &rows {
            for callee in calls {
                called_by.entry(callee.clone()).or_default().push(caller.clone());
            }
        }
        for v in called_by.values_mut() {
            v.sort();
            v.dedup();
        }

        let tx = self.conn.transaction()?;
        {
            let mut update = tx.prepare(
                "UPDATE symbols SET called_by = ?1 WHERE file_path = ?2 AND symbol_name = ?3",
            )?;
            for (file, name, _) in &rows {
                let short = name.rsplit('.').next().unwrap_or(name);
                let callers = called_by.get(short).cloned().unwrap_or_default();
                update.execute(params![serde_json::to_string(&callers)?, file, name])?;
            }
        }
        tx.commit()?;
        debug!("called_by recomputed");
        Ok(())
    }

    /* ---------------------------- queries ---------------------------- */

    pub fn find_by_raises(&self, exception_type: &str) -> Result<Vec<IndexEntry>, IndexError> {
        self.query_like("raises", exception_type)
    }

    pub fn find_by_error_string(&self, needle: &str) -> Result<Vec<IndexEntry>, IndexError> {
        self.query_like("error_strings", needle)
    }

    pub fn find_by_mutates(&self, name: &str) -> Result<Vec<IndexEntry>, IndexError> {
        self.query_like("mutates", name)
    }

    /// Exact plain-name or qualified-name match.
    pub fn find_by_symbol(&self, name: &str) -> Result<Vec<IndexEntry>, IndexError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM symbols \
             WHERE symbol_name = ?1 OR symbol_name LIKE '%.' || ?1 \
             ORDER BY file_path, line_start"
        );
        self.run_query(&sql, params![name])
    }

    /// Path-substring match.
    pub fn find_by_file(&self, path_fragment: &str) -> Result<Vec<IndexEntry>, IndexError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM symbols \
             WHERE file_path LIKE '%' || ?1 || '%' \
             ORDER BY file_path, line_start"
        );
        self.run_query(&sql, params![path_fragment])
    }

    pub fn find_by_file_and_symbol(
        &self,
        path_fragment: &str,
        name: &str,
    ) -> Result<Vec<IndexEntry>, IndexError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM symbols \
             WHERE file_path LIKE '%' || ?1 || '%' \
               AND (symbol_name = ?2 OR symbol_name LIKE '%.' || ?2) \
             ORDER BY file_path, line_start"
        );
        self.run_query(&sql, params![path_fragment, name])
    }

    /// Rows whose `calls` list contains `name`.
    pub fn callers(&self, name: &str) -> Result<Vec<IndexEntry>, IndexError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM symbols \
             WHERE calls LIKE '%\"' || ?1 || '\"%' \
             ORDER BY file_path, line_start"
        );
        self.run_query(&sql, params![name])
    }

    /// Entries for every symbol that `name` calls.
    pub fn callees(&self, name: &str) -> Result<Vec<IndexEntry>, IndexError> {
        let mut out = Vec::new();
        for entry in self.find_by_symbol(name)? {
            for callee in &entry.calls {
                out.extend(self.find_by_symbol(callee)?);
            }
        }
        out.sort_by(|a, b| (&a.file_path, a.line_start).cmp(&(&b.file_path, b.line_start)));
        out.dedup_by(|a, b| a.file_path == b.file_path && a.symbol_name == b.symbol_name);
        Ok(out)
    }

    /// Total row count.
    pub fn len(&self) -> Result<usize, IndexError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    /// All rows, deterministically ordered. Used by invariant checks.
    pub fn all_entries(&self) -> Result<Vec<IndexEntry>, IndexError> {
        let sql =
            format!("SELECT {SELECT_COLUMNS} FROM symbols ORDER BY file_path, line_start");
        self.run_query(&sql, [])
    }

    fn query_like(&self, column: &str, needle: &str) -> Result<Vec<IndexEntry>, IndexError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM symbols \
             WHERE {column} LIKE '%' || ?1 || '%' \
             ORDER BY file_path, line_start"
        );
        self.run_query(&sql, params![needle])
    }

    fn run_query<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<IndexEntry>, IndexError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_entry)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<IndexEntry> {
    let list = |idx: usize| -> rusqlite::Result<Vec<String>> {
        let raw: String = row.get(idx)?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    };
    Ok(IndexEntry {
        file_path: row.get(0)?,
        symbol_name: row.get(1)?,
        kind: row.get(2)?,
        line_start: row.get(3)?,
        line_end: row.get(4)?,
        signature: row.get(5)?,
        docstring: row.get(6)?,
        calls: list(7)?,
        called_by: list(8)?,
        raises: list(9)?,
        mutates: list(10)?,
        error_strings: list(11)?,
        source_hash: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{parse_file, LanguageKind};

    fn fixture() -> Vec<ParsedFile> {
        let deps = parse_file(
            "api/deps.py",
            r#"
_db_instances = {}

def get_db(name):
    """Return a cached connection."""
    try:
        pass
    except Exception:
        logger.error("readonly database")
        raise sqlite3.OperationalError("readonly database")
    _db_instances[name] = 1
    return name
"#,
            LanguageKind::Python,
        )
        .unwrap();
        let notes = parse_file(
            "api/routers/notes.py",
            r#"
def get_notes_service():
    return get_db("notes")
"#,
            LanguageKind::Python,
        )
        .unwrap();
        vec![deps, notes]
    }

    #[test]
    fn build_and_point_queries() {
        let mut idx = CodeIndex::open_in_memory().unwrap();
        idx.build(&fixture(), "hash1").unwrap();

        let by_raises = idx.find_by_raises("sqlite3.OperationalError").unwrap();
        assert_eq!(by_raises.len(), 1);
        assert_eq!(by_raises[0].symbol_name, "get_db");

        let by_err = idx.find_by_error_string("readonly").unwrap();
        assert_eq!(by_err[0].file_path, "api/deps.py");

        let by_mutates = idx.find_by_mutates("_db_instances").unwrap();
        assert_eq!(by_mutates.len(), 1);

        let by_file = idx.find_by_file("routers").unwrap();
        assert_eq!(by_file[0].symbol_name, "get_notes_service");

        let both = idx
            .find_by_file_and_symbol("api/routers/notes.py", "get_notes_service")
            .unwrap();
        assert_eq!(both.len(), 1);
    }

    #[test]
    fn called_by_is_inversion_of_calls() {
        let mut idx = CodeIndex::open_in_memory().unwrap();
        idx.build(&fixture(), "hash1").unwrap();

        let get_db = &idx.find_by_symbol("get_db").unwrap()[0];
        assert!(get_db.called_by.contains(&"get_notes_service".to_string()));

        // full-table inversion invariant
        let all = idx.all_entries().unwrap();
        for entry in &all {
            for caller in &entry.called_by {
                let caller_rows = idx.find_by_symbol(caller).unwrap();
                assert!(
                    caller_rows
                        .iter()
                        .any(|c| c.calls.iter().any(|n| n == entry.short_name())),
                    "{caller} listed as caller of {} but has no matching call",
                    entry.symbol_name
                );
            }
            for callee in &entry.calls {
                for target in idx.find_by_symbol(callee).unwrap() {
                    assert!(
                        target.called_by.contains(&entry.symbol_name),
                        "{} calls {callee} but is missing from its called_by",
                        entry.symbol_name
                    );
                }
            }
        }
    }

    #[test]
    fn rebuild_wipes_stale_rows() {
        let mut idx = CodeIndex::open_in_memory().unwrap();
        idx.build(&fixture(), "hash1").unwrap();
        let before = idx.len().unwrap();

        // same file set again: no duplicates
        idx.build(&fixture(), "hash2").unwrap();
        assert_eq!(idx.len().unwrap(), before);

        let entry = &idx.find_by_symbol("get_db").unwrap()[0];
        assert_eq!(entry.source_hash, "hash2");
    }

    #[test]
    fn callers_query_matches_calls_lists() {
        let mut idx = CodeIndex::open_in_memory().unwrap();
        idx.build(&fixture(), "hash1").unwrap();
        let callers = idx.callers("get_db").unwrap();
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].symbol_name, "get_notes_service");
    }

    #[test]
    fn docstring_truncated_to_cap() {
        let long_doc = format!("\"\"\"{}\"\"\"", "d".repeat(400));
        let src = format!("def f():\n    {long_doc}\n    return 1\n");
        let f = parse_file("x.py", &src, LanguageKind::Python).unwrap();
        let mut idx = CodeIndex::open_in_memory().unwrap();
        idx.build(&[f], "h").unwrap();
        let entry = &idx.find_by_symbol("f").unwrap()[0];
        assert_eq!(entry.docstring.as_ref().unwrap().len(), DOCSTRING_MAX_CHARS);
    }

    #[test]
    fn ordering_is_deterministic() {
        let mut idx = CodeIndex::open_in_memory().unwrap();
        idx.build(&fixture(), "hash1").unwrap();
        let a = idx.all_entries().unwrap();
        let b = idx.all_entries().unwrap();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| (&w[0].file_path, w[0].line_start)
            <= (&w[1].file_path, w[1].line_start)));
    }
}
