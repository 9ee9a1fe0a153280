//! Content-hash signatures and their store.
//!
//! File signature = SHA-256 of the source bytes plus any correction notes
//! targeting the file. Directory signature = SHA-256 over the sorted
//! `name:content_hash` pairs of its direct files plus the sorted
//! `path:purpose` pairs of its immediate subdirectories, so a child role
//! change invalidates every ancestor.

use std::path::Path;

use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use crate::errors::GenError;

/// Signature of one file's generation input.
pub fn file_signature(content: &str, correction_notes: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    if let Some(notes) = correction_notes {
        hasher.update(b"\0notes\0");
        hasher.update(notes.as_bytes());
    }
    hex(&hasher.finalize())
}

/// Signature of one directory's generation input.
pub fn dir_signature(
    files: &[(String, String)],
    child_dirs: &[(String, String)],
) -> String {
    let mut file_parts: Vec<String> = files
        .iter()
        .map(|(name, hash)| format!("{name}:{hash}"))
        .collect();
    file_parts.sort();

    let mut dir_parts: Vec<String> = child_dirs
        .iter()
        .map(|(path, purpose)| format!("{path}:{purpose}"))
        .collect();
    dir_parts.sort();

    let mut hasher = Sha256::new();
    hasher.update(file_parts.join("\n").as_bytes());
    hasher.update(b"\0||\0");
    hasher.update(dir_parts.join("\n").as_bytes());
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Entity kind a signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigKind {
    File,
    Dir,
}

impl SigKind {
    fn as_str(self) -> &'static str {
        match self {
            SigKind::File => "file",
            SigKind::Dir => "dir",
        }
    }
}

/// SQLite-backed signature store (`signatures.db`). Corruption here is
/// fatal to the run; everything else about signatures is advisory.
pub struct SignatureStore {
    conn: Connection,
}

impl SignatureStore {
    pub fn open(path: &Path) -> Result<Self, GenError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS signatures (
                 kind TEXT NOT NULL,
                 path TEXT NOT NULL,
                 digest TEXT NOT NULL,
                 PRIMARY KEY (kind, path)
             );",
        )
        .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, GenError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS signatures (
                 kind TEXT NOT NULL,
                 path TEXT NOT NULL,
                 digest TEXT NOT NULL,
                 PRIMARY KEY (kind, path)
             );",
        )
        .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn get(&self, kind: SigKind, path: &str) -> Result<Option<String>, GenError> {
        self.conn
            .query_row(
                "SELECT digest FROM signatures WHERE kind = ?1 AND path = ?2",
                params![kind.as_str(), path],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(GenError::SignatureStore(other.to_string())),
            })
    }

    pub fn put(&mut self, kind: SigKind, path: &str, digest: &str) -> Result<(), GenError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO signatures (kind, path, digest) VALUES (?1, ?2, ?3)",
                params![kind.as_str(), path, digest],
            )
            .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        Ok(())
    }

    /// Transactionally replace the whole table with this run's signatures.
    pub fn replace_all(
        &mut self,
        entries: &[(SigKind, String, String)],
    ) -> Result<(), GenError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        tx.execute("DELETE FROM signatures", [])
            .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO signatures (kind, path, digest) VALUES (?1, ?2, ?3)")
                .map_err(|e| GenError::SignatureStore(e.to_string()))?;
            for (kind, path, digest) in entries {
                stmt.execute(params![kind.as_str(), path, digest])
                    .map_err(|e| GenError::SignatureStore(e.to_string()))?;
            }
        }
        tx.commit()
            .map_err(|e| GenError::SignatureStore(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_signature_changes_with_content_and_notes() {
        let a = file_signature("x = 1", None);
        let b = file_signature("x = 2", None);
        let c = file_signature("x = 1", Some("treat x as constant"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, file_signature("x = 1", None));
    }

    #[test]
    fn dir_signature_is_order_insensitive() {
        let files1 = vec![("a.py".into(), "h1".into()), ("b.py".into(), "h2".into())];
        let files2 = vec![("b.py".into(), "h2".into()), ("a.py".into(), "h1".into())];
        let dirs: Vec<(String, String)> = vec![("api/sub".into(), "Helpers.".into())];
        assert_eq!(
            dir_signature(&files1, &dirs),
            dir_signature(&files2, &dirs)
        );
    }

    #[test]
    fn child_purpose_change_invalidates_parent() {
        let files: Vec<(String, String)> = vec![("a.py".into(), "h1".into())];
        let before = dir_signature(&files, &[("api/sub".into(), "Old purpose.".into())]);
        let after = dir_signature(&files, &[("api/sub".into(), "New purpose.".into())]);
        assert_ne!(before, after);
    }

    #[test]
    fn store_round_trip_and_replace() {
        let mut store = SignatureStore::open_in_memory().unwrap();
        store.put(SigKind::File, "a.py", "h1").unwrap();
        assert_eq!(store.get(SigKind::File, "a.py").unwrap().as_deref(), Some("h1"));
        assert_eq!(store.get(SigKind::Dir, "a.py").unwrap(), None);

        store
            .replace_all(&[(SigKind::Dir, "api".into(), "d1".into())])
            .unwrap();
        assert_eq!(store.get(SigKind::File, "a.py").unwrap(), None);
        assert_eq!(store.get(SigKind::Dir, "api").unwrap().as_deref(), Some("d1"));
    }
}
