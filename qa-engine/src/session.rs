//! CGRAG session state.
//!
//! A session accumulates context across passes (and across requests that
//! reuse a session ID) and remembers which chunks it has already seen so
//! nothing is appended twice.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::retrievers::ContextBlock;

#[derive(Debug, Clone, Default)]
pub struct CgragSession {
    pub id: String,
    /// IDs of chunks/snippets already in context.
    pub seen: HashSet<String>,
    pub context: Vec<ContextBlock>,
    pub resolved_gaps: Vec<String>,
    pub unresolved_gaps: Vec<String>,
    pub passes: usize,
}

impl CgragSession {
    pub fn new(id: String) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Append a block unless its key was already seen. Returns whether it
    /// was added.
    pub fn push_context(&mut self, key: String, block: ContextBlock) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.context.push(block);
        true
    }
}

/// In-memory session table keyed by session ID.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, CgragSession>,
}

impl SessionStore {
    /// Fetch an existing session or mint a fresh one. The bool reports
    /// whether cached context was found.
    pub fn get_or_create(&mut self, id: Option<&str>) -> (&mut CgragSession, bool) {
        let key = match id {
            Some(existing) if self.sessions.contains_key(existing) => existing.to_string(),
            Some(supplied) => {
                self.sessions
                    .insert(supplied.to_string(), CgragSession::new(supplied.to_string()));
                supplied.to_string()
            }
            None => {
                let fresh = Uuid::new_v4().to_string();
                self.sessions
                    .insert(fresh.clone(), CgragSession::new(fresh.clone()));
                fresh
            }
        };
        let had_context = self
            .sessions
            .get(&key)
            .map(|s| !s.context.is_empty())
            .unwrap_or(false);
        let session = self.sessions.entry(key.clone()).or_default();
        if session.id.is_empty() {
            session.id = key;
        }
        (session, had_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> ContextBlock {
        ContextBlock {
            origin: "test".into(),
            source_path: None,
            line_start: None,
            line_end: None,
            text: "x".into(),
        }
    }

    #[test]
    fn dedupes_context_by_key() {
        let mut s = CgragSession::new("s1".into());
        assert!(s.push_context("k1".into(), block()));
        assert!(!s.push_context("k1".into(), block()));
        assert_eq!(s.context.len(), 1);
    }

    #[test]
    fn store_reuses_sessions() {
        let mut store = SessionStore::default();
        let id = {
            let (s, cached) = store.get_or_create(None);
            assert!(!cached);
            s.push_context("k".into(), block());
            s.id.clone()
        };
        let (s2, cached) = store.get_or_create(Some(&id));
        assert!(cached);
        assert_eq!(s2.context.len(), 1);
    }

    #[test]
    fn unknown_supplied_id_starts_empty() {
        let mut store = SessionStore::default();
        let (s, cached) = store.get_or_create(Some("external-123"));
        assert!(!cached);
        assert_eq!(s.id, "external-123");
    }
}
