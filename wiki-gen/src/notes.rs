//! Correction notes supplied by an external collaborator.
//!
//! Free text keyed to a file or directory. When present for an entity
//! being generated they are appended to the prompt as authoritative, and
//! they participate in the entity's signature so an edited note triggers
//! regeneration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionNotes {
    #[serde(default)]
    pub by_file: HashMap<String, String>,
    #[serde(default)]
    pub by_dir: HashMap<String, String>,
}

impl CorrectionNotes {
    pub fn for_file(&self, path: &str) -> Option<&str> {
        self.by_file.get(path).map(String::as_str)
    }

    pub fn for_dir(&self, path: &str) -> Option<&str> {
        self.by_dir.get(path).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty() && self.by_dir.is_empty()
    }
}
