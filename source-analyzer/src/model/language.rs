//! Supported languages and extension-based detection.

use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageKind {
    Python,
    Rust,
    TypeScript,
    JavaScript,
}

impl Display for LanguageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LanguageKind::Python => "python",
            LanguageKind::Rust => "rust",
            LanguageKind::TypeScript => "typescript",
            LanguageKind::JavaScript => "javascript",
        };
        f.write_str(s)
    }
}

/// Detect the language from a path's extension. Unknown extensions return
/// `None` and the file is carried through the pipeline unparsed.
pub fn detect_language(path: &Path) -> Option<LanguageKind> {
    match path.extension().and_then(|e| e.to_str())? {
        "py" | "pyi" => Some(LanguageKind::Python),
        "rs" => Some(LanguageKind::Rust),
        "ts" | "tsx" => Some(LanguageKind::TypeScript),
        "js" | "jsx" | "mjs" | "cjs" => Some(LanguageKind::JavaScript),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert_eq!(
            detect_language(Path::new("src/app.py")),
            Some(LanguageKind::Python)
        );
        assert_eq!(
            detect_language(Path::new("lib.rs")),
            Some(LanguageKind::Rust)
        );
        assert_eq!(
            detect_language(Path::new("web/index.tsx")),
            Some(LanguageKind::TypeScript)
        );
        assert_eq!(detect_language(Path::new("README.md")), None);
        assert_eq!(detect_language(Path::new("Makefile")), None);
    }
}
