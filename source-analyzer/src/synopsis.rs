//! Usage-synopsis extraction from a file's own documentation.
//!
//! Conventions, per language:
//! - Python: module docstring with an `Example:`/`Examples:`/`Usage:`
//!   heading; the indented or fenced block after it.
//! - Rust: `//!` module docs; first fenced code block.
//! - TypeScript/JavaScript: leading `/** ... */` block with an `@example`
//!   tag; the lines after the tag.
//!
//! A file without a recognized convention simply has no synopsis.

use crate::model::language::LanguageKind;

pub fn extract_synopsis(content: &str, language: LanguageKind) -> Option<String> {
    match language {
        LanguageKind::Python => python_synopsis(content),
        LanguageKind::Rust => rust_synopsis(content),
        LanguageKind::TypeScript | LanguageKind::JavaScript => ecma_synopsis(content),
    }
}

fn python_synopsis(content: &str) -> Option<String> {
    let doc = python_module_docstring(content)?;
    let mut lines = doc.lines().peekable();
    while let Some(line) = lines.next() {
        let t = line.trim();
        if !(t.eq_ignore_ascii_case("example:")
            || t.eq_ignore_ascii_case("examples:")
            || t.eq_ignore_ascii_case("usage:"))
        {
            continue;
        }
        // fenced block directly after the heading
        let rest: Vec<&str> = lines.collect();
        if let Some(block) = fenced_block(&rest) {
            return Some(block);
        }
        // otherwise the indented run after the heading
        let mut out = Vec::new();
        for l in &rest {
            if l.trim().is_empty() {
                if out.is_empty() {
                    continue;
                }
                break;
            }
            if l.starts_with("    ") || l.starts_with('\t') {
                out.push(l.trim_start().to_string());
            } else if out.is_empty() {
                // unindented example lines directly after the heading
                out.push(l.trim().to_string());
            } else {
                break;
            }
        }
        if !out.is_empty() {
            return Some(out.join("\n"));
        }
        return None;
    }
    None
}

fn python_module_docstring(content: &str) -> Option<String> {
    let trimmed = content.trim_start();
    for quote in ["\"\"\"", "'''"] {
        if let Some(rest) = trimmed.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

fn rust_synopsis(content: &str) -> Option<String> {
    let doc_lines: Vec<&str> = content
        .lines()
        .take_while(|l| {
            let t = l.trim_start();
            t.starts_with("//!") || t.is_empty()
        })
        .filter_map(|l| l.trim_start().strip_prefix("//!"))
        .map(|l| l.strip_prefix(' ').unwrap_or(l))
        .collect();
    fenced_block(&doc_lines)
}

fn ecma_synopsis(content: &str) -> Option<String> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("/**") {
        return None;
    }
    let end = trimmed.find("*/")?;
    let block = &trimmed[..end];
    let mut collecting = false;
    let mut out = Vec::new();
    for line in block.lines() {
        let t = line
            .trim()
            .trim_start_matches("/**")
            .trim_start_matches('*')
            .trim();
        if t.starts_with("@example") {
            collecting = true;
            let rest = t.trim_start_matches("@example").trim();
            if !rest.is_empty() {
                out.push(rest.to_string());
            }
            continue;
        }
        if collecting {
            if t.starts_with('@') {
                break;
            }
            if !t.is_empty() {
                out.push(t.to_string());
            }
        }
    }
    (!out.is_empty()).then(|| out.join("\n"))
}

/// First ``` fenced block in a slice of lines, fence language tag ignored.
fn fenced_block(lines: &[&str]) -> Option<String> {
    let mut in_block = false;
    let mut out = Vec::new();
    for line in lines {
        let t = line.trim_end();
        if t.trim_start().starts_with("```") {
            if in_block {
                return Some(out.join("\n"));
            }
            in_block = true;
            continue;
        }
        if in_block {
            out.push(t.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_example_heading() {
        let src = r#""""Database helpers.

Example:
    db = get_db("notes")
    db.execute("select 1")
"""
import sqlite3
"#;
        let syn = extract_synopsis(src, LanguageKind::Python).unwrap();
        assert!(syn.contains("get_db(\"notes\")"));
    }

    #[test]
    fn python_without_example_has_none() {
        let src = "\"\"\"Just a summary.\"\"\"\nx = 1\n";
        assert!(extract_synopsis(src, LanguageKind::Python).is_none());
    }

    #[test]
    fn rust_fenced_block() {
        let src = "//! Helpers.\n//!\n//! ```\n//! let x = open(\"db\");\n//! ```\nfn open() {}\n";
        let syn = extract_synopsis(src, LanguageKind::Rust).unwrap();
        assert_eq!(syn, "let x = open(\"db\");");
    }

    #[test]
    fn ecma_example_tag() {
        let src = "/**\n * Session tools.\n * @example\n * const s = new SessionStore();\n */\nexport class SessionStore {}\n";
        let syn = extract_synopsis(src, LanguageKind::TypeScript).unwrap();
        assert!(syn.contains("new SessionStore()"));
    }
}
