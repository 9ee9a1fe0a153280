//! Prompt builders for page generation.
//!
//! Keep system messages short; the page format contract lives in the user
//! prompt next to the material it applies to. All builders respect a char
//! budget and truncate source content first when over it.

use source_analyzer::ParsedFile;

use crate::callsite::CallSiteSynopsis;
use crate::summary::{DirectorySummary, FileSummary};

/// System message for file pages.
pub const FILE_PAGE_SYSTEM: &str = "You are a precise technical writer documenting a codebase. \
Output exactly the requested markdown page, nothing else. Never invent APIs that are not in \
the provided source.";

/// System message for directory summaries.
pub const DIR_SUMMARY_SYSTEM: &str = "You are a precise technical writer summarizing a source \
directory from its children's summaries. Output exactly the requested YAML, nothing else.";

const FILE_PAGE_FORMAT: &str = r#"Produce a markdown wiki page with this exact shape:

---
file_summary:
  purpose: <one sentence>
  layer: <api|domain|infrastructure|utility|config|test>
  key_abstractions: [<name>, ...]
  internal_deps: [<repo-relative path>, ...]
  external_deps: [<library>, ...]
  issues:
    - category: <security|reliability|maintainability>
      severity: <problem|suggestion>
      title: <short>
      description: <one or two sentences>
      lines: [<start>, <end>]
---

# <file path>

## 1. Purpose

## 2. Synopsis

## 3. Public API

## 4. Internal Details

## 5. Dependencies

## 6. Usage Examples

Sections appear in that order. Omit issues entirely when there are none."#;

/// Assemble the prompt for one file page.
pub fn build_file_prompt(
    file: &ParsedFile,
    call_site: Option<&CallSiteSynopsis>,
    correction_notes: Option<&str>,
    max_chars: usize,
) -> String {
    let mut out = String::new();
    out.push_str(FILE_PAGE_FORMAT);
    out.push_str("\n\nFile: ");
    out.push_str(&file.path);
    out.push('\n');

    if !file.symbols.is_empty() {
        out.push_str("\nParsed symbols:\n");
        for s in &file.symbols {
            out.push_str(&format!(
                "- {} {} (lines {}-{})\n",
                s.kind.as_str(),
                s.qualified_name(),
                s.line_start,
                s.line_end
            ));
        }
    }
    if !file.imports.is_empty() {
        out.push_str("\nImports:\n");
        for i in &file.imports {
            match &i.name {
                Some(n) => out.push_str(&format!("- from {} import {n}\n", i.module)),
                None => out.push_str(&format!("- import {}\n", i.module)),
            }
        }
    }

    match (&file.synopsis, call_site) {
        (Some(own), _) => {
            out.push_str("\nSynopsis from the file's own documentation (use verbatim in section 2):\n```\n");
            out.push_str(own);
            out.push_str("\n```\n");
        }
        (None, Some(cs)) => {
            out.push_str(&format!(
                "\nReal call site from {}::{} (lines {}-{}), use it as the synopsis in section 2:\n```\n{}```\n",
                cs.caller_file, cs.caller_symbol, cs.line_start, cs.line_end, cs.snippet
            ));
            if !cs.other_callers.is_empty() {
                out.push_str("Other callers:\n");
                for c in &cs.other_callers {
                    out.push_str(&format!("- {c}\n"));
                }
            }
        }
        (None, None) => {
            out.push_str(
                "\nNo synopsis or call site is available. Write a short illustrative example in \
section 2 and mark it explicitly as generated.\n",
            );
        }
    }

    if let Some(notes) = correction_notes {
        out.push_str("\nCorrection notes from a maintainer. Treat them as authoritative, they \
override anything inferred from the source:\n");
        out.push_str(notes);
        out.push('\n');
    }

    out.push_str("\nSource:\n```\n");
    let budget = max_chars.saturating_sub(out.len() + 8);
    out.push_str(truncate_chars(&file.content, budget));
    out.push_str("\n```\n");
    out
}

/// Prompt for one directory's YAML summary.
pub fn build_dir_prompt(
    dir_path: &str,
    file_summaries: &[&FileSummary],
    child_summaries: &[&DirectorySummary],
    correction_notes: Option<&str>,
    max_chars: usize,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Summarize the directory `{dir_path}` from its children. Output exactly:\n\n\
directory_summary:\n  purpose: <one sentence>\n  contains: [<child name>, ...]\n  \
role_in_system: <one sentence>\n\nDirect files:\n"
    ));
    for f in file_summaries {
        out.push_str(&format!(
            "- {} [{}]: {}\n",
            f.file_path, f.layer, f.purpose
        ));
    }
    if !child_summaries.is_empty() {
        out.push_str("\nSubdirectories:\n");
        for d in child_summaries {
            out.push_str(&format!("- {}: {}\n", d.directory_path, d.purpose));
        }
    }
    if let Some(notes) = correction_notes {
        out.push_str("\nCorrection notes from a maintainer, treat as authoritative:\n");
        out.push_str(notes);
        out.push('\n');
    }
    truncate_chars(&out, max_chars).to_string()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{parse_file, LanguageKind};

    #[test]
    fn file_prompt_carries_symbols_and_source() {
        let f = parse_file(
            "api/deps.py",
            "def get_db(name):\n    return name\n",
            LanguageKind::Python,
        )
        .unwrap();
        let p = build_file_prompt(&f, None, None, 20_000);
        assert!(p.contains("File: api/deps.py"));
        assert!(p.contains("- function get_db"));
        assert!(p.contains("def get_db(name):"));
        assert!(p.contains("mark it explicitly as generated"));
    }

    #[test]
    fn correction_notes_are_flagged_authoritative() {
        let f = parse_file("a.py", "x = 1\n", LanguageKind::Python).unwrap();
        let p = build_file_prompt(&f, None, Some("x is deprecated"), 20_000);
        assert!(p.contains("authoritative"));
        assert!(p.contains("x is deprecated"));
    }

    #[test]
    fn prompt_respects_char_budget() {
        let big = format!("x = 1\n{}", "# filler\n".repeat(10_000));
        let f = parse_file("a.py", &big, LanguageKind::Python).unwrap();
        let p = build_file_prompt(&f, None, None, 5_000);
        assert!(p.len() <= 5_100, "prompt length {}", p.len());
    }
}
