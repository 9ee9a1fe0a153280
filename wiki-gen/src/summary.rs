//! File and directory summaries: the YAML front-matter of generated pages.
//!
//! Parsing is defensive throughout: a missing or non-mapping front-matter
//! block yields `None`, an invalid layer coerces to `utility`, and
//! malformed issues are skipped rather than failing the page.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Architectural layer of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Api,
    Domain,
    Infrastructure,
    #[default]
    Utility,
    Config,
    Test,
}

impl Layer {
    /// Coerce an arbitrary string; anything unknown becomes `Utility`.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "api" => Layer::Api,
            "domain" => Layer::Domain,
            "infrastructure" => Layer::Infrastructure,
            "utility" => Layer::Utility,
            "config" => Layer::Config,
            "test" => Layer::Test,
            _ => Layer::Utility,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Api => "api",
            Layer::Domain => "domain",
            Layer::Infrastructure => "infrastructure",
            Layer::Utility => "utility",
            Layer::Config => "config",
            Layer::Test => "test",
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Security,
    Reliability,
    Maintainability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Problem,
    Suggestion,
}

/// One issue surfaced by the file-summary pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub severity: IssueSeverity,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Optional `[start, end]` line range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<(u32, u32)>,
}

/// Front-matter of a generated file page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileSummary {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub layer: Layer,
    #[serde(default)]
    pub key_abstractions: Vec<String>,
    #[serde(default)]
    pub internal_deps: Vec<String>,
    #[serde(default)]
    pub external_deps: Vec<String>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// Front-matter of a generated directory page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DirectorySummary {
    #[serde(default)]
    pub directory_path: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub role_in_system: String,
}

/// Extract the YAML front-matter block of a page, if present.
fn front_matter_block(markdown: &str) -> Option<&str> {
    let rest = markdown.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    Some(&rest[..end])
}

/// Parse a file page's front-matter. Non-mapping input yields `None`;
/// invalid layers coerce to `utility`.
pub fn parse_file_summary(markdown: &str, file_path: &str) -> Option<FileSummary> {
    let block = front_matter_block(markdown)?;
    let value: serde_yml::Value = serde_yml::from_str(block).ok()?;
    let root = value.as_mapping()?;
    let summary = root.get("file_summary")?;
    let map = summary.as_mapping()?;

    let get_str = |key: &str| -> String {
        map.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string()
    };
    let get_list = |key: &str| -> Vec<String> {
        map.get(key)
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    let issues = map
        .get("issues")
        .and_then(|v| v.as_sequence())
        .map(|seq| seq.iter().filter_map(parse_issue).collect())
        .unwrap_or_default();

    Some(FileSummary {
        file_path: file_path.to_string(),
        purpose: get_str("purpose"),
        layer: Layer::coerce(&get_str("layer")),
        key_abstractions: get_list("key_abstractions"),
        internal_deps: get_list("internal_deps"),
        external_deps: get_list("external_deps"),
        issues,
    })
}

fn parse_issue(value: &serde_yml::Value) -> Option<Issue> {
    let map = value.as_mapping()?;
    let get = |key: &str| map.get(key).and_then(|v| v.as_str()).unwrap_or("");

    let category = match get("category") {
        "security" => IssueCategory::Security,
        "reliability" => IssueCategory::Reliability,
        "maintainability" => IssueCategory::Maintainability,
        _ => return None,
    };
    let severity = match get("severity") {
        "problem" => IssueSeverity::Problem,
        "suggestion" => IssueSeverity::Suggestion,
        _ => return None,
    };
    let lines = map.get("lines").and_then(|v| v.as_sequence()).and_then(|s| {
        let a = s.first()?.as_u64()? as u32;
        let b = s.get(1)?.as_u64()? as u32;
        Some((a, b))
    });

    Some(Issue {
        category,
        severity,
        title: get("title").to_string(),
        description: get("description").to_string(),
        lines,
    })
}

/// Parse a directory page's front-matter.
pub fn parse_directory_summary(markdown: &str, dir_path: &str) -> Option<DirectorySummary> {
    let block = front_matter_block(markdown)?;
    let value: serde_yml::Value = serde_yml::from_str(block).ok()?;
    let root = value.as_mapping()?;
    let summary = root.get("directory_summary")?;
    let map = summary.as_mapping()?;

    let get_str = |key: &str| -> String {
        map.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string()
    };
    let contains = map
        .get("contains")
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Some(DirectorySummary {
        directory_path: dir_path.to_string(),
        purpose: get_str("purpose"),
        contains,
        role_in_system: get_str("role_in_system"),
    })
}

/// Render front-matter for a file page.
pub fn render_file_front_matter(summary: &FileSummary) -> String {
    #[derive(Serialize)]
    struct Wrapper<'a> {
        file_summary: &'a FileSummary,
    }
    let yaml = serde_yml::to_string(&Wrapper {
        file_summary: summary,
    })
    .unwrap_or_default();
    format!("---\n{yaml}---\n")
}

/// Render front-matter for a directory page.
pub fn render_directory_front_matter(summary: &DirectorySummary) -> String {
    #[derive(Serialize)]
    struct Wrapper<'a> {
        directory_summary: &'a DirectorySummary,
    }
    let yaml = serde_yml::to_string(&Wrapper {
        directory_summary: summary,
    })
    .unwrap_or_default();
    format!("---\n{yaml}---\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"---
file_summary:
  purpose: Database dependency helpers.
  layer: infrastructure
  key_abstractions: [get_db, close_db]
  internal_deps: [api/config.py]
  external_deps: [sqlite3]
  issues:
    - category: reliability
      severity: problem
      title: Unbounded cache
      description: The instance cache never evicts.
      lines: [12, 30]
    - category: bogus
      severity: problem
      title: dropped
---

# api/deps.py

## Purpose

Stuff.
"#;

    #[test]
    fn parses_complete_front_matter() {
        let s = parse_file_summary(PAGE, "api/deps.py").unwrap();
        assert_eq!(s.purpose, "Database dependency helpers.");
        assert_eq!(s.layer, Layer::Infrastructure);
        assert_eq!(s.key_abstractions, vec!["get_db", "close_db"]);
        assert_eq!(s.issues.len(), 1, "malformed issue must be skipped");
        assert_eq!(s.issues[0].lines, Some((12, 30)));
    }

    #[test]
    fn invalid_layer_coerces_to_utility() {
        let page = "---\nfile_summary:\n  purpose: X.\n  layer: quantum\n---\nbody\n";
        let s = parse_file_summary(page, "a.py").unwrap();
        assert_eq!(s.layer, Layer::Utility);
    }

    #[test]
    fn non_mapping_front_matter_is_dropped() {
        assert!(parse_file_summary("---\n- just\n- a list\n---\nbody\n", "a.py").is_none());
        assert!(parse_file_summary("no front matter at all", "a.py").is_none());
        assert!(parse_file_summary("---\nfile_summary: plain string\n---\n", "a.py").is_none());
    }

    #[test]
    fn directory_summary_round_trip() {
        let d = DirectorySummary {
            directory_path: "api".into(),
            purpose: "HTTP surface.".into(),
            contains: vec!["deps.py".into(), "routers".into()],
            role_in_system: "Serves requests.".into(),
        };
        let page = format!("{}\n# api\n", render_directory_front_matter(&d));
        let parsed = parse_directory_summary(&page, "api").unwrap();
        assert_eq!(parsed.purpose, d.purpose);
        assert_eq!(parsed.contains, d.contains);
        assert_eq!(parsed.role_in_system, d.role_in_system);
    }

    #[test]
    fn file_summary_round_trip() {
        let s = FileSummary {
            file_path: "api/deps.py".into(),
            purpose: "Helpers.".into(),
            layer: Layer::Api,
            key_abstractions: vec!["get_db".into()],
            internal_deps: vec![],
            external_deps: vec!["sqlite3".into()],
            issues: vec![],
        };
        let page = format!("{}\nbody\n", render_file_front_matter(&s));
        let parsed = parse_file_summary(&page, "api/deps.py").unwrap();
        assert_eq!(parsed.purpose, s.purpose);
        assert_eq!(parsed.layer, Layer::Api);
    }
}
