//! Page assembly for directory, root, stub, and synthesis pages.
//!
//! File pages come out of the LLM whole; everything else is rendered here
//! from summaries and graph data so the page structure never depends on
//! model formatting.

use std::collections::BTreeMap;

use code_graph::{to_mermaid, CodeGraph};

use crate::summary::{
    render_directory_front_matter, render_file_front_matter, DirectorySummary, FileSummary, Layer,
};

/// Breadcrumb like `[root](../../index.md) / api / routers`, truncated with
/// an ellipsis when the directory sits deeper than `max_depth`.
pub fn breadcrumb(dir_path: &str, max_depth: usize) -> String {
    if dir_path.is_empty() {
        return "root".to_string();
    }
    let parts: Vec<&str> = dir_path.split('/').collect();
    let mut shown: Vec<&str> = vec!["root"];
    if parts.len() > max_depth {
        shown.push("...");
        shown.extend(&parts[parts.len() - max_depth..]);
    } else {
        shown.extend(&parts);
    }
    shown.join(" / ")
}

/// Assemble a directory page: front-matter, breadcrumb, purpose, child
/// tables with links.
pub fn directory_page(
    summary: &DirectorySummary,
    file_summaries: &[&FileSummary],
    child_summaries: &[&DirectorySummary],
    max_breadcrumb_depth: usize,
) -> String {
    let title = if summary.directory_path.is_empty() {
        "Repository root".to_string()
    } else {
        summary.directory_path.clone()
    };

    let mut out = render_directory_front_matter(summary);
    out.push_str(&format!("\n# {title}\n\n"));
    out.push_str(&breadcrumb(&summary.directory_path, max_breadcrumb_depth));
    out.push_str("\n\n## Purpose\n\n");
    out.push_str(&summary.purpose);
    out.push('\n');

    if !summary.role_in_system.is_empty() {
        out.push_str("\n## Role in the system\n\n");
        out.push_str(&summary.role_in_system);
        out.push('\n');
    }

    if !child_summaries.is_empty() {
        out.push_str("\n## Subdirectories\n\n| Directory | Purpose |\n|---|---|\n");
        for d in child_summaries {
            let name = d
                .directory_path
                .rsplit('/')
                .next()
                .unwrap_or(&d.directory_path);
            out.push_str(&format!(
                "| [{name}]({name}/index.md) | {} |\n",
                d.purpose.replace('|', "\\|")
            ));
        }
    }

    if !file_summaries.is_empty() {
        out.push_str("\n## Files\n\n| File | Layer | Purpose |\n|---|---|---|\n");
        for f in file_summaries {
            let name = f.file_path.rsplit('/').next().unwrap_or(&f.file_path);
            out.push_str(&format!(
                "| [{name}]({name}.md) | {} | {} |\n",
                f.layer,
                f.purpose.replace('|', "\\|")
            ));
        }
    }
    out
}

/// Stub page for a file whose generation permanently failed.
pub fn error_stub_page(file_path: &str, error: &str) -> String {
    let summary = FileSummary {
        file_path: file_path.to_string(),
        purpose: "Generation failed for this file.".to_string(),
        layer: Layer::Utility,
        ..Default::default()
    };
    format!(
        "{}\n# {file_path}\n\n## 1. Purpose\n\nPage generation failed and will be retried on \
the next run.\n\nError: {error}\n",
        render_file_front_matter(&summary)
    )
}

/// Architecture synthesis page: layer grouping plus a Mermaid diagram of
/// the highest-confidence file neighborhood.
pub fn architecture_page(file_summaries: &[FileSummary], graph: &CodeGraph) -> String {
    let mut by_layer: BTreeMap<&str, Vec<&FileSummary>> = BTreeMap::new();
    for f in file_summaries {
        by_layer.entry(f.layer.as_str()).or_default().push(f);
    }

    let mut out = String::from(
        "---\npage_summary:\n  purpose: Architecture overview synthesized from file summaries.\n---\n\n# Architecture\n",
    );
    for (layer, files) in &by_layer {
        out.push_str(&format!("\n## Layer: {layer} ({} files)\n\n", files.len()));
        for f in files {
            out.push_str(&format!("- `{}`: {}\n", f.file_path, f.purpose));
        }
    }

    // densest file node gives the most informative diagram
    let hub = graph
        .nodes_sorted()
        .into_iter()
        .filter(|n| n.kind == "file")
        .max_by_key(|n| {
            graph.callers(&n.id).len() + graph.callees(&n.id).len()
        });
    if let Some(hub) = hub {
        let sub = graph.neighborhood(&hub.id, 2, 0.6);
        if !sub.edges.is_empty() {
            out.push_str("\n## Reference map\n\n```mermaid\n");
            out.push_str(&to_mermaid(&sub));
            out.push_str("```\n");
        }
    }
    out
}

/// Workflows synthesis page: entry points and their forward call chains.
pub fn workflows_page(entry_points: &[(String, String)], graph: &CodeGraph) -> String {
    let mut out = String::from(
        "---\npage_summary:\n  purpose: Entry points and their call flows.\n---\n\n# Workflows\n",
    );
    if entry_points.is_empty() {
        out.push_str("\nNo entry points were identified.\n");
        return out;
    }
    for (id, description) in entry_points {
        out.push_str(&format!("\n## {description}\n\n"));
        let mut lines = Vec::new();
        render_flow(graph, id, 0, 3, &mut Vec::new(), &mut lines);
        if lines.is_empty() {
            out.push_str("(no outgoing calls)\n");
        } else {
            out.push_str("```\n");
            for l in lines {
                out.push_str(&l);
                out.push('\n');
            }
            out.push_str("```\n");
        }
    }
    out
}

fn render_flow(
    graph: &CodeGraph,
    id: &str,
    depth: usize,
    max_depth: usize,
    seen: &mut Vec<String>,
    out: &mut Vec<String>,
) {
    if depth > max_depth || seen.iter().any(|s| s == id) {
        return;
    }
    seen.push(id.to_string());
    let name = graph.node(id).map(|n| n.name.clone()).unwrap_or_else(|| id.to_string());
    out.push(format!("{}{name}", "  ".repeat(depth)));
    for (callee, _) in graph.callees(id).into_iter().take(3) {
        render_flow(graph, &callee.id, depth + 1, max_depth, seen, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumb_truncates_past_max_depth() {
        assert_eq!(breadcrumb("", 4), "root");
        assert_eq!(breadcrumb("api", 4), "root / api");
        assert_eq!(
            breadcrumb("a/b/c/d/e/f", 4),
            "root / ... / c / d / e / f"
        );
        assert!(breadcrumb("a/b/c/d/e/f", 4).contains("..."));
    }

    #[test]
    fn directory_page_links_children() {
        let summary = DirectorySummary {
            directory_path: "api".into(),
            purpose: "HTTP surface.".into(),
            contains: vec![],
            role_in_system: "Serves requests.".into(),
        };
        let file = FileSummary {
            file_path: "api/deps.py".into(),
            purpose: "Helpers.".into(),
            layer: Layer::Infrastructure,
            ..Default::default()
        };
        let child = DirectorySummary {
            directory_path: "api/routers".into(),
            purpose: "Route handlers.".into(),
            contains: vec![],
            role_in_system: String::new(),
        };
        let page = directory_page(&summary, &[&file], &[&child], 4);
        assert!(page.starts_with("---\n"));
        assert!(page.contains("[deps.py](deps.py.md)"));
        assert!(page.contains("[routers](routers/index.md)"));
        assert!(page.contains("root / api"));
    }

    #[test]
    fn error_stub_has_valid_front_matter() {
        let page = error_stub_page("api/deps.py", "model unavailable");
        let parsed = crate::summary::parse_file_summary(&page, "api/deps.py").unwrap();
        assert_eq!(parsed.layer, Layer::Utility);
        assert!(page.contains("model unavailable"));
    }
}
