//! Deterministic Mermaid flowchart rendering for subgraphs.
//!
//! Node labels use short symbol names; node IDs are the sanitized
//! fully-qualified IDs so the output is stable and diffable.

use crate::model::Subgraph;

/// Render a subgraph as a `flowchart TD`.
pub fn to_mermaid(sub: &Subgraph) -> String {
    let mut out = String::from("flowchart TD\n");

    let mut nodes = sub.nodes.clone();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    for n in &nodes {
        out.push_str(&format!(
            "    {}[\"{}\"]\n",
            sanitize_id(&n.id),
            escape_label(&n.name)
        ));
    }

    let mut edges = sub.edges.clone();
    edges.sort_by(|a, b| {
        (&a.source, &a.target, a.kind.as_str()).cmp(&(&b.source, &b.target, b.kind.as_str()))
    });
    for e in &edges {
        out.push_str(&format!(
            "    {} -->|{} {:.1}| {}\n",
            sanitize_id(&e.source),
            e.kind.as_str(),
            e.confidence,
            sanitize_id(&e.target)
        ));
    }
    out
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn escape_label(label: &str) -> String {
    label.replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphEdge, GraphNode};
    use source_analyzer::RefKind;

    fn node(id: &str, name: &str) -> GraphNode {
        GraphNode {
            id: id.into(),
            name: name.into(),
            kind: "function".into(),
            file_path: "a.py".into(),
            line_start: 1,
            line_end: 2,
            docstring: None,
        }
    }

    #[test]
    fn renders_sorted_flowchart() {
        let sub = Subgraph {
            nodes: vec![node("a.py::z", "z"), node("a.py::a", "a")],
            edges: vec![GraphEdge {
                source: "a.py::a".into(),
                target: "a.py::z".into(),
                kind: RefKind::Calls,
                confidence: 0.9,
                line: 3,
            }],
        };
        let text = to_mermaid(&sub);
        assert!(text.starts_with("flowchart TD\n"));
        let a_pos = text.find("a_py__a[").unwrap();
        let z_pos = text.find("a_py__z[").unwrap();
        assert!(a_pos < z_pos, "nodes must be sorted by id");
        assert!(text.contains("a_py__a -->|calls 0.9| a_py__z"));
    }

    #[test]
    fn output_is_stable() {
        let sub = Subgraph {
            nodes: vec![node("a.py::f", "f")],
            edges: vec![],
        };
        assert_eq!(to_mermaid(&sub), to_mermaid(&sub));
    }
}
