//! JSON persistence: `nodes.json`, `edges.json`, `metadata.json`.
//!
//! Files are pretty-printed and sorted for diffability. A full rebuild
//! replaces all three files on every generation run.

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::info;

use crate::errors::GraphError;
use crate::graph::CodeGraph;
use crate::model::{ConfidenceHistogram, GraphEdge, GraphMetadata, GraphNode};

const NODES_FILE: &str = "nodes.json";
const EDGES_FILE: &str = "edges.json";
const METADATA_FILE: &str = "metadata.json";

/// Write the graph into `dir`, creating it if needed.
pub fn save(graph: &CodeGraph, dir: &Path, source_hash: &str) -> Result<GraphMetadata, GraphError> {
    fs::create_dir_all(dir)?;

    let nodes: Vec<&GraphNode> = graph.nodes_sorted();
    let edges: Vec<&GraphEdge> = graph.edges_sorted();

    let mut histogram = ConfidenceHistogram::default();
    for e in &edges {
        histogram.add(e.confidence);
    }

    let metadata = GraphMetadata {
        built_at: Utc::now().to_rfc3339(),
        source_hash: source_hash.to_string(),
        node_count: nodes.len(),
        edge_count: edges.len(),
        edge_confidence_histogram: histogram,
    };

    fs::write(dir.join(NODES_FILE), serde_json::to_vec_pretty(&nodes)?)?;
    fs::write(dir.join(EDGES_FILE), serde_json::to_vec_pretty(&edges)?)?;
    fs::write(
        dir.join(METADATA_FILE),
        serde_json::to_vec_pretty(&metadata)?,
    )?;

    info!(
        dir = %dir.display(),
        nodes = metadata.node_count,
        edges = metadata.edge_count,
        "graph persisted"
    );
    Ok(metadata)
}

/// Load a previously persisted graph.
pub fn load(dir: &Path) -> Result<(CodeGraph, GraphMetadata), GraphError> {
    let nodes: Vec<GraphNode> = serde_json::from_slice(&fs::read(dir.join(NODES_FILE))?)?;
    let edges: Vec<GraphEdge> = serde_json::from_slice(&fs::read(dir.join(EDGES_FILE))?)?;
    let metadata: GraphMetadata = serde_json::from_slice(&fs::read(dir.join(METADATA_FILE))?)?;

    let mut inner = petgraph::graph::DiGraph::new();
    let mut by_id = std::collections::HashMap::new();
    for n in nodes {
        let id = n.id.clone();
        let idx = inner.add_node(n);
        by_id.insert(id, idx);
    }
    for e in edges {
        let (Some(&s), Some(&t)) = (by_id.get(&e.source), by_id.get(&e.target)) else {
            return Err(GraphError::UnknownNode(format!(
                "edge references missing node: {} -> {}",
                e.source, e.target
            )));
        };
        inner.add_edge(s, t, e);
    }

    Ok((CodeGraph { inner, by_id }, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{parse_file, resolve, LanguageKind};

    #[test]
    fn round_trip_preserves_graph() {
        let f = parse_file(
            "svc.py",
            "def helper():\n    return 1\n\ndef main():\n    return helper()\n",
            LanguageKind::Python,
        )
        .unwrap();
        let files = vec![f];
        let refs = resolve(&files).references;
        let graph = CodeGraph::build(&files, &refs);

        let dir = tempfile::tempdir().unwrap();
        let meta = save(&graph, dir.path(), "abc123").unwrap();
        assert_eq!(meta.node_count, graph.node_count());

        let (loaded, loaded_meta) = load(dir.path()).unwrap();
        assert_eq!(loaded.node_count(), graph.node_count());
        assert_eq!(loaded.edge_count(), graph.edge_count());
        assert_eq!(loaded_meta.source_hash, "abc123");

        let before: Vec<_> = graph.nodes_sorted().into_iter().cloned().collect();
        let after: Vec<_> = loaded.nodes_sorted().into_iter().cloned().collect();
        assert_eq!(before, after);

        let edges_before: Vec<_> = graph.edges_sorted().into_iter().cloned().collect();
        let edges_after: Vec<_> = loaded.edges_sorted().into_iter().cloned().collect();
        assert_eq!(edges_before, edges_after);
    }

    #[test]
    fn histogram_buckets_by_tier() {
        let mut h = ConfidenceHistogram::default();
        h.add(0.95);
        h.add(0.7);
        h.add(0.4);
        h.add(0.9);
        assert_eq!(h.high, 2);
        assert_eq!(h.medium, 1);
        assert_eq!(h.low, 1);
    }
}
