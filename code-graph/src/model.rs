//! Graph node/edge types shared by builders, queries, and exporters.
//!
//! Edges reference nodes by ID and never embed them, so cycles cost
//! nothing at the storage layer.

use serde::{Deserialize, Serialize};
use source_analyzer::RefKind;

/// One graph node. Symbol nodes carry their source kind; each parsed file
/// additionally contributes a synthetic `file` node so import edges always
/// have existing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Canonical ID: `file_path::qualified_name` (or `file_path::<file>`).
    pub id: String,
    /// Short display name.
    pub name: String,
    /// `function` | `method` | `class` | `variable` | `file`.
    pub kind: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

/// One directed edge between two node IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: RefKind,
    pub confidence: f32,
    pub line: u32,
}

/// Node-and-edge slice returned by graph queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Confidence histogram over the spec's three tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceHistogram {
    /// `confidence >= 0.9`
    pub high: usize,
    /// `0.6 <= confidence < 0.9`
    pub medium: usize,
    /// `confidence < 0.6`
    pub low: usize,
}

impl ConfidenceHistogram {
    pub fn add(&mut self, confidence: f32) {
        if confidence >= 0.9 {
            self.high += 1;
        } else if confidence >= 0.6 {
            self.medium += 1;
        } else {
            self.low += 1;
        }
    }
}

/// Sidecar metadata persisted next to nodes and edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// RFC 3339 build timestamp.
    pub built_at: String,
    /// Hash of the analyzed source set.
    pub source_hash: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub edge_confidence_histogram: ConfidenceHistogram,
}
