//! Code graph: nodes are fully-qualified symbol IDs, edges are resolved
//! references with kind, confidence, and source line.
//!
//! The graph is rebuilt from scratch on every generation run and persisted
//! as three human-readable JSON files (`nodes.json`, `edges.json`,
//! `metadata.json`). All iteration orders are sorted so identical input
//! produces byte-identical output.

pub mod errors;
pub mod graph;
pub mod mermaid;
pub mod model;
pub mod persist;

pub use errors::GraphError;
pub use graph::CodeGraph;
pub use mermaid::to_mermaid;
pub use model::{GraphEdge, GraphMetadata, GraphNode, Subgraph};
