//! In-memory graph with lookup and walk queries.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::{info, warn};

use source_analyzer::{file_node_id, ParsedFile, RefKind, ResolvedReference};

use crate::model::{GraphEdge, GraphNode, Subgraph};

/// Directed symbol graph. Node lookups go through an ID map so queries can
/// address nodes by their canonical string ID.
pub struct CodeGraph {
    pub(crate) inner: DiGraph<GraphNode, GraphEdge>,
    pub(crate) by_id: HashMap<String, NodeIndex>,
}

impl CodeGraph {
    /// Build from parsed files and resolved references.
    ///
    /// Every parsed file contributes one synthetic file node plus one node
    /// per symbol. References whose endpoints are missing are dropped with
    /// a warning; the persisted graph never violates the endpoint
    /// invariant.
    pub fn build(files: &[ParsedFile], references: &[ResolvedReference]) -> Self {
        let mut inner = DiGraph::new();
        let mut by_id: HashMap<String, NodeIndex> = HashMap::new();

        let mut add_node = |inner: &mut DiGraph<GraphNode, GraphEdge>,
                            by_id: &mut HashMap<String, NodeIndex>,
                            node: GraphNode| {
            if by_id.contains_key(&node.id) {
                return;
            }
            let id = node.id.clone();
            let idx = inner.add_node(node);
            by_id.insert(id, idx);
        };

        for f in files {
            add_node(
                &mut inner,
                &mut by_id,
                GraphNode {
                    id: file_node_id(&f.path),
                    name: f.path.clone(),
                    kind: "file".into(),
                    file_path: f.path.clone(),
                    line_start: 1,
                    line_end: f.line_count.max(1),
                    docstring: None,
                },
            );
            for s in &f.symbols {
                add_node(
                    &mut inner,
                    &mut by_id,
                    GraphNode {
                        id: s.id(),
                        name: s.qualified_name(),
                        kind: s.kind.as_str().into(),
                        file_path: s.file_path.clone(),
                        line_start: s.line_start,
                        line_end: s.line_end,
                        docstring: s.docstring.clone(),
                    },
                );
            }
        }

        let mut dropped = 0usize;
        for r in references {
            let (Some(&src), Some(&dst)) = (by_id.get(&r.source), by_id.get(&r.target)) else {
                dropped += 1;
                continue;
            };
            inner.add_edge(
                src,
                dst,
                GraphEdge {
                    source: r.source.clone(),
                    target: r.target.clone(),
                    kind: r.kind,
                    confidence: r.confidence,
                    line: r.line,
                },
            );
        }
        if dropped > 0 {
            warn!(dropped, "references with missing endpoints were dropped");
        }

        info!(
            nodes = inner.node_count(),
            edges = inner.edge_count(),
            "graph built"
        );
        Self { inner, by_id }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.by_id.get(id).map(|&i| &self.inner[i])
    }

    /// All nodes, sorted by ID.
    pub fn nodes_sorted(&self) -> Vec<&GraphNode> {
        let mut v: Vec<&GraphNode> = self.inner.node_weights().collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        v
    }

    /// All edges, sorted by `(source, target, kind)`.
    pub fn edges_sorted(&self) -> Vec<&GraphEdge> {
        let mut v: Vec<&GraphEdge> = self.inner.edge_weights().collect();
        v.sort_by(|a, b| {
            (&a.source, &a.target, a.kind.as_str()).cmp(&(&b.source, &b.target, b.kind.as_str()))
        });
        v
    }

    /// Undirected BFS neighborhood around `node_id`, bounded by hop count
    /// and minimum edge confidence.
    pub fn neighborhood(&self, node_id: &str, hops: usize, min_confidence: f32) -> Subgraph {
        let Some(&start) = self.by_id.get(node_id) else {
            return Subgraph::default();
        };

        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        seen.insert(start);
        queue.push_back((start, 0));

        let mut edge_ids = HashSet::new();
        while let Some((idx, depth)) = queue.pop_front() {
            if depth >= hops {
                continue;
            }
            for dir in [Direction::Outgoing, Direction::Incoming] {
                for e in self.inner.edges_directed(idx, dir) {
                    if e.weight().confidence < min_confidence {
                        continue;
                    }
                    edge_ids.insert(e.id());
                    let other = if dir == Direction::Outgoing {
                        e.target()
                    } else {
                        e.source()
                    };
                    if seen.insert(other) {
                        queue.push_back((other, depth + 1));
                    }
                }
            }
        }

        self.slice(seen, edge_ids)
    }

    /// Incoming `calls` edges of a node addressed by ID or plain name.
    pub fn callers(&self, symbol: &str) -> Vec<(GraphNode, GraphEdge)> {
        self.adjacent_calls(symbol, Direction::Incoming)
    }

    /// Outgoing `calls` edges of a node addressed by ID or plain name.
    pub fn callees(&self, symbol: &str) -> Vec<(GraphNode, GraphEdge)> {
        self.adjacent_calls(symbol, Direction::Outgoing)
    }

    /// All simple paths `src -> dst` above a confidence floor, depth-capped.
    pub fn paths(&self, src: &str, dst: &str, min_confidence: f32) -> Vec<Vec<String>> {
        const MAX_DEPTH: usize = 8;
        let (Some(&s), Some(&d)) = (self.by_id.get(src), self.by_id.get(dst)) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut stack = vec![self.inner[s].id.clone()];
        let mut visited = HashSet::from([s]);
        self.dfs_paths(s, d, min_confidence, MAX_DEPTH, &mut stack, &mut visited, &mut out);
        out.sort();
        out
    }

    fn dfs_paths(
        &self,
        at: NodeIndex,
        goal: NodeIndex,
        min_confidence: f32,
        budget: usize,
        stack: &mut Vec<String>,
        visited: &mut HashSet<NodeIndex>,
        out: &mut Vec<Vec<String>>,
    ) {
        if at == goal {
            out.push(stack.clone());
            return;
        }
        if budget == 0 {
            return;
        }
        let mut nexts: Vec<(NodeIndex, String)> = self
            .inner
            .edges_directed(at, Direction::Outgoing)
            .filter(|e| e.weight().confidence >= min_confidence)
            .map(|e| (e.target(), self.inner[e.target()].id.clone()))
            .collect();
        nexts.sort_by(|a, b| a.1.cmp(&b.1));
        nexts.dedup_by(|a, b| a.0 == b.0);

        for (next, id) in nexts {
            if !visited.insert(next) {
                continue;
            }
            stack.push(id);
            self.dfs_paths(next, goal, min_confidence, budget - 1, stack, visited, out);
            stack.pop();
            visited.remove(&next);
        }
    }

    fn adjacent_calls(&self, symbol: &str, dir: Direction) -> Vec<(GraphNode, GraphEdge)> {
        let idx = match self.by_id.get(symbol) {
            Some(&i) => Some(i),
            None => {
                // fall back to a unique plain-name match
                let mut hits: Vec<NodeIndex> = self
                    .inner
                    .node_indices()
                    .filter(|&i| {
                        let n = &self.inner[i];
                        n.name == symbol || n.name.rsplit('.').next() == Some(symbol)
                    })
                    .collect();
                hits.sort_by(|&a, &b| self.inner[a].id.cmp(&self.inner[b].id));
                hits.first().copied()
            }
        };
        let Some(idx) = idx else {
            return Vec::new();
        };

        let mut out: Vec<(GraphNode, GraphEdge)> = self
            .inner
            .edges_directed(idx, dir)
            .filter(|e| matches!(e.weight().kind, RefKind::Calls | RefKind::Instantiates))
            .map(|e| {
                let other = if dir == Direction::Outgoing {
                    e.target()
                } else {
                    e.source()
                };
                (self.inner[other].clone(), e.weight().clone())
            })
            .collect();
        out.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        out
    }

    fn slice(
        &self,
        nodes: HashSet<NodeIndex>,
        edges: HashSet<petgraph::graph::EdgeIndex>,
    ) -> Subgraph {
        let mut out_nodes: Vec<GraphNode> =
            nodes.iter().map(|&i| self.inner[i].clone()).collect();
        out_nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut out_edges: Vec<GraphEdge> = edges
            .iter()
            .map(|&e| self.inner[e].clone())
            .collect();
        out_edges.sort_by(|a, b| {
            (&a.source, &a.target, a.kind.as_str()).cmp(&(&b.source, &b.target, b.kind.as_str()))
        });

        Subgraph {
            nodes: out_nodes,
            edges: out_edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use source_analyzer::{parse_file, resolve, LanguageKind};

    fn login_fixture() -> (Vec<ParsedFile>, Vec<ResolvedReference>) {
        let auth = parse_file(
            "auth.py",
            r#"
def db_query(q):
    return q

def get_user(token):
    return db_query(token)

def save_session(user):
    return user

def verify_token(token):
    user = get_user(token)
    save_session(user)
    return user

def login(token):
    return verify_token(token)
"#,
            LanguageKind::Python,
        )
        .unwrap();
        let files = vec![auth];
        let refs = resolve(&files).references;
        (files, refs)
    }

    #[test]
    fn every_edge_endpoint_exists() {
        let (files, refs) = login_fixture();
        let g = CodeGraph::build(&files, &refs);
        for e in g.edges_sorted() {
            assert!(g.node(&e.source).is_some(), "missing source {}", e.source);
            assert!(g.node(&e.target).is_some(), "missing target {}", e.target);
        }
    }

    #[test]
    fn callers_and_callees() {
        let (files, refs) = login_fixture();
        let g = CodeGraph::build(&files, &refs);

        let callers = g.callers("auth.py::verify_token");
        assert!(callers.iter().any(|(n, _)| n.id == "auth.py::login"));

        let callees = g.callees("auth.py::verify_token");
        let ids: Vec<&str> = callees.iter().map(|(n, _)| n.id.as_str()).collect();
        assert!(ids.contains(&"auth.py::get_user"));
        assert!(ids.contains(&"auth.py::save_session"));
    }

    #[test]
    fn neighborhood_respects_hops_and_confidence() {
        let (files, refs) = login_fixture();
        let g = CodeGraph::build(&files, &refs);

        let one_hop = g.neighborhood("auth.py::login", 1, 0.0);
        assert!(one_hop.nodes.iter().any(|n| n.id == "auth.py::verify_token"));
        assert!(!one_hop.nodes.iter().any(|n| n.id == "auth.py::get_user"));

        let two_hops = g.neighborhood("auth.py::login", 2, 0.0);
        assert!(two_hops.nodes.iter().any(|n| n.id == "auth.py::get_user"));

        let strict = g.neighborhood("auth.py::login", 2, 0.99);
        assert_eq!(strict.edges.len(), 0);
    }

    #[test]
    fn paths_walk_forward() {
        let (files, refs) = login_fixture();
        let g = CodeGraph::build(&files, &refs);
        let paths = g.paths("auth.py::login", "auth.py::db_query", 0.5);
        assert!(!paths.is_empty());
        assert!(paths[0].starts_with(&["auth.py::login".to_string()]));
        assert_eq!(paths[0].last().map(String::as_str), Some("auth.py::db_query"));
    }

    #[test]
    fn unknown_node_yields_empty() {
        let (files, refs) = login_fixture();
        let g = CodeGraph::build(&files, &refs);
        assert!(g.neighborhood("nope::x", 2, 0.0).nodes.is_empty());
        assert!(g.paths("nope::x", "auth.py::login", 0.0).is_empty());
        assert!(g.callers("nonexistent_symbol_xyz").is_empty());
    }
}
