//! The edge-scanner collaborator: the row producer a search drives once
//! per live frontier vertex per hop, plus an in-memory adjacency-list
//! implementation used by embedders, tests, and benches.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::types::{EdgeId, Result, Snapshot, VertexId};

/// One adjacent row produced by a scanner: the vertex on the far side of
/// an edge and, where the source exposes one, the edge identifier.
/// Producers without row identifiers leave `edge` unset; such edges
/// surface as `EdgeId::default()` in output rows.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Neighbor {
    /// Vertex reached by following the edge.
    pub vertex: VertexId,
    /// Identifier of the traversed edge, if the producer exposes one.
    pub edge: Option<EdgeId>,
}

/// External row producer for one search direction.
///
/// A search binds the snapshot once, then repeatedly rebinds the source
/// vertex and drains the produced neighbors, so implementations must
/// make reparameterization and re-execution cheap.
pub trait EdgeScanner {
    /// Fixes the visibility snapshot the scanner reads under for the
    /// remainder of the search. Called exactly once, before any rebind.
    fn bind_snapshot(&mut self, snapshot: Snapshot) -> Result<()>;

    /// Re-parameterizes the scanner to produce the neighbors of
    /// `source`, restarting its output from the beginning.
    fn rebind(&mut self, source: VertexId) -> Result<()>;

    /// Pulls the next adjacent row, or `None` when the current source is
    /// exhausted.
    fn next_neighbor(&mut self) -> Result<Option<Neighbor>>;
}

/// In-memory adjacency list keyed by source vertex.
///
/// Both search directions can scan the same graph (undirected insertion)
/// or each direction can own its own oriented copy.
#[derive(Default, Debug, Clone)]
pub struct AdjacencyGraph {
    edges: FxHashMap<VertexId, Vec<Neighbor>>,
    next_edge: u64,
}

impl AdjacencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directed edge and returns its generated id.
    pub fn add_directed_edge(&mut self, from: VertexId, to: VertexId) -> EdgeId {
        let edge = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.entry(from).or_default().push(Neighbor {
            vertex: to,
            edge: Some(edge),
        });
        edge
    }

    /// Adds an undirected edge (one id, visible from both endpoints).
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> EdgeId {
        let edge = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.entry(a).or_default().push(Neighbor {
            vertex: b,
            edge: Some(edge),
        });
        self.edges.entry(b).or_default().push(Neighbor {
            vertex: a,
            edge: Some(edge),
        });
        edge
    }

    /// Neighbors of `vertex`, in insertion order.
    pub fn neighbors(&self, vertex: VertexId) -> &[Neighbor] {
        self.edges.get(&vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when `a` and `b` are joined by `edge`.
    pub fn has_edge(&self, a: VertexId, edge: EdgeId, b: VertexId) -> bool {
        self.neighbors(a)
            .iter()
            .any(|n| n.vertex == b && n.edge == Some(edge))
    }
}

/// [`EdgeScanner`] over a shared [`AdjacencyGraph`].
pub struct AdjacencyScanner {
    graph: Arc<AdjacencyGraph>,
    source: Option<VertexId>,
    pos: usize,
}

impl AdjacencyScanner {
    /// Creates an unbound scanner over `graph`.
    pub fn new(graph: Arc<AdjacencyGraph>) -> Self {
        Self {
            graph,
            source: None,
            pos: 0,
        }
    }
}

impl EdgeScanner for AdjacencyScanner {
    fn bind_snapshot(&mut self, _snapshot: Snapshot) -> Result<()> {
        // The shared graph is immutable for the scanner's lifetime, so
        // every snapshot observes the same edges.
        Ok(())
    }

    fn rebind(&mut self, source: VertexId) -> Result<()> {
        self.source = Some(source);
        self.pos = 0;
        Ok(())
    }

    fn next_neighbor(&mut self) -> Result<Option<Neighbor>> {
        let Some(source) = self.source else {
            return Ok(None);
        };
        let neighbors = self.graph.neighbors(source);
        if self.pos >= neighbors.len() {
            return Ok(None);
        }
        let next = neighbors[self.pos];
        self.pos += 1;
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{AdjacencyGraph, AdjacencyScanner, EdgeScanner};
    use crate::types::{Snapshot, VertexId};

    #[test]
    fn scanner_replays_after_rebind() {
        let mut graph = AdjacencyGraph::new();
        let a = VertexId::new(0, 1);
        let b = VertexId::new(0, 2);
        let c = VertexId::new(0, 3);
        graph.add_edge(a, b);
        graph.add_edge(a, c);

        let mut scanner = AdjacencyScanner::new(Arc::new(graph));
        scanner.bind_snapshot(Snapshot(1)).unwrap();
        scanner.rebind(a).unwrap();
        let mut seen = Vec::new();
        while let Some(n) = scanner.next_neighbor().unwrap() {
            seen.push(n.vertex);
        }
        assert_eq!(seen, vec![b, c]);

        scanner.rebind(b).unwrap();
        let n = scanner.next_neighbor().unwrap().unwrap();
        assert_eq!(n.vertex, a);
        assert!(scanner.next_neighbor().unwrap().is_none());
    }

    #[test]
    fn has_edge_checks_both_vertex_and_id() {
        let mut graph = AdjacencyGraph::new();
        let a = VertexId::new(0, 1);
        let b = VertexId::new(0, 2);
        let e = graph.add_edge(a, b);
        assert!(graph.has_edge(a, e, b));
        assert!(graph.has_edge(b, e, a));
        assert!(!graph.has_edge(a, e, a));
    }
}
