//! Path projection: turning a matched outer/inner entry pair into one
//! ordered output row.

use crate::frontier::entry::FrontierEntry;
use crate::types::{EdgeId, Result, SearchError, VertexId};

/// One output row: ordered vertex and edge id sequences satisfying
/// `vertices.len() == edges.len() + 1`, except the trivial zero-hop row
/// (one vertex, no edges).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathRow {
    /// Vertices from the start endpoint to the end endpoint.
    pub vertices: Vec<VertexId>,
    /// `edges[i]` joins `vertices[i]` to `vertices[i + 1]`.
    pub edges: Vec<EdgeId>,
}

impl PathRow {
    /// Number of edges (hops) in the row.
    pub fn hops(&self) -> usize {
        self.edges.len()
    }
}

/// Reconstructs output rows from matched entry pairs through a reusable
/// scratch buffer, grown geometrically as hop counts rise.
#[derive(Default)]
pub struct PathProjector {
    vertices: Vec<VertexId>,
    edges: Vec<EdgeId>,
}

impl PathProjector {
    /// Creates a projector with empty scratch buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the scratch can hold a row of `hops` edges without
    /// reallocating mid-projection.
    pub fn reserve_hops(&mut self, hops: usize) {
        let want = hops + 1;
        if self.vertices.capacity() < want {
            let target = want.max(self.vertices.capacity() * 2);
            self.vertices.reserve(target - self.vertices.len());
            self.edges.reserve(target - self.edges.len());
        }
    }

    /// Builds the row for a meeting of `start_entry` (start-anchored)
    /// and `end_entry` (end-anchored) at their shared vertex: the start
    /// side's path, the meeting vertex, then the end side's path
    /// replayed in reverse as (edge, vertex) pairs.
    pub fn project(
        &mut self,
        start_entry: &FrontierEntry,
        end_entry: &FrontierEntry,
    ) -> Result<PathRow> {
        let start_path = start_entry
            .path
            .as_ref()
            .ok_or(SearchError::Internal("marker entry reached projection"))?;
        let end_path = end_entry
            .path
            .as_ref()
            .ok_or(SearchError::Internal("marker entry reached projection"))?;
        if start_entry.vertex != end_entry.vertex {
            return Err(SearchError::Internal("projected entries do not meet"));
        }
        self.vertices.clear();
        self.edges.clear();
        self.vertices.extend_from_slice(&start_path.vertices);
        self.edges.extend_from_slice(&start_path.edges);
        self.vertices.push(start_entry.vertex);
        for i in (0..end_path.len()).rev() {
            self.edges.push(end_path.edges[i]);
            self.vertices.push(end_path.vertices[i]);
        }
        if self.vertices.len() != self.edges.len() + 1 {
            return Err(SearchError::Internal("path length invariant violated"));
        }
        Ok(PathRow {
            vertices: self.vertices.clone(),
            edges: self.edges.clone(),
        })
    }
}
