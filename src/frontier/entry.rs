//! Frontier entries: either a marker ("reachable, path not yet
//! tracked") or a path entry carrying the full vertex/edge sequence
//! accumulated from this side's endpoint.

use smallvec::SmallVec;

use crate::types::{EdgeId, Result, SearchError, VertexId};

/// Ordered vertex/edge sequence accumulated from a side's endpoint up to
/// (but excluding) the entry's own vertex, so `vertices.len()` always
/// equals `edges.len()`. A zero-hop seed is the empty sequence.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PathSeq {
    /// Vertices from the endpoint towards the entry, endpoint first.
    pub vertices: SmallVec<[VertexId; 4]>,
    /// `edges[i]` joins `vertices[i]` to `vertices[i + 1]` (or to the
    /// entry's vertex for the last edge).
    pub edges: SmallVec<[EdgeId; 4]>,
}

impl PathSeq {
    /// Number of edges in the sequence.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True for a zero-hop seed.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Extends a parent's sequence by one hop: the parent vertex and the
    /// edge that led away from it.
    pub fn child(&self, parent: VertexId, edge: EdgeId) -> PathSeq {
        let mut vertices = self.vertices.clone();
        let mut edges = self.edges.clone();
        vertices.push(parent);
        edges.push(edge);
        PathSeq { vertices, edges }
    }
}

/// One frontier record. `path == None` is a marker entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrontierEntry {
    /// Vertex this entry stands for.
    pub vertex: VertexId,
    /// Accumulated sequence from the side's endpoint, absent for markers.
    pub path: Option<PathSeq>,
}

impl FrontierEntry {
    /// Marker entry: the vertex is reachable, no path is tracked.
    pub fn marker(vertex: VertexId) -> Self {
        Self { vertex, path: None }
    }

    /// Path entry carrying the accumulated sequence.
    pub fn path(vertex: VertexId, path: PathSeq) -> Self {
        Self {
            vertex,
            path: Some(path),
        }
    }

    /// Zero-hop seed for a side's own endpoint.
    pub fn seed(vertex: VertexId) -> Self {
        Self::path(vertex, PathSeq::default())
    }

    /// True when no path is tracked.
    pub fn is_marker(&self) -> bool {
        self.path.is_none()
    }

    /// Approximate resident footprint in bytes, used for the memory
    /// budget that triggers batch growth.
    pub fn mem_size(&self) -> usize {
        const SLOT_OVERHEAD: usize = 48;
        let path_len = self.path.as_ref().map(PathSeq::len).unwrap_or(0);
        SLOT_OVERHEAD + path_len * 16
    }

    /// Encodes the entry into the spill-log payload form: the vertex id,
    /// then for path entries a hop count followed by the vertex and edge
    /// ids. A marker is the bare vertex id, distinguished by length.
    pub fn encode(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.vertex.0.to_be_bytes());
        let Some(path) = &self.path else {
            return;
        };
        dst.extend_from_slice(&(path.len() as u32).to_be_bytes());
        for v in &path.vertices {
            dst.extend_from_slice(&v.0.to_be_bytes());
        }
        for e in &path.edges {
            dst.extend_from_slice(&e.0.to_be_bytes());
        }
    }

    /// Decodes one spill-log payload produced by [`encode`](Self::encode).
    pub fn decode(src: &[u8]) -> Result<Self> {
        let vertex = VertexId(read_u64(src, 0)?);
        if src.len() == 8 {
            return Ok(Self::marker(vertex));
        }
        if src.len() < 12 {
            return Err(SearchError::Internal("truncated frontier entry"));
        }
        let hops = u32::from_be_bytes(
            src[8..12]
                .try_into()
                .map_err(|_| SearchError::Internal("truncated frontier entry"))?,
        ) as usize;
        if src.len() != 12 + hops * 16 {
            return Err(SearchError::Internal("frontier entry length mismatch"));
        }
        let mut path = PathSeq::default();
        for i in 0..hops {
            path.vertices.push(VertexId(read_u64(src, 12 + i * 8)?));
        }
        let edge_base = 12 + hops * 8;
        for i in 0..hops {
            path.edges.push(EdgeId(read_u64(src, edge_base + i * 8)?));
        }
        Ok(Self::path(vertex, path))
    }
}

fn read_u64(src: &[u8], offset: usize) -> Result<u64> {
    let bytes = src
        .get(offset..offset + 8)
        .ok_or(SearchError::Internal("truncated frontier entry"))?;
    Ok(u64::from_be_bytes(bytes.try_into().expect("8-byte slice")))
}

#[cfg(test)]
mod tests {
    use super::{FrontierEntry, PathSeq};
    use crate::types::{EdgeId, VertexId};

    fn sample_path() -> PathSeq {
        PathSeq::default()
            .child(VertexId::new(0, 1), EdgeId(10))
            .child(VertexId::new(0, 2), EdgeId(11))
    }

    #[test]
    fn marker_payload_is_bare_vertex() {
        let marker = FrontierEntry::marker(VertexId::new(3, 9));
        let mut bytes = Vec::new();
        marker.encode(&mut bytes);
        assert_eq!(bytes.len(), 8);
        assert_eq!(FrontierEntry::decode(&bytes).unwrap(), marker);
        assert!(marker.is_marker());
    }

    #[test]
    fn path_entry_roundtrips() {
        let entry = FrontierEntry::path(VertexId::new(0, 3), sample_path());
        let mut bytes = Vec::new();
        entry.encode(&mut bytes);
        let decoded = FrontierEntry::decode(&bytes).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.path.unwrap().len(), 2);
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let entry = FrontierEntry::path(VertexId::new(0, 3), sample_path());
        let mut bytes = Vec::new();
        entry.encode(&mut bytes);
        bytes.pop();
        assert!(FrontierEntry::decode(&bytes).is_err());
    }

    #[test]
    fn child_appends_parent_and_edge() {
        let path = sample_path();
        assert_eq!(path.vertices.as_slice(), &[VertexId::new(0, 1), VertexId::new(0, 2)]);
        assert_eq!(path.edges.as_slice(), &[EdgeId(10), EdgeId(11)]);
        assert!(!path.is_empty());
        assert!(PathSeq::default().is_empty());
    }
}
