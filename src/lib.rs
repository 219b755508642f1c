//! Bidirectional path search over graph frontiers.
//!
//! Given a start vertex, an end vertex, hop bounds, and a result limit,
//! [`PathSearch`] expands frontiers from both endpoints simultaneously,
//! stores each frontier in a hash-partitioned, disk-spillable
//! [`FrontierTable`](frontier::FrontierTable), joins the two frontiers
//! with an external hash probe, and projects every meeting into an
//! ordered vertex/edge row. Edge data is supplied by the embedder
//! through the [`EdgeScanner`](scan::EdgeScanner) collaborator, rebound
//! once per live frontier vertex per hop under a single visibility
//! snapshot.
//!
//! ```
//! use std::sync::Arc;
//!
//! use bidipath::scan::{AdjacencyGraph, AdjacencyScanner};
//! use bidipath::search::{PathSearch, SearchOptions, SearchParams};
//! use bidipath::types::{CancelToken, VertexId};
//!
//! let mut graph = AdjacencyGraph::new();
//! let (a, b, c) = (VertexId::new(0, 1), VertexId::new(0, 2), VertexId::new(0, 3));
//! graph.add_edge(a, b);
//! graph.add_edge(b, c);
//! let graph = Arc::new(graph);
//!
//! let params = SearchParams::new(a, c, 1, 3, 10)?;
//! let search = PathSearch::new(
//!     params,
//!     SearchOptions::default(),
//!     Box::new(AdjacencyScanner::new(graph.clone())),
//!     Box::new(AdjacencyScanner::new(graph)),
//!     CancelToken::none(),
//! )?;
//! let rows = search.collect::<bidipath::types::Result<Vec<_>>>()?;
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].vertices, vec![a, b, c]);
//! # Ok::<(), bidipath::types::SearchError>(())
//! ```

#![forbid(unsafe_code)]

pub mod frontier;
pub mod scan;
pub mod search;
pub mod types;

pub use scan::{EdgeScanner, Neighbor};
pub use search::{PathRow, PathSearch, SearchMetrics, SearchOptions, SearchParams};
pub use types::{CancelToken, EdgeId, Result, SearchError, Snapshot, VertexId};
