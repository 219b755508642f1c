//! The search engine proper: side controllers driving per-hop frontier
//! expansion, the coordinator state machine joining the two frontiers,
//! and the projector that builds output rows from meetings.

/// Bidirectional search coordinator and its state machine.
pub mod coordinator;
/// Output-row reconstruction from matched entry pairs.
pub mod project;
/// Per-direction frontier ownership and expansion.
pub mod side;

pub use coordinator::{PathSearch, SearchMetrics, SearchOptions, SearchParams};
pub use project::{PathProjector, PathRow};
pub use side::{Anchor, SideController, SideMetrics, SideOptions};
