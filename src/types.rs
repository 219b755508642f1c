//! Core identifier types, the visibility snapshot token, and the error
//! taxonomy shared by every module in the crate.

use std::fmt;

/// Number of low bits holding the per-label local sequence id.
pub const LOCAL_ID_BITS: u32 = 48;
const LOCAL_ID_MASK: u64 = (1 << LOCAL_ID_BITS) - 1;

/// Opaque 64-bit vertex identifier: a 16-bit label id in the high bits
/// and a 48-bit local sequence id in the low bits.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct VertexId(pub u64);

/// Opaque 64-bit edge (row) identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct EdgeId(pub u64);

/// Visibility marker bound to a search's edge scanners exactly once, so
/// the whole search observes a single consistent snapshot of the edge
/// data even while sibling operations use independent markers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Snapshot(pub u64);

impl VertexId {
    /// Packs a label id and a local sequence id into one identifier.
    pub const fn new(label: u16, local: u64) -> Self {
        VertexId(((label as u64) << LOCAL_ID_BITS) | (local & LOCAL_ID_MASK))
    }

    /// Label id stored in the high 16 bits.
    pub const fn label(self) -> u16 {
        (self.0 >> LOCAL_ID_BITS) as u16
    }

    /// Local sequence id stored in the low 48 bits.
    pub const fn local(self) -> u64 {
        self.0 & LOCAL_ID_MASK
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label(), self.local())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by the search engine.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// Spill file create/write/read failure; aborts the whole search.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Rejected configuration, reported before the state machine starts.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Internal consistency violation; a defect, not a user error.
    #[error("internal: {0}")]
    Internal(&'static str),
    /// Cooperative cancellation requested by the host.
    #[error("cancelled")]
    Cancelled,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Cooperative cancellation handle polled inside every bucket sweep,
/// expansion loop, and disk-replay loop.
#[derive(Clone, Default)]
pub struct CancelToken(Option<std::sync::Arc<std::sync::atomic::AtomicBool>>);

impl CancelToken {
    /// Token backed by a host-owned flag.
    pub fn new(flag: std::sync::Arc<std::sync::atomic::AtomicBool>) -> Self {
        Self(Some(flag))
    }

    /// Token that never cancels.
    pub fn none() -> Self {
        Self(None)
    }

    /// Fails with [`SearchError::Cancelled`] once the host raises the flag.
    pub fn check(&self) -> Result<()> {
        match &self.0 {
            Some(flag) if flag.load(std::sync::atomic::Ordering::SeqCst) => {
                Err(SearchError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}
