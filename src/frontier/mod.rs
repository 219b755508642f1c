//! Frontier storage for one search side: variable-length path/marker
//! entries in a hash-partitioned, arena-backed table that spills cold
//! partitions to per-batch append-only files.

/// Frontier entries and their spill-log byte form.
pub mod entry;
/// Per-batch append-only spill log.
pub mod spill;
/// The hash-partitioned frontier table.
pub mod table;

pub use entry::{FrontierEntry, PathSeq};
pub use table::{FrontierTable, InsertOutcome, TableOptions};

use xxhash_rust::xxh64::xxh64;

use crate::types::VertexId;

/// Stable 32-bit partition hash for a vertex id.
///
/// The low 32 bits of xxh64 feed both the bucket mask and the batch
/// shift, and are what the spill log persists, so the partition layout
/// survives a save/replay cycle.
pub fn vertex_hash(vertex: VertexId) -> u32 {
    xxh64(&vertex.0.to_be_bytes(), 0) as u32
}
