//! One direction of the search: the side controller owns the current
//! and previous-generation ("key") frontier tables, the hop counter,
//! and the edge scanner that expands the frontier one hop at a time.

use tracing::debug;

use crate::frontier::entry::FrontierEntry;
use crate::frontier::table::{FrontierTable, InsertOutcome, TableOptions, TableStats};
use crate::frontier::vertex_hash;
use crate::scan::EdgeScanner;
use crate::types::{CancelToken, Result, Snapshot, VertexId};

/// Which endpoint a side is anchored to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Anchor {
    /// The side expanding from the start vertex.
    Start,
    /// The side expanding from the end vertex.
    End,
}

/// Per-side configuration.
#[derive(Clone, Debug, Default)]
pub struct SideOptions {
    /// Frontier table sizing.
    pub table: TableOptions,
    /// Entries expanded while the side's hop count is below this bound
    /// are stored as markers (reachability only, no path). Children of
    /// markers stay markers, so any threshold above zero trades path
    /// completeness below it for memory; the coordinator always uses
    /// zero.
    pub track_paths_from_hop: u32,
}

/// Cumulative per-side counters reported by [`SideController::metrics`].
#[derive(Copy, Clone, Debug, Default)]
pub struct SideMetrics {
    /// Expansion hops performed.
    pub hops: u32,
    /// Live path entries after the last expansion.
    pub live_paths: u64,
    /// Aggregated table insert statistics across all generations.
    pub table: TableStats,
    /// Highest resident table footprint observed, in bytes.
    pub peak_bytes: usize,
}

/// Controller for one search direction.
pub struct SideController {
    anchor: Anchor,
    scanner: Box<dyn EdgeScanner>,
    current: FrontierTable,
    key: FrontierTable,
    hop: u32,
    track_from: u32,
    peak_bytes: usize,
    retired_stats: TableStats,
}

impl SideController {
    /// Creates an unseeded controller.
    pub fn new(anchor: Anchor, scanner: Box<dyn EdgeScanner>, opts: SideOptions) -> Result<Self> {
        Ok(Self {
            anchor,
            scanner,
            current: FrontierTable::create(opts.table.clone())?,
            key: FrontierTable::create(opts.table)?,
            hop: 0,
            track_from: opts.track_paths_from_hop,
            peak_bytes: 0,
            retired_stats: TableStats::default(),
        })
    }

    /// Endpoint this side is anchored to.
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Hop count of the current frontier.
    pub fn hop(&self) -> u32 {
        self.hop
    }

    /// Fixes the visibility snapshot for the side's scanner.
    pub fn bind_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        self.scanner.bind_snapshot(snapshot)
    }

    /// Seeds the side with the zero-hop path entry for its endpoint.
    pub fn seed(&mut self, vertex: VertexId) -> Result<()> {
        let hash = vertex_hash(vertex);
        self.current.insert(FrontierEntry::seed(vertex), hash)?;
        Ok(())
    }

    /// Live frontier entries (paths plus markers) after the last
    /// expansion; the coordinator compares these to pick the smaller
    /// side and terminates when either reaches zero.
    pub fn live_entries(&self) -> u64 {
        self.current.path_count() + self.current.marker_count()
    }

    /// Live path entries of the current frontier.
    pub fn live_paths(&self) -> u64 {
        self.current.path_count()
    }

    /// Promotes the current table to the key role and allocates a fresh
    /// current table, cloning bucket/batch geometry once the promoted
    /// table has split into multiple batches.
    pub fn promote(&mut self) -> Result<()> {
        let fresh = FrontierTable::create_like(&self.current)?;
        let old_key = std::mem::replace(&mut self.key, std::mem::replace(&mut self.current, fresh));
        self.absorb(old_key.stats());
        Ok(())
    }

    /// Expands the frontier one hop: every live key entry rebinds the
    /// scanner and its neighbors are inserted into the current table
    /// under the duplicate-cancellation rule.
    pub fn expand_one_hop(&mut self, cancel: &CancelToken) -> Result<()> {
        self.hop += 1;
        let track_paths = self.hop >= self.track_from;
        let mut accepted = 0u64;
        let mut spilled = 0u64;
        let mut duplicates = 0u64;
        self.key.restart_scan(cancel)?;
        while let Some((_, parent)) = self.key.next_live(cancel)? {
            cancel.check()?;
            self.scanner.rebind(parent.vertex)?;
            while let Some(neighbor) = self.scanner.next_neighbor()? {
                let hash = vertex_hash(neighbor.vertex);
                let entry = match (&parent.path, track_paths) {
                    (Some(path), true) => FrontierEntry::path(
                        neighbor.vertex,
                        path.child(parent.vertex, neighbor.edge.unwrap_or_default()),
                    ),
                    _ => FrontierEntry::marker(neighbor.vertex),
                };
                match self.current.insert(entry, hash)? {
                    InsertOutcome::Resident => accepted += 1,
                    InsertOutcome::Spilled => spilled += 1,
                    InsertOutcome::Duplicate => duplicates += 1,
                }
            }
            self.current.maybe_grow()?;
        }
        self.peak_bytes = self.peak_bytes.max(self.current.peak_bytes());
        debug!(
            anchor = ?self.anchor,
            hop = self.hop,
            accepted,
            spilled,
            duplicates,
            paths = self.current.path_count(),
            markers = self.current.marker_count(),
            batches = self.current.nbatches(),
            "search.side.expanded"
        );
        Ok(())
    }

    /// Rewinds the key table's replay cursor ahead of an expansion.
    pub fn restart_scan(&mut self, cancel: &CancelToken) -> Result<()> {
        self.key.restart_scan(cancel)
    }

    /// Current-generation frontier table.
    pub fn table(&self) -> &FrontierTable {
        &self.current
    }

    /// Mutable access for coordinator-driven batch loading.
    pub fn table_mut(&mut self) -> &mut FrontierTable {
        &mut self.current
    }

    /// Releases both tables and their spill files.
    pub fn destroy(&mut self) {
        self.absorb(self.current.stats());
        self.absorb(self.key.stats());
        self.current.destroy();
        self.key.destroy();
    }

    fn absorb(&mut self, stats: TableStats) {
        self.retired_stats.inserted_paths += stats.inserted_paths;
        self.retired_stats.inserted_markers += stats.inserted_markers;
        self.retired_stats.duplicates += stats.duplicates;
        self.retired_stats.tombstoned += stats.tombstoned;
        self.retired_stats.spilled_records += stats.spilled_records;
    }

    /// Counter snapshot across all table generations.
    pub fn metrics(&self) -> SideMetrics {
        let mut table = self.retired_stats;
        for live in [self.current.stats(), self.key.stats()] {
            table.inserted_paths += live.inserted_paths;
            table.inserted_markers += live.inserted_markers;
            table.duplicates += live.duplicates;
            table.tombstoned += live.tombstoned;
            table.spilled_records += live.spilled_records;
        }
        SideMetrics {
            hops: self.hop,
            live_paths: self.current.path_count(),
            table,
            peak_bytes: self.peak_bytes.max(self.current.peak_bytes()),
        }
    }
}
