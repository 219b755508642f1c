//! The bidirectional search coordinator: a state machine that rotates
//! expansion between the two sides, probes for meetings with an
//! external hash join, and projects matches into output rows.
//!
//! The machine is an explicit loop — every state handler returns the
//! next state — over `GET_PARAMETER → ROTATE → BUILD → NEED_OUTER →
//! SCAN_BUCKET → NEED_BATCH`, with `ROTATE` as the per-hop hub.
//! Exactly one side expands per rotation (the numerically smaller
//! frontier), so the global hop counter equals the total length of any
//! path matched that round and each length is probed exactly once.

use std::collections::VecDeque;

use tracing::debug;

use crate::frontier::entry::FrontierEntry;
use crate::frontier::table::TableOptions;
use crate::scan::EdgeScanner;
use crate::search::project::{PathProjector, PathRow};
use crate::search::side::{Anchor, SideController, SideMetrics, SideOptions};
use crate::types::{CancelToken, Result, SearchError, Snapshot, VertexId};

/// Validated search parameters.
#[derive(Clone, Debug)]
pub struct SearchParams {
    /// Start endpoint.
    pub start: VertexId,
    /// End endpoint.
    pub end: VertexId,
    /// Minimum number of edges in an emitted path.
    pub min_hops: u32,
    /// Maximum number of edges, `None` for unbounded.
    pub max_hops: Option<u32>,
    /// Number of rows after which the search stops cleanly.
    pub limit: u64,
}

impl SearchParams {
    /// Validates hop bounds (`max_hops == -1` means unbounded) and the
    /// result limit before any search state exists.
    pub fn new(
        start: VertexId,
        end: VertexId,
        min_hops: u32,
        max_hops: i64,
        limit: u64,
    ) -> Result<Self> {
        if max_hops < -1 {
            return Err(SearchError::Invalid("max hops must be >= -1"));
        }
        if limit == 0 {
            return Err(SearchError::Invalid("result limit must be >= 1"));
        }
        let max_hops = if max_hops == -1 {
            None
        } else {
            u32::try_from(max_hops).map(Some).map_err(|_| {
                SearchError::Invalid("max hops out of range")
            })?
        };
        if let Some(max) = max_hops {
            if min_hops > max {
                return Err(SearchError::Invalid("min hops exceeds max hops"));
            }
        }
        Ok(Self {
            start,
            end,
            min_hops,
            max_hops,
            limit,
        })
    }
}

/// Engine-level options shared by both sides.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// Frontier table sizing for both sides.
    pub table: TableOptions,
    /// Visibility snapshot bound to both scanners at start.
    pub snapshot: Snapshot,
}

/// Snapshot of a search's counters.
#[derive(Copy, Clone, Debug, Default)]
pub struct SearchMetrics {
    /// Global hop counter (total path length probed last round).
    pub hops: u64,
    /// Rows emitted so far.
    pub rows_emitted: u64,
    /// Start-anchored side counters.
    pub start_side: SideMetrics,
    /// End-anchored side counters.
    pub end_side: SideMetrics,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum State {
    GetParameter,
    Rotate,
    Build,
    NeedOuter,
    ScanBucket,
    NeedBatch,
    Done,
}

/// A running bidirectional path search, pulled one row at a time.
///
/// Each pull performs bounded work: at most one rotation's expansion
/// plus the probe work needed to reach the next match.
pub struct PathSearch {
    params: SearchParams,
    outer: SideController,
    inner: SideController,
    state: State,
    hops: u64,
    rows_emitted: u64,
    projector: PathProjector,
    pending: VecDeque<PathRow>,
    outer_entry: Option<(u32, FrontierEntry)>,
    outer_batch: usize,
    inner_batch: usize,
    snapshot: Snapshot,
    cancel: CancelToken,
}

impl PathSearch {
    /// Creates a search over the two direction scanners. The start
    /// scanner must produce forward edges, the end scanner the edges
    /// arriving at its source (for undirected data they coincide).
    pub fn new(
        params: SearchParams,
        options: SearchOptions,
        start_scanner: Box<dyn EdgeScanner>,
        end_scanner: Box<dyn EdgeScanner>,
        cancel: CancelToken,
    ) -> Result<Self> {
        let side_opts = SideOptions {
            table: options.table,
            track_paths_from_hop: 0,
        };
        let outer = SideController::new(Anchor::Start, start_scanner, side_opts.clone())?;
        let inner = SideController::new(Anchor::End, end_scanner, side_opts)?;
        Ok(Self {
            params,
            outer,
            inner,
            state: State::GetParameter,
            hops: 0,
            rows_emitted: 0,
            projector: PathProjector::new(),
            pending: VecDeque::new(),
            outer_entry: None,
            outer_batch: 0,
            inner_batch: 0,
            snapshot: options.snapshot,
            cancel,
        })
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> SearchMetrics {
        let (start_side, end_side) = match self.outer.anchor() {
            Anchor::Start => (self.outer.metrics(), self.inner.metrics()),
            Anchor::End => (self.inner.metrics(), self.outer.metrics()),
        };
        SearchMetrics {
            hops: self.hops,
            rows_emitted: self.rows_emitted,
            start_side,
            end_side,
        }
    }

    fn advance(&mut self) -> Result<Option<PathRow>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            self.state = match self.state {
                State::GetParameter => self.get_parameter()?,
                State::Rotate => self.rotate()?,
                State::Build => self.build()?,
                State::NeedOuter => self.need_outer()?,
                State::ScanBucket => self.scan_bucket()?,
                State::NeedBatch => self.need_batch()?,
                State::Done => return Ok(None),
            };
        }
    }

    fn get_parameter(&mut self) -> Result<State> {
        self.outer.bind_snapshot(self.snapshot)?;
        self.inner.bind_snapshot(self.snapshot)?;
        if self.params.min_hops == 0 && self.params.start == self.params.end {
            self.pending.push_back(PathRow {
                vertices: vec![self.params.start],
                edges: Vec::new(),
            });
            self.rows_emitted = 1;
            return Ok(State::Done);
        }
        self.outer.seed(self.params.start)?;
        self.inner.seed(self.params.end)?;
        Ok(State::Rotate)
    }

    fn rotate(&mut self) -> Result<State> {
        self.cancel.check()?;
        if self.rows_emitted >= self.params.limit {
            return Ok(State::Done);
        }
        if let Some(max) = self.params.max_hops {
            if self.hops >= u64::from(max) {
                debug!(hops = self.hops, "search.rotate.budget_exhausted");
                return Ok(State::Done);
            }
        }
        if self.outer.live_entries() == 0 || self.inner.live_entries() == 0 {
            debug!(hops = self.hops, "search.rotate.frontier_empty");
            return Ok(State::Done);
        }
        self.hops += 1;
        self.projector.reserve_hops(self.hops as usize);
        // The smaller frontier becomes the inner (expanding, probed)
        // side, bounding this round's edge-scan work by its size.
        if self.inner.live_entries() > self.outer.live_entries() {
            std::mem::swap(&mut self.outer, &mut self.inner);
        }
        debug!(
            hops = self.hops,
            inner = self.inner.live_entries(),
            outer = self.outer.live_entries(),
            inner_anchor = ?self.inner.anchor(),
            "search.rotate"
        );
        Ok(State::Build)
    }

    fn build(&mut self) -> Result<State> {
        self.inner.promote()?;
        self.inner.expand_one_hop(&self.cancel)?;
        if self.hops < u64::from(self.params.min_hops) {
            // No meeting this round could satisfy the minimum; skip the
            // probe and keep expanding.
            return Ok(State::Rotate);
        }
        self.outer_batch = 0;
        self.inner_batch = 0;
        self.inner.table_mut().load_batch(0, &self.cancel)?;
        self.outer.table_mut().load_batch(0, &self.cancel)?;
        Ok(State::NeedOuter)
    }

    fn need_outer(&mut self) -> Result<State> {
        loop {
            self.cancel.check()?;
            let Some((hash, entry)) = self.outer.table_mut().next_in_resident() else {
                return Ok(State::NeedBatch);
            };
            if entry.is_marker() {
                continue;
            }
            if self.inner.table().batch_for_hash(hash) != self.inner_batch {
                // Probed once the matching inner batch is resident.
                continue;
            }
            self.outer_entry = Some((hash, entry));
            return Ok(State::ScanBucket);
        }
    }

    fn scan_bucket(&mut self) -> Result<State> {
        let (hash, outer_entry) = self
            .outer_entry
            .take()
            .ok_or(SearchError::Internal("scan bucket without an outer entry"))?;
        let matches: Vec<FrontierEntry> = self
            .inner
            .table()
            .probe(hash, outer_entry.vertex)
            .filter(|entry| !entry.is_marker())
            .cloned()
            .collect();
        for inner_entry in matches {
            self.cancel.check()?;
            let row = match self.outer.anchor() {
                Anchor::Start => self.projector.project(&outer_entry, &inner_entry)?,
                Anchor::End => self.projector.project(&inner_entry, &outer_entry)?,
            };
            self.pending.push_back(row);
            self.rows_emitted += 1;
            if self.rows_emitted >= self.params.limit {
                // Clean stop: discard all tables and spill files; the
                // rotation hub sees the limit and terminates.
                self.outer.destroy();
                self.inner.destroy();
                return Ok(State::Rotate);
            }
        }
        Ok(State::NeedOuter)
    }

    fn need_batch(&mut self) -> Result<State> {
        self.outer_batch += 1;
        if self.outer_batch < self.outer.table().nbatches() {
            self.outer.table_mut().load_batch(self.outer_batch, &self.cancel)?;
            return Ok(State::NeedOuter);
        }
        self.inner_batch += 1;
        if self.inner_batch < self.inner.table().nbatches() {
            self.inner.table_mut().load_batch(self.inner_batch, &self.cancel)?;
            self.outer_batch = 0;
            self.outer.table_mut().load_batch(0, &self.cancel)?;
            return Ok(State::NeedOuter);
        }
        Ok(State::Rotate)
    }
}

impl Iterator for PathSearch {
    type Item = Result<PathRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.cancel.check() {
            self.state = State::Done;
            return Some(Err(err));
        }
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(err) => {
                self.state = State::Done;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SearchParams;
    use crate::types::VertexId;

    #[test]
    fn params_reject_invalid_bounds() {
        let a = VertexId::new(0, 1);
        let b = VertexId::new(0, 2);
        assert!(SearchParams::new(a, b, 0, -2, 1).is_err());
        assert!(SearchParams::new(a, b, 0, 1, 0).is_err());
        assert!(SearchParams::new(a, b, 5, 3, 1).is_err());
        let unbounded = SearchParams::new(a, b, 5, -1, 1).unwrap();
        assert_eq!(unbounded.max_hops, None);
        let bounded = SearchParams::new(a, b, 1, 3, 10).unwrap();
        assert_eq!(bounded.max_hops, Some(3));
    }
}
