//! Hash-partitioned frontier table.
//!
//! Entries live in a slot arena (a growable vector addressed by `u32`
//! handles); buckets are singly linked chains threaded through the
//! slots. The hash space is split into `nbuckets * nbatches` partitions,
//! both powers of two: the bucket comes from the low hash bits, the
//! batch from the bits above them. Batch 0 is resident; once the
//! resident footprint exceeds the memory budget the batch count doubles,
//! non-resident batches spill to per-batch append-only files, and the
//! spill store re-partitions so every record sits in its current batch's
//! file.
//!
//! Duplicate cancellation is decided by a per-vertex index that is
//! independent of the partition geometry, so the surviving entry per
//! vertex and the frontier counts are identical whether the table stays
//! resident or spills. Cancelling a live marker is an in-place tombstone
//! (the slot's entry is taken), skipped by every scan, growth pass, and
//! probe.

use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::frontier::entry::FrontierEntry;
use crate::frontier::spill::SpillStore;
use crate::types::{CancelToken, Result, SearchError, VertexId};

const MAX_BUCKETS: usize = 1 << 24;

/// Sizing knobs for one frontier table.
#[derive(Clone, Debug)]
pub struct TableOptions {
    /// Resident-memory ceiling; exceeding it doubles the batch count.
    pub mem_budget: usize,
    /// Initial bucket count (power of two).
    pub initial_buckets: usize,
    /// Root directory for spill files; system temp dir when `None`.
    pub spill_root: Option<PathBuf>,
}

impl TableOptions {
    /// Default sizing: 64 MiB resident budget, 64 initial buckets,
    /// spill files under the system temp dir.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            mem_budget: 64 << 20,
            initial_buckets: 64,
            spill_root: None,
        }
    }
}

/// Where an inserted entry ended up.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum InsertOutcome {
    /// Appended to the resident batch.
    Resident,
    /// Serialized to a non-resident batch's spill file.
    Spilled,
    /// Dropped by the duplicate rule (or it cancelled a marker and took
    /// its place — the caller sees one live entry either way).
    Duplicate,
}

/// Cumulative insert statistics, never reset by batch switches.
#[derive(Copy, Clone, Debug, Default)]
pub struct TableStats {
    /// Path entries accepted (resident or spilled).
    pub inserted_paths: u64,
    /// Marker entries accepted (resident or spilled).
    pub inserted_markers: u64,
    /// Entries dropped by the duplicate rule.
    pub duplicates: u64,
    /// Markers cancelled by a later path entry.
    pub tombstoned: u64,
    /// Records written to spill files during the fill sweep.
    pub spilled_records: u64,
}

struct SlotNode {
    hash: u32,
    next: Option<u32>,
    entry: Option<FrontierEntry>,
}

/// One side's frontier for a single hop generation.
pub struct FrontierTable {
    opts: TableOptions,
    nbuckets: usize,
    bucket_bits: u32,
    nbatches: usize,
    buckets: Vec<Option<u32>>,
    slots: Vec<SlotNode>,
    resident_batch: usize,
    mem_bytes: usize,
    peak_bytes: usize,
    // Resident-batch occupancy, zeroed on every batch switch.
    live_paths: u64,
    live_markers: u64,
    // Frontier-wide counts, independent of which batch is resident.
    total_paths: u64,
    total_markers: u64,
    // vertex -> a path entry (vs marker) is live for it, in any batch.
    index: FxHashMap<VertexId, bool>,
    growth_enabled: bool,
    stats: TableStats,
    spill: Option<SpillStore>,
    cursor: usize,
    scratch: Vec<u8>,
}

impl FrontierTable {
    /// Creates an empty single-batch table.
    pub fn create(opts: TableOptions) -> Result<Self> {
        if !opts.initial_buckets.is_power_of_two() {
            return Err(SearchError::Invalid("bucket count must be a power of two"));
        }
        if opts.mem_budget == 0 {
            return Err(SearchError::Invalid("memory budget must be non-zero"));
        }
        let nbuckets = opts.initial_buckets;
        Ok(Self {
            opts,
            nbuckets,
            bucket_bits: nbuckets.trailing_zeros(),
            nbatches: 1,
            buckets: vec![None; nbuckets],
            slots: Vec::new(),
            resident_batch: 0,
            mem_bytes: 0,
            peak_bytes: 0,
            live_paths: 0,
            live_markers: 0,
            total_paths: 0,
            total_markers: 0,
            index: FxHashMap::default(),
            growth_enabled: true,
            stats: TableStats::default(),
            spill: None,
            cursor: 0,
            scratch: Vec::new(),
        })
    }

    /// Creates an empty table cloned from `other`'s bucket/batch
    /// geometry, amortizing re-partitioning cost across generations
    /// once a table has split into multiple batches.
    pub fn create_like(other: &FrontierTable) -> Result<Self> {
        let mut table = Self::create(other.opts.clone())?;
        if other.nbatches > 1 {
            table.nbuckets = other.nbuckets;
            table.bucket_bits = other.bucket_bits;
            table.nbatches = other.nbatches;
            table.buckets = vec![None; table.nbuckets];
        }
        Ok(table)
    }

    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize & (self.nbuckets - 1)
    }

    fn batch_of(&self, hash: u32) -> usize {
        ((hash >> self.bucket_bits) as usize) & (self.nbatches - 1)
    }

    fn ensure_spill(&mut self) -> Result<&mut SpillStore> {
        if self.spill.is_none() {
            self.spill = Some(SpillStore::create(self.opts.spill_root.as_deref())?);
        }
        Ok(self.spill.as_mut().expect("spill store just created"))
    }

    /// Inserts `entry` under `hash`, applying the duplicate rule and
    /// spilling entries of non-resident batches.
    ///
    /// Duplicate rule: at most one live entry per vertex id; a path
    /// entry always wins over a marker regardless of insertion order; a
    /// second path entry for the same vertex is dropped. The rule is
    /// enforced through the vertex index, so resident and spilled
    /// placements make identical decisions.
    pub fn insert(&mut self, entry: FrontierEntry, hash: u32) -> Result<InsertOutcome> {
        match self.index.get(&entry.vertex).copied() {
            Some(true) => {
                self.stats.duplicates += 1;
                return Ok(InsertOutcome::Duplicate);
            }
            Some(false) if entry.is_marker() => {
                self.stats.duplicates += 1;
                return Ok(InsertOutcome::Duplicate);
            }
            Some(false) => {
                // Path supersedes the live marker for this vertex. When
                // the marker is resident the arena tombstones it below;
                // a spilled marker record is cancelled at replay.
                self.index.insert(entry.vertex, true);
                self.total_markers -= 1;
                self.total_paths += 1;
                self.stats.tombstoned += 1;
                self.stats.inserted_paths += 1;
            }
            None => {
                self.index.insert(entry.vertex, !entry.is_marker());
                if entry.is_marker() {
                    self.total_markers += 1;
                    self.stats.inserted_markers += 1;
                } else {
                    self.total_paths += 1;
                    self.stats.inserted_paths += 1;
                }
            }
        }
        let batch = self.batch_of(hash);
        if batch != self.resident_batch {
            self.save_to_batch(&entry, hash, batch)?;
            return Ok(InsertOutcome::Spilled);
        }
        // The resident batch is mirrored to its own spill file once the
        // table is multi-batch, so the batch can be reloaded after the
        // scan cursor has moved past it.
        if self.nbatches > 1 {
            let mirror = self.resident_batch;
            self.save_to_batch(&entry, hash, mirror)?;
        }
        self.insert_resident(entry, hash);
        Ok(InsertOutcome::Resident)
    }

    /// Convenience wrapper building a zero-payload marker entry.
    pub fn insert_marker(&mut self, vertex: VertexId, hash: u32) -> Result<InsertOutcome> {
        self.insert(FrontierEntry::marker(vertex), hash)
    }

    fn save_to_batch(&mut self, entry: &FrontierEntry, hash: u32, batch: usize) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        entry.encode(&mut scratch);
        let result = self.ensure_spill()?.save_entry(batch, hash, &scratch);
        self.scratch = scratch;
        self.stats.spilled_records += 1;
        trace!(batch, hash, "frontier.table.spill_entry");
        result
    }

    /// Places `entry` in the arena. Duplicate decisions are already
    /// settled by the vertex index; the chain scan here only resolves
    /// replayed records against what is resident (a path record
    /// cancelling its marker, stale mirror copies dropping out).
    fn insert_resident(&mut self, entry: FrontierEntry, hash: u32) {
        let bucket = self.bucket_of(hash);
        let mut slot = self.buckets[bucket];
        while let Some(idx) = slot {
            let node = &self.slots[idx as usize];
            slot = node.next;
            let Some(existing) = &node.entry else {
                continue;
            };
            if node.hash != hash || existing.vertex != entry.vertex {
                continue;
            }
            if entry.is_marker() || !existing.is_marker() {
                return;
            }
            let reclaimed = existing.mem_size();
            self.slots[idx as usize].entry = None;
            self.live_markers -= 1;
            self.mem_bytes -= reclaimed;
        }
        self.append_slot(entry, hash, bucket);
    }

    fn append_slot(&mut self, entry: FrontierEntry, hash: u32, bucket: usize) {
        if entry.is_marker() {
            self.live_markers += 1;
        } else {
            self.live_paths += 1;
        }
        self.mem_bytes += entry.mem_size();
        self.peak_bytes = self.peak_bytes.max(self.mem_bytes);
        let idx = self.slots.len() as u32;
        self.slots.push(SlotNode {
            hash,
            next: self.buckets[bucket],
            entry: Some(entry),
        });
        self.buckets[bucket] = Some(idx);
    }

    /// Reassesses bucket and batch growth. Called by the side controller
    /// after each frontier vertex's neighbor sweep, bounding the budget
    /// overshoot to one vertex's expansion.
    pub fn maybe_grow(&mut self) -> Result<()> {
        while self.nbatches == 1
            && self.nbuckets < MAX_BUCKETS
            && (self.live_paths + self.live_markers) as usize > self.nbuckets
        {
            self.increase_buckets();
        }
        if self.growth_enabled && self.mem_bytes > self.opts.mem_budget {
            self.increase_batches()?;
        }
        Ok(())
    }

    /// Doubles the bucket count and redistributes the arena. Only legal
    /// while single-batched: bucket bits feed the batch shift, so
    /// growing them later would scramble the on-disk partitioning.
    pub fn increase_buckets(&mut self) {
        debug_assert_eq!(self.nbatches, 1);
        self.nbuckets *= 2;
        self.bucket_bits += 1;
        debug!(nbuckets = self.nbuckets, "frontier.table.grow_buckets");
        let old = std::mem::take(&mut self.slots);
        self.buckets = vec![None; self.nbuckets];
        self.mem_bytes = 0;
        for node in old {
            // Tombstones are dropped by the repack.
            if let Some(entry) = node.entry {
                let bucket = self.bucket_of(node.hash);
                self.mem_bytes += entry.mem_size();
                let idx = self.slots.len() as u32;
                self.slots.push(SlotNode {
                    hash: node.hash,
                    next: self.buckets[bucket],
                    entry: Some(entry),
                });
                self.buckets[bucket] = Some(idx);
            }
        }
    }

    /// Doubles the batch count: the spill store re-partitions its files
    /// so every existing record lands in its new batch, resident entries
    /// whose batch moved are evicted (the first split writes them and
    /// the kept entries to files, later ones already have a file copy),
    /// and the rest repack. Growth is permanently disabled when a
    /// doubling frees none or all resident entries, which guards against
    /// infinite doubling under extreme hash skew (a single hub vertex
    /// saturating one partition).
    pub fn increase_batches(&mut self) -> Result<()> {
        let first_split = self.nbatches == 1;
        self.nbatches *= 2;
        debug!(nbatches = self.nbatches, "frontier.table.grow_batches");
        let bucket_bits = self.bucket_bits;
        let nbatches = self.nbatches;
        if let Some(spill) = self.spill.as_mut() {
            spill.redistribute(|hash| ((hash >> bucket_bits) as usize) & (nbatches - 1))?;
        }
        let resident = self.resident_batch;
        let old = std::mem::take(&mut self.slots);
        self.buckets = vec![None; self.nbuckets];
        self.mem_bytes = 0;
        let mut moved = 0u64;
        let mut kept = 0u64;
        for node in old {
            let Some(entry) = node.entry else {
                continue;
            };
            let batch = self.batch_of(node.hash);
            if batch != resident {
                if first_split {
                    self.save_to_batch(&entry, node.hash, batch)?;
                }
                if entry.is_marker() {
                    self.live_markers -= 1;
                } else {
                    self.live_paths -= 1;
                }
                moved += 1;
                continue;
            }
            if first_split {
                self.save_to_batch(&entry, node.hash, resident)?;
            }
            self.mem_bytes += entry.mem_size();
            let bucket = self.bucket_of(node.hash);
            let idx = self.slots.len() as u32;
            self.slots.push(SlotNode {
                hash: node.hash,
                next: self.buckets[bucket],
                entry: Some(entry),
            });
            self.buckets[bucket] = Some(idx);
            kept += 1;
        }
        if moved == 0 || kept == 0 {
            self.growth_enabled = false;
            debug!(moved, kept, "frontier.table.growth_disabled");
        }
        Ok(())
    }

    /// Discards the resident slots and reallocates a zeroed bucket
    /// array. Geometry, spill files, the vertex index, and the
    /// frontier-wide counts are kept: the frontier itself survives in
    /// the files, only its resident batch is dropped.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.buckets = vec![None; self.nbuckets];
        self.mem_bytes = 0;
        self.live_paths = 0;
        self.live_markers = 0;
        self.cursor = 0;
    }

    /// Makes `batch` resident by replaying its spill file. Duplicate
    /// records (mirror copies, superseded markers) resolve against the
    /// arena; frontier-wide counts are untouched, replay only
    /// re-materializes entries that were already counted.
    pub fn load_batch(&mut self, batch: usize, cancel: &CancelToken) -> Result<()> {
        if batch >= self.nbatches {
            return Err(SearchError::Internal("batch index out of range"));
        }
        if batch == self.resident_batch {
            self.cursor = 0;
            return Ok(());
        }
        self.reset();
        self.resident_batch = batch;
        let Some(spill) = self.spill.as_mut() else {
            return Ok(());
        };
        let mut reader = spill.open_batch(batch)?;
        let mut replayed = 0u64;
        while let Some((hash, payload)) = reader.load_next_entry()? {
            cancel.check()?;
            if self.batch_of(hash) != batch {
                return Err(SearchError::Internal("spill record in a foreign batch"));
            }
            let entry = FrontierEntry::decode(&payload)?;
            self.insert_resident(entry, hash);
            replayed += 1;
        }
        trace!(batch, replayed, "frontier.table.load_batch");
        Ok(())
    }

    /// Rewinds the full-sweep cursor to the first batch.
    pub fn restart_scan(&mut self, cancel: &CancelToken) -> Result<()> {
        self.load_batch(0, cancel)?;
        self.cursor = 0;
        Ok(())
    }

    /// Next live entry of the full sweep, advancing across spilled
    /// batches as the resident one is exhausted.
    pub fn next_live(&mut self, cancel: &CancelToken) -> Result<Option<(u32, FrontierEntry)>> {
        loop {
            cancel.check()?;
            if let Some(found) = self.next_in_resident() {
                return Ok(Some(found));
            }
            if self.resident_batch + 1 >= self.nbatches {
                return Ok(None);
            }
            let next = self.resident_batch + 1;
            self.load_batch(next, cancel)?;
        }
    }

    /// Next live entry of the resident batch only; batch advancement is
    /// the caller's business (the coordinator's `NEED_BATCH` step).
    pub fn next_in_resident(&mut self) -> Option<(u32, FrontierEntry)> {
        while self.cursor < self.slots.len() {
            let node = &self.slots[self.cursor];
            self.cursor += 1;
            if let Some(entry) = &node.entry {
                return Some((node.hash, entry.clone()));
            }
        }
        None
    }

    /// Live entries of the resident bucket matching `hash` and `vertex`.
    pub fn probe(&self, hash: u32, vertex: VertexId) -> impl Iterator<Item = &FrontierEntry> {
        let mut slot = self.buckets[self.bucket_of(hash)];
        std::iter::from_fn(move || {
            while let Some(idx) = slot {
                let node = &self.slots[idx as usize];
                slot = node.next;
                if node.hash != hash {
                    continue;
                }
                if let Some(entry) = &node.entry {
                    if entry.vertex == vertex {
                        return Some(entry);
                    }
                }
            }
            None
        })
    }

    /// Releases all memory and spill files. Statistics are zeroed too;
    /// callers that aggregate them must absorb `stats()` first.
    pub fn destroy(&mut self) {
        self.reset();
        self.total_paths = 0;
        self.total_markers = 0;
        self.index.clear();
        self.stats = TableStats::default();
        self.spill = None;
    }

    /// Live path entries across the whole frontier, independent of which
    /// batch is resident.
    pub fn path_count(&self) -> u64 {
        self.total_paths
    }

    /// Live marker entries across the whole frontier.
    pub fn marker_count(&self) -> u64 {
        self.total_markers
    }

    /// Current resident footprint in bytes.
    pub fn mem_bytes(&self) -> usize {
        self.mem_bytes
    }

    /// Highest resident footprint observed.
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }

    /// Batch partition count.
    pub fn nbatches(&self) -> usize {
        self.nbatches
    }

    /// Bucket count.
    pub fn nbuckets(&self) -> usize {
        self.nbuckets
    }

    /// Index of the batch whose entries are resident.
    pub fn resident_batch(&self) -> usize {
        self.resident_batch
    }

    /// Batch index `hash` maps to under this table's geometry.
    pub fn batch_for_hash(&self, hash: u32) -> usize {
        self.batch_of(hash)
    }

    /// Whether batch growth is still permitted.
    pub fn growth_enabled(&self) -> bool {
        self.growth_enabled
    }

    /// Records currently held across the table's spill files.
    pub fn spill_records(&self) -> u64 {
        self.spill.as_ref().map(SpillStore::total_records).unwrap_or(0)
    }

    /// Cumulative insert statistics.
    pub fn stats(&self) -> TableStats {
        self.stats
    }
}
