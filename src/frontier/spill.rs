//! Per-batch append-only spill log.
//!
//! Each non-resident batch of a frontier table gets a private file of
//! `(hash: u32, len: u32, bytes)` records, written through a buffered
//! appender and read back sequentially. The log is not durable and not
//! shared across searches; the owning temp directory removes every file
//! when the table drops.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::types::Result;

const RECORD_HDR_LEN: usize = 8;

/// Lazily created set of per-batch spill files inside one temp dir.
pub struct SpillStore {
    dir: TempDir,
    writers: Vec<Option<BufWriter<File>>>,
    records: Vec<u64>,
}

impl SpillStore {
    /// Creates an empty store rooted under `spill_root` (or the system
    /// temp dir when `None`).
    pub fn create(spill_root: Option<&Path>) -> Result<Self> {
        let dir = match spill_root {
            Some(root) => TempDir::new_in(root)?,
            None => TempDir::new()?,
        };
        debug!(dir = %dir.path().display(), "frontier.spill.create");
        Ok(Self {
            dir,
            writers: Vec::new(),
            records: Vec::new(),
        })
    }

    fn batch_path(&self, batch: usize) -> PathBuf {
        self.dir.path().join(format!("batch-{batch}.spill"))
    }

    /// Appends one `(hash, payload)` record to `batch`'s file.
    pub fn save_entry(&mut self, batch: usize, hash: u32, payload: &[u8]) -> Result<()> {
        if self.writers.len() <= batch {
            self.writers.resize_with(batch + 1, || None);
            self.records.resize(batch + 1, 0);
        }
        if self.writers[batch].is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.batch_path(batch))?;
            self.writers[batch] = Some(BufWriter::new(file));
        }
        let writer = self.writers[batch].as_mut().expect("writer just created");
        writer.write_all(&hash.to_be_bytes())?;
        writer.write_all(&(payload.len() as u32).to_be_bytes())?;
        writer.write_all(payload)?;
        self.records[batch] += 1;
        Ok(())
    }

    /// Records appended to `batch` so far.
    pub fn record_count(&self, batch: usize) -> u64 {
        self.records.get(batch).copied().unwrap_or(0)
    }

    /// Records currently held across all batch files.
    pub fn total_records(&self) -> u64 {
        self.records.iter().sum()
    }

    /// Rewrites every record into the batch `assign` maps its hash to.
    /// Called when the batch count grows, so that each record lives in
    /// exactly the file its hash currently partitions to.
    pub fn redistribute<F>(&mut self, assign: F) -> Result<()>
    where
        F: Fn(u32) -> usize,
    {
        let old_batches = self.writers.len();
        let mut sources = Vec::new();
        for batch in 0..old_batches {
            if let Some(writer) = self.writers[batch].as_mut() {
                writer.flush()?;
            }
            self.writers[batch] = None;
            let from = self.batch_path(batch);
            let moving = self.dir.path().join(format!("batch-{batch}.moving"));
            match std::fs::rename(&from, &moving) {
                Ok(()) => sources.push(moving),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.records.clear();
        debug!(batches = old_batches, "frontier.spill.redistribute");
        for source in sources {
            let mut reader = SpillReader {
                file: Some(BufReader::new(File::open(&source)?)),
            };
            while let Some((hash, payload)) = reader.load_next_entry()? {
                self.save_entry(assign(hash), hash, &payload)?;
            }
            std::fs::remove_file(&source)?;
        }
        Ok(())
    }

    /// Opens a sequential reader over `batch`'s records, flushing any
    /// pending appends first. A batch that never spilled reads as empty.
    pub fn open_batch(&mut self, batch: usize) -> Result<SpillReader> {
        if let Some(Some(writer)) = self.writers.get_mut(batch) {
            writer.flush()?;
        }
        let file = match File::open(self.batch_path(batch)) {
            Ok(file) => Some(BufReader::new(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        Ok(SpillReader { file })
    }
}

/// Sequential reader over one batch's spill records.
pub struct SpillReader {
    file: Option<BufReader<File>>,
}

impl SpillReader {
    /// Reads the next `(hash, payload)` record, or `None` at the end of
    /// the log.
    pub fn load_next_entry(&mut self) -> Result<Option<(u32, Vec<u8>)>> {
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };
        let mut header = [0u8; RECORD_HDR_LEN];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let hash = u32::from_be_bytes(header[0..4].try_into().expect("4-byte slice"));
        let len = u32::from_be_bytes(header[4..8].try_into().expect("4-byte slice")) as usize;
        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;
        Ok(Some((hash, payload)))
    }
}
