//! Append-only, fixed-capacity postings store for a single segment.
//!
//! Records are length-prefixed (`[8-byte length][record bytes]`), the same on-disk
//! shape the teacher's log store uses. Unlike a plain log, a segment's postings
//! store is sized once at creation (spec.md 4.2: "segment capacity is fixed at
//! creation") so `ensure_fit` can answer without ever growing the memory map.
//!
//! Layout: `[8-byte used-bytes header][capacity bytes of record data]`.

use crate::errors::{StoreError, StoreResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, instrument};

const HEADER_WIDTH: u64 = 8;
const LEN_WIDTH: u64 = 8;

/// Bytes of framing `append` adds on top of the record itself. Callers sizing an
/// entry against `Segment::ensure_fit` must budget for this too.
pub const RECORD_OVERHEAD: u64 = LEN_WIDTH;

pub struct Store {
    mmap: MmapMut,
    capacity: u64,
    used: u64,
}

impl Store {
    /// Creates a fresh store backed by a file sized for `capacity` bytes of records.
    #[instrument(skip_all, fields(path = ?path.as_ref(), capacity))]
    pub fn create(path: impl AsRef<Path>, capacity: u64) -> StoreResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| StoreError::OpenFailed {
                path: path.display().to_string(),
                source,
            })?;

        file.set_len(HEADER_WIDTH + capacity)
            .map_err(|source| StoreError::OpenFailed {
                path: path.display().to_string(),
                source,
            })?;

        let mut mmap =
            unsafe { MmapOptions::new().map_mut(&file) }.map_err(|source| StoreError::MmapFailed {
                size: HEADER_WIDTH + capacity,
                source,
            })?;
        mmap[0..HEADER_WIDTH as usize].copy_from_slice(&0u64.to_le_bytes());

        debug!(capacity, "created postings store");
        Ok(Store {
            mmap,
            capacity,
            used: 0,
        })
    }

    /// Reopens an existing store, trusting the size recorded in its header.
    #[instrument(skip_all, fields(path = ?path.as_ref()))]
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| StoreError::OpenFailed {
                path: path.display().to_string(),
                source,
            })?;

        let file_len = file
            .metadata()
            .map_err(|source| StoreError::OpenFailed {
                path: path.display().to_string(),
                source,
            })?
            .len();

        let mmap = unsafe { MmapOptions::new().map_mut(&file) }
            .map_err(|source| StoreError::MmapFailed { size: file_len, source })?;

        let mut used_bytes = [0u8; 8];
        used_bytes.copy_from_slice(&mmap[0..HEADER_WIDTH as usize]);
        let used = u64::from_le_bytes(used_bytes);
        let capacity = file_len - HEADER_WIDTH;

        debug!(capacity, used, "reopened postings store");
        Ok(Store {
            mmap,
            capacity,
            used,
        })
    }

    /// Appends a length-prefixed record and returns the position it was written at.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let total_len = LEN_WIDTH + data.len() as u64;
        if self.used + total_len > self.capacity {
            return Err(StoreError::OutOfSpace {
                needed: total_len,
                used: self.used,
                capacity: self.capacity,
            });
        }

        let position = self.used;
        let data_start = (HEADER_WIDTH + position) as usize;

        self.mmap[data_start..data_start + LEN_WIDTH as usize]
            .copy_from_slice(&(data.len() as u64).to_le_bytes());
        self.mmap[data_start + LEN_WIDTH as usize..data_start + total_len as usize]
            .copy_from_slice(data);

        self.used += total_len;
        self.mmap[0..HEADER_WIDTH as usize].copy_from_slice(&self.used.to_le_bytes());
        self.mmap
            .flush()
            .map_err(|source| StoreError::WriteFailed {
                position,
                bytes: total_len,
                source,
            })?;

        debug!(position, total_len, "appended record");
        Ok(position)
    }

    pub fn read(&self, position: u64) -> StoreResult<Vec<u8>> {
        if position >= self.used {
            return Err(StoreError::ReadBeyondEnd {
                position,
                size: self.used,
            });
        }

        let data_start = (HEADER_WIDTH + position) as usize;
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&self.mmap[data_start..data_start + LEN_WIDTH as usize]);
        let len = u64::from_le_bytes(len_bytes);

        let record_start = data_start + LEN_WIDTH as usize;
        let record_end = record_start + len as usize;
        if record_end as u64 > HEADER_WIDTH + self.capacity {
            return Err(StoreError::CorruptedRecord {
                position,
                reason: format!("record of length {len} runs past store capacity"),
            });
        }

        Ok(self.mmap[record_start..record_end].to_vec())
    }

    pub fn size(&self) -> u64 {
        self.used
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn remaining(&self) -> u64 {
        self.capacity - self.used
    }

    pub fn fits(&self, bytes: u64, reserve: u64) -> bool {
        self.used + bytes + reserve <= self.capacity
    }
}
