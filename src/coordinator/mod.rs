//! The index coordinator: composes a sequence of append-only on-disk segments
//! into one logical index with a monotonic global document-id space.
//!
//! Ported from `wp_index_*` in the original source (`examples/original_source/index.c`
//! in the retrieval pack) and restructured after the teacher's `storage::log::Log`,
//! which plays the identical role (segments + offsets + rotation) for a plain
//! commit log rather than a labeled postings index.

pub mod query;

use crate::entry::Entry;
use crate::errors::{CoordinatorError, CoordinatorResult};
use crate::segment::{Segment, SegmentConfig};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Hard ceiling on how many segments `load` will discover before it stops
/// looking. A gap in the numbering also stops the scan, whichever comes first.
/// Deliberately generous: spec.md documents this as truncation behavior for
/// pathologically large indices, not a bug to work around.
pub const MAX_SEGMENTS: usize = 4096;

pub(crate) fn segment_path(base_path: &str, n: usize) -> PathBuf {
    PathBuf::from(format!("{base_path}{n}"))
}

/// A logical full-text index, physically sharded across fixed-capacity segments.
pub struct Index {
    base_path: String,
    segments: Vec<Segment>,
    offsets: Vec<u64>,
    config: SegmentConfig,
    open: bool,
}

impl Index {
    /// Creates a fresh index at `base_path`, instantiating segment 0. Fails if a
    /// segment already exists there.
    #[instrument(skip(config), fields(base_path))]
    pub fn create(base_path: impl Into<String>, config: SegmentConfig) -> CoordinatorResult<Self> {
        let base_path = base_path.into();
        let path0 = segment_path(&base_path, 0);
        if Segment::exists(&path0) {
            return Err(CoordinatorError::AlreadyExists { base: base_path });
        }

        let segment0 = Segment::create(&path0, &config)?;
        info!(base = %base_path, "created index");
        Ok(Index {
            base_path,
            segments: vec![segment0],
            offsets: vec![0],
            config,
            open: true,
        })
    }

    /// Loads an index from `base_path`, discovering segments `0, 1, 2, ...`
    /// consecutively until a gap or [`MAX_SEGMENTS`]. Fails if segment 0 is absent.
    #[instrument(skip(config), fields(base_path))]
    pub fn load(base_path: impl Into<String>, config: SegmentConfig) -> CoordinatorResult<Self> {
        let base_path = base_path.into();
        if !Segment::exists(segment_path(&base_path, 0)) {
            return Err(CoordinatorError::NotFound { base: base_path });
        }

        let mut segments = Vec::new();
        let mut offsets = Vec::new();

        while segments.len() < MAX_SEGMENTS {
            let n = segments.len();
            let path = segment_path(&base_path, n);
            if !Segment::exists(&path) {
                break;
            }

            let segment = Segment::load(&path)?;
            let offset = if n == 0 {
                0
            } else {
                offsets[n - 1] + segments[n - 1].num_docs()
            };

            debug!(segment = n, offset, "loaded segment");
            offsets.push(offset);
            segments.push(segment);
        }

        info!(base = %base_path, segments = segments.len(), "loaded index");
        Ok(Index {
            base_path,
            segments,
            offsets,
            config,
            open: true,
        })
    }

    /// Releases every segment's resources and marks the index closed. Idempotent.
    #[instrument(skip(self), fields(base_path = %self.base_path))]
    pub fn unload(&mut self) {
        if !self.open {
            return;
        }
        for segment in std::mem::take(&mut self.segments) {
            segment.unload();
        }
        self.open = false;
        info!("unloaded index");
    }

    /// Unloads if still open, then drops the index. Provided for parity with
    /// spec.md's explicit `free`; in Rust simply dropping an `Index` has the same
    /// effect via its `Drop` impl.
    pub fn free(mut self) {
        self.unload();
    }

    /// Removes every on-disk segment belonging to `base_path`. Operates purely on
    /// paths; does not require a loaded index.
    pub fn delete(base_path: &str) -> CoordinatorResult<()> {
        let mut n = 0;
        while Segment::exists(segment_path(base_path, n)) {
            Segment::delete(segment_path(base_path, n))?;
            n += 1;
        }
        Ok(())
    }

    fn tail_index(&self) -> usize {
        self.segments.len() - 1
    }

    /// Writes `entry` into the tail segment, rolling over to a fresh segment
    /// first if it doesn't fit. Returns the newly assigned global doc id.
    #[instrument(skip(self, entry))]
    pub fn add_entry(&mut self, entry: &Entry) -> CoordinatorResult<u64> {
        self.ensure_room_in_tail(entry)?;

        let tail = self.tail_index();
        let local_doc_id = self.segments[tail].grab_docid();
        self.segments[tail].write_entry(local_doc_id, entry)?;

        let global_doc_id = self.offsets[tail] + local_doc_id as u64;
        info!(global_doc_id, segment = tail, "added entry");
        Ok(global_doc_id)
    }

    /// Ensures the tail segment has room for `entry`, rolling over once if not.
    /// A second failure against a freshly created segment is a fatal logic error:
    /// the entry can never be written, no matter how many segments we create.
    fn ensure_room_in_tail(&mut self, entry: &Entry) -> CoordinatorResult<()> {
        let tail = self.tail_index();
        let postings_bytes = self.segments[tail].entry_size(entry);
        if self.segments[tail].ensure_fit(postings_bytes, 0) {
            return Ok(());
        }

        info!(segment = tail, "tail segment full, rolling over");
        self.rollover()?;

        let new_tail = self.tail_index();
        let postings_bytes = self.segments[new_tail].entry_size(entry);
        if !self.segments[new_tail].ensure_fit(postings_bytes, 0) {
            return Err(CoordinatorError::FreshSegmentTooSmall {
                needed_bytes: postings_bytes,
                capacity_bytes: self.config.capacity_bytes,
            });
        }
        Ok(())
    }

    /// Creates a new tail segment and derives its offset from the previous tail's
    /// final doc count, updated exactly once here since the previous tail never
    /// receives writes again.
    fn rollover(&mut self) -> CoordinatorResult<()> {
        let prev = self.tail_index();
        let new_offset = self.offsets[prev] + self.segments[prev].num_docs();
        let new_idx = self.segments.len();

        let path = segment_path(&self.base_path, new_idx);
        let segment = Segment::create(&path, &self.config)?;

        self.segments.push(segment);
        self.offsets.push(new_offset);
        info!(new_idx, new_offset, "rolled over to new segment");
        Ok(())
    }

    /// Locates the segment owning `global_doc_id` by scanning from the newest
    /// segment down — recently ingested documents are more likely to be labeled
    /// soon after, so this finds them in expected O(1) rather than needing a
    /// binary search over at most `MAX_SEGMENTS` entries.
    ///
    /// An id past the last segment's highest issued doc id belongs to no segment
    /// at all (it was never assigned), so the offset check alone isn't enough —
    /// the candidate local id must also fall within that segment's actual doc count.
    fn owning_segment(&self, global_doc_id: u64) -> CoordinatorResult<(usize, u32)> {
        for idx in (0..self.segments.len()).rev() {
            if global_doc_id > self.offsets[idx] {
                let local_doc_id = global_doc_id - self.offsets[idx];
                if local_doc_id <= self.segments[idx].num_docs() {
                    return Ok((idx, local_doc_id as u32));
                }
                break;
            }
        }
        Err(CoordinatorError::DocNotFound { global_doc_id })
    }

    pub fn add_label(&mut self, label: &str, global_doc_id: u64) -> CoordinatorResult<()> {
        let (idx, local_doc_id) = self.owning_segment(global_doc_id)?;
        self.segments[idx].add_label(label, local_doc_id)?;
        Ok(())
    }

    pub fn remove_label(&mut self, label: &str, global_doc_id: u64) -> CoordinatorResult<()> {
        let (idx, local_doc_id) = self.owning_segment(global_doc_id)?;
        self.segments[idx].remove_label(label, local_doc_id)?;
        Ok(())
    }

    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_docs()).sum()
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn dumpinfo(&self, sink: &mut impl std::io::Write) -> std::io::Result<()> {
        writeln!(sink, "index has {} segments", self.segments.len())?;
        for (i, segment) in self.segments.iter().enumerate() {
            writeln!(sink, "\nsegment {i}:")?;
            segment.dumpinfo(sink)?;
        }
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if self.open {
            self.unload();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn create_rejects_existing_base() {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");
        Index::create(&base, SegmentConfig::default()).unwrap();

        assert!(matches!(
            Index::create(&base, SegmentConfig::default()),
            Err(CoordinatorError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn load_rejects_missing_base() {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");

        assert!(matches!(
            Index::load(&base, SegmentConfig::default()),
            Err(CoordinatorError::NotFound { .. })
        ));
    }

    #[test]
    fn add_entry_ids_are_sequential_from_one() -> CoordinatorResult<()> {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");
        let mut index = Index::create(&base, SegmentConfig::default())?;

        for expected in 1..=3u64 {
            let id = index.add_entry(&Entry::from_terms(["x"]))?;
            assert_eq!(id, expected);
        }
        assert_eq!(index.num_docs(), 3);
        Ok(())
    }

    #[test]
    fn create_then_load_agree_on_offsets_and_doc_count() -> CoordinatorResult<()> {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");

        {
            let mut index = Index::create(&base, SegmentConfig::default())?;
            for _ in 0..3 {
                index.add_entry(&Entry::from_terms(["x"]))?;
            }
        }

        let reloaded = Index::load(&base, SegmentConfig::default())?;
        assert_eq!(reloaded.num_docs(), 3);
        assert_eq!(reloaded.num_segments(), 1);
        Ok(())
    }

    #[test]
    fn rollover_when_capacity_is_exhausted() -> CoordinatorResult<()> {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");

        // "x" as a single-position posting takes 8 (record overhead) + 4
        // (postings count) + 4 (term len) + 1 (term byte) + 4 (position count)
        // + 4 (one position) = 25 bytes; size two entries in, reject the third.
        let config = SegmentConfig { capacity_bytes: 50 };
        let mut index = Index::create(&base, config)?;

        let e1 = index.add_entry(&Entry::from_terms(["x"]))?;
        let e2 = index.add_entry(&Entry::from_terms(["x"]))?;
        assert_eq!((e1, e2), (1, 2));
        assert_eq!(index.num_segments(), 1);

        let e3 = index.add_entry(&Entry::from_terms(["x"]))?;
        assert_eq!(e3, 3);
        assert_eq!(index.num_segments(), 2);

        drop(index);
        let reloaded = Index::load(&base, config)?;
        assert_eq!(reloaded.num_docs(), 3);
        assert_eq!(reloaded.num_segments(), 2);
        Ok(())
    }

    #[test]
    fn label_routing_lands_in_the_owning_segment_after_rollover() -> CoordinatorResult<()> {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");
        let config = SegmentConfig { capacity_bytes: 50 };
        let mut index = Index::create(&base, config)?;

        index.add_entry(&Entry::from_terms(["x"]))?; // doc 1, segment 0
        index.add_entry(&Entry::from_terms(["x"]))?; // doc 2, segment 0
        index.add_entry(&Entry::from_terms(["x"]))?; // doc 3, segment 1 (rollover)

        index.add_label("starred", 2)?;
        index.add_label("starred", 3)?;

        assert!(matches!(
            index.add_label("starred", 99),
            Err(CoordinatorError::DocNotFound { global_doc_id: 99 })
        ));
        assert!(matches!(
            index.add_label("starred", 0),
            Err(CoordinatorError::DocNotFound { global_doc_id: 0 })
        ));
        Ok(())
    }

    #[test]
    fn delete_removes_every_segment() -> CoordinatorResult<()> {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");
        let config = SegmentConfig { capacity_bytes: 50 };
        {
            let mut index = Index::create(&base, config)?;
            for _ in 0..3 {
                index.add_entry(&Entry::from_terms(["x"]))?;
            }
        }
        assert_eq!(Index::load(&base, config)?.num_segments(), 2);

        Index::delete(&base)?;

        assert!(matches!(
            Index::load(&base, config),
            Err(CoordinatorError::NotFound { .. })
        ));
        Index::create(&base, config)?;
        Ok(())
    }

    #[test]
    fn unload_is_idempotent() -> CoordinatorResult<()> {
        let dir = TempDir::new().unwrap();
        let base = base(&dir, "t1_");
        let mut index = Index::create(&base, SegmentConfig::default())?;
        index.unload();
        index.unload();
        Ok(())
    }
}
