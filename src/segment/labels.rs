//! Per-segment label posting lists: late-bound tags on already-ingested documents.
//!
//! Persisted as a single `bincode2`-encoded sidecar file next to the segment's
//! postings store, following the segment-dictionary persistence idiom from
//! `juanmilkah-indexer::tree::flush_segment`. Rewritten wholesale on every mutation;
//! at the scale a single segment holds this is cheap and keeps the format simple.

use crate::errors::SegmentError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LabelTable {
    labels: HashMap<String, HashSet<u32>>,
}

pub struct LabelIndex {
    path: PathBuf,
    table: LabelTable,
}

impl LabelIndex {
    /// Loads the sidecar file if present, otherwise starts empty (a fresh segment
    /// has no labels yet and no file to load).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SegmentError> {
        let path = path.as_ref().to_path_buf();
        let table = match File::open(&path) {
            Ok(file) => {
                let mut reader = BufReader::new(file);
                bincode2::deserialize_from(&mut reader).map_err(|source| SegmentError::LabelCodec {
                    path: path.display().to_string(),
                    source,
                })?
            }
            Err(_) => LabelTable::default(),
        };

        Ok(LabelIndex { path, table })
    }

    pub fn add(&mut self, label: &str, local_doc_id: u32) -> Result<(), SegmentError> {
        self.table
            .labels
            .entry(label.to_string())
            .or_default()
            .insert(local_doc_id);
        self.flush()
    }

    pub fn remove(&mut self, label: &str, local_doc_id: u32) -> Result<(), SegmentError> {
        if let Some(docs) = self.table.labels.get_mut(label) {
            docs.remove(&local_doc_id);
            if docs.is_empty() {
                self.table.labels.remove(label);
            }
        }
        self.flush()
    }

    pub fn contains(&self, label: &str, local_doc_id: u32) -> bool {
        self.table
            .labels
            .get(label)
            .is_some_and(|docs| docs.contains(&local_doc_id))
    }

    pub fn labels_for(&self, local_doc_id: u32) -> Vec<&str> {
        self.table
            .labels
            .iter()
            .filter(|(_, docs)| docs.contains(&local_doc_id))
            .map(|(label, _)| label.as_str())
            .collect()
    }

    fn flush(&self) -> Result<(), SegmentError> {
        let file = File::create(&self.path).map_err(|source| SegmentError::LabelIo {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        bincode2::serialize_into(&mut writer, &self.table).map_err(|source| {
            SegmentError::LabelCodec {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        debug!(path = ?self.path, "flushed label sidecar");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_remove_and_reload_roundtrip() -> Result<(), SegmentError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0.labels");

        {
            let mut labels = LabelIndex::load(&path)?;
            labels.add("starred", 1)?;
            labels.add("starred", 2)?;
            labels.add("urgent", 2)?;
        }

        let mut reloaded = LabelIndex::load(&path)?;
        assert!(reloaded.contains("starred", 1));
        assert!(reloaded.contains("starred", 2));
        assert!(reloaded.contains("urgent", 2));
        assert!(!reloaded.contains("urgent", 1));

        reloaded.remove("starred", 1)?;
        assert!(!reloaded.contains("starred", 1));
        assert!(reloaded.contains("starred", 2));
        Ok(())
    }

    #[test]
    fn loading_missing_file_starts_empty() -> Result<(), SegmentError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.labels");
        let labels = LabelIndex::load(&path)?;
        assert!(!labels.contains("anything", 1));
        Ok(())
    }
}
