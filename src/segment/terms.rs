//! Per-segment term dictionary: term -> local doc ids that contain it.
//!
//! Persisted the same way as [`crate::segment::labels::LabelIndex`] — a single
//! `bincode2`-encoded sidecar file, rewritten on every ingested entry. A segment's
//! postings store never needs random access into this dictionary at write time
//! (append-only), only at query time, so an in-memory map reloaded on open is
//! enough; there's no need for the on-disk offset/length table the indexer example
//! repo uses for a dictionary rebuilt across many flushes.

use crate::errors::SegmentError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct TermTable {
    postings: HashMap<String, Vec<u32>>,
    /// Highest local doc id ever recorded, i.e. this segment's document count.
    max_doc_id: u64,
}

pub struct TermDictionary {
    path: PathBuf,
    table: TermTable,
}

impl TermDictionary {
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
            Err(_) => TermTable::default(),
        };
        Ok(TermDictionary { path, table })
    }

    pub fn record(&mut self, local_doc_id: u32, terms: &[String]) -> Result<(), SegmentError> {
        for term in terms {
            self.table
                .postings
                .entry(term.clone())
                .or_default()
                .push(local_doc_id);
        }
        self.table.max_doc_id = self.table.max_doc_id.max(local_doc_id as u64);
        self.flush()
    }

    pub fn postings_for(&self, term: &str) -> &[u32] {
        self.table
            .postings
            .get(term)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The number of documents ever recorded in this segment (its highest issued
    /// local doc id), used to recover `Segment::num_docs` on reload.
    pub fn max_doc_id(&self) -> u64 {
        self.table.max_doc_id
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
        Ok(())
    }
}
