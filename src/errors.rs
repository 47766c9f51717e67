use std::io;
use thiserror::Error;

/// Errors from the on-disk postings store of a single segment.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store file: {path}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {bytes} bytes to store at position {position}")]
    WriteFailed {
        position: u64,
        bytes: u64,
        #[source]
        source: io::Error,
    },

    #[error("read position {position} is beyond store size {size}")]
    ReadBeyondEnd { position: u64, size: u64 },

    #[error("corrupted record at position {position}: {reason}")]
    CorruptedRecord { position: u64, reason: String },

    #[error("memory mapping failed for size {size}")]
    MmapFailed {
        size: u64,
        #[source]
        source: io::Error,
    },

    #[error("store has no room for {needed} more bytes ({used}/{capacity} used)")]
    OutOfSpace {
        needed: u64,
        used: u64,
        capacity: u64,
    },
}

/// Errors from a single segment (postings store + label posting lists).
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("segment already exists at {path}")]
    AlreadyExists { path: String },

    #[error("segment does not exist at {path}")]
    NotFound { path: String },

    #[error("local doc id {local_doc_id} out of range (segment has {num_docs} docs)")]
    LocalDocIdOutOfRange { local_doc_id: u32, num_docs: u64 },

    #[error("failed to read or write label sidecar at {path}")]
    LabelIo {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to (de)serialize label sidecar at {path}")]
    LabelCodec {
        path: String,
        #[source]
        source: bincode2::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the index coordinator: lifecycle, ingestion, label routing, queries.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("index already exists at base path {base}")]
    AlreadyExists { base: String },

    #[error("no index found at base path {base}")]
    NotFound { base: String },

    #[error("no segment owns global doc id {global_doc_id}")]
    DocNotFound { global_doc_id: u64 },

    #[error(
        "entry needing {needed_bytes} bytes does not fit even in a freshly created segment (capacity {capacity_bytes} bytes)"
    )]
    FreshSegmentTooSmall {
        needed_bytes: u64,
        capacity_bytes: u64,
    },

    #[error("segment array growth failed: requested capacity for {requested} segments")]
    OutOfMemory { requested: usize },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("segment error: {0}")]
    Segment(#[from] SegmentError),
}

impl CoordinatorError {
    /// Whether retrying the same call again might succeed without caller changes.
    ///
    /// Used by callers deciding whether to retry ingestion after a transient I/O
    /// blip versus surfacing a logic error (e.g. `FreshSegmentTooSmall`) to the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoordinatorError::Io(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type SegmentResult<T> = Result<T, SegmentError>;
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
