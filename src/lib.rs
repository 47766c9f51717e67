pub mod coordinator;
pub mod entry;
pub mod errors;
pub mod segment;

pub use coordinator::query::{CursorState, Query};
pub use coordinator::{Index, MAX_SEGMENTS};
pub use entry::{Entry, Posting};
pub use segment::SegmentConfig;
