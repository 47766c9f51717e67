//! The query driver: resumable, bounded-batch iteration across segments in
//! reverse-chronological (newest-segment-first) order.
//!
//! Ported from the original `wp_index_run_query` cursor walk (see
//! `examples/original_source/index.c` in the retrieval pack), re-architected per
//! spec.md 9's redesign note: the two magic sentinel values (`SEGMENT_UNINITIALIZED`,
//! `SEGMENT_DONE`) become a tagged [`CursorState`] instead of numbers overloading the
//! segment-index space.

use super::Index;
use crate::errors::CoordinatorResult;
use crate::segment::search::{self, SegmentSearchState};
use tracing::{debug, instrument};

/// Where a query's resumable walk across segments currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Before the first `run_query` call, or after `teardown_query`.
    Uninitialized,
    /// Currently draining segment `k` (newest-first, so this counts down to 0).
    At(usize),
    /// Every segment has been drained; further `run_query` calls return nothing.
    Done,
}

/// A single-term query plus the cursor state that makes it resumable across
/// `run_query` calls. Analogous to spec.md's "Query Cursor" attached to a query
/// object.
pub struct Query {
    term: String,
    cursor: CursorState,
    state: Option<SegmentSearchState>,
}

impl Query {
    pub fn new(term: impl Into<String>) -> Self {
        Query {
            term: term.into(),
            cursor: CursorState::Uninitialized,
            state: None,
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }
}

/// Default buffer size `count_results` drives `run_query` with.
const COUNT_BATCH_SIZE: usize = 1024;

impl Index {
    /// Resets `query`'s cursor without touching any segment state. Idempotent.
    pub fn setup_query(&self, query: &mut Query) {
        if let Some(state) = query.state.take() {
            search::release_search_state(state);
        }
        query.cursor = CursorState::Uninitialized;
    }

    /// Releases any in-flight per-segment search state and resets the cursor to
    /// `Uninitialized`. A no-op if the cursor is already `Uninitialized` or `Done`.
    pub fn teardown_query(&self, query: &mut Query) {
        self.setup_query(query);
    }

    /// Fills at most `max_results` global doc ids. A result count below
    /// `max_results` means the query is exhausted; the client should call again
    /// otherwise.
    #[instrument(skip(self, query), fields(term = %query.term, max_results))]
    pub fn run_query(
        &self,
        query: &mut Query,
        max_results: usize,
    ) -> CoordinatorResult<Vec<u64>> {
        let mut results = Vec::with_capacity(max_results);
        if self.segments.is_empty() {
            return Ok(results);
        }

        if matches!(query.cursor, CursorState::Uninitialized) {
            let top = self.segments.len() - 1;
            query.state = Some(self.segments[top].search(&query.term));
            query.cursor = CursorState::At(top);
            debug!(segment = top, "initialized search state");
        }

        while results.len() < max_results {
            let CursorState::At(idx) = query.cursor else {
                break;
            };
            let Some(mut state) = query.state.take() else {
                break;
            };

            let want = max_results - results.len();
            let got = search::run_query_on_segment(&mut state, want);
            let got_len = got.len();

            for local_doc_id in got {
                results.push(self.offsets[idx] + local_doc_id as u64);
            }

            if got_len < want {
                search::release_search_state(state);

                if idx > 0 {
                    let next = idx - 1;
                    query.state = Some(self.segments[next].search(&query.term));
                    query.cursor = CursorState::At(next);
                    debug!(segment = next, "advanced search state");
                } else {
                    query.cursor = CursorState::Done;
                    debug!("query exhausted");
                }
            } else {
                query.state = Some(state);
            }
        }

        Ok(results)
    }

    /// Drives `run_query` to exhaustion, summing result counts, then tears down.
    pub fn count_results(&self, query: &mut Query) -> CoordinatorResult<u64> {
        self.setup_query(query);
        let mut total = 0u64;
        loop {
            let batch = self.run_query(query, COUNT_BATCH_SIZE)?;
            let got = batch.len();
            total += got as u64;
            if got < COUNT_BATCH_SIZE {
                break;
            }
        }
        self.teardown_query(query);
        Ok(total)
    }
}
