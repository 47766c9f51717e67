//! Per-segment query evaluator.
//!
//! A stand-in for spec.md's external evaluator, grounded in the same
//! lookup-by-scan idiom the teacher uses to locate segments for an offset, applied
//! here to a segment's term postings instead. A query is a single term; matching
//! documents are handed back in descending local-doc-id order so that, once the
//! coordinator walks segments newest-first, the overall result stream reads
//! reverse-chronological (spec.md 4.4).

/// Cursor over one segment's matches for the query term. Owned by the coordinator's
/// per-segment search state while that segment is being drained.
pub struct SegmentSearchState {
    matches: Vec<u32>,
    next: usize,
}

/// Opens a cursor over `term`'s postings in this segment's term dictionary.
pub fn init_search_state(term_postings: &[u32]) -> SegmentSearchState {
    let mut matches = term_postings.to_vec();
    matches.sort_unstable_by(|a, b| b.cmp(a));
    SegmentSearchState { matches, next: 0 }
}

/// Hands back up to `want` further local doc ids from this segment's matches.
pub fn run_query_on_segment(state: &mut SegmentSearchState, want: usize) -> Vec<u32> {
    let end = (state.next + want).min(state.matches.len());
    let slice = state.matches[state.next..end].to_vec();
    state.next = end;
    slice
}

/// Releases the per-segment search state. Matching is pure in-memory bookkeeping
/// here, so this is a no-op beyond dropping `state`, but the call exists to mirror
/// spec.md's `release_search_state` / `result_free` resource-discipline contract.
pub fn release_search_state(state: SegmentSearchState) {
    drop(state);
}
