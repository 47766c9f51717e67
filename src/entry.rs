//! The payload ingestion writes into a segment.
//!
//! Tokenization, stemming, and field handling belong to the entry builder, which
//! sits outside this crate. `Entry` only carries what a segment needs to store and
//! what the query evaluator needs to match against: terms and the positions they
//! occur at.

/// One term's occurrences within a document, already tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub term: String,
    pub positions: Vec<u32>,
}

/// A document's tokens, ready to be written into a segment's postings region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub postings: Vec<Posting>,
}

impl Entry {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self { postings }
    }

    /// A convenience builder for tests and callers who only have term strings and
    /// don't care about positions within the document.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let postings = terms
            .into_iter()
            .enumerate()
            .map(|(i, term)| Posting {
                term: term.into(),
                positions: vec![i as u32],
            })
            .collect();
        Self { postings }
    }

    /// Number of bytes this entry will consume in a segment's postings region,
    /// before the store's own length-prefix framing.
    ///
    /// Mirrors [`crate::segment::encode_entry`]'s layout: a 4-byte postings count,
    /// then per posting a 4-byte term length, the term bytes, a 4-byte position
    /// count, and 4 bytes per position.
    pub fn size_in_postings_region(&self) -> u64 {
        4 + self
            .postings
            .iter()
            .map(|p| 4 + p.term.len() as u64 + 4 + 4 * p.positions.len() as u64)
            .sum::<u64>()
    }
}
