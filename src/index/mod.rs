//! The persistent inverted index.
//!
//! An index is a set of immutable segments named by a commit point. Writes go
//! to the [`writer::IndexWriter`]'s buffer and become a new segment plus a new
//! commit point on commit; reads go through an [`reader::IndexReader`], which
//! is a point-in-time view of one commit point.
//!
//! - [`segment`] - Segment contents and their on-disk encoding
//! - [`commit`] - Commit points (`segments_<gen>.json`)
//! - [`writer`] - Write buffer, commit and merge
//! - [`reader`] - Snapshot of committed segments

pub mod commit;
pub mod reader;
pub mod segment;
pub mod writer;

pub use commit::{CommitPoint, SegmentMeta};
pub use reader::{IndexReader, SegmentReader};
pub use segment::{Posting, SegmentData};
pub use writer::IndexWriter;

/// Location of a document inside a snapshot: segment ordinal and the
/// document number within that segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct DocAddress {
    pub segment: u32,
    pub doc: u32,
}

impl DocAddress {
    pub fn new(segment: u32, doc: u32) -> Self {
        DocAddress { segment, doc }
    }
}
