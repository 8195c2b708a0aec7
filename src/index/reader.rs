//! Point-in-time view of a committed generation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::{OnionIndexError, Result};
use crate::index::DocAddress;
use crate::index::commit::{CommitPoint, SegmentMeta};
use crate::index::segment::{FieldIndex, Posting, SegmentData};
use crate::schema::{FieldValue, SearchField};
use crate::storage::FileStorage;

/// A decoded, immutable segment.
#[derive(Debug)]
pub struct SegmentReader {
    name: String,
    data: SegmentData,
}

impl SegmentReader {
    pub fn new(name: impl Into<String>, data: SegmentData) -> Self {
        SegmentReader {
            name: name.into(),
            data,
        }
    }

    /// Map and decode a segment file.
    pub fn open(storage: &FileStorage, name: &str) -> Result<Self> {
        let map = storage
            .map(name)
            .map_err(|e| OnionIndexError::index_unavailable(format!("segment {name}: {e}")))?;
        let data = SegmentData::decode(&map).map_err(|e| e.during(name))?;
        debug!(segment = name, docs = data.doc_count(), "opened segment");
        Ok(SegmentReader::new(name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &SegmentData {
        &self.data
    }

    pub fn doc_count(&self) -> u32 {
        self.data.doc_count()
    }

    pub fn field(&self, field: &str) -> Option<&FieldIndex> {
        self.data.field(field)
    }

    pub fn postings(&self, field: &str, term: &str) -> &[Posting] {
        self.field(field)
            .and_then(|index| index.postings(term))
            .unwrap_or(&[])
    }
}

/// A segment together with its deletions in one generation.
#[derive(Debug, Clone)]
pub struct LiveSegment {
    pub reader: Arc<SegmentReader>,
    pub meta: SegmentMeta,
}

impl LiveSegment {
    pub fn is_deleted(&self, doc: u32) -> bool {
        self.meta.is_deleted(doc)
    }

    /// Postings of a term, deleted documents excluded.
    pub fn live_postings<'a>(
        &'a self,
        field: &str,
        term: &str,
    ) -> impl Iterator<Item = &'a Posting> + 'a {
        self.reader
            .postings(field, term)
            .iter()
            .filter(move |posting| !self.is_deleted(posting.doc))
    }
}

/// Collection statistics for one field, live documents only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldStats {
    /// Documents that have the field.
    pub doc_count: u64,
    /// Total tokens of the field.
    pub total_terms: u64,
    pub avg_length: f32,
}

/// Read-only view of one commit point.
#[derive(Debug, Clone)]
pub struct IndexReader {
    commit: CommitPoint,
    segments: Vec<LiveSegment>,
}

impl IndexReader {
    /// Open a commit point. Segments already loaded by `previous` are shared
    /// instead of being read again.
    pub fn open(
        storage: &FileStorage,
        commit: CommitPoint,
        previous: Option<&IndexReader>,
    ) -> Result<Self> {
        let loaded: HashMap<&str, &Arc<SegmentReader>> = previous
            .map(|reader| {
                reader
                    .segments
                    .iter()
                    .map(|s| (s.reader.name(), &s.reader))
                    .collect()
            })
            .unwrap_or_default();

        let mut segments = Vec::with_capacity(commit.segments.len());
        for meta in &commit.segments {
            let reader = match loaded.get(meta.name.as_str()) {
                Some(reader) => Arc::clone(reader),
                None => Arc::new(SegmentReader::open(storage, &meta.name)?),
            };
            if reader.doc_count() != meta.doc_count {
                return Err(OnionIndexError::index_unavailable(format!(
                    "segment {} holds {} documents, commit point expects {}",
                    meta.name,
                    reader.doc_count(),
                    meta.doc_count
                )));
            }
            segments.push(LiveSegment {
                reader,
                meta: meta.clone(),
            });
        }

        Ok(IndexReader { commit, segments })
    }

    /// Assemble a reader from segments that are already loaded.
    pub(crate) fn from_parts(commit: CommitPoint, segments: Vec<LiveSegment>) -> Self {
        IndexReader { commit, segments }
    }

    pub fn commit(&self) -> &CommitPoint {
        &self.commit
    }

    pub fn generation(&self) -> u64 {
        self.commit.generation
    }

    pub fn segments(&self) -> &[LiveSegment] {
        &self.segments
    }

    /// Live documents.
    pub fn num_docs(&self) -> u64 {
        self.commit.num_docs()
    }

    /// Documents including deleted ones.
    pub fn max_doc(&self) -> u64 {
        self.segments.iter().map(|s| s.meta.doc_count as u64).sum()
    }

    pub fn is_deleted(&self, address: DocAddress) -> bool {
        self.segments
            .get(address.segment as usize)
            .is_none_or(|s| s.is_deleted(address.doc))
    }

    /// Live documents containing the term.
    pub fn doc_freq(&self, field: &str, term: &str) -> u64 {
        self.segments
            .iter()
            .map(|s| s.live_postings(field, term).count() as u64)
            .sum()
    }

    pub fn field_stats(&self, field: &str) -> FieldStats {
        let mut stats = FieldStats::default();
        for segment in &self.segments {
            let Some(index) = segment.reader.field(field) else {
                continue;
            };
            for doc in 0..segment.meta.doc_count {
                if segment.is_deleted(doc) {
                    continue;
                }
                let length = index.length(doc);
                if length > 0 {
                    stats.doc_count += 1;
                    stats.total_terms += length as u64;
                }
            }
        }
        if stats.doc_count > 0 {
            stats.avg_length = stats.total_terms as f32 / stats.doc_count as f32;
        }
        stats
    }

    /// Live documents whose URL equals `url`, ignoring case.
    pub fn find_url(&self, url: &str) -> Vec<DocAddress> {
        let term = url.to_lowercase();
        let field = SearchField::Url.name();
        self.segments
            .iter()
            .enumerate()
            .flat_map(|(ordinal, segment)| {
                segment
                    .live_postings(field, &term)
                    .map(move |posting| DocAddress::new(ordinal as u32, posting.doc))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Stored fields of a document.
    pub fn stored_fields(&self, address: DocAddress) -> Option<BTreeMap<String, FieldValue>> {
        let segment = self.segments.get(address.segment as usize)?;
        if address.doc >= segment.meta.doc_count {
            return None;
        }
        Some(segment.reader.data().stored_fields(address.doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use tempfile::TempDir;

    fn write_segment(storage: &FileStorage, name: &str, docs: &[Document]) -> SegmentMeta {
        let mut data = SegmentData::default();
        for doc in docs {
            data.add_document(&doc.to_indexable().unwrap());
        }
        storage.write_new(name, &data.encode().unwrap()).unwrap();
        SegmentMeta::new(name, data.doc_count())
    }

    fn fixture() -> (TempDir, FileStorage, CommitPoint) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let first = write_segment(
            &storage,
            "one.seg",
            &[
                Document::page("http://A.onion/1", "a.onion", "Hello", "world wide"),
                Document::page("http://a.onion/2", "a.onion", "Other", "nothing here"),
            ],
        );
        let mut second = write_segment(
            &storage,
            "two.seg",
            &[Document::page("http://b.onion/", "b.onion", "B", "world")],
        );
        second.deleted = vec![0];
        let commit = CommitPoint::initial().next(vec![first, second]);
        (dir, storage, commit)
    }

    #[test]
    fn test_open_and_counts() {
        let (_dir, storage, commit) = fixture();
        let reader = IndexReader::open(&storage, commit, None).unwrap();

        assert_eq!(reader.generation(), 2);
        assert_eq!(reader.num_docs(), 2);
        assert_eq!(reader.max_doc(), 3);
        assert_eq!(reader.doc_freq("PageContent", "world"), 1);
        assert!(reader.is_deleted(DocAddress::new(1, 0)));
        assert!(reader.is_deleted(DocAddress::new(5, 0)));

        let stats = reader.field_stats("PageContent");
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.total_terms, 4);
        assert_eq!(stats.avg_length, 2.0);
    }

    #[test]
    fn test_find_url_ignores_case() {
        let (_dir, storage, commit) = fixture();
        let reader = IndexReader::open(&storage, commit, None).unwrap();

        assert_eq!(reader.find_url("HTTP://a.ONION/1"), vec![DocAddress::new(0, 0)]);
        assert!(reader.find_url("http://b.onion/").is_empty());

        let stored = reader.stored_fields(DocAddress::new(0, 0)).unwrap();
        assert_eq!(stored.get("URL"), Some(&FieldValue::from("http://A.onion/1")));
    }

    #[test]
    fn test_reopen_shares_segments() {
        let (_dir, storage, commit) = fixture();
        let first = IndexReader::open(&storage, commit.clone(), None).unwrap();
        let second = IndexReader::open(&storage, commit.next(commit.segments.clone()), Some(&first))
            .unwrap();

        assert!(Arc::ptr_eq(&first.segments()[0].reader, &second.segments()[0].reader));
    }

    #[test]
    fn test_missing_segment_is_unavailable() {
        let (_dir, storage, commit) = fixture();
        storage.delete_file("two.seg").unwrap();

        let result = IndexReader::open(&storage, commit, None);
        assert!(matches!(result, Err(OnionIndexError::IndexUnavailable(_))));
    }
}
