//! The index writer.
//!
//! Adds and deletions are appended to an ordered buffer and applied in that
//! order on [`IndexWriter::commit`]. A deletion removes every committed
//! document with the URL and every add buffered before it; an add buffered
//! after a deletion of the same URL survives.
//!
//! `commit` and `maybe_merge` produce new generations and must be serialized
//! by the caller. Buffering methods may be called concurrently with them.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::Document;
use crate::error::{OnionIndexError, Result};
use crate::index::commit::{CommitPoint, SegmentMeta};
use crate::index::reader::{IndexReader, LiveSegment, SegmentReader};
use crate::index::segment::{SEGMENT_EXTENSION, SegmentData};
use crate::schema::{IndexableField, SearchField};
use crate::storage::FileStorage;

/// A buffered mutation.
#[derive(Debug, Clone)]
enum PendingOp {
    Add {
        fields: Vec<IndexableField>,
        /// Lower-cased URL, if the document has one.
        url: Option<String>,
    },
    Delete(String),
}

#[derive(Debug, Default)]
struct WriteBuffer {
    ops: Vec<PendingOp>,
    closed: bool,
}

/// Writer statistics since open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub docs_added: u64,
    pub deletes_requested: u64,
    pub commits: u64,
    pub merges: u64,
}

/// Buffers mutations and commits them as new generations.
#[derive(Debug)]
pub struct IndexWriter {
    storage: FileStorage,
    buffer: Mutex<WriteBuffer>,
    stats: Mutex<WriterStats>,
    merge_factor: usize,
}

impl IndexWriter {
    /// Open a writer on `storage` in create-or-append mode.
    ///
    /// Returns the writer and the authoritative commit point. A directory
    /// without a commit point gets an empty first generation.
    pub fn open(storage: FileStorage, merge_factor: usize) -> Result<(Self, CommitPoint)> {
        let commit = match CommitPoint::read_latest(&storage)? {
            Some(commit) => commit,
            None => {
                let commit = CommitPoint::initial();
                commit.write(&storage)?;
                info!(directory = %storage.directory().display(), "created empty index");
                commit
            }
        };

        let removed = commit.remove_unreferenced(&storage)?;
        if removed > 0 {
            info!(removed, "removed files left over from earlier generations");
        }

        let writer = IndexWriter {
            storage,
            buffer: Mutex::new(WriteBuffer::default()),
            stats: Mutex::new(WriterStats::default()),
            merge_factor: merge_factor.max(1),
        };
        Ok((writer, commit))
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Buffer a document for the next commit.
    pub fn add_document(&self, doc: &Document) -> Result<()> {
        let fields = doc.to_indexable()?;
        let url = fields
            .iter()
            .find(|field| field.name == SearchField::Url.name())
            .map(|field| field.indexed.clone());

        self.push(PendingOp::Add { fields, url })?;
        self.stats.lock().docs_added += 1;
        Ok(())
    }

    /// Buffer the deletion of every document whose URL equals `url`, ignoring case.
    pub fn delete_by_url(&self, url: &str) -> Result<()> {
        self.push(PendingOp::Delete(url.to_lowercase()))?;
        self.stats.lock().deletes_requested += 1;
        Ok(())
    }

    fn push(&self, op: PendingOp) -> Result<()> {
        let mut buffer = self.buffer.lock();
        if buffer.closed {
            return Err(OnionIndexError::not_initialized("index writer is closed"));
        }
        buffer.ops.push(op);
        Ok(())
    }

    /// Number of buffered operations.
    pub fn pending_ops(&self) -> usize {
        self.buffer.lock().ops.len()
    }

    /// Discard all buffered operations.
    pub fn rollback(&self) -> usize {
        let mut buffer = self.buffer.lock();
        let dropped = buffer.ops.len();
        buffer.ops.clear();
        dropped
    }

    /// Refuse further buffering. Already buffered operations stay and are
    /// still applied by the next commit.
    pub fn close(&self) {
        self.buffer.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.lock().closed
    }

    pub fn stats(&self) -> WriterStats {
        *self.stats.lock()
    }

    /// Apply the buffered operations on top of `base` and commit them.
    ///
    /// Returns the reader for the new generation, or `None` when nothing was
    /// buffered. On failure the operations go back to the front of the
    /// buffer and `base` remains the latest durable generation.
    pub fn commit(&self, base: &IndexReader) -> Result<Option<IndexReader>> {
        let ops = std::mem::take(&mut self.buffer.lock().ops);
        if ops.is_empty() {
            return Ok(None);
        }

        match self.apply(base, &ops) {
            Ok(reader) => {
                self.stats.lock().commits += 1;
                Ok(Some(reader))
            }
            Err(e) => {
                let mut buffer = self.buffer.lock();
                buffer.ops.splice(0..0, ops);
                Err(e)
            }
        }
    }

    fn apply(&self, base: &IndexReader, ops: &[PendingOp]) -> Result<IndexReader> {
        let mut segments: Vec<LiveSegment> = base.segments().to_vec();
        let mut data = SegmentData::default();
        let mut new_urls: Vec<Option<&str>> = Vec::new();
        let mut new_deleted = BTreeSet::new();
        let mut deleted_committed = 0usize;

        for op in ops {
            match op {
                PendingOp::Add { fields, url } => {
                    data.add_document(fields);
                    new_urls.push(url.as_deref());
                }
                PendingOp::Delete(url) => {
                    for address in base.find_url(url) {
                        let meta = &mut segments[address.segment as usize].meta;
                        if let Err(pos) = meta.deleted.binary_search(&address.doc) {
                            meta.deleted.insert(pos, address.doc);
                            deleted_committed += 1;
                        }
                    }
                    for (doc, doc_url) in new_urls.iter().enumerate() {
                        if *doc_url == Some(url.as_str()) {
                            new_deleted.insert(doc as u32);
                        }
                    }
                }
            }
        }

        let fully_deleted = segments
            .iter()
            .filter(|s| s.meta.live_docs() == 0)
            .count();
        segments.retain(|s| s.meta.live_docs() > 0);

        let mut written = None;
        if data.doc_count() as usize > new_deleted.len() {
            let name = format!("{}{SEGMENT_EXTENSION}", Uuid::new_v4().simple());
            self.storage.write_new(&name, &data.encode()?)?;
            written = Some(name.clone());

            let mut meta = SegmentMeta::new(&name, data.doc_count());
            meta.deleted = new_deleted.into_iter().collect();
            segments.push(LiveSegment {
                reader: Arc::new(SegmentReader::new(name, data)),
                meta,
            });
        }

        let commit = base
            .commit()
            .next(segments.iter().map(|s| s.meta.clone()).collect());
        if let Err(e) = commit.write(&self.storage) {
            self.abandon(&commit, written.as_deref());
            return Err(e);
        }

        info!(
            generation = commit.generation,
            ops = ops.len(),
            deleted = deleted_committed,
            dropped_segments = fully_deleted,
            segments = segments.len(),
            docs = commit.num_docs(),
            "committed index generation"
        );
        self.cleanup(&commit);
        Ok(IndexReader::from_parts(commit, segments))
    }

    /// Merge all segments of `base` into one when there are more than the
    /// merge factor. Deleted documents are dropped physically.
    pub fn maybe_merge(&self, base: &IndexReader) -> Result<Option<IndexReader>> {
        if base.segments().len() <= self.merge_factor {
            return Ok(None);
        }

        let merged = SegmentData::merge(
            base.segments()
                .iter()
                .map(|s| (s.reader.data(), s.meta.deleted.as_slice())),
        );

        let mut segments = Vec::new();
        let mut written = None;
        if merged.doc_count() > 0 {
            let name = format!("{}{SEGMENT_EXTENSION}", Uuid::new_v4().simple());
            self.storage.write_new(&name, &merged.encode()?)?;
            written = Some(name.clone());
            segments.push(LiveSegment {
                meta: SegmentMeta::new(&name, merged.doc_count()),
                reader: Arc::new(SegmentReader::new(name, merged)),
            });
        }

        let commit = base
            .commit()
            .next(segments.iter().map(|s| s.meta.clone()).collect());
        if let Err(e) = commit.write(&self.storage) {
            self.abandon(&commit, written.as_deref());
            return Err(e);
        }

        info!(
            generation = commit.generation,
            merged = base.segments().len(),
            docs = commit.num_docs(),
            "merged segments"
        );
        self.stats.lock().merges += 1;
        self.cleanup(&commit);
        Ok(Some(IndexReader::from_parts(commit, segments)))
    }

    /// Remove the files of a generation whose commit point failed to write.
    ///
    /// The commit point may already have been renamed into place, so it goes
    /// first; a surviving commit point must never reference a missing segment.
    fn abandon(&self, commit: &CommitPoint, segment: Option<&str>) {
        let commit_file = CommitPoint::file_name(commit.generation);
        if let Err(e) = self.storage.delete_file(&commit_file) {
            warn!(file = %commit_file, error = %e, "failed to remove abandoned commit point");
            return;
        }
        if let Some(name) = segment
            && let Err(e) = self.storage.delete_file(name)
        {
            warn!(file = %name, error = %e, "failed to remove abandoned segment");
        }
    }

    fn cleanup(&self, commit: &CommitPoint) {
        match commit.remove_unreferenced(&self.storage) {
            Ok(removed) => debug!(removed, "cleaned up index directory"),
            Err(e) => warn!(error = %e, "failed to clean up index directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page(url: &str, content: &str) -> Document {
        Document::page(url, "a.onion", "Title", content)
    }

    fn open(dir: &TempDir, merge_factor: usize) -> (IndexWriter, IndexReader) {
        let storage = FileStorage::new(dir.path()).unwrap();
        let (writer, commit) = IndexWriter::open(storage, merge_factor).unwrap();
        let reader = IndexReader::open(writer.storage(), commit, None).unwrap();
        (writer, reader)
    }

    #[test]
    fn test_open_creates_first_generation() {
        let dir = TempDir::new().unwrap();
        let (_writer, reader) = open(&dir, 10);

        assert_eq!(reader.generation(), 1);
        assert_eq!(reader.num_docs(), 0);
        assert!(dir.path().join("segments_1.json").exists());
    }

    #[test]
    fn test_commit_without_ops_is_noop() {
        let dir = TempDir::new().unwrap();
        let (writer, reader) = open(&dir, 10);

        assert!(writer.commit(&reader).unwrap().is_none());
        assert!(!dir.path().join("segments_2.json").exists());
    }

    #[test]
    fn test_commit_adds_segment() {
        let dir = TempDir::new().unwrap();
        let (writer, reader) = open(&dir, 10);

        writer.add_document(&page("http://a.onion/1", "world")).unwrap();
        writer.add_document(&page("http://a.onion/2", "here")).unwrap();
        assert_eq!(writer.pending_ops(), 2);

        let reader = writer.commit(&reader).unwrap().unwrap();
        assert_eq!(reader.generation(), 2);
        assert_eq!(reader.num_docs(), 2);
        assert_eq!(writer.pending_ops(), 0);
        assert!(!dir.path().join("segments_1.json").exists());

        let reopened = CommitPoint::read_latest(writer.storage()).unwrap().unwrap();
        assert_eq!(&reopened, reader.commit());
    }

    #[test]
    fn test_delete_committed_document() {
        let dir = TempDir::new().unwrap();
        let (writer, reader) = open(&dir, 10);

        writer.add_document(&page("http://a.onion/1", "world")).unwrap();
        writer.add_document(&page("http://a.onion/2", "here")).unwrap();
        let reader = writer.commit(&reader).unwrap().unwrap();

        writer.delete_by_url("HTTP://A.ONION/1").unwrap();
        let reader = writer.commit(&reader).unwrap().unwrap();

        assert_eq!(reader.num_docs(), 1);
        assert!(reader.find_url("http://a.onion/1").is_empty());
        assert_eq!(reader.segments()[0].meta.deleted, vec![0]);
    }

    #[test]
    fn test_delete_then_add_keeps_later_add() {
        let dir = TempDir::new().unwrap();
        let (writer, reader) = open(&dir, 10);

        writer.add_document(&page("http://a.onion/1", "old")).unwrap();
        writer.delete_by_url("http://a.onion/1").unwrap();
        writer.add_document(&page("http://a.onion/1", "new")).unwrap();
        let reader = writer.commit(&reader).unwrap().unwrap();

        assert_eq!(reader.num_docs(), 1);
        let segment = &reader.segments()[0];
        assert_eq!(segment.meta.deleted, vec![0]);
        assert_eq!(segment.live_postings("PageContent", "new").count(), 1);
        assert_eq!(segment.live_postings("PageContent", "old").count(), 0);
    }

    #[test]
    fn test_fully_deleted_segment_is_dropped() {
        let dir = TempDir::new().unwrap();
        let (writer, reader) = open(&dir, 10);

        writer.add_document(&page("http://a.onion/1", "world")).unwrap();
        let reader = writer.commit(&reader).unwrap().unwrap();
        let name = reader.segments()[0].reader.name().to_string();

        writer.delete_by_url("http://a.onion/1").unwrap();
        let reader = writer.commit(&reader).unwrap().unwrap();

        assert!(reader.segments().is_empty());
        assert!(!dir.path().join(name).exists());
    }

    #[test]
    fn test_closed_writer_rejects_ops() {
        let dir = TempDir::new().unwrap();
        let (writer, _reader) = open(&dir, 10);

        writer.add_document(&page("http://a.onion/1", "world")).unwrap();
        writer.close();

        let result = writer.add_document(&page("http://a.onion/2", "here"));
        assert!(matches!(result, Err(OnionIndexError::NotInitialized(_))));
        assert_eq!(writer.pending_ops(), 1);
    }

    #[test]
    fn test_merge_collapses_segments() {
        let dir = TempDir::new().unwrap();
        let (writer, mut reader) = open(&dir, 2);

        for i in 0..3 {
            writer
                .add_document(&page(&format!("http://a.onion/{i}"), "world"))
                .unwrap();
            reader = writer.commit(&reader).unwrap().unwrap();
        }
        writer.delete_by_url("http://a.onion/0").unwrap();
        reader = writer.commit(&reader).unwrap().unwrap();
        assert_eq!(reader.segments().len(), 2);

        writer.add_document(&page("http://a.onion/3", "world")).unwrap();
        reader = writer.commit(&reader).unwrap().unwrap();
        assert_eq!(reader.segments().len(), 3);

        let merged = writer.maybe_merge(&reader).unwrap().unwrap();
        assert_eq!(merged.segments().len(), 1);
        assert_eq!(merged.num_docs(), 3);
        assert_eq!(merged.max_doc(), 3);
        assert_eq!(merged.generation(), reader.generation() + 1);
        assert!(writer.maybe_merge(&merged).unwrap().is_none());
        assert_eq!(writer.stats().merges, 1);
    }

    #[test]
    fn test_abandoned_generation_is_removed() {
        let dir = TempDir::new().unwrap();
        let (writer, reader) = open(&dir, 10);

        let name = format!("orphan{SEGMENT_EXTENSION}");
        let mut data = SegmentData::default();
        data.add_document(&page("http://a.onion/1", "world").to_indexable().unwrap());
        writer.storage().write_new(&name, &data.encode().unwrap()).unwrap();

        let commit = reader.commit().next(vec![SegmentMeta::new(&name, 1)]);
        commit.write(writer.storage()).unwrap();
        writer.abandon(&commit, Some(&name));

        assert!(!dir.path().join("segments_2.json").exists());
        assert!(!dir.path().join(&name).exists());
        let latest = CommitPoint::read_latest(writer.storage()).unwrap().unwrap();
        assert_eq!(latest.generation, 1);
        IndexReader::open(writer.storage(), latest, None).unwrap();
    }

    #[test]
    fn test_rollback_discards_buffer() {
        let dir = TempDir::new().unwrap();
        let (writer, reader) = open(&dir, 10);

        writer.add_document(&page("http://a.onion/1", "world")).unwrap();
        assert_eq!(writer.rollback(), 1);
        assert!(writer.commit(&reader).unwrap().is_none());
    }
}
