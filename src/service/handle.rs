//! An open index.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::IndexConfig;
use crate::document::Document;
use crate::error::{OnionIndexError, Result};
use crate::index::reader::IndexReader;
use crate::index::writer::IndexWriter;
use crate::query::Query;
use crate::search::{SearchRequest, SearchResults, Searcher};
use crate::storage::{DirectoryLock, FileStorage};

/// An index directory opened for reading and writing.
///
/// Holding an `IndexHandle` means holding the directory lock. Writes are
/// buffered until [`persist`](Self::persist), which commits them and
/// publishes a new [`Searcher`]. Searches use whichever searcher was
/// published when they started.
///
/// ```no_run
/// use onion_index::config::IndexConfig;
/// use onion_index::document::Document;
/// use onion_index::service::IndexHandle;
///
/// let handle = IndexHandle::open(&IndexConfig::new("/tmp/onion-index"))?;
/// handle.add(&Document::page("http://a.onion/1", "a.onion", "Hello", "world wide"))?;
/// handle.persist()?;
///
/// let results = handle.search("world")?;
/// assert_eq!(results.urls(), vec!["http://a.onion/1"]);
/// handle.close()?;
/// # Ok::<(), onion_index::error::OnionIndexError>(())
/// ```
#[derive(Debug)]
pub struct IndexHandle {
    config: IndexConfig,
    writer: IndexWriter,
    searcher: ArcSwap<Searcher>,
    /// Serializes commits and snapshot installs. `None` once closed.
    lock: Mutex<Option<DirectoryLock>>,
}

impl IndexHandle {
    /// Open or create the index in `config.index_dir`.
    ///
    /// Fails with `LockContention` if the directory stays locked for longer
    /// than the configured timeout.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        let storage = FileStorage::new(&config.index_dir)?;
        let lock = DirectoryLock::acquire(
            storage.directory(),
            config.lock_timeout(),
            config.lock_poll_interval(),
        )?;

        let (writer, commit) = IndexWriter::open(storage, config.merge_factor)?;
        let reader = IndexReader::open(writer.storage(), commit, None)?;
        let searcher = Searcher::new(reader, config.bm25);

        let entries = searcher.count(&Query::MatchAll);
        info!(
            directory = %config.index_dir.display(),
            generation = searcher.generation(),
            segments = searcher.reader().segments().len(),
            entries,
            "opened search index"
        );

        Ok(IndexHandle {
            config: config.clone(),
            writer,
            searcher: ArcSwap::from_pointee(searcher),
            lock: Mutex::new(Some(lock)),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn directory(&self) -> &Path {
        self.writer.storage().directory()
    }

    pub fn is_open(&self) -> bool {
        self.lock.lock().is_some()
    }

    /// Buffer a document. It becomes searchable with the next `persist`.
    pub fn add(&self, doc: &Document) -> Result<()> {
        self.writer.add_document(doc)
    }

    /// Buffer removal of every document with this URL, ignoring case.
    pub fn remove(&self, url: &str) -> Result<()> {
        self.writer.delete_by_url(url)
    }

    /// Buffered operations not yet persisted.
    pub fn pending_ops(&self) -> usize {
        self.writer.pending_ops()
    }

    /// Commit buffered operations and publish a searcher that sees them.
    ///
    /// Returns the generation now visible. With nothing buffered this is a
    /// no-op. On failure the buffer and the published searcher are unchanged.
    pub fn persist(&self) -> Result<u64> {
        let guard = self.lock.lock();
        if guard.is_none() {
            return Err(OnionIndexError::not_initialized("index is closed"));
        }

        let current = self.searcher.load_full();
        let Some(reader) = self.writer.commit(current.reader())? else {
            debug!(generation = current.generation(), "nothing to persist");
            return Ok(current.generation());
        };
        self.publish(reader);

        let current = self.searcher.load_full();
        match self.writer.maybe_merge(current.reader()) {
            Ok(Some(merged)) => self.publish(merged),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "segment merge failed, keeping unmerged segments"),
        }

        let generation = self.generation();
        drop(guard);
        Ok(generation)
    }

    fn publish(&self, reader: IndexReader) {
        let searcher = Searcher::new(reader, self.config.bm25);
        info!(
            generation = searcher.generation(),
            docs = searcher.num_docs(),
            "published index snapshot"
        );
        self.searcher.store(Arc::new(searcher));
    }

    /// The currently published searcher.
    pub fn searcher(&self) -> Arc<Searcher> {
        self.searcher.load_full()
    }

    /// Search with the configured default page size.
    pub fn search(&self, query: &str) -> Result<SearchResults> {
        self.search_request(&SearchRequest::new(query, self.config.default_limit))
    }

    pub fn search_request(&self, request: &SearchRequest) -> Result<SearchResults> {
        self.searcher.load().search(request)
    }

    /// Number of documents matching the query text.
    pub fn count(&self, query: &str) -> Result<u64> {
        let searcher = self.searcher.load();
        let query = searcher.parse(query)?;
        Ok(searcher.count(&query))
    }

    /// Live documents visible to search.
    pub fn num_docs(&self) -> u64 {
        self.searcher.load().num_docs()
    }

    /// Generation visible to search.
    pub fn generation(&self) -> u64 {
        self.searcher.load().generation()
    }

    /// Persist what is buffered and release the directory lock.
    pub fn close(self) -> Result<()> {
        self.shutdown()
    }

    /// Close through a shared reference. Later writes and persists fail with
    /// `NotInitialized`; searches keep using the last published searcher.
    ///
    /// The lock is released even when the final commit fails; the first
    /// error is returned.
    pub(crate) fn shutdown(&self) -> Result<()> {
        let mut guard = self.lock.lock();
        let Some(lock) = guard.take() else {
            return Err(OnionIndexError::not_initialized("index is already closed"));
        };

        self.writer.close();
        let mut first_error = None;

        match self.writer.commit(self.searcher.load().reader()) {
            Ok(Some(reader)) => self.publish(reader),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, pending = self.writer.pending_ops(), "final commit failed");
                first_error = Some(e);
            }
        }

        if let Err(e) = lock.release() {
            error!(error = %e, "failed to release index lock");
            first_error.get_or_insert(e);
        }

        info!(directory = %self.directory().display(), "closed search index");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        if self.lock.get_mut().is_some() {
            let pending = self.writer.pending_ops();
            if pending > 0 {
                warn!(pending, "index dropped without close, buffered operations are lost");
            }
        }
    }
}
