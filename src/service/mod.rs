//! The search index lifecycle manager.
//!
//! [`SearchService`] owns one index directory and moves through
//! `Uninitialized -> Ready -> Stopped`. While `Ready` it holds an
//! [`IndexHandle`]. With `lazy_init` enabled every operation other than
//! `stop` opens the index on first use; with it disabled they fail with
//! `NotInitialized` until `init` is called.

pub mod handle;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::document::Document;
use crate::error::{OnionIndexError, Result};
use crate::search::{SearchRequest, SearchResults};

pub use handle::IndexHandle;

/// Lifecycle state of a [`SearchService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Ready,
    Stopped,
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Ready(Arc<IndexHandle>),
    Stopped,
}

/// Owns the index for the lifetime of the process.
///
/// Operations may be called concurrently. Writes buffer into the next
/// generation while a `persist` is running; searches use the snapshot that
/// was current when they started.
#[derive(Debug)]
pub struct SearchService {
    config: IndexConfig,
    state: Mutex<State>,
}

impl SearchService {
    pub fn new(config: IndexConfig) -> Self {
        SearchService {
            config,
            state: Mutex::new(State::Uninitialized),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        match *self.state.lock() {
            State::Uninitialized => ServiceState::Uninitialized,
            State::Ready(_) => ServiceState::Ready,
            State::Stopped => ServiceState::Stopped,
        }
    }

    /// Open the index. Fails with `AlreadyInitialized` when already open.
    pub fn init(&self) -> Result<()> {
        let mut state = self.state.lock();
        if matches!(*state, State::Ready(_)) {
            return Err(OnionIndexError::already_initialized(format!(
                "search index {} is already open",
                self.config.index_dir.display()
            )));
        }
        *state = State::Ready(self.open()?);
        Ok(())
    }

    fn open(&self) -> Result<Arc<IndexHandle>> {
        IndexHandle::open(&self.config)
            .map(Arc::new)
            .map_err(|e| e.during("init"))
    }

    /// Persist buffered writes, close the index and release its lock.
    ///
    /// Fails with `NotInitialized` unless the index is open. The service
    /// ends up `Stopped` even when closing reports an error.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        let handle = match std::mem::replace(&mut *state, State::Stopped) {
            State::Ready(handle) => handle,
            previous => {
                *state = previous;
                return Err(OnionIndexError::not_initialized(
                    "stop: search index is not open",
                ));
            }
        };
        info!(directory = %self.config.index_dir.display(), "stopping search index");
        handle.shutdown().map_err(|e| e.during("stop"))
    }

    /// The open handle, opening the index first if lazy initialization allows.
    pub fn handle(&self) -> Result<Arc<IndexHandle>> {
        let mut state = self.state.lock();
        if let State::Ready(handle) = &*state {
            return Ok(Arc::clone(handle));
        }
        if !self.config.lazy_init {
            return Err(OnionIndexError::not_initialized(
                "search index is not open and lazy initialization is disabled",
            ));
        }

        debug!("lazily initializing search index");
        let handle = self.open()?;
        *state = State::Ready(Arc::clone(&handle));
        Ok(handle)
    }

    pub fn add(&self, doc: &Document) -> Result<()> {
        self.handle()?.add(doc).map_err(|e| e.during("add"))
    }

    pub fn remove(&self, url: &str) -> Result<()> {
        self.handle()?.remove(url).map_err(|e| e.during("remove"))
    }

    /// Make buffered writes durable and visible. Returns the visible generation.
    pub fn persist(&self) -> Result<u64> {
        let handle = self.handle()?;
        info!("persisting search index");
        let generation = handle.persist().map_err(|e| e.during("persist"))?;
        info!(generation, "persisting search index complete");
        Ok(generation)
    }

    /// Search with the default page size.
    pub fn search(&self, query: &str) -> Result<SearchResults> {
        self.handle()?.search(query).map_err(|e| e.during("search"))
    }

    pub fn search_request(&self, request: &SearchRequest) -> Result<SearchResults> {
        self.handle()?
            .search_request(request)
            .map_err(|e| e.during("search"))
    }

    pub fn count(&self, query: &str) -> Result<u64> {
        self.handle()?.count(query).map_err(|e| e.during("count"))
    }

    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.handle()?.num_docs())
    }
}
