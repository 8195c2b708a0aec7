//! Query execution against a snapshot.

pub mod collector;
pub mod scoring;
pub mod searcher;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::index::DocAddress;
use crate::schema::{FieldValue, SearchField};

pub use self::collector::TopDocsCollector;
pub use self::scoring::Bm25Scorer;
pub use self::searcher::Searcher;

/// A search: query text plus the page of ranked hits to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Query text, see [`crate::query::parser`].
    pub query: String,
    /// Ranked hits to skip.
    pub offset: usize,
    /// Hits to return after `offset`.
    pub limit: usize,
}

impl SearchRequest {
    /// Create a request for the first `limit` hits.
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        SearchRequest {
            query: query.into(),
            offset: 0,
            limit,
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub score: f32,
    #[serde(skip)]
    pub address: DocAddress,
    /// Stored fields only; indexed-only fields such as the page body never appear.
    pub fields: BTreeMap<String, FieldValue>,
}

impl SearchHit {
    pub fn get(&self, field: SearchField) -> Option<&FieldValue> {
        self.fields.get(field.name())
    }

    pub fn url(&self) -> Option<&str> {
        self.get(SearchField::Url).and_then(FieldValue::as_text)
    }
}

/// The outcome of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    /// Matching live documents, regardless of paging.
    pub total_hits: u64,
    /// Best score among all matches.
    pub max_score: Option<f32>,
    /// The requested page of hits, best first.
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.hits.iter().filter_map(SearchHit::url).collect()
    }
}
