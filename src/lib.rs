//! # onion-index
//!
//! Search index and ban gate for a hidden-service crawler.
//!
//! Crawled pages are buffered, committed as immutable segments under a
//! directory lock, and searched with a Lucene-style query syntax ranked by
//! BM25. A separate ban gate answers whether a URL's host is excluded from
//! crawling, and a host status table records which hosts were last seen
//! online.
//!
//! ```
//! use onion_index::config::IndexConfig;
//! use onion_index::document::Document;
//! use onion_index::service::SearchService;
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let service = SearchService::new(IndexConfig::new(dir.path()));
//!
//! service.init().unwrap();
//! service.add(&Document::page("http://a.onion/1", "a.onion", "Hello", "hello world")).unwrap();
//! service.persist().unwrap();
//!
//! let results = service.search("world").unwrap();
//! assert_eq!(results.urls(), vec!["http://a.onion/1"]);
//! service.stop().unwrap();
//! ```

pub mod analysis;
pub mod ban;
pub mod cli;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod host;
pub mod index;
pub mod query;
pub mod schema;
pub mod search;
pub mod service;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
