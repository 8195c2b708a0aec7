//! Evaluates queries against one snapshot.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use tracing::debug;

use crate::config::Bm25Config;
use crate::error::Result;
use crate::index::reader::{IndexReader, LiveSegment};
use crate::index::segment::Posting;
use crate::index::DocAddress;
use crate::query::{Clause, Occur, Query, QueryParser};
use crate::schema::SearchField;
use crate::search::collector::TopDocsCollector;
use crate::search::scoring::{self, Bm25Scorer};
use crate::search::{SearchHit, SearchRequest, SearchResults};

/// Matching documents of one segment with their scores.
type DocSet = BTreeMap<u32, f32>;

const CONSTANT_SCORE: f32 = 1.0;

/// A reader bound to a ranking function.
///
/// A searcher never changes; a newer generation gets a new searcher.
#[derive(Debug)]
pub struct Searcher {
    reader: IndexReader,
    params: Bm25Config,
    parser: QueryParser,
}

impl Searcher {
    pub fn new(reader: IndexReader, params: Bm25Config) -> Self {
        Searcher {
            reader,
            params,
            parser: QueryParser::new(),
        }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn generation(&self) -> u64 {
        self.reader.generation()
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.num_docs()
    }

    /// Parse query text with the default field.
    pub fn parse(&self, query: &str) -> Result<Query> {
        self.parser.parse(query)
    }

    /// Parse and run a search request.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let query = self.parse(&request.query)?;
        Ok(self.search_query(&query, request.offset, request.limit))
    }

    /// Run a parsed query and return the hits ranked `offset..offset + limit`.
    pub fn search_query(&self, query: &Query, offset: usize, limit: usize) -> SearchResults {
        let weights = Weights::compute(&self.reader, query);
        let wanted = offset.saturating_add(limit);

        let collector = self
            .reader
            .segments()
            .par_iter()
            .enumerate()
            .map(|(ordinal, segment)| {
                let mut collector = TopDocsCollector::new(wanted);
                for (doc, score) in self.evaluate(segment, query, &weights) {
                    collector.collect(DocAddress::new(ordinal as u32, doc), score);
                }
                collector
            })
            .reduce(|| TopDocsCollector::new(wanted), TopDocsCollector::merge);

        let total_hits = collector.total_hits();
        let max_score = collector.max_score();
        let hits = collector
            .into_sorted()
            .into_iter()
            .skip(offset)
            .filter_map(|doc| {
                Some(SearchHit {
                    score: doc.score,
                    address: doc.address,
                    fields: self.reader.stored_fields(doc.address)?,
                })
            })
            .collect();

        debug!(
            query = %query,
            generation = self.generation(),
            total_hits,
            "executed search"
        );
        SearchResults {
            total_hits,
            max_score,
            hits,
        }
    }

    /// Number of live documents matching a query.
    pub fn count(&self, query: &Query) -> u64 {
        let weights = Weights::compute(&self.reader, query);
        self.reader
            .segments()
            .par_iter()
            .map(|segment| self.evaluate(segment, query, &weights).len() as u64)
            .sum()
    }

    fn evaluate(&self, segment: &LiveSegment, query: &Query, weights: &Weights) -> DocSet {
        match query {
            Query::MatchAll => live_docs(segment),
            Query::MatchNone => DocSet::new(),
            Query::Term { field, term } => {
                let scorer = weights.scorer(*field, [term.as_str()], self.params);
                segment
                    .live_postings(field.name(), term)
                    .map(|posting| {
                        let length = field_length(segment, *field, posting.doc);
                        (posting.doc, scorer.score(posting.frequency(), length))
                    })
                    .collect()
            }
            Query::Prefix { field, prefix } => {
                let Some(index) = segment.reader.field(field.name()) else {
                    return DocSet::new();
                };
                index
                    .terms_with_prefix(prefix)
                    .flat_map(|(_, postings)| postings)
                    .filter(|posting| !segment.is_deleted(posting.doc))
                    .map(|posting| (posting.doc, CONSTANT_SCORE))
                    .collect()
            }
            Query::Phrase { field, terms } => self.evaluate_phrase(segment, *field, terms, weights),
            Query::Boolean(clauses) => self.evaluate_boolean(segment, clauses, weights),
        }
    }

    fn evaluate_phrase(
        &self,
        segment: &LiveSegment,
        field: SearchField,
        terms: &[String],
        weights: &Weights,
    ) -> DocSet {
        let lists: Vec<&[Posting]> = terms
            .iter()
            .map(|term| segment.reader.postings(field.name(), term))
            .collect();
        let Some((first, rest)) = lists.split_first() else {
            return DocSet::new();
        };
        if lists.iter().any(|list| list.is_empty()) {
            return DocSet::new();
        }

        let scorer = weights.scorer(field, terms.iter().map(String::as_str), self.params);
        let mut matches = DocSet::new();

        for posting in first.iter() {
            if segment.is_deleted(posting.doc) {
                continue;
            }
            let others: Option<Vec<&Posting>> =
                rest.iter().map(|list| find_posting(list, posting.doc)).collect();
            let Some(others) = others else {
                continue;
            };

            let frequency = posting
                .positions
                .iter()
                .filter(|&&start| {
                    others.iter().enumerate().all(|(i, other)| {
                        other.positions.binary_search(&(start + i as u32 + 1)).is_ok()
                    })
                })
                .count() as u32;

            if frequency > 0 {
                let length = field_length(segment, field, posting.doc);
                matches.insert(posting.doc, scorer.score(frequency, length));
            }
        }

        matches
    }

    fn evaluate_boolean(
        &self,
        segment: &LiveSegment,
        clauses: &[Clause],
        weights: &Weights,
    ) -> DocSet {
        let mut must = Vec::new();
        let mut should = Vec::new();
        let mut must_not = Vec::new();
        for clause in clauses {
            let docs = self.evaluate(segment, &clause.query, weights);
            match clause.occur {
                Occur::Must => must.push(docs),
                Occur::Should => should.push(docs),
                Occur::MustNot => must_not.push(docs),
            }
        }

        let mut result = if !must.is_empty() {
            let mut must = must.into_iter();
            let mut result = must.next().unwrap_or_default();
            for docs in must {
                result.retain(|doc, _| docs.contains_key(doc));
                for (doc, score) in result.iter_mut() {
                    *score += docs.get(doc).copied().unwrap_or(0.0);
                }
            }
            for docs in &should {
                for (doc, score) in result.iter_mut() {
                    *score += docs.get(doc).copied().unwrap_or(0.0);
                }
            }
            result
        } else if !should.is_empty() {
            let mut result = DocSet::new();
            for docs in should {
                for (doc, score) in docs {
                    *result.entry(doc).or_insert(0.0) += score;
                }
            }
            result
        } else if !must_not.is_empty() {
            live_docs(segment)
        } else {
            DocSet::new()
        };

        for docs in &must_not {
            result.retain(|doc, _| !docs.contains_key(doc));
        }
        result
    }
}

fn live_docs(segment: &LiveSegment) -> DocSet {
    (0..segment.meta.doc_count)
        .filter(|doc| !segment.is_deleted(*doc))
        .map(|doc| (doc, CONSTANT_SCORE))
        .collect()
}

fn field_length(segment: &LiveSegment, field: SearchField, doc: u32) -> u32 {
    segment
        .reader
        .field(field.name())
        .map_or(0, |index| index.length(doc))
}

fn find_posting(list: &[Posting], doc: u32) -> Option<&Posting> {
    list.binary_search_by_key(&doc, |posting| posting.doc)
        .ok()
        .map(|i| &list[i])
}

/// Collection statistics for the terms of one query, computed once per
/// search across all segments of the snapshot.
#[derive(Debug, Default)]
struct Weights {
    idf: HashMap<SearchField, HashMap<String, f32>>,
    avg_length: HashMap<SearchField, f32>,
}

impl Weights {
    fn compute(reader: &IndexReader, query: &Query) -> Self {
        let mut weights = Weights::default();
        weights.visit(reader, query);
        weights
    }

    fn visit(&mut self, reader: &IndexReader, query: &Query) {
        match query {
            Query::Term { field, term } => self.add(reader, *field, term),
            Query::Phrase { field, terms } => {
                for term in terms {
                    self.add(reader, *field, term);
                }
            }
            Query::Boolean(clauses) => {
                for clause in clauses {
                    self.visit(reader, &clause.query);
                }
            }
            Query::MatchAll | Query::MatchNone | Query::Prefix { .. } => {}
        }
    }

    fn add(&mut self, reader: &IndexReader, field: SearchField, term: &str) {
        let total_docs = reader.num_docs();
        self.idf
            .entry(field)
            .or_default()
            .entry(term.to_string())
            .or_insert_with(|| scoring::idf(reader.doc_freq(field.name(), term), total_docs));
        self.avg_length
            .entry(field)
            .or_insert_with(|| reader.field_stats(field.name()).avg_length);
    }

    fn scorer<'a>(
        &self,
        field: SearchField,
        terms: impl IntoIterator<Item = &'a str>,
        params: Bm25Config,
    ) -> Bm25Scorer {
        let idfs = self.idf.get(&field);
        Bm25Scorer::combined(
            terms
                .into_iter()
                .map(|term| idfs.and_then(|m| m.get(term)).copied().unwrap_or(0.0)),
            self.avg_length.get(&field).copied().unwrap_or(0.0),
            params,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::index::writer::IndexWriter;
    use crate::storage::FileStorage;
    use tempfile::TempDir;

    fn searcher_with(dir: &TempDir, batches: &[&[Document]], deletes: &[&str]) -> Searcher {
        let storage = FileStorage::new(dir.path()).unwrap();
        let (writer, commit) = IndexWriter::open(storage, 10).unwrap();
        let mut reader = IndexReader::open(writer.storage(), commit, None).unwrap();
        for batch in batches {
            for doc in *batch {
                writer.add_document(doc).unwrap();
            }
            reader = writer.commit(&reader).unwrap().unwrap();
        }
        for url in deletes {
            writer.delete_by_url(url).unwrap();
        }
        if let Some(next) = writer.commit(&reader).unwrap() {
            reader = next;
        }
        Searcher::new(reader, Bm25Config::default())
    }

    fn pages() -> Vec<Document> {
        vec![
            Document::page("http://a.onion/1", "a.onion", "Hello", "world wide"),
            Document::page("http://a.onion/2", "a.onion", "Other", "nothing here"),
        ]
    }

    fn urls(searcher: &Searcher, query: &str) -> Vec<String> {
        searcher
            .search(&SearchRequest::new(query, 10))
            .unwrap()
            .urls()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_single_term() {
        let dir = TempDir::new().unwrap();
        let searcher = searcher_with(&dir, &[&pages()], &[]);

        let results = searcher.search(&SearchRequest::new("world", 10)).unwrap();
        assert_eq!(results.total_hits, 1);
        assert_eq!(results.urls(), vec!["http://a.onion/1"]);
        assert!(results.max_score.unwrap() > 0.0);

        let hit = &results.hits[0];
        assert!(hit.get(SearchField::PageTitle).is_some());
        assert!(hit.get(SearchField::PageContent).is_none());
    }

    #[test]
    fn test_exact_url_and_host() {
        let dir = TempDir::new().unwrap();
        let searcher = searcher_with(&dir, &[&pages()], &[]);

        assert_eq!(urls(&searcher, "URL:\"HTTP://A.ONION/2\""), vec!["http://a.onion/2"]);
        assert_eq!(urls(&searcher, "Hostname:a.onion").len(), 2);
        assert!(urls(&searcher, "URL:\"http://a.onion\"").is_empty());
    }

    #[test]
    fn test_phrase_requires_adjacency() {
        let dir = TempDir::new().unwrap();
        let docs = [
            Document::page("http://a.onion/1", "a.onion", "t", "world wide web"),
            Document::page("http://a.onion/2", "a.onion", "t", "wide world"),
        ];
        let searcher = searcher_with(&dir, &[&docs], &[]);

        assert_eq!(urls(&searcher, "\"world wide\""), vec!["http://a.onion/1"]);
        assert_eq!(urls(&searcher, "\"wide world\""), vec!["http://a.onion/2"]);
        assert_eq!(urls(&searcher, "world wide").len(), 2);
    }

    #[test]
    fn test_boolean_and_prefix() {
        let dir = TempDir::new().unwrap();
        let searcher = searcher_with(&dir, &[&pages()], &[]);

        assert_eq!(urls(&searcher, "+world -here"), vec!["http://a.onion/1"]);
        assert_eq!(urls(&searcher, "-world"), vec!["http://a.onion/2"]);
        assert!(urls(&searcher, "world AND nothing").is_empty());
        assert_eq!(urls(&searcher, "world OR nothing").len(), 2);
        assert_eq!(urls(&searcher, "noth*"), vec!["http://a.onion/2"]);
        assert_eq!(urls(&searcher, "PageTitle:hel*"), vec!["http://a.onion/1"]);
        assert_eq!(urls(&searcher, "*:*").len(), 2);
    }

    #[test]
    fn test_ranking_prefers_more_occurrences() {
        let dir = TempDir::new().unwrap();
        let docs = [
            Document::page(
                "http://a.onion/1",
                "a.onion",
                "t",
                "market once among many other words",
            ),
            Document::page("http://a.onion/2", "a.onion", "t", "market market"),
            Document::page("http://a.onion/3", "a.onion", "t", "unrelated"),
        ];
        let searcher = searcher_with(&dir, &[&docs], &[]);

        assert_eq!(
            urls(&searcher, "market"),
            vec!["http://a.onion/2", "http://a.onion/1"]
        );
    }

    #[test]
    fn test_paging_across_segments() {
        let dir = TempDir::new().unwrap();
        let first = [Document::page("http://a.onion/1", "a.onion", "t", "shared")];
        let second = [
            Document::page("http://a.onion/2", "a.onion", "t", "shared"),
            Document::page("http://a.onion/3", "a.onion", "t", "shared"),
        ];
        let searcher = searcher_with(&dir, &[&first, &second], &[]);

        let page = searcher
            .search(&SearchRequest::new("shared", 1).offset(1))
            .unwrap();
        assert_eq!(page.total_hits, 3);
        assert_eq!(page.urls(), vec!["http://a.onion/2"]);

        let beyond = searcher
            .search(&SearchRequest::new("shared", 10).offset(5))
            .unwrap();
        assert_eq!(beyond.total_hits, 3);
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_deleted_documents_are_invisible() {
        let dir = TempDir::new().unwrap();
        let searcher = searcher_with(&dir, &[&pages()], &["http://a.onion/1"]);

        assert!(urls(&searcher, "world").is_empty());
        assert_eq!(searcher.count(&Query::MatchAll), 1);
        assert_eq!(searcher.num_docs(), 1);
    }

    #[test]
    fn test_query_syntax_error() {
        let dir = TempDir::new().unwrap();
        let searcher = searcher_with(&dir, &[&pages()], &[]);

        let result = searcher.search(&SearchRequest::new("(world", 10));
        assert!(matches!(
            result,
            Err(crate::error::OnionIndexError::QuerySyntax(_))
        ));
    }
}
