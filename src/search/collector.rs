//! Collectors for gathering ranked hits.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::index::DocAddress;

/// A scored document.
#[derive(Debug, Clone, Copy)]
pub struct ScoredDoc {
    pub address: DocAddress,
    pub score: f32,
}

/// Orders better hits first: higher score, then lower address.
fn rank(a: &ScoredDoc, b: &ScoredDoc) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.address.cmp(&b.address))
}

/// Heap entry whose maximum is the worst hit kept.
#[derive(Debug, Clone, Copy)]
struct Worst(ScoredDoc);

impl PartialEq for Worst {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Worst {}

impl PartialOrd for Worst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Worst {
    fn cmp(&self, other: &Self) -> Ordering {
        rank(&self.0, &other.0)
    }
}

/// Keeps the best `max_docs` hits and counts every hit.
#[derive(Debug)]
pub struct TopDocsCollector {
    max_docs: usize,
    hits: BinaryHeap<Worst>,
    total_hits: u64,
    max_score: Option<f32>,
}

impl TopDocsCollector {
    pub fn new(max_docs: usize) -> Self {
        TopDocsCollector {
            max_docs,
            hits: BinaryHeap::with_capacity(max_docs.min(1024)),
            total_hits: 0,
            max_score: None,
        }
    }

    pub fn collect(&mut self, address: DocAddress, score: f32) {
        self.total_hits += 1;
        self.max_score = Some(self.max_score.map_or(score, |max| max.max(score)));
        self.offer(ScoredDoc { address, score });
    }

    fn offer(&mut self, doc: ScoredDoc) {
        if self.max_docs == 0 {
            return;
        }

        if self.hits.len() < self.max_docs {
            self.hits.push(Worst(doc));
        } else if let Some(worst) = self.hits.peek()
            && rank(&doc, &worst.0) == Ordering::Less
        {
            self.hits.pop();
            self.hits.push(Worst(doc));
        }
    }

    /// Combine with a collector that saw a disjoint set of documents.
    pub fn merge(mut self, other: TopDocsCollector) -> Self {
        self.total_hits += other.total_hits;
        self.max_score = match (self.max_score, other.max_score) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for Worst(doc) in other.hits {
            self.offer(doc);
        }
        self
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    pub fn max_score(&self) -> Option<f32> {
        self.max_score
    }

    /// Kept hits, best first.
    pub fn into_sorted(self) -> Vec<ScoredDoc> {
        let mut hits: Vec<ScoredDoc> = self.hits.into_iter().map(|Worst(doc)| doc).collect();
        hits.sort_by(rank);
        hits
    }
}
