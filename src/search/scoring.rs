//! BM25 ranking.

use crate::config::Bm25Config;

/// BM25 weight of one term (or phrase) in one field of a snapshot.
///
/// `idf = ln(1 + (N - df + 0.5) / (df + 0.5))`, which stays positive for
/// terms that occur in most documents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Scorer {
    idf: f32,
    avg_field_length: f32,
    k1: f32,
    b: f32,
}

impl Bm25Scorer {
    /// Create a scorer from collection statistics.
    ///
    /// `total_docs` is the number of live documents, `doc_freq` the number
    /// of those containing the term.
    pub fn new(doc_freq: u64, total_docs: u64, avg_field_length: f32, params: Bm25Config) -> Self {
        Bm25Scorer {
            idf: idf(doc_freq, total_docs),
            avg_field_length,
            k1: params.k1,
            b: params.b,
        }
    }

    /// A scorer for several terms scored as one unit, such as a phrase.
    pub fn combined(
        idfs: impl IntoIterator<Item = f32>,
        avg_field_length: f32,
        params: Bm25Config,
    ) -> Self {
        Bm25Scorer {
            idf: idfs.into_iter().sum(),
            avg_field_length,
            k1: params.k1,
            b: params.b,
        }
    }

    pub fn idf(&self) -> f32 {
        self.idf
    }

    /// Score a document in which the term occurs `term_freq` times in a
    /// field of `field_length` tokens.
    pub fn score(&self, term_freq: u32, field_length: u32) -> f32 {
        if term_freq == 0 {
            return 0.0;
        }

        let tf = term_freq as f32;
        let norm = if self.avg_field_length > 0.0 {
            1.0 - self.b + self.b * (field_length as f32 / self.avg_field_length)
        } else {
            1.0
        };

        self.idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm)
    }
}

/// Inverse document frequency.
pub fn idf(doc_freq: u64, total_docs: u64) -> f32 {
    if doc_freq == 0 || total_docs == 0 {
        return 0.0;
    }
    let n = total_docs as f32;
    let df = doc_freq as f32;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}
