//! Analyzers: a tokenizer followed by case normalization.
//!
//! Two analyzers cover the schema's field types:
//!
//! - [`SimpleAnalyzer`] - Unicode words, lower-cased. Used for full-text fields.
//! - [`KeywordAnalyzer`] - The whole value as one lower-cased term. Used for
//!   identifiers such as URLs and host names.

use crate::analysis::token::Token;
use crate::analysis::tokenizer::{Tokenizer, UnicodeWordTokenizer, WholeTokenizer};

/// Trait for analyzers that turn a field value into index terms.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze the given text into tokens.
    fn analyze(&self, text: &str) -> Vec<Token>;

    /// Get the name of this analyzer.
    fn name(&self) -> &'static str;

    /// Analyze and keep only the term texts.
    fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }
}

/// Lower-cases every token produced by the wrapped tokenizer.
#[derive(Debug, Clone)]
struct LowercaseAnalyzer<T> {
    tokenizer: T,
}

impl<T: Tokenizer> LowercaseAnalyzer<T> {
    fn analyze(&self, text: &str) -> Vec<Token> {
        self.tokenizer
            .tokenize(text)
            .into_iter()
            .map(|mut token| {
                token.text = token.text.to_lowercase();
                token
            })
            .collect()
    }
}

/// Analyzer for full-text fields: Unicode word tokenization plus lower-casing.
///
/// ```
/// use onion_index::analysis::analyzer::{Analyzer, SimpleAnalyzer};
///
/// let terms = SimpleAnalyzer::new().terms("Hello, Wide World");
/// assert_eq!(terms, vec!["hello", "wide", "world"]);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleAnalyzer {
    inner: LowercaseAnalyzer<UnicodeWordTokenizer>,
}

impl SimpleAnalyzer {
    /// Create a new simple analyzer.
    pub const fn new() -> Self {
        SimpleAnalyzer {
            inner: LowercaseAnalyzer {
                tokenizer: UnicodeWordTokenizer,
            },
        }
    }
}

impl Default for SimpleAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for SimpleAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

/// Analyzer for exact-match fields: the whole value, lower-cased.
///
/// ```
/// use onion_index::analysis::analyzer::{Analyzer, KeywordAnalyzer};
///
/// let terms = KeywordAnalyzer::new().terms("HTTP://A.onion/Page");
/// assert_eq!(terms, vec!["http://a.onion/page"]);
/// ```
#[derive(Debug, Clone)]
pub struct KeywordAnalyzer {
    inner: LowercaseAnalyzer<WholeTokenizer>,
}

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub const fn new() -> Self {
        KeywordAnalyzer {
            inner: LowercaseAnalyzer {
                tokenizer: WholeTokenizer,
            },
        }
    }
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_analyzer_lowercases() {
        let tokens = SimpleAnalyzer::new().analyze("Nothing HERE");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "nothing");
        assert_eq!(tokens[1].text, "here");
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_simple_analyzer_drops_punctuation() {
        assert!(SimpleAnalyzer::new().analyze("... --- !!!").is_empty());
    }

    #[test]
    fn test_keyword_analyzer_single_term() {
        let tokens = KeywordAnalyzer::new().analyze("Example.ONION");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "example.onion");
    }
}
