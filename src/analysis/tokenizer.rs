//! Tokenizers that split text into tokens.
//!
//! - [`UnicodeWordTokenizer`] - Unicode word boundaries (UAX #29), punctuation dropped
//! - [`WholeTokenizer`] - The entire input as one token

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::Token;

/// Trait for tokenizers that convert text into tokens.
pub trait Tokenizer: Send + Sync + std::fmt::Debug {
    /// Tokenize the given text.
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// Get the name of this tokenizer.
    fn name(&self) -> &'static str;
}

/// A tokenizer that splits text on Unicode word boundaries.
///
/// Only segments containing at least one alphanumeric character become tokens,
/// so whitespace and punctuation never reach the index.
///
/// ```
/// use onion_index::analysis::tokenizer::{Tokenizer, UnicodeWordTokenizer};
///
/// let tokens = UnicodeWordTokenizer::new().tokenize("Hello, world! café");
/// let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, vec!["Hello", "world", "café"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    /// Create a new Unicode word tokenizer.
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        text.split_word_bound_indices()
            .filter(|(_, word)| word.chars().any(char::is_alphanumeric))
            .enumerate()
            .map(|(position, (start, word))| {
                Token::with_offsets(word, position as u32, start, start + word.len())
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "unicode_word"
    }
}

/// A tokenizer that emits the whole input as a single token.
///
/// Empty input produces no token.
#[derive(Clone, Debug, Default)]
pub struct WholeTokenizer;

impl WholeTokenizer {
    /// Create a new whole-input tokenizer.
    pub fn new() -> Self {
        WholeTokenizer
    }
}

impl Tokenizer for WholeTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token::with_offsets(text, 0, 0, text.len())]
    }

    fn name(&self) -> &'static str {
        "whole"
    }
}
