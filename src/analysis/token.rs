//! Token type produced by text analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single unit of analyzed text.
///
/// `position` counts tokens (0-based) and is what phrase matching compares;
/// the offsets are byte offsets into the analyzed input.
///
/// ```
/// use onion_index::analysis::token::Token;
///
/// let token = Token::with_offsets("world", 1, 6, 11);
/// assert_eq!(token.text, "world");
/// assert_eq!(token.position, 1);
/// assert_eq!(token.end_offset, 11);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token's text content.
    pub text: String,
    /// Position in the token stream.
    pub position: u32,
    /// Byte offset where the token starts.
    pub start_offset: usize,
    /// Byte offset just past the token.
    pub end_offset: usize,
}

impl Token {
    /// Create a token without offset information.
    pub fn new<S: Into<String>>(text: S, position: u32) -> Self {
        let text = text.into();
        let end_offset = text.len();
        Token {
            text,
            position,
            start_offset: 0,
            end_offset,
        }
    }

    /// Create a token with explicit offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: u32,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.text, self.position)
    }
}
