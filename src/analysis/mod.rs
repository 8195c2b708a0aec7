//! Text analysis for indexed and queried field values.
//!
//! Analysis turns a field value into the terms stored in the inverted index.
//! The same analyzer runs at index time and at query time, which is what makes
//! a query term comparable to an indexed term.
//!
//! - [`token`] - The [`Token`](token::Token) unit produced by analysis
//! - [`tokenizer`] - Splitting text into tokens
//! - [`analyzer`] - Tokenizer plus normalization, one per field type

pub mod analyzer;
pub mod token;
pub mod tokenizer;
