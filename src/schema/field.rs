//! Field types, typed values and the conversion into index-ready fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::{Analyzer, KeywordAnalyzer, SimpleAnalyzer};
use crate::analysis::token::Token;
use crate::error::{OnionIndexError, Result};

static SIMPLE_ANALYZER: SimpleAnalyzer = SimpleAnalyzer::new();
static KEYWORD_ANALYZER: KeywordAnalyzer = KeywordAnalyzer::new();

/// The value type of a field, fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Case-normalized, not tokenized. Identifiers and URLs.
    ExactString,
    /// Tokenized and case-normalized. Titles and body text.
    FullText,
    /// A signed integer, indexed as its decimal form.
    Integer,
}

impl FieldType {
    /// The analyzer used for values of this type, if the type is textual.
    pub fn analyzer(&self) -> Option<&'static dyn Analyzer> {
        match self {
            FieldType::ExactString => Some(&KEYWORD_ANALYZER),
            FieldType::FullText => Some(&SIMPLE_ANALYZER),
            FieldType::Integer => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::ExactString => "exact_string",
            FieldType::FullText => "full_text",
            FieldType::Integer => "integer",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed field value.
///
/// Serialized untagged, so `"a.onion"` reads as text and `80` as an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
}

impl FieldValue {
    /// The field type this value can be assigned to without conversion.
    pub fn fits(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (FieldValue::Text(_), FieldType::ExactString | FieldType::FullText)
                | (FieldValue::Integer(_), FieldType::Integer)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Integer(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Declaration of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field key, stable across the index's lifetime.
    pub name: &'static str,
    /// Whether the original value is retrievable from a hit.
    pub stored: bool,
    /// Value type.
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, stored: bool, field_type: FieldType) -> Self {
        FieldDescriptor {
            name,
            stored,
            field_type,
        }
    }

    /// Convert a value for this field into its index-ready form.
    pub fn to_indexable(&self, value: &FieldValue) -> Result<IndexableField> {
        to_indexable(self, value)
    }
}

/// A field value prepared for the index.
///
/// `indexed` is the normalized form that analysis runs on; `stored` is the
/// verbatim value when the field is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexableField {
    pub name: &'static str,
    pub field_type: FieldType,
    pub indexed: String,
    pub stored: Option<FieldValue>,
}

impl IndexableField {
    /// Analyze the indexed form into terms with positions.
    pub fn tokens(&self) -> Vec<Token> {
        match self.field_type.analyzer() {
            Some(analyzer) => analyzer.analyze(&self.indexed),
            None => vec![Token::new(self.indexed.clone(), 0)],
        }
    }
}

/// Convert a typed value into the representation the index stores.
///
/// Text values are lower-cased before analysis so matching is
/// case-insensitive. Fails with a schema error if the value does not fit the
/// descriptor's type.
///
/// ```
/// use onion_index::schema::{FieldValue, SearchField, to_indexable};
///
/// let value = FieldValue::from("HTTP://A.onion/");
/// let field = to_indexable(&SearchField::Url.descriptor(), &value).unwrap();
/// assert_eq!(field.indexed, "http://a.onion/");
/// assert_eq!(field.stored, Some(FieldValue::from("HTTP://A.onion/")));
/// ```
pub fn to_indexable(descriptor: &FieldDescriptor, value: &FieldValue) -> Result<IndexableField> {
    let indexed = match (descriptor.field_type, value) {
        (FieldType::ExactString | FieldType::FullText, FieldValue::Text(text)) => {
            text.to_lowercase()
        }
        (FieldType::Integer, FieldValue::Integer(number)) => number.to_string(),
        (field_type, value) => {
            return Err(OnionIndexError::schema(format!(
                "field {} of type {field_type} cannot hold a {} value",
                descriptor.name,
                value.kind()
            )));
        }
    };

    Ok(IndexableField {
        name: descriptor.name,
        field_type: descriptor.field_type,
        indexed,
        stored: descriptor.stored.then(|| value.clone()),
    })
}
