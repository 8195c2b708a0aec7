//! The unit of ingestion: one crawled page as typed field values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{OnionIndexError, Result};
use crate::schema::{FieldValue, IndexableField, SearchField};

/// A document to be indexed.
///
/// Values are type-checked against the schema when they are set, so a
/// `Document` that exists always converts cleanly into index fields.
///
/// ```
/// use onion_index::document::Document;
/// use onion_index::schema::SearchField;
///
/// let doc = Document::page("http://a.onion/1", "a.onion", "Hello", "world wide");
/// assert_eq!(doc.url(), Some("http://a.onion/1"));
/// assert_eq!(doc.len(), 4);
///
/// let err = Document::new().with(SearchField::PageTitle, 7i64);
/// assert!(err.is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<SearchField, FieldValue>",
    into = "BTreeMap<SearchField, FieldValue>"
)]
pub struct Document {
    fields: BTreeMap<SearchField, FieldValue>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// A crawled page with all four schema fields.
    pub fn page(
        url: impl Into<String>,
        hostname: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let fields = BTreeMap::from([
            (SearchField::Url, FieldValue::Text(url.into())),
            (SearchField::Hostname, FieldValue::Text(hostname.into())),
            (SearchField::PageTitle, FieldValue::Text(title.into())),
            (SearchField::PageContent, FieldValue::Text(content.into())),
        ]);
        Document { fields }
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: SearchField, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        check(field, &value)?;
        self.fields.insert(field, value);
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: SearchField, value: impl Into<FieldValue>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    pub fn get(&self, field: SearchField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// The removal key of this document.
    pub fn url(&self) -> Option<&str> {
        self.get(SearchField::Url).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (SearchField, &FieldValue)> {
        self.fields.iter().map(|(field, value)| (*field, value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert every present field into its index-ready form, in schema order.
    pub fn to_indexable(&self) -> Result<Vec<IndexableField>> {
        self.fields
            .iter()
            .map(|(field, value)| {
                check(*field, value)?;
                field.descriptor().to_indexable(value)
            })
            .collect()
    }
}

/// Type-check `value` against `field`. A URL must be non-empty.
fn check(field: SearchField, value: &FieldValue) -> Result<()> {
    if !value.fits(field.field_type()) {
        return Err(OnionIndexError::schema(format!(
            "value {value:?} does not fit field {field} of type {}",
            field.field_type()
        )));
    }
    if field == SearchField::Url && value.as_text().is_some_and(|url| url.trim().is_empty()) {
        return Err(OnionIndexError::schema("field URL must not be empty"));
    }
    Ok(())
}

impl TryFrom<BTreeMap<SearchField, FieldValue>> for Document {
    type Error = OnionIndexError;

    fn try_from(fields: BTreeMap<SearchField, FieldValue>) -> Result<Self> {
        let mut doc = Document::new();
        for (field, value) in fields {
            doc.set(field, value)?;
        }
        Ok(doc)
    }
}

impl From<Document> for BTreeMap<SearchField, FieldValue> {
    fn from(doc: Document) -> Self {
        doc.fields
    }
}
