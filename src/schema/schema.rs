//! The fixed set of fields every indexed page carries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::field::{FieldDescriptor, FieldType};

/// A field of the page index.
///
/// The declaration order is the schema order returned by [`SearchField::all`]
/// and [`SearchField::fields_of_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SearchField {
    /// The page URL. Exact match, stored. Also the removal key.
    #[serde(rename = "URL")]
    Url,
    /// The host the page was fetched from. Exact match, stored.
    Hostname,
    /// The page title. Full text, stored.
    PageTitle,
    /// The page body. Full text, searchable but not returned from hits.
    PageContent,
}

const URL: FieldDescriptor = FieldDescriptor::new("URL", true, FieldType::ExactString);
const HOSTNAME: FieldDescriptor = FieldDescriptor::new("Hostname", true, FieldType::ExactString);
const PAGE_TITLE: FieldDescriptor = FieldDescriptor::new("PageTitle", true, FieldType::FullText);
const PAGE_CONTENT: FieldDescriptor =
    FieldDescriptor::new("PageContent", false, FieldType::FullText);

impl SearchField {
    /// The field unqualified query terms search.
    pub const DEFAULT: SearchField = SearchField::PageContent;

    /// All fields in schema order.
    pub fn all() -> &'static [SearchField] {
        &[
            SearchField::Url,
            SearchField::Hostname,
            SearchField::PageTitle,
            SearchField::PageContent,
        ]
    }

    /// The declaration for this field.
    pub fn descriptor(&self) -> FieldDescriptor {
        match self {
            SearchField::Url => URL,
            SearchField::Hostname => HOSTNAME,
            SearchField::PageTitle => PAGE_TITLE,
            SearchField::PageContent => PAGE_CONTENT,
        }
    }

    /// The on-disk field key.
    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    pub fn field_type(&self) -> FieldType {
        self.descriptor().field_type
    }

    pub fn is_stored(&self) -> bool {
        self.descriptor().stored
    }

    /// Look a field up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<SearchField> {
        Self::all()
            .iter()
            .copied()
            .find(|field| field.name().eq_ignore_ascii_case(name))
    }

    /// Fields of the given type, in schema order.
    ///
    /// ```
    /// use onion_index::schema::{FieldType, SearchField};
    ///
    /// assert_eq!(
    ///     SearchField::fields_of_type(FieldType::FullText),
    ///     vec![SearchField::PageTitle, SearchField::PageContent]
    /// );
    /// ```
    pub fn fields_of_type(field_type: FieldType) -> Vec<SearchField> {
        Self::all()
            .iter()
            .copied()
            .filter(|field| field.field_type() == field_type)
            .collect()
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_unique() {
        let mut names: Vec<_> = SearchField::all().iter().map(|f| f.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), SearchField::all().len());
    }

    #[test]
    fn test_storage_policy() {
        assert!(SearchField::Url.is_stored());
        assert!(SearchField::Hostname.is_stored());
        assert!(SearchField::PageTitle.is_stored());
        assert!(!SearchField::PageContent.is_stored());
    }

    #[test]
    fn test_fields_of_type() {
        assert_eq!(
            SearchField::fields_of_type(FieldType::ExactString),
            vec![SearchField::Url, SearchField::Hostname]
        );
        assert!(SearchField::fields_of_type(FieldType::Integer).is_empty());
    }

    #[test]
    fn test_from_name_ignores_case() {
        assert_eq!(SearchField::from_name("url"), Some(SearchField::Url));
        assert_eq!(SearchField::from_name("pagecontent"), Some(SearchField::PageContent));
        assert_eq!(SearchField::from_name("Body"), None);
    }

    #[test]
    fn test_serde_uses_field_names() {
        let json = serde_json::to_string(&SearchField::Url).unwrap();
        assert_eq!(json, "\"URL\"");
        let field: SearchField = serde_json::from_str("\"PageTitle\"").unwrap();
        assert_eq!(field, SearchField::PageTitle);
    }
}
