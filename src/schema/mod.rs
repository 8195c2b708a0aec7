//! Field schema for indexed pages.
//!
//! [`field`] declares the value types and storage policies a field can have and
//! converts typed values into index-ready fields. [`schema`] declares the fixed
//! set of fields this index knows about.

pub mod field;
#[allow(clippy::module_inception)]
pub mod schema;

pub use field::{FieldDescriptor, FieldType, FieldValue, IndexableField, to_indexable};
pub use schema::SearchField;
