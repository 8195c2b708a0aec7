//! Segment contents and their on-disk encoding.
//!
//! A segment file is a fixed header followed by a `bincode` payload:
//!
//! ```text
//! magic    u32  "OIDX"
//! version  u32
//! length   u64  payload length in bytes
//! crc32    u32  checksum of the payload
//! payload  [u8; length]
//! ```

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{OnionIndexError, Result};
use crate::schema::{FieldValue, IndexableField};

pub const SEGMENT_MAGIC: u32 = 0x4F49_4458;
pub const SEGMENT_VERSION: u32 = 1;
pub const SEGMENT_EXTENSION: &str = ".seg";
const HEADER_LEN: usize = 4 + 4 + 8 + 4;

/// Occurrences of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: u32,
    /// Token positions, ascending. Its length is the term frequency.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Inverted index and length norms for one field of a segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldIndex {
    /// Term dictionary. Posting lists are sorted by document.
    pub terms: BTreeMap<String, Vec<Posting>>,
    /// Token count per document; zero where the document lacks the field.
    pub lengths: Vec<u32>,
    /// Number of documents that have the field.
    pub doc_count: u32,
    /// Sum of `lengths`.
    pub total_length: u64,
}

impl FieldIndex {
    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.terms.get(term).map(Vec::as_slice)
    }

    /// Terms starting with `prefix`, in dictionary order.
    pub fn terms_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Vec<Posting>)> + 'a {
        self.terms
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(term, _)| term.starts_with(prefix))
    }

    pub fn length(&self, doc: u32) -> u32 {
        self.lengths.get(doc as usize).copied().unwrap_or(0)
    }
}

/// Stored form of a field value. Kept separate from [`FieldValue`], whose
/// untagged JSON form cannot round-trip through `bincode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum StoredValue {
    Text(String),
    Integer(i64),
}

impl From<&FieldValue> for StoredValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(text) => StoredValue::Text(text.clone()),
            FieldValue::Integer(number) => StoredValue::Integer(*number),
        }
    }
}

impl From<&StoredValue> for FieldValue {
    fn from(value: &StoredValue) -> Self {
        match value {
            StoredValue::Text(text) => FieldValue::Text(text.clone()),
            StoredValue::Integer(number) => FieldValue::Integer(*number),
        }
    }
}

/// The full contents of one segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    doc_count: u32,
    fields: BTreeMap<String, FieldIndex>,
    stored: Vec<BTreeMap<String, StoredValue>>,
}

impl SegmentData {
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn field(&self, name: &str) -> Option<&FieldIndex> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldIndex)> {
        self.fields.iter()
    }

    /// Stored field values of a document.
    pub fn stored_fields(&self, doc: u32) -> BTreeMap<String, FieldValue> {
        self.stored
            .get(doc as usize)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), FieldValue::from(value)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append a document given as index-ready fields. Returns its document number.
    pub fn add_document(&mut self, fields: &[IndexableField]) -> u32 {
        let doc = self.doc_count;
        let mut stored = BTreeMap::new();

        for field in fields {
            let tokens = field.tokens();
            let index = self.fields.entry(field.name.to_string()).or_default();

            for token in &tokens {
                let postings = index.terms.entry(token.text.clone()).or_default();
                match postings.last_mut() {
                    Some(posting) if posting.doc == doc => posting.positions.push(token.position),
                    _ => postings.push(Posting {
                        doc,
                        positions: vec![token.position],
                    }),
                }
            }

            index.lengths.resize(doc as usize + 1, 0);
            index.lengths[doc as usize] += tokens.len() as u32;
            index.doc_count += 1;
            index.total_length += tokens.len() as u64;

            if let Some(value) = &field.stored {
                stored.insert(field.name.to_string(), StoredValue::from(value));
            }
        }

        self.stored.push(stored);
        self.doc_count += 1;
        doc
    }

    /// Pad per-document arrays so every field covers every document.
    fn seal(&mut self) {
        for index in self.fields.values_mut() {
            index.lengths.resize(self.doc_count as usize, 0);
        }
    }

    /// Merge segments into one, dropping each segment's deleted documents
    /// (given as a sorted list). Documents keep their relative order.
    pub fn merge<'a, I>(segments: I) -> SegmentData
    where
        I: IntoIterator<Item = (&'a SegmentData, &'a [u32])>,
    {
        let mut merged = SegmentData::default();

        for (segment, deleted) in segments {
            let mut remap = vec![None; segment.doc_count as usize];
            for doc in 0..segment.doc_count {
                if deleted.binary_search(&doc).is_err() {
                    remap[doc as usize] = Some(merged.doc_count);
                    merged.stored.push(segment.stored[doc as usize].clone());
                    merged.doc_count += 1;
                }
            }

            for (name, index) in &segment.fields {
                let target = merged.fields.entry(name.clone()).or_default();
                for (term, postings) in &index.terms {
                    let remapped = postings.iter().filter_map(|posting| {
                        remap[posting.doc as usize].map(|doc| Posting {
                            doc,
                            positions: posting.positions.clone(),
                        })
                    });
                    let list = target.terms.entry(term.clone()).or_default();
                    list.extend(remapped);
                }

                for (doc, new_doc) in remap.iter().enumerate() {
                    if let Some(new_doc) = new_doc {
                        let length = index.length(doc as u32);
                        target.lengths.resize(*new_doc as usize + 1, 0);
                        target.lengths[*new_doc as usize] = length;
                        target.total_length += length as u64;
                        if length > 0 || segment.stored[doc].contains_key(name) {
                            target.doc_count += 1;
                        }
                    }
                }
            }
        }

        for index in merged.fields.values_mut() {
            index.terms.retain(|_, postings| !postings.is_empty());
        }
        merged.seal();
        merged
    }

    /// Encode into the on-disk format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut sealed;
        let data = if self.fields.values().all(|f| f.lengths.len() == self.doc_count as usize) {
            self
        } else {
            sealed = self.clone();
            sealed.seal();
            &sealed
        };

        let payload = bincode::serialize(data)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.write_u32::<LittleEndian>(SEGMENT_MAGIC)?;
        bytes.write_u32::<LittleEndian>(SEGMENT_VERSION)?;
        bytes.write_u64::<LittleEndian>(payload.len() as u64)?;
        bytes.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
        bytes.write_all(&payload)?;
        Ok(bytes)
    }

    /// Decode from the on-disk format, verifying header and checksum.
    pub fn decode(bytes: &[u8]) -> Result<SegmentData> {
        if bytes.len() < HEADER_LEN {
            return Err(OnionIndexError::index_unavailable(format!(
                "segment truncated: {} bytes",
                bytes.len()
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != SEGMENT_MAGIC {
            return Err(OnionIndexError::index_unavailable(format!(
                "bad segment magic {magic:#010x}"
            )));
        }
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != SEGMENT_VERSION {
            return Err(OnionIndexError::index_unavailable(format!(
                "unsupported segment version {version}"
            )));
        }
        let length = cursor.read_u64::<LittleEndian>()? as usize;
        let checksum = cursor.read_u32::<LittleEndian>()?;

        let mut payload = Vec::with_capacity(length.min(bytes.len()));
        cursor.take(length as u64).read_to_end(&mut payload)?;
        if payload.len() != length {
            return Err(OnionIndexError::index_unavailable(format!(
                "segment payload truncated: {} of {length} bytes",
                payload.len()
            )));
        }
        if crc32fast::hash(&payload) != checksum {
            return Err(OnionIndexError::index_unavailable(
                "segment checksum mismatch",
            ));
        }

        bincode::deserialize(&payload).map_err(|e| {
            OnionIndexError::index_unavailable(format!("segment payload unreadable: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn segment_of(docs: &[Document]) -> SegmentData {
        let mut segment = SegmentData::default();
        for doc in docs {
            segment.add_document(&doc.to_indexable().unwrap());
        }
        segment
    }

    fn pages() -> Vec<Document> {
        vec![
            Document::page("http://a.onion/1", "a.onion", "Hello", "world wide world"),
            Document::page("http://a.onion/2", "a.onion", "Other", "nothing here"),
        ]
    }

    #[test]
    fn test_postings_and_lengths() {
        let segment = segment_of(&pages());
        assert_eq!(segment.doc_count(), 2);

        let content = segment.field("PageContent").unwrap();
        let world = content.postings("world").unwrap();
        assert_eq!(world.len(), 1);
        assert_eq!(world[0].doc, 0);
        assert_eq!(world[0].positions, vec![0, 2]);
        assert_eq!(content.length(0), 3);
        assert_eq!(content.length(1), 2);
        assert_eq!(content.total_length, 5);

        let url = segment.field("URL").unwrap();
        assert!(url.postings("http://a.onion/2").is_some());
    }

    #[test]
    fn test_unstored_field_not_retrievable() {
        let segment = segment_of(&pages());
        let stored = segment.stored_fields(0);

        assert_eq!(stored.get("PageTitle"), Some(&FieldValue::from("Hello")));
        assert!(!stored.contains_key("PageContent"));
    }

    #[test]
    fn test_prefix_terms() {
        let segment = segment_of(&pages());
        let content = segment.field("PageContent").unwrap();

        let terms: Vec<_> = content.terms_with_prefix("w").map(|(t, _)| t.as_str()).collect();
        assert_eq!(terms, vec!["wide", "world"]);
    }

    #[test]
    fn test_encode_decode() {
        let segment = segment_of(&pages());
        let bytes = segment.encode().unwrap();
        assert_eq!(SegmentData::decode(&bytes).unwrap(), segment);
    }

    #[test]
    fn test_decode_detects_corruption() {
        let mut bytes = segment_of(&pages()).encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let result = SegmentData::decode(&bytes);
        assert!(matches!(result, Err(OnionIndexError::IndexUnavailable(_))));

        let result = SegmentData::decode(&bytes[..10]);
        assert!(matches!(result, Err(OnionIndexError::IndexUnavailable(_))));
    }

    #[test]
    fn test_merge_drops_deleted() {
        let first = segment_of(&pages());
        let second = segment_of(&[Document::page(
            "http://b.onion/",
            "b.onion",
            "Third",
            "wide open",
        )]);

        let merged = SegmentData::merge([(&first, &[0u32][..]), (&second, &[][..])]);

        assert_eq!(merged.doc_count(), 2);
        let content = merged.field("PageContent").unwrap();
        assert!(content.postings("world").is_none());
        assert_eq!(content.postings("wide").unwrap()[0].doc, 1);
        assert_eq!(content.lengths, vec![2, 2]);
        assert_eq!(
            merged.stored_fields(1).get("URL"),
            Some(&FieldValue::from("http://b.onion/"))
        );
    }
}
