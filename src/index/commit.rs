//! Commit points.
//!
//! A commit point names the segments that make up one generation of the
//! index together with each segment's deleted documents. The commit point
//! with the highest generation is authoritative; anything it does not
//! reference is garbage left over from an older generation or a crash.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{OnionIndexError, Result};
use crate::index::segment::SEGMENT_EXTENSION;
use crate::storage::{FileStorage, TEMP_SUFFIX};

const COMMIT_PREFIX: &str = "segments_";
const COMMIT_EXTENSION: &str = ".json";

/// One segment as seen by a commit point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Segment file name.
    pub name: String,
    /// Documents written to the segment, deleted ones included.
    pub doc_count: u32,
    /// Deleted document numbers, sorted and unique.
    #[serde(default)]
    pub deleted: Vec<u32>,
}

impl SegmentMeta {
    pub fn new(name: impl Into<String>, doc_count: u32) -> Self {
        SegmentMeta {
            name: name.into(),
            doc_count,
            deleted: Vec::new(),
        }
    }

    pub fn live_docs(&self) -> u32 {
        self.doc_count - self.deleted.len() as u32
    }

    pub fn is_deleted(&self, doc: u32) -> bool {
        self.deleted.binary_search(&doc).is_ok()
    }
}

/// A durable generation of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitPoint {
    pub generation: u64,
    pub committed_at: DateTime<Utc>,
    pub segments: Vec<SegmentMeta>,
}

impl CommitPoint {
    /// The empty first generation.
    pub fn initial() -> Self {
        CommitPoint {
            generation: 1,
            committed_at: Utc::now(),
            segments: Vec::new(),
        }
    }

    /// The generation following this one, with the given segments.
    pub fn next(&self, segments: Vec<SegmentMeta>) -> Self {
        CommitPoint {
            generation: self.generation + 1,
            committed_at: Utc::now(),
            segments,
        }
    }

    pub fn file_name(generation: u64) -> String {
        format!("{COMMIT_PREFIX}{generation}{COMMIT_EXTENSION}")
    }

    /// Generation encoded in a commit point file name.
    pub fn parse_generation(file_name: &str) -> Option<u64> {
        file_name
            .strip_prefix(COMMIT_PREFIX)?
            .strip_suffix(COMMIT_EXTENSION)?
            .parse()
            .ok()
    }

    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.live_docs() as u64).sum()
    }

    /// Files this commit point needs, its own file included.
    pub fn referenced_files(&self) -> HashSet<String> {
        let mut files: HashSet<String> = self.segments.iter().map(|s| s.name.clone()).collect();
        files.insert(Self::file_name(self.generation));
        files
    }

    /// Read the newest commit point that parses. Unreadable commit points are
    /// skipped with a warning; if some exist but none can be read the index
    /// is unavailable.
    pub fn read_latest(storage: &FileStorage) -> Result<Option<CommitPoint>> {
        let mut generations: Vec<u64> = storage
            .list_files()?
            .iter()
            .filter_map(|name| Self::parse_generation(name))
            .collect();
        generations.sort_unstable_by(|a, b| b.cmp(a));

        if generations.is_empty() {
            return Ok(None);
        }

        for generation in &generations {
            let name = Self::file_name(*generation);
            let parsed = storage
                .read(&name)
                .and_then(|bytes| Ok(serde_json::from_slice::<CommitPoint>(&bytes)?));

            match parsed {
                Ok(commit) if commit.generation == *generation => return Ok(Some(commit)),
                Ok(commit) => warn!(
                    file = %name,
                    recorded = commit.generation,
                    "commit point generation does not match its file name, skipping"
                ),
                Err(e) => warn!(file = %name, error = %e, "unreadable commit point, skipping"),
            }
        }

        Err(OnionIndexError::index_unavailable(format!(
            "none of {} commit point(s) in {} could be read",
            generations.len(),
            storage.directory().display()
        )))
    }

    /// Write this commit point durably. The file appears atomically.
    pub fn write(&self, storage: &FileStorage) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        storage.write_atomic(&Self::file_name(self.generation), &bytes)
    }

    /// Delete index files that this commit point does not reference.
    ///
    /// Failures are logged and skipped; an orphan file costs disk space but
    /// never affects correctness.
    pub fn remove_unreferenced(&self, storage: &FileStorage) -> Result<usize> {
        let referenced = self.referenced_files();
        let mut removed = 0;

        for name in storage.list_files()? {
            let is_index_file = name.ends_with(SEGMENT_EXTENSION)
                || name.ends_with(TEMP_SUFFIX)
                || Self::parse_generation(&name).is_some();
            if !is_index_file || referenced.contains(&name) {
                continue;
            }

            match storage.delete_file(&name) {
                Ok(()) => {
                    debug!(file = %name, "removed unreferenced index file");
                    removed += 1;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "failed to remove unreferenced index file")
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_round_trip() {
        assert_eq!(CommitPoint::file_name(12), "segments_12.json");
        assert_eq!(CommitPoint::parse_generation("segments_12.json"), Some(12));
        assert_eq!(CommitPoint::parse_generation("segments_x.json"), None);
        assert_eq!(CommitPoint::parse_generation("segments_3.json.tmp"), None);
        assert_eq!(CommitPoint::parse_generation("write.lock"), None);
    }

    #[test]
    fn test_read_latest_picks_highest_generation() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        assert!(CommitPoint::read_latest(&storage).unwrap().is_none());

        let first = CommitPoint::initial();
        first.write(&storage).unwrap();
        let second = first.next(vec![SegmentMeta::new("a.seg", 3)]);
        second.write(&storage).unwrap();

        let latest = CommitPoint::read_latest(&storage).unwrap().unwrap();
        assert_eq!(latest, second);
        assert_eq!(latest.num_docs(), 3);
    }

    #[test]
    fn test_read_latest_skips_corrupt() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        CommitPoint::initial().write(&storage).unwrap();
        storage.write_new("segments_2.json", b"{ not json").unwrap();

        let latest = CommitPoint::read_latest(&storage).unwrap().unwrap();
        assert_eq!(latest.generation, 1);
    }

    #[test]
    fn test_read_latest_all_corrupt() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.write_new("segments_1.json", b"garbage").unwrap();

        let result = CommitPoint::read_latest(&storage);
        assert!(matches!(result, Err(OnionIndexError::IndexUnavailable(_))));
    }

    #[test]
    fn test_remove_unreferenced() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        let old = CommitPoint::initial();
        old.write(&storage).unwrap();
        let current = old.next(vec![SegmentMeta::new("keep.seg", 1)]);
        current.write(&storage).unwrap();
        storage.write_new("keep.seg", b"x").unwrap();
        storage.write_new("orphan.seg", b"x").unwrap();
        storage.write_new("segments_3.json.tmp", b"x").unwrap();
        storage.write_new("write.lock", b"").unwrap();
        storage.write_new("notes.txt", b"x").unwrap();

        let removed = current.remove_unreferenced(&storage).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(
            storage.list_files().unwrap(),
            vec!["keep.seg", "notes.txt", "segments_2.json", "write.lock"]
        );
    }

    #[test]
    fn test_segment_meta_deletions() {
        let mut meta = SegmentMeta::new("a.seg", 4);
        meta.deleted = vec![1, 3];
        assert_eq!(meta.live_docs(), 2);
        assert!(meta.is_deleted(3));
        assert!(!meta.is_deleted(2));
    }
}
