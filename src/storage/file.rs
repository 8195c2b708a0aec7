//! File-based storage for the index directory.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{OnionIndexError, Result};
use crate::storage::TEMP_SUFFIX;

/// File operations scoped to one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
}

impl FileStorage {
    /// Open storage in the given directory, creating it if it doesn't exist.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            fs::create_dir_all(&directory).map_err(|e| {
                OnionIndexError::storage_io(format!(
                    "failed to create directory {}: {e}",
                    directory.display()
                ))
            })?;
        }

        if !directory.is_dir() {
            return Err(OnionIndexError::storage_io(format!(
                "path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the full path for a file name.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    /// Write a file that must not exist yet and sync it to disk.
    pub fn write_new(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.file_path(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| OnionIndexError::storage_io(format!("failed to create {name}: {e}")))?;

        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| OnionIndexError::storage_io(format!("failed to write {name}: {e}")))?;
        Ok(())
    }

    /// Replace a file atomically: write a temp file, sync it, rename it over
    /// the target and sync the directory.
    pub fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let temp_name = format!("{name}{TEMP_SUFFIX}");
        let temp_path = self.file_path(&temp_name);

        let result = (|| -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, self.file_path(name))
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(OnionIndexError::storage_io(format!(
                "failed to write {name}: {e}"
            )));
        }

        self.sync_directory()
    }

    /// Read a whole file.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        fs::read(self.file_path(name))
            .map_err(|e| OnionIndexError::storage_io(format!("failed to read {name}: {e}")))
    }

    /// Memory-map a file for reading.
    pub fn map(&self, name: &str) -> Result<Mmap> {
        let file = File::open(self.file_path(name))
            .map_err(|e| OnionIndexError::storage_io(format!("failed to open {name}: {e}")))?;

        // SAFETY: segment files are written once, synced, and never modified
        // afterwards; they are only deleted once no commit point references them.
        unsafe { Mmap::map(&file) }
            .map_err(|e| OnionIndexError::storage_io(format!("failed to map {name}: {e}")))
    }

    /// Delete a file if it exists.
    pub fn delete_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OnionIndexError::storage_io(format!(
                "failed to delete {name}: {e}"
            ))),
        }
    }

    /// List the regular files in the directory, sorted by name.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.directory).map_err(|e| {
            OnionIndexError::storage_io(format!(
                "failed to list {}: {e}",
                self.directory.display()
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                files.push(name.to_string());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Sum of the sizes of all files in the directory.
    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0;
        for name in self.list_files()? {
            total += fs::metadata(self.file_path(&name))?.len();
        }
        Ok(total)
    }

    /// Make renames and deletions in the directory durable.
    pub fn sync_directory(&self) -> Result<()> {
        #[cfg(unix)]
        {
            File::open(&self.directory)
                .and_then(|dir| dir.sync_all())
                .map_err(|e| {
                    OnionIndexError::storage_io(format!(
                        "failed to sync {}: {e}",
                        self.directory.display()
                    ))
                })?;
        }
        Ok(())
    }
}
