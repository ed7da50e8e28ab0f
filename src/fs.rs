//! Filesystem access used by the scanner
//!
//! The scanner only ever needs one directory level at a time, so the
//! abstraction is a single `list_dir` call. `LocalFileSystem` backs it with
//! walkdir; tests substitute an in-memory tree.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{IndexError, Result};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, sockets, devices
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub hidden: bool,
}

impl FsEntry {
    /// Build an entry, deriving `hidden` from the file name
    pub fn new(path: PathBuf, kind: EntryKind) -> Self {
        let hidden = is_hidden_name(&path);
        Self { path, kind, hidden }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Final path component, lossily converted
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn is_hidden_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Directory listing source
pub trait FileSystem: Send + Sync {
    /// List the immediate children of `dir`.
    ///
    /// An error means the directory itself could not be read.
    fn list_dir(&self, dir: &Path) -> Result<Vec<FsEntry>>;
}

/// Local disk, listed one level at a time with walkdir
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn list_dir(&self, dir: &Path) -> Result<Vec<FsEntry>> {
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        let mut entries = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    let kind = if file_type.is_dir() {
                        EntryKind::Directory
                    } else if file_type.is_file() {
                        EntryKind::File
                    } else {
                        EntryKind::Other
                    };
                    entries.push(FsEntry::new(entry.into_path(), kind));
                }
                // Depth 0 is the directory itself: nothing can be listed
                Err(e) if e.depth() == 0 => {
                    return Err(IndexError::from(e).with_path(dir));
                }
                Err(e) => {
                    log::debug!("Skipping unreadable entry in {:?}: {}", dir, e);
                }
            }
        }
        Ok(entries)
    }
}
