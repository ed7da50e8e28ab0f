//! Media entry filter
//!
//! Decides which directory entries the scanner looks at: every visible
//! directory, and visible files whose extension is on the allow-list.

use std::collections::HashSet;

use crate::fs::FsEntry;

/// Extension-based entry filter
#[derive(Debug, Clone)]
pub struct MediaFilter {
    /// Lowercase extensions without the leading dot
    extensions: HashSet<String>,
}

impl MediaFilter {
    /// Create a filter from an extension allow-list
    pub fn new(extensions: HashSet<String>) -> Self {
        Self { extensions }
    }

    /// Check whether an entry should be traversed or indexed
    pub fn accept(&self, entry: &FsEntry) -> bool {
        if entry.hidden {
            return false;
        }
        if entry.is_dir() {
            return true;
        }
        entry.is_file() && self.accepts_name(&entry.file_name())
    }

    /// Check a file name against the allow-list, ignoring case
    pub fn accepts_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        match lower.rsplit_once('.') {
            Some((_, ext)) => self.extensions.contains(ext),
            None => false,
        }
    }
}
