//! Test doubles shared by the unit tests

use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, IndexErrorKind, Result};
use crate::fs::{EntryKind, FileSystem, FsEntry};
use crate::models::MediaRecord;
use crate::store::CatalogStore;

#[derive(Default)]
struct Tree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
    denied: HashSet<PathBuf>,
    listings: HashMap<PathBuf, usize>,
}

/// In-memory directory tree that counts listings.
///
/// Listing can be held with `close_gate` so a scan stays running until
/// `open_gate` is called.
#[derive(Default)]
pub struct MemoryFileSystem {
    tree: Mutex<Tree>,
    gate_closed: Mutex<bool>,
    gate: Condvar,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory and all its ancestors
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut tree = self.tree.lock();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            tree.dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Add a file and all its parent directories
    pub fn add_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.tree.lock().files.insert(path);
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.tree.lock().files.remove(path.as_ref());
    }

    /// Make listing `path` fail with permission denied
    pub fn deny(&self, path: impl Into<PathBuf>) {
        self.tree.lock().denied.insert(path.into());
    }

    /// Number of times `path` was listed
    pub fn list_count(&self, path: &Path) -> usize {
        self.tree.lock().listings.get(path).copied().unwrap_or(0)
    }

    /// Total number of listings across all directories
    pub fn total_listings(&self) -> usize {
        self.tree.lock().listings.values().sum()
    }

    pub fn close_gate(&self) {
        *self.gate_closed.lock() = true;
    }

    pub fn open_gate(&self) {
        *self.gate_closed.lock() = false;
        self.gate.notify_all();
    }
}

impl FileSystem for MemoryFileSystem {
    fn list_dir(&self, dir: &Path) -> Result<Vec<FsEntry>> {
        {
            let mut closed = self.gate_closed.lock();
            while *closed {
                self.gate.wait(&mut closed);
            }
        }

        let mut tree = self.tree.lock();
        *tree.listings.entry(dir.to_path_buf()).or_insert(0) += 1;

        if tree.denied.contains(dir) {
            return Err(IndexError::new(
                IndexErrorKind::PermissionDenied,
                Some(dir.to_path_buf()),
                "permission denied",
            ));
        }
        if !tree.dirs.contains(dir) {
            return Err(IndexError::not_found(dir.to_path_buf()));
        }

        let child_of = |p: &PathBuf| p.parent() == Some(dir);
        let mut entries: Vec<FsEntry> = tree
            .dirs
            .iter()
            .filter(|p| child_of(*p))
            .map(|p| FsEntry::new(p.clone(), EntryKind::Directory))
            .chain(
                tree.files
                    .iter()
                    .filter(|p| child_of(*p))
                    .map(|p| FsEntry::new(p.clone(), EntryKind::File)),
            )
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

/// Store wrapper whose deletes fail for selected paths
pub struct FailingDeleteStore<S> {
    inner: S,
    failing: HashSet<PathBuf>,
}

impl<S: CatalogStore> FailingDeleteStore<S> {
    pub fn new<I, P>(inner: S, failing: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            inner,
            failing: failing.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: CatalogStore> CatalogStore for FailingDeleteStore<S> {
    fn persisted_roots(&self) -> Result<Vec<PathBuf>> {
        self.inner.persisted_roots()
    }

    fn add_root(&self, root: &Path) -> Result<()> {
        self.inner.add_root(root)
    }

    fn remove_root(&self, root: &Path) -> Result<()> {
        self.inner.remove_root(root)
    }

    fn all_records(&self) -> Result<HashMap<PathBuf, MediaRecord>> {
        self.inner.all_records()
    }

    fn upsert_record(&self, record: &MediaRecord) -> Result<()> {
        self.inner.upsert_record(record)
    }

    fn delete_record(&self, path: &Path) -> Result<()> {
        if self.failing.contains(path) {
            return Err(IndexError::database_error("store unavailable").with_path(path));
        }
        self.inner.delete_record(path)
    }
}
