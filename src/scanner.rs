//! Scanner module - traversal and reconciliation against the catalog store
//!
//! A scan walks every root twice with an explicit stack: the first pass
//! only counts accepted files so progress has a total, the second builds
//! the new catalog. Records already in the store are reused, new files get
//! fresh records, and store entries that were not seen are deleted.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::error::IndexError;
use crate::filter::MediaFilter;
use crate::fs::{FileSystem, FsEntry};
use crate::metadata::MetadataResolver;
use crate::models::{MediaRecord, ScanSummary};
use crate::progress::ProgressReporter;
use crate::store::CatalogStore;

/// Traversal and reconciliation engine
pub struct Scanner {
    store: Arc<dyn CatalogStore>,
    fs: Arc<dyn FileSystem>,
    resolver: Arc<dyn MetadataResolver>,
    filter: MediaFilter,
    default_root: PathBuf,
}

/// Outcome of the loading pass
struct LoadOutcome {
    records: Vec<MediaRecord>,
    seen: HashSet<PathBuf>,
}

impl Scanner {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fs: Arc<dyn FileSystem>,
        resolver: Arc<dyn MetadataResolver>,
        filter: MediaFilter,
        default_root: PathBuf,
    ) -> Self {
        Self {
            store,
            fs,
            resolver,
            filter,
            default_root,
        }
    }

    /// Run one complete scan.
    ///
    /// `publish` receives the rebuilt catalog after the loading pass and
    /// before stale records are deleted from the store.
    pub fn run<F>(&self, progress: &ProgressReporter, publish: F) -> ScanSummary
    where
        F: FnOnce(Vec<MediaRecord>),
    {
        let start = Instant::now();
        let mut summary = ScanSummary {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let roots = self.resolve_roots(&mut summary.errors);
        log::info!("Scanning roots: {:?}", roots);
        progress.begin(&roots);

        let existing = match self.store.all_records() {
            Ok(existing) => existing,
            Err(e) => {
                log::warn!("Failed to load catalog records: {}", e);
                summary.errors.push(e);
                HashMap::new()
            }
        };

        summary.total_files = self.count_files(&roots);
        let outcome = self.load_records(&roots, &existing, progress, &mut summary);
        summary.roots = roots;

        publish(outcome.records);

        self.purge_stale(&existing, &outcome.seen, &mut summary);

        summary.duration_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Scan finished: {} files ({} new, {} reused), {} removed, {} errors in {}ms",
            summary.loaded_files,
            summary.new_files,
            summary.reused_files,
            summary.removed_files,
            summary.error_count(),
            summary.duration_ms
        );
        progress.end(&summary);
        summary
    }

    /// Persisted roots, or the default root when none are configured
    fn resolve_roots(&self, errors: &mut Vec<IndexError>) -> Vec<PathBuf> {
        let roots = match self.store.persisted_roots() {
            Ok(roots) => roots,
            Err(e) => {
                log::warn!("Failed to read persisted roots: {}", e);
                errors.push(e);
                Vec::new()
            }
        };
        if roots.is_empty() {
            vec![self.default_root.clone()]
        } else {
            roots
        }
    }

    /// Depth-first walk from `roots`, calling `visit` for each accepted file.
    ///
    /// Directories that cannot be listed contribute no entries.
    fn walk<V>(&self, roots: &[PathBuf], errors: &mut Vec<IndexError>, mut visit: V)
    where
        V: FnMut(FsEntry),
    {
        let mut stack: Vec<PathBuf> = roots.to_vec();

        while let Some(dir) = stack.pop() {
            let entries = match self.fs.list_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Cannot list {:?}: {}", dir, e);
                    errors.push(e.with_path(dir));
                    continue;
                }
            };

            for entry in entries {
                if !self.filter.accept(&entry) {
                    continue;
                }
                if entry.is_dir() {
                    stack.push(entry.path);
                } else {
                    visit(entry);
                }
            }
        }
    }

    /// First pass: count accepted files
    fn count_files(&self, roots: &[PathBuf]) -> u64 {
        let mut total = 0u64;
        // Listing failures are reported once, by the loading pass
        let mut ignored = Vec::new();
        self.walk(roots, &mut ignored, |_| total += 1);
        total
    }

    /// Second pass: build the new catalog
    fn load_records(
        &self,
        roots: &[PathBuf],
        existing: &HashMap<PathBuf, MediaRecord>,
        progress: &ProgressReporter,
        summary: &mut ScanSummary,
    ) -> LoadOutcome {
        let total = summary.total_files;
        let mut records = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut processed = 0u64;
        let mut new_files = 0u64;
        let mut reused_files = 0u64;
        let mut errors = Vec::new();
        let mut walk_errors = Vec::new();

        self.walk(roots, &mut walk_errors, |entry| {
            progress.update(&entry.file_name(), processed, total);
            processed += 1;

            // Overlapping roots reach the same file more than once
            if seen.contains(&entry.path) {
                return;
            }

            let record = match existing.get(&entry.path) {
                Some(record) => {
                    reused_files += 1;
                    record.clone()
                }
                None => {
                    new_files += 1;
                    self.create_record(entry.path.clone(), &mut errors)
                }
            };
            records.push(record);
            seen.insert(entry.path);
        });

        summary.loaded_files = processed;
        summary.new_files = new_files;
        summary.reused_files = reused_files;
        summary.errors.append(&mut walk_errors);
        summary.errors.append(&mut errors);

        LoadOutcome { records, seen }
    }

    /// Build and persist a record for a file the store does not know yet
    fn create_record(&self, path: PathBuf, errors: &mut Vec<IndexError>) -> MediaRecord {
        let mut record = MediaRecord::new(path);

        // A panicking resolver costs this file its tags, not the scan
        let resolved = catch_unwind(AssertUnwindSafe(|| self.resolver.resolve(&record.path)))
            .unwrap_or_else(|_| {
                Err(IndexError::metadata_error(
                    record.path.clone(),
                    "metadata resolver panicked",
                ))
            });

        match resolved {
            Ok(tags) => record = record.with_tags(tags),
            Err(e) => {
                log::warn!("Metadata resolution failed for {:?}: {}", record.path, e);
                errors.push(e.with_path(record.path.clone()));
            }
        }

        if let Err(e) = self.store.upsert_record(&record) {
            log::warn!("Failed to store {:?}: {}", record.path, e);
            errors.push(e.with_path(record.path.clone()));
        }

        record
    }

    /// Delete every store record that the loading pass did not see
    fn purge_stale(
        &self,
        existing: &HashMap<PathBuf, MediaRecord>,
        seen: &HashSet<PathBuf>,
        summary: &mut ScanSummary,
    ) {
        for path in stale_paths(existing, seen) {
            match self.store.delete_record(&path) {
                Ok(()) => {
                    log::debug!("Removed stale record {:?}", path);
                    summary.removed_files += 1;
                }
                Err(e) => {
                    log::warn!("Failed to remove stale record {:?}: {}", path, e);
                    summary.failed_deletes += 1;
                    summary.errors.push(e.with_path(path));
                }
            }
        }
    }
}

/// Paths present in the store but not seen by the scan, sorted
pub fn stale_paths(
    existing: &HashMap<PathBuf, MediaRecord>,
    seen: &HashSet<PathBuf>,
) -> Vec<PathBuf> {
    let mut stale: Vec<PathBuf> = existing
        .keys()
        .filter(|path| !seen.contains(path.as_path()))
        .cloned()
        .collect();
    stale.sort();
    stale
}
