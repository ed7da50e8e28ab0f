//! Media library service
//!
//! Owns the in-memory catalog and runs scans on a background thread. At
//! most one scan runs at a time: a request while one is alive is dropped.
//! Readers always see a complete catalog, either the previous one or the
//! one published at the end of the loading pass.

use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::catalog::CatalogSnapshot;
use crate::config::IndexerConfig;
use crate::db::SqliteCatalogStore;
use crate::error::{IndexError, IndexErrorKind, Result};
use crate::filter::MediaFilter;
use crate::fs::{FileSystem, LocalFileSystem};
use crate::metadata::{LoftyResolver, MetadataResolver, NoopResolver};
use crate::models::{MediaAttribute, MediaRecord, MediaType, ScanSummary};
use crate::observers::{CatalogEvent, ObserverRegistry, SubscriptionId};
use crate::progress::{ProgressReporter, ProgressSnapshot};
use crate::scanner::Scanner;
use crate::store::CatalogStore;

/// Poll interval of `wait_for_scan`
const WAIT_POLL: Duration = Duration::from_millis(5);

/// State shared with the scan thread
struct Shared {
    scanner: Scanner,
    store: Arc<dyn CatalogStore>,
    catalog: RwLock<CatalogSnapshot>,
    observers: ObserverRegistry,
    progress: ProgressReporter,
    last_summary: Mutex<Option<ScanSummary>>,
}

impl Shared {
    fn run_scan(&self) -> ScanSummary {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.scanner.run(&self.progress, |records| {
                *self.catalog.write() = CatalogSnapshot::new(records);
                let delivered = self.observers.publish(CatalogEvent::Updated);
                log::debug!("Catalog update delivered to {} observers", delivered);
            })
        }));

        let summary = outcome.unwrap_or_else(|_| {
            // Progress must not stay active after an aborted scan
            log::error!("Scan aborted by a panic");
            let mut summary = ScanSummary::new();
            summary.errors.push(IndexError::new(
                IndexErrorKind::Unknown,
                None,
                "scan aborted by a panic",
            ));
            self.progress.end(&summary);
            summary
        });
        *self.last_summary.lock() = Some(summary.clone());
        summary
    }
}

/// Builder for `MediaLibrary`
pub struct MediaLibraryBuilder {
    config: IndexerConfig,
    store: Arc<dyn CatalogStore>,
    fs: Arc<dyn FileSystem>,
    resolver: Arc<dyn MetadataResolver>,
}

impl MediaLibraryBuilder {
    /// Replace the filesystem the scanner lists
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Replace the metadata resolver used for new files
    pub fn resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn build(self) -> MediaLibrary {
        let scanner = Scanner::new(
            Arc::clone(&self.store),
            self.fs,
            self.resolver,
            MediaFilter::new(self.config.extensions.clone()),
            self.config.default_root.clone(),
        );
        let progress = ProgressReporter::with_output(
            self.config.progress_output,
            self.config.progress_interval_ms,
        );

        MediaLibrary {
            shared: Arc::new(Shared {
                scanner,
                store: self.store,
                catalog: RwLock::new(CatalogSnapshot::default()),
                observers: ObserverRegistry::new(),
                progress,
                last_summary: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }
}

/// Media catalog with single-flight background rescans
pub struct MediaLibrary {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<ScanSummary>>>,
}

impl MediaLibrary {
    /// Start building a library over `store`
    pub fn builder(config: IndexerConfig, store: Arc<dyn CatalogStore>) -> MediaLibraryBuilder {
        MediaLibraryBuilder {
            config,
            store,
            fs: Arc::new(LocalFileSystem::new()),
            resolver: Arc::new(NoopResolver),
        }
    }

    /// Open the SQLite catalog named by `config` and build a library on it.
    ///
    /// Audio tags of new files are read with `LoftyResolver`.
    pub fn open(config: IndexerConfig) -> Result<Self> {
        let store = SqliteCatalogStore::open(&config.effective_db_path())?;
        Ok(Self::builder(config, Arc::new(store))
            .resolver(Arc::new(LoftyResolver::new()))
            .build())
    }

    /// Start a background scan unless one is already running.
    ///
    /// Returns true if a new scan was started.
    pub fn request_scan(&self) -> bool {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.as_ref() {
            if !handle.is_finished() {
                log::debug!("Scan already running, request dropped");
                return false;
            }
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("media-scan".to_string())
            .spawn(move || shared.run_scan());

        match spawned {
            Ok(handle) => {
                // A finished previous handle is dropped here; its summary
                // is kept in `last_summary`
                *worker = Some(handle);
                true
            }
            Err(e) => {
                log::error!("Failed to start scan thread: {}", e);
                false
            }
        }
    }

    /// Whether a scan thread is alive
    pub fn is_scanning(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Block until the current scan finishes and return its summary.
    ///
    /// Without a running scan this returns the last completed summary. Called
    /// from the scan thread itself (an observer callback), it returns the
    /// last completed summary immediately instead of waiting on itself.
    pub fn wait_for_scan(&self) -> Option<ScanSummary> {
        loop {
            {
                let mut worker = self.worker.lock();
                let finished = match worker.as_ref() {
                    None => return self.last_summary(),
                    Some(handle) if handle.thread().id() == thread::current().id() => {
                        log::warn!("wait_for_scan called from the scan thread");
                        return self.last_summary();
                    }
                    Some(handle) => handle.is_finished(),
                };
                if finished {
                    let handle = worker.take()?;
                    return match handle.join() {
                        Ok(summary) => Some(summary),
                        Err(_) => {
                            log::error!("Scan thread panicked");
                            None
                        }
                    };
                }
            }
            thread::sleep(WAIT_POLL);
        }
    }

    /// Summary of the most recent completed scan
    pub fn last_summary(&self) -> Option<ScanSummary> {
        self.shared.last_summary.lock().clone()
    }

    /// Current progress for display
    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.progress.snapshot()
    }

    /// Register a callback run after every completed scan
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(CatalogEvent) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(callback)
    }

    /// Register a channel that receives an event after every completed scan
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::Receiver<CatalogEvent>) {
        self.shared.observers.subscribe_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.observers.unsubscribe(id)
    }

    /// Snapshot of the current catalog
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.shared.catalog.read().clone()
    }

    pub fn all(&self) -> CatalogSnapshot {
        self.snapshot()
    }

    pub fn list_by_type(&self, media_type: MediaType) -> Vec<MediaRecord> {
        self.snapshot().list_by_type(media_type)
    }

    pub fn list_by_attribute(&self, attribute: MediaAttribute, value: &str) -> Vec<MediaRecord> {
        self.snapshot().list_by_attribute(attribute, value)
    }

    pub fn find(&self, path: &Path) -> Option<MediaRecord> {
        self.snapshot().find(path)
    }

    pub fn find_many<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<Option<MediaRecord>> {
        self.snapshot().find_many(paths)
    }

    /// Configured scan roots
    pub fn roots(&self) -> Result<Vec<PathBuf>> {
        self.shared.store.persisted_roots()
    }

    /// Add a scan root; takes effect on the next scan
    pub fn add_root(&self, root: &Path) -> Result<()> {
        log::info!("Adding scan root {:?}", root);
        self.shared.store.add_root(root)
    }

    /// Remove a scan root; its records are purged by the next scan
    pub fn remove_root(&self, root: &Path) -> Result<()> {
        log::info!("Removing scan root {:?}", root);
        self.shared.store.remove_root(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FsEntry;
    use crate::models::MediaTags;
    use crate::testing::MemoryFileSystem;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn library_on(fs: Arc<MemoryFileSystem>) -> (MediaLibrary, Arc<SqliteCatalogStore>) {
        let store = Arc::new(SqliteCatalogStore::open_memory().unwrap());
        let config = IndexerConfig::builder().default_root("/media").build();
        let library = MediaLibrary::builder(config, store.clone())
            .file_system(fs)
            .build();
        (library, store)
    }

    fn scan(library: &MediaLibrary) -> ScanSummary {
        assert!(library.request_scan());
        library.wait_for_scan().unwrap()
    }

    #[test]
    fn test_end_to_end_scan() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/song.mp3");
        let (library, store) = library_on(fs);
        store
            .upsert_record(&MediaRecord::new(PathBuf::from("/media/old.mp4")))
            .unwrap();

        let summary = scan(&library);

        let catalog = library.all();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].path, PathBuf::from("/media/song.mp3"));
        assert_eq!(catalog[0].media_type, MediaType::Audio);
        assert!(library.find(Path::new("/media/old.mp4")).is_none());
        assert_eq!(summary.removed_files, 1);
        assert!(!store
            .all_records()
            .unwrap()
            .contains_key(Path::new("/media/old.mp4")));
        assert!(!library.progress().active);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        fs.add_file("/media/films/b.mkv");
        fs.add_file("/media/films/extras/c.avi");
        let (library, _store) = library_on(fs);

        scan(&library);
        let first: Vec<MediaRecord> = library.all().to_vec();
        let second_summary = scan(&library);
        let second: Vec<MediaRecord> = library.all().to_vec();

        assert_eq!(first, second);
        assert_eq!(second_summary.new_files, 0);
        assert_eq!(second_summary.reused_files, 3);
        assert_eq!(second_summary.removed_files, 0);
    }

    #[test]
    fn test_removed_file_purged_on_rescan() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        fs.add_file("/media/b.mp3");
        let (library, store) = library_on(fs.clone());

        scan(&library);
        fs.remove_file("/media/b.mp3");
        scan(&library);

        assert_eq!(library.all().paths(), vec![PathBuf::from("/media/a.mp3")]);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn test_single_flight() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        fs.close_gate();
        let (library, _store) = library_on(fs.clone());

        assert!(library.request_scan());
        assert!(library.is_scanning());
        assert!(!library.request_scan());
        assert!(!library.request_scan());

        fs.open_gate();
        let summary = library.wait_for_scan().unwrap();

        // One scan: the root is listed once per pass
        assert_eq!(fs.list_count(Path::new("/media")), 2);
        assert_eq!(fs.total_listings(), 2);
        assert_eq!(summary.loaded_files, 1);
        assert!(!library.is_scanning());
    }

    #[test]
    fn test_readers_see_previous_catalog_during_scan() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        let (library, _store) = library_on(fs.clone());
        scan(&library);

        fs.add_file("/media/b.mp3");
        fs.close_gate();
        assert!(library.request_scan());
        assert_eq!(library.all().paths(), vec![PathBuf::from("/media/a.mp3")]);

        fs.open_gate();
        library.wait_for_scan();
        assert_eq!(library.all().len(), 2);
    }

    #[test]
    fn test_observers_notified_once_per_scan() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        let (library, _store) = library_on(fs);

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = library.subscribe(move |event| {
            assert_eq!(event, CatalogEvent::Updated);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (_, rx) = library.subscribe_channel();

        scan(&library);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv(), Ok(CatalogEvent::Updated));
        assert!(rx.try_recv().is_err());

        assert!(library.unsubscribe(id));
        scan(&library);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv(), Ok(CatalogEvent::Updated));
    }

    #[test]
    fn test_observer_sees_new_catalog() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        let (library, _store) = library_on(fs);
        let library = Arc::new(library);

        let seen = Arc::new(Mutex::new(0usize));
        let reader = Arc::clone(&library);
        let slot = Arc::clone(&seen);
        library.subscribe(move |_| *slot.lock() = reader.all().len());

        scan(&library);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_queries_over_scanned_catalog() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        fs.add_file("/media/b.mkv");
        fs.add_file("/media/c.ogg");
        let store = Arc::new(SqliteCatalogStore::open_memory().unwrap());
        let config = IndexerConfig::builder().default_root("/media").build();
        let resolver = |path: &Path| -> Result<crate::models::MediaTags> {
            Ok(crate::models::MediaTags {
                artist: Some("Same".to_string()),
                album: path.file_stem().map(|s| s.to_string_lossy().to_string()),
                genre: None,
            })
        };
        let library = MediaLibrary::builder(config, store)
            .file_system(fs)
            .resolver(Arc::new(resolver))
            .build();
        scan(&library);

        assert_eq!(library.list_by_type(MediaType::Audio).len(), 2);
        assert_eq!(library.list_by_type(MediaType::Video).len(), 1);
        // b.mkv carries the artist too but is not audio
        assert_eq!(library.list_by_attribute(MediaAttribute::Artist, "Same").len(), 2);
        assert_eq!(library.list_by_attribute(MediaAttribute::Album, "c").len(), 1);

        let found = library.find_many(&["/media/a.mp3", "/missing", "/media/b.mkv"]);
        assert!(found[0].is_some());
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().unwrap().media_type, MediaType::Video);
    }

    #[test]
    fn test_root_management() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/music/a.mp3");
        fs.add_file("/films/b.mkv");
        let (library, _store) = library_on(fs);

        library.add_root(Path::new("/music")).unwrap();
        library.add_root(Path::new("/films")).unwrap();
        scan(&library);
        assert_eq!(library.all().len(), 2);

        library.remove_root(Path::new("/films")).unwrap();
        assert_eq!(library.roots().unwrap(), vec![PathBuf::from("/music")]);
        let summary = scan(&library);
        assert_eq!(library.all().paths(), vec![PathBuf::from("/music/a.mp3")]);
        assert_eq!(summary.removed_files, 1);
    }

    #[test]
    fn test_wait_without_scan() {
        let fs = Arc::new(MemoryFileSystem::new());
        let (library, _store) = library_on(fs);
        assert!(library.wait_for_scan().is_none());
        assert!(!library.is_scanning());
    }

    #[test]
    fn test_scan_real_directory_tree() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("music")).unwrap();
        std::fs::create_dir_all(root.join(".cache")).unwrap();
        std::fs::write(root.join("music").join("a.mp3"), b"x").unwrap();
        std::fs::write(root.join("movie.MP4"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();
        std::fs::write(root.join(".cache").join("hidden.mp3"), b"x").unwrap();
        std::fs::write(root.join(".trailer.mkv"), b"x").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink;
            symlink(root.join("music").join("a.mp3"), root.join("link.mp3")).unwrap();
            symlink(root.join("music"), root.join("linked_music")).unwrap();
        }
        let missing = root.join("unplugged");

        let store = Arc::new(SqliteCatalogStore::open_memory().unwrap());
        store.add_root(root).unwrap();
        store.add_root(&missing).unwrap();
        let config = IndexerConfig::builder().default_root(root).build();
        let library = MediaLibrary::builder(config, store.clone()).build();

        let summary = scan(&library);

        let mut paths = library.all().paths();
        paths.sort();
        assert_eq!(
            paths,
            vec![root.join("movie.MP4"), root.join("music").join("a.mp3")]
        );
        assert_eq!(
            library.find(&root.join("movie.MP4")).unwrap().media_type,
            MediaType::Video
        );
        assert_eq!(summary.error_count(), 1);
        assert_eq!(summary.errors[0].kind, IndexErrorKind::NotFound);
        assert_eq!(summary.errors[0].path.as_deref(), Some(missing.as_path()));
        assert_eq!(store.record_count().unwrap(), 2);
        assert!(!library.progress().active);
    }

    #[test]
    fn test_panicking_resolver_does_not_abort_scan() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        fs.add_file("/media/b.mp3");
        let store = Arc::new(SqliteCatalogStore::open_memory().unwrap());
        store
            .upsert_record(&MediaRecord::new(PathBuf::from("/media/old.mp4")))
            .unwrap();
        let resolver = |path: &Path| -> Result<MediaTags> {
            if path.ends_with("b.mp3") {
                panic!("tag reader crashed");
            }
            Ok(MediaTags::default())
        };
        let config = IndexerConfig::builder().default_root("/media").build();
        let library = MediaLibrary::builder(config, store.clone())
            .file_system(fs)
            .resolver(Arc::new(resolver))
            .build();

        let summary = scan(&library);

        assert!(!library.progress().active);
        assert_eq!(library.all().len(), 2);
        assert_eq!(summary.removed_files, 1);
        assert_eq!(summary.errors[0].kind, IndexErrorKind::Metadata);
        assert_eq!(store.record_count().unwrap(), 2);
        assert!(library.last_summary().is_some());
    }

    struct PanickingFileSystem;

    impl FileSystem for PanickingFileSystem {
        fn list_dir(&self, _dir: &Path) -> Result<Vec<FsEntry>> {
            panic!("device vanished");
        }
    }

    #[test]
    fn test_aborted_scan_still_ends_progress() {
        let store = Arc::new(SqliteCatalogStore::open_memory().unwrap());
        let config = IndexerConfig::builder().default_root("/media").build();
        let library = MediaLibrary::builder(config, store)
            .file_system(Arc::new(PanickingFileSystem))
            .build();

        let summary = scan(&library);

        assert!(!library.progress().active);
        assert!(!summary.is_success());
        assert_eq!(summary.errors[0].kind, IndexErrorKind::Unknown);
        assert!(library.last_summary().is_some());
        assert!(!library.is_scanning());
        assert!(library.request_scan());
        library.wait_for_scan();
    }

    #[test]
    fn test_wait_from_observer_returns() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/media/a.mp3");
        let (library, _store) = library_on(fs);
        let library = Arc::new(library);

        let waited = Arc::new(Mutex::new(false));
        let reader = Arc::clone(&library);
        let slot = Arc::clone(&waited);
        library.subscribe(move |_| {
            reader.wait_for_scan();
            *slot.lock() = true;
        });

        let summary = scan(&library);
        assert_eq!(summary.loaded_files, 1);
        assert!(*waited.lock());
    }

    fn tree_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            ("[a-c]", prop::option::of("[a-c]"), "[a-e]", prop::sample::select(vec!["mp3", "mkv", "txt"])),
            1..20,
        )
        .prop_map(|files| {
            files
                .into_iter()
                .map(|(d1, d2, name, ext)| match d2 {
                    Some(d2) => format!("/media/{}/{}/{}.{}", d1, d2, name, ext),
                    None => format!("/media/{}/{}.{}", d1, name, ext),
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_overlapping_roots_never_duplicate(
            files in tree_strategy(),
            extra_roots in prop::collection::vec("[a-c]", 0..3),
        ) {
            let fs = Arc::new(MemoryFileSystem::new());
            for file in &files {
                fs.add_file(file.as_str());
            }
            let (library, store) = library_on(fs);
            store.add_root(Path::new("/media")).unwrap();
            for root in &extra_roots {
                store.add_root(&Path::new("/media").join(root)).unwrap();
            }

            scan(&library);
            let paths = library.all().paths();
            let unique: HashSet<PathBuf> = paths.iter().cloned().collect();
            prop_assert_eq!(unique.len(), paths.len());

            let expected: HashSet<PathBuf> = files
                .iter()
                .filter(|f| !f.ends_with(".txt"))
                .map(PathBuf::from)
                .collect();
            prop_assert_eq!(unique, expected);
            prop_assert_eq!(store.record_count().unwrap() as usize, paths.len());
        }
    }
}
