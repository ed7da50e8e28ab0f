//! Filesystem-backed media indexer
//!
//! This library walks a set of root directories, classifies media files by
//! extension, reconciles them against a persisted catalog and notifies
//! observers when the catalog changes. Scans run on a background thread
//! and only one runs at a time.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod fs;
pub mod library;
pub mod metadata;
pub mod models;
pub mod observers;
pub mod progress;
pub mod scanner;
pub mod store;

#[cfg(test)]
mod testing;

pub use catalog::CatalogSnapshot;
pub use config::IndexerConfig;
pub use db::SqliteCatalogStore;
pub use error::{IndexError, IndexErrorKind, Result};
pub use filter::MediaFilter;
pub use fs::{EntryKind, FileSystem, FsEntry, LocalFileSystem};
pub use library::{MediaLibrary, MediaLibraryBuilder};
pub use metadata::{LoftyResolver, MetadataResolver, NoopResolver};
pub use models::{
    MediaAttribute, MediaRecord, MediaTags, MediaType, ScanSummary, AUDIO_EXTENSIONS,
    VIDEO_EXTENSIONS,
};
pub use observers::{CatalogEvent, SubscriptionId};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use store::CatalogStore;
