//! Catalog store contract
//!
//! The scanner reads the persisted roots and records from a store and
//! writes back new records and deletions. `SqliteCatalogStore` in
//! `db.rs` is the bundled implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::MediaRecord;

/// Durable mapping from absolute path to media record
pub trait CatalogStore: Send + Sync {
    /// Root directories configured for scanning
    fn persisted_roots(&self) -> Result<Vec<PathBuf>>;

    /// Add a scan root; adding an existing root is a no-op
    fn add_root(&self, root: &Path) -> Result<()>;

    /// Remove a scan root; removing an unknown root is a no-op
    fn remove_root(&self, root: &Path) -> Result<()>;

    /// Every persisted record keyed by path
    fn all_records(&self) -> Result<HashMap<PathBuf, MediaRecord>>;

    /// Insert or replace a record
    fn upsert_record(&self, record: &MediaRecord) -> Result<()>;

    /// Delete the record stored under `path`
    fn delete_record(&self, path: &Path) -> Result<()>;
}
