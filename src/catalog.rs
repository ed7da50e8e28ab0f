//! Read-only views over the in-memory catalog

use serde::{Serialize, Serializer};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{MediaAttribute, MediaRecord, MediaType};

/// Immutable snapshot of the catalog as of the last completed scan.
///
/// Cloning is cheap; a snapshot never changes after it is taken.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    records: Arc<Vec<MediaRecord>>,
}

impl CatalogSnapshot {
    pub fn new(records: Vec<MediaRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// All records, in catalog order
    pub fn all(&self) -> &[MediaRecord] {
        &self.records
    }

    /// Records of one media type, in catalog order
    pub fn list_by_type(&self, media_type: MediaType) -> Vec<MediaRecord> {
        self.records
            .iter()
            .filter(|r| r.media_type == media_type)
            .cloned()
            .collect()
    }

    /// Audio records whose tag field equals `value` exactly
    pub fn list_by_attribute(&self, attribute: MediaAttribute, value: &str) -> Vec<MediaRecord> {
        self.records
            .iter()
            .filter(|r| r.media_type == MediaType::Audio)
            .filter(|r| r.attribute(attribute) == Some(value))
            .cloned()
            .collect()
    }

    /// Records matching every given filter, in catalog order.
    ///
    /// An attribute filter only matches audio records, so combining it with
    /// another media type yields nothing.
    pub fn select(
        &self,
        media_type: Option<MediaType>,
        attribute: Option<(MediaAttribute, &str)>,
    ) -> Vec<MediaRecord> {
        let mut records = match attribute {
            Some((attribute, value)) => self.list_by_attribute(attribute, value),
            None => self.records.to_vec(),
        };
        if let Some(media_type) = media_type {
            records.retain(|r| r.media_type == media_type);
        }
        records
    }

    /// Record with exactly this path
    pub fn find(&self, path: &Path) -> Option<MediaRecord> {
        self.records.iter().find(|r| r.path == path).cloned()
    }

    /// One slot per requested path, `None` where the path is not cataloged
    pub fn find_many<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<Option<MediaRecord>> {
        paths.iter().map(|p| self.find(p.as_ref())).collect()
    }

    /// Paths of all records, in catalog order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.records.iter().map(|r| r.path.clone()).collect()
    }
}

impl Serialize for CatalogSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.records.as_slice().serialize(serializer)
    }
}

impl Deref for CatalogSnapshot {
    type Target = [MediaRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}
