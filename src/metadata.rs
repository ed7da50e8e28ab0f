//! Metadata resolution for newly discovered files

use lofty::{read_from_path, Accessor, TaggedFileExt};
use std::path::Path;

use crate::error::{IndexError, Result};
use crate::models::{MediaTags, MediaType};

/// Resolves tags for a media file
pub trait MetadataResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> Result<MediaTags>;
}

/// Resolver that leaves every tag empty
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

impl MetadataResolver for NoopResolver {
    fn resolve(&self, _path: &Path) -> Result<MediaTags> {
        Ok(MediaTags::default())
    }
}

/// Reads artist, album and genre from audio tags with lofty.
///
/// Only audio files are read; other media types resolve to empty tags.
/// The primary tag wins, then the first tag present in the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyResolver;

impl LoftyResolver {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataResolver for LoftyResolver {
    fn resolve(&self, path: &Path) -> Result<MediaTags> {
        if MediaType::from_path(path) != MediaType::Audio {
            return Ok(MediaTags::default());
        }

        let tagged = read_from_path(path)
            .map_err(|e| IndexError::metadata_error(path.to_path_buf(), e.to_string()))?;

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return Ok(MediaTags::default());
        };

        Ok(MediaTags {
            artist: tag.artist().map(|v| v.into_owned()),
            album: tag.album().map(|v| v.into_owned()),
            genre: tag.genre().map(|v| v.into_owned()),
        })
    }
}

impl<F> MetadataResolver for F
where
    F: Fn(&Path) -> Result<MediaTags> + Send + Sync,
{
    fn resolve(&self, path: &Path) -> Result<MediaTags> {
        self(path)
    }
}
