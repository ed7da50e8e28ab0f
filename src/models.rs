//! Core data models for the media indexer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::IndexError;

/// Extensions classified as video
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "3gp", "asf", "avi", "divx", "flv", "m2ts", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "mts",
    "ogm", "ogv", "rm", "rmvb", "ts", "vob", "webm", "wmv",
];

/// Extensions classified as audio
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "aac", "ac3", "aif", "aiff", "amr", "ape", "flac", "m4a", "mka", "mp2", "mp3", "oga", "ogg",
    "opus", "wav", "wma",
];

/// Media type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Video files (mp4, mkv, avi, etc.)
    Video,
    /// Audio files (mp3, flac, ogg, etc.)
    Audio,
    /// Accepted files that are neither video nor audio
    Other,
}

impl MediaType {
    /// Infer media type from file extension
    pub fn from_extension(ext: &str) -> Self {
        let ext_lower = ext.to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext_lower.as_str()) {
            MediaType::Video
        } else if AUDIO_EXTENSIONS.contains(&ext_lower.as_str()) {
            MediaType::Audio
        } else {
            MediaType::Other
        }
    }

    /// Infer media type from the extension of a path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(MediaType::Other)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        }
    }

    /// Parse the string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(MediaType::Video),
            "audio" => Some(MediaType::Audio),
            "other" => Some(MediaType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tag fields an audio listing can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaAttribute {
    Artist,
    Album,
    Genre,
}

/// Tags produced by metadata resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
}

/// One discovered media file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Absolute path, the identity of the record
    pub path: PathBuf,
    /// Media type derived from the extension at creation time
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// When the file was first discovered
    pub added_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Create a record for a newly discovered file
    pub fn new(path: PathBuf) -> Self {
        let media_type = MediaType::from_path(&path);
        Self {
            path,
            media_type,
            artist: None,
            album: None,
            genre: None,
            added_at: Utc::now(),
        }
    }

    /// Fill in resolved tags
    pub fn with_tags(mut self, tags: MediaTags) -> Self {
        self.artist = tags.artist;
        self.album = tags.album;
        self.genre = tags.genre;
        self
    }

    /// File name without the directory part
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Value of a tag field
    pub fn attribute(&self, attribute: MediaAttribute) -> Option<&str> {
        match attribute {
            MediaAttribute::Artist => self.artist.as_deref(),
            MediaAttribute::Album => self.album.as_deref(),
            MediaAttribute::Genre => self.genre.as_deref(),
        }
    }
}

/// Result of one completed scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Roots the scan traversed
    pub roots: Vec<PathBuf>,
    /// Files counted by the first pass
    pub total_files: u64,
    /// Accepted files visited by the loading pass
    pub loaded_files: u64,
    /// Records created this scan
    pub new_files: u64,
    /// Records reused from the catalog store
    pub reused_files: u64,
    /// Stale records deleted from the catalog store
    pub removed_files: u64,
    /// Stale records whose delete failed
    pub failed_deletes: u64,
    /// Recoverable errors encountered while scanning
    #[serde(skip)]
    pub errors: Vec<IndexError>,
    /// Wall-clock start of the scan
    pub started_at: Option<DateTime<Utc>>,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
}

impl ScanSummary {
    /// Create a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the scan completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
