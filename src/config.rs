//! Configuration for the media indexer

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::models::{AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};

/// Default interval between progress lines on stderr
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Default database file name
pub const DEFAULT_DB_FILE: &str = "media_indexer.db";

/// Environment variable naming the platform storage root
pub const EXTERNAL_STORAGE_ENV: &str = "EXTERNAL_STORAGE";

/// Configuration for the media library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Root scanned when no root directories are persisted
    pub default_root: PathBuf,

    /// Accepted file extensions (lowercase, without dot)
    pub extensions: HashSet<String>,

    /// Catalog database path
    pub db_path: Option<PathBuf>,

    /// Whether progress is written to stderr as JSON lines
    pub progress_output: bool,

    /// Minimum interval between progress lines
    pub progress_interval_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            default_root: Self::platform_default_root(),
            extensions: Self::default_extensions(),
            db_path: None,
            progress_output: false,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl IndexerConfig {
    /// Create a config builder
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder::new()
    }

    /// Get the default video extensions
    pub fn default_video_extensions() -> HashSet<String> {
        VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    /// Get the default audio extensions
    pub fn default_audio_extensions() -> HashSet<String> {
        AUDIO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    /// Get all default media extensions
    pub fn default_extensions() -> HashSet<String> {
        let mut extensions = Self::default_video_extensions();
        extensions.extend(Self::default_audio_extensions());
        extensions
    }

    /// Resolve the platform storage root.
    ///
    /// `EXTERNAL_STORAGE` wins when set, then the user's home directory,
    /// then the filesystem root.
    pub fn platform_default_root() -> PathBuf {
        if let Some(root) = std::env::var_os(EXTERNAL_STORAGE_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(root);
        }
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Get the database path, falling back to the default file name
    pub fn effective_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }
}

/// Builder for IndexerConfig
#[derive(Debug, Default)]
pub struct IndexerConfigBuilder {
    config: IndexerConfig,
}

impl IndexerConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback root directory
    pub fn default_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.default_root = root.into();
        self
    }

    /// Replace the extension allow-list
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Set the database path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = Some(path.into());
        self
    }

    /// Enable or disable JSON progress lines on stderr
    pub fn progress_output(mut self, enabled: bool) -> Self {
        self.config.progress_output = enabled;
        self
    }

    /// Set the progress line interval
    pub fn progress_interval_ms(mut self, interval: u64) -> Self {
        self.config.progress_interval_ms = interval;
        self
    }

    /// Build the config
    pub fn build(self) -> IndexerConfig {
        self.config
    }
}
