//! Database configuration
//!
//! Controls where a database lives and how its packages are encoded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shardb_core::{Error, Result};
use shardb_durability::codec::DEFAULT_COMPRESSION_LEVEL;
use shardb_durability::{get_codec, StorageCodec, ZstdCodec};

/// Default number of elements cached per collection
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Directory holding the header and the `collections` directory
    pub root: PathBuf,
    /// Codec identifier (default: "zstd")
    pub codec_id: String,
    /// zstd compression level, 1..=22
    pub compression_level: i32,
    /// Elements cached per collection (0 disables caching)
    pub cache_capacity: usize,
    /// Seed for the database's random generator (OS entropy when `None`)
    pub seed: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            root: PathBuf::from("."),
            codec_id: "zstd".to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            seed: None,
        }
    }
}

impl DatabaseConfig {
    /// Default config rooted at `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        DatabaseConfig {
            root: root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Create config for testing
    ///
    /// Fast compression, a small cache and a fixed seed.
    pub fn for_testing(root: impl AsRef<Path>) -> Self {
        DatabaseConfig {
            root: root.as_ref().to_path_buf(),
            codec_id: "zstd".to_string(),
            compression_level: 1,
            cache_capacity: 16,
            seed: Some(0x5EED),
        }
    }

    /// Set the root directory
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    /// Set codec identifier
    pub fn with_codec(mut self, codec_id: impl Into<String>) -> Self {
        self.codec_id = codec_id.into();
        self
    }

    /// Set compression level
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set per-collection cache capacity
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        get_codec(&self.codec_id).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if !(1..=22).contains(&self.compression_level) {
            return Err(Error::InvalidConfig(format!(
                "compression level {} outside 1..=22",
                self.compression_level
            )));
        }
        Ok(())
    }

    /// Build the configured codec
    pub fn codec(&self) -> Result<Arc<dyn StorageCodec>> {
        match self.codec_id.as_str() {
            "zstd" => Ok(Arc::new(ZstdCodec::new(self.compression_level))),
            other => Ok(Arc::from(
                get_codec(other).map_err(|e| Error::InvalidConfig(e.to_string()))?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.codec_id, "zstd");
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = DatabaseConfig::new("/data")
            .with_codec("identity")
            .with_compression_level(9)
            .with_cache_capacity(0)
            .with_seed(7);

        assert_eq!(config.root, PathBuf::from("/data"));
        assert_eq!(config.codec_id, "identity");
        assert_eq!(config.compression_level, 9);
        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.codec().unwrap().codec_id(), "identity");
    }

    #[test]
    fn test_validate_invalid_codec() {
        let config = DatabaseConfig::default().with_codec("nonexistent_codec");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_invalid_level() {
        assert!(DatabaseConfig::default()
            .with_compression_level(0)
            .validate()
            .is_err());
        assert!(DatabaseConfig::default()
            .with_compression_level(23)
            .validate()
            .is_err());
    }

    #[test]
    fn test_for_testing() {
        let config = DatabaseConfig::for_testing("/tmp/x");
        assert!(config.validate().is_ok());
        assert!(config.seed.is_some());
        assert_eq!(config.codec().unwrap().codec_id(), "zstd");
    }
}
