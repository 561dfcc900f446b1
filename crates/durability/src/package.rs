//! Encoded/compressed packages
//!
//! A package is one file holding one value: serialized, passed through the
//! storage codec, and written with the write-fsync-rename pattern.
//!
//! - [`EncodedCompressedPackage`]: bincode values (shard metadata)
//! - [`CompressedPackage`]: raw bytes or JSON (collection descriptors)
//!
//! # Crash Safety
//!
//! 1. Write to a temporary file next to the target (`<name>.tmp`)
//! 2. fsync the temporary file
//! 3. Rename over the target
//! 4. fsync the parent directory
//!
//! A reader sees either the previous complete file or the new complete file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use shardb_core::Result;

use crate::codec::StorageCodec;

/// Write `bytes` to `path` atomically (write-fsync-rename)
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = temp_path_for(path);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)?;

    // Sync parent directory so the rename itself is durable
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && parent.exists() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }

    Ok(())
}

/// Temporary file used while `path` is being replaced
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Package holding a single bincode-encoded, compressed value
pub struct EncodedCompressedPackage<T> {
    path: PathBuf,
    codec: Arc<dyn StorageCodec>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> EncodedCompressedPackage<T> {
    /// Create a package bound to `path`
    pub fn new(path: impl Into<PathBuf>, codec: Arc<dyn StorageCodec>) -> Self {
        EncodedCompressedPackage {
            path: path.into(),
            codec,
            _value: PhantomData,
        }
    }

    /// Package file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode, compress and atomically write `value`
    pub fn save(&self, value: &T) -> Result<()> {
        let encoded = bincode::serialize(value)?;
        let compressed = self.codec.encode(&encoded)?;
        write_atomic(&self.path, &compressed)?;
        Ok(())
    }

    /// Read, decompress and decode the stored value
    pub fn load(&self) -> Result<T> {
        let compressed = std::fs::read(&self.path)?;
        let encoded = self.codec.decode(&compressed)?;
        Ok(bincode::deserialize(&encoded)?)
    }
}

/// Package holding compressed raw bytes (JSON payloads)
pub struct CompressedPackage {
    path: PathBuf,
    codec: Arc<dyn StorageCodec>,
}

impl CompressedPackage {
    /// Create a package bound to `path`
    pub fn new(path: impl Into<PathBuf>, codec: Arc<dyn StorageCodec>) -> Self {
        CompressedPackage {
            path: path.into(),
            codec,
        }
    }

    /// Package file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compress and atomically write `data`
    pub fn save(&self, data: &[u8]) -> Result<()> {
        let compressed = self.codec.encode(data)?;
        write_atomic(&self.path, &compressed)?;
        Ok(())
    }

    /// Read and decompress the stored bytes
    pub fn load(&self) -> Result<Vec<u8>> {
        let compressed = std::fs::read(&self.path)?;
        Ok(self.codec.decode(&compressed)?)
    }

    /// Serialize `value` as JSON and save it
    pub fn save_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value)?;
        self.save(&json)
    }

    /// Load and decode a JSON value
    pub fn load_json<T: DeserializeOwned>(&self) -> Result<T> {
        let json = self.load()?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{IdentityCodec, ZstdCodec};
    use serde::Deserialize;
    use shardb_core::Error;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: usize,
        entries: BTreeMap<u64, u64>,
    }

    fn sample() -> Sample {
        Sample {
            id: 4,
            entries: (0..50).map(|i| (i, i * 10)).collect(),
        }
    }

    fn zstd() -> Arc<dyn StorageCodec> {
        Arc::new(ZstdCodec::default())
    }

    #[test]
    fn test_encoded_package_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let package = EncodedCompressedPackage::<Sample>::new(dir.path().join("s.gob.gzip"), zstd());

        package.save(&sample()).unwrap();
        assert_eq!(package.load().unwrap(), sample());
    }

    #[test]
    fn test_encoded_package_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let package = EncodedCompressedPackage::<Sample>::new(dir.path().join("none"), zstd());

        let err = package.load().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_encoded_package_wrong_codec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.gob.gzip");
        EncodedCompressedPackage::<Sample>::new(&path, Arc::new(IdentityCodec))
            .save(&sample())
            .unwrap();

        let err = EncodedCompressedPackage::<Sample>::new(&path, zstd())
            .load()
            .unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_save_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.gob.gzip");
        let package = EncodedCompressedPackage::<Sample>::new(&path, zstd());

        package.save(&sample()).unwrap();
        let first = std::fs::read(&path).unwrap();
        package.save(&sample()).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_no_temp_file_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.json.gzip");
        CompressedPackage::new(&path, zstd()).save(b"{}").unwrap();

        assert!(path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_compressed_package_json() {
        let dir = tempfile::tempdir().unwrap();
        let package = CompressedPackage::new(dir.path().join("users.json.gzip"), zstd());

        let mut value = BTreeMap::new();
        value.insert("name".to_string(), "users".to_string());
        package.save_json(&value).unwrap();

        let loaded: BTreeMap<String, String> = package.load_json().unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_temp_path_keeps_full_name() {
        let path = Path::new("/db/shard_3_meta.gob.gzip");
        assert_eq!(
            temp_path_for(path),
            PathBuf::from("/db/shard_3_meta.gob.gzip.tmp")
        );
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }
}
