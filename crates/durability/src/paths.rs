//! Database directory structure
//!
//! ```text
//! <root>/
//! ├── <name>.shardb                    # Header: {name, version} as JSON
//! └── collections/
//!     └── <collection>/
//!         ├── <collection>.json.gzip   # Collection descriptor
//!         ├── map.index                # Counter + sync destination
//!         ├── shard_0.gobs             # Shard data
//!         ├── shard_0_meta.gob.gzip    # Shard metadata
//!         └── ...
//! ```

use std::path::{Path, PathBuf};

/// Extension of the database header file
pub const HEADER_EXTENSION: &str = "shardb";

/// Directory holding one subdirectory per collection
pub const COLLECTIONS_DIR_NAME: &str = "collections";

/// Per-collection counter/sync-destination file
pub const MAP_INDEX_FILE_NAME: &str = "map.index";

const SHARD_PREFIX: &str = "shard_";
const SHARD_DATA_SUFFIX: &str = ".gobs";
const SHARD_META_SUFFIX: &str = "_meta.gob.gzip";
const DESCRIPTOR_SUFFIX: &str = ".json.gzip";

/// Database directory paths
#[derive(Debug, Clone)]
pub struct DatabasePaths {
    root: PathBuf,
}

impl DatabasePaths {
    /// Create paths from root directory
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        DatabasePaths {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root database directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Header file for the database called `name`
    pub fn header(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, HEADER_EXTENSION))
    }

    /// The `collections` directory
    pub fn collections_dir(&self) -> PathBuf {
        self.root.join(COLLECTIONS_DIR_NAME)
    }

    /// Paths of one collection
    pub fn collection(&self, name: &str) -> CollectionPaths {
        CollectionPaths::new(self.collections_dir().join(name), name)
    }

    /// Path of a collection directory relative to the root
    pub fn relative_collection_dir(name: &str) -> PathBuf {
        Path::new(COLLECTIONS_DIR_NAME).join(name)
    }
}

/// Files inside one collection directory
#[derive(Debug, Clone)]
pub struct CollectionPaths {
    dir: PathBuf,
    name: String,
}

impl CollectionPaths {
    /// Create paths for the collection `name` stored in `dir`
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        CollectionPaths {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Collection directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shard data file (`shard_<i>.gobs`)
    pub fn shard_data(&self, shard: usize) -> PathBuf {
        self.dir.join(shard_data_file_name(shard))
    }

    /// Shard metadata file (`shard_<i>_meta.gob.gzip`)
    pub fn shard_meta(&self, shard: usize) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", SHARD_PREFIX, shard, SHARD_META_SUFFIX))
    }

    /// Counter/sync-destination file
    pub fn map_index(&self) -> PathBuf {
        self.dir.join(MAP_INDEX_FILE_NAME)
    }

    /// Collection descriptor (`<name>.json.gzip`)
    pub fn descriptor(&self) -> PathBuf {
        self.dir.join(format!("{}{}", self.name, DESCRIPTOR_SUFFIX))
    }
}

/// File name of shard `shard`'s data file
pub fn shard_data_file_name(shard: usize) -> String {
    format!("{}{}{}", SHARD_PREFIX, shard, SHARD_DATA_SUFFIX)
}

/// Parse the ordinal out of a shard data file name
///
/// Returns `None` for anything that is not exactly `shard_<i>.gobs`.
pub fn parse_shard_data_file_name(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(SHARD_PREFIX)?
        .strip_suffix(SHARD_DATA_SUFFIX)?
        .parse()
        .ok()
}

/// Check whether `file_name` is a database header
pub fn is_header_file_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext == HEADER_EXTENSION)
        && file_name.len() > HEADER_EXTENSION.len() + 1
}
