//! Database registry and load/sync/optimize logic
//!
//! A [`Database`] is a named registry of [`Collection`]s rooted in one
//! directory:
//!
//! ```text
//! <root>/<name>.shardb                  header JSON {name, version, codec}
//! <root>/collections/<collection>/...   one directory per collection
//! ```
//!
//! ## Loading
//!
//! [`Database::load`] finds the single header in the root, checks the
//! version gap and the codec, then reconstructs every collection directory in sorted
//! order. The first failure aborts the load.
//!
//! ## Syncing
//!
//! [`Database::sync`] persists every collection on its own thread. A failing
//! collection is logged and reported in the [`SyncReport`] without
//! affecting the others. The header is written once all threads finish.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shardb_core::{CustomStructure, Error, Result};
use shardb_durability::paths::is_header_file_name;
use shardb_durability::{write_atomic, DatabasePaths, StorageCodec, TypeRegistry};
use tracing::{debug, error, info, warn};

use crate::cache::CollectionCache;
use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::setup::{register_builtin_types, seeded_rng, MemoryProfile};

/// Version of the on-disk layout written by this code
pub const DB_VERSION: i64 = 1;

/// Version gap at which a database can no longer be loaded
pub const MAJOR_VERSION_GAP: u64 = 10;

/// Contents of the `<name>.shardb` header file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseHeader {
    /// Database name
    pub name: String,
    /// Layout version that wrote the header
    pub version: i64,
    /// Codec every package of the database is encoded with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

/// Outcome of [`Database::sync`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Collections persisted successfully, sorted
    pub synced: Vec<String>,
    /// Collections that failed, with the error message
    pub failed: BTreeMap<String, String>,
}

impl SyncReport {
    /// Check if every collection was persisted
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Named registry of collections
pub struct Database {
    name: String,
    version: i64,
    config: DatabaseConfig,
    paths: DatabasePaths,
    codec: Arc<dyn StorageCodec>,
    registry: Arc<TypeRegistry>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("root", &self.paths.root())
            .field("collections", &self.collections.read().len())
            .finish()
    }
}

impl Database {
    /// Create an empty database
    ///
    /// Nothing is written until the first [`Database::sync`] or
    /// [`Database::add_collection`].
    pub fn new(name: impl Into<String>, config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidConfig("database name is empty".to_string()));
        }

        let codec = config.codec()?;
        let registry = Arc::new(TypeRegistry::new());
        register_builtin_types(&registry);
        let rng = seeded_rng(config.seed);
        MemoryProfile::sample();

        debug!(
            target: "shardb::db",
            name = %name,
            root = ?config.root,
            codec = codec.codec_id(),
            "Database created"
        );
        Ok(Database {
            name,
            version: DB_VERSION,
            paths: DatabasePaths::from_root(&config.root),
            config,
            codec,
            registry,
            collections: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
        })
    }

    /// Find the single `.shardb` header in `path`
    ///
    /// An empty path means the current directory.
    pub fn locate_header(path: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = match path.as_ref() {
            p if p.as_os_str().is_empty() => Path::new("."),
            p => p,
        };

        let mut candidates = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_str().is_some_and(is_header_file_name) {
                candidates.push(entry.path());
            }
        }
        candidates.sort();

        match candidates.len() {
            0 => Err(Error::NotFound(format!(
                "no database header in {}",
                dir.display()
            ))),
            1 => Ok(candidates.remove(0)),
            _ => Err(Error::AmbiguousHeader {
                dir: dir.to_path_buf(),
                candidates,
            }),
        }
    }

    /// Load the database stored in `path` with the default configuration
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_config(DatabaseConfig::new(path))
    }

    /// Load the database stored in `config.root`
    pub fn load_with_config(config: DatabaseConfig) -> Result<Self> {
        let header_path = Self::locate_header(&config.root)?;
        let header: DatabaseHeader = serde_json::from_slice(&fs::read(&header_path)?)?;

        let gap = DB_VERSION.abs_diff(header.version);
        if gap >= MAJOR_VERSION_GAP {
            return Err(Error::VersionIncompatible {
                found: header.version,
                running: DB_VERSION,
            });
        }
        if gap > 0 {
            warn!(
                target: "shardb::db",
                found = header.version,
                running = DB_VERSION,
                "Loading database written by a different version"
            );
        }

        if let Some(expected) = header.codec.as_deref() {
            if expected != config.codec_id {
                return Err(Error::CodecMismatch {
                    expected: expected.to_string(),
                    actual: config.codec_id.clone(),
                });
            }
        }

        let db = Database::new(header.name, config)?;
        let collections_dir = db.paths.collections_dir();
        if !collections_dir.is_dir() {
            return Err(Error::MissingCollectionsDir(collections_dir));
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&collections_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.file_name());
            }
        }
        dirs.sort();

        for dir_name in dirs {
            let name = dir_name.to_str().ok_or_else(|| {
                Error::corrupted(
                    dir_name.to_string_lossy(),
                    "collection directory name is not valid UTF-8",
                )
            })?;
            let collection = Collection::open(
                db.paths.root(),
                name,
                db.new_cache(),
                Arc::clone(&db.registry),
                Arc::clone(&db.codec),
            )?;
            db.collections
                .write()
                .insert(name.to_string(), Arc::new(collection));
        }

        info!(
            target: "shardb::db",
            name = %db.name,
            collections = db.collections_count(),
            objects = db.total_objects_count(),
            "Database loaded"
        );
        Ok(db)
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layout version
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Active configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Type registry shared with every collection
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Register a structure type under its Rust type name
    pub fn register_type<T: CustomStructure + 'static>(&self) {
        self.registry.register::<T>();
    }

    /// Register a structure type under `name`
    pub fn register_type_name<T: CustomStructure + 'static>(&self, name: impl Into<String>) {
        self.registry.register_name::<T>(name);
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Create and register a new collection
    pub fn add_collection(&self, name: &str) -> Result<Arc<Collection>> {
        validate_collection_name(name)?;

        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        let collection = Arc::new(Collection::create(
            self.paths.root(),
            name,
            self.new_cache(),
            Arc::clone(&self.registry),
            Arc::clone(&self.codec),
        )?);
        collections.insert(name.to_string(), Arc::clone(&collection));

        info!(target: "shardb::db", collection = name, "Collection added");
        Ok(collection)
    }

    /// Registered collection by name
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Unregister a collection
    ///
    /// Its files stay on disk and are picked up again by the next load.
    pub fn drop_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.write().remove(name)
    }

    /// Number of registered collections
    pub fn collections_count(&self) -> usize {
        self.collections.read().len()
    }

    /// Sum of live elements over all collections
    pub fn total_objects_count(&self) -> u64 {
        self.collections.read().values().map(|c| c.size()).sum()
    }

    /// Registered collection names, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Uniformly chosen registered collection
    pub fn random_collection(&self) -> Result<Arc<Collection>> {
        let collections = self.collections.read();
        if collections.is_empty() {
            return Err(Error::EmptyRegistry);
        }
        let mut names: Vec<&String> = collections.keys().collect();
        names.sort();
        let pick = self.rng.lock().gen_range(0..names.len());
        Ok(Arc::clone(&collections[names[pick]]))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persist every collection in parallel, then the header
    ///
    /// Only a failure to write the header is returned as an error.
    pub fn sync(&self) -> Result<SyncReport> {
        let snapshot: Vec<Arc<Collection>> = self.collections.read().values().cloned().collect();

        let results: Vec<(String, std::result::Result<(), String>)> = thread::scope(|scope| {
            let handles: Vec<_> = snapshot
                .iter()
                .map(|collection| {
                    let handle = scope.spawn(move || {
                        debug!(
                            target: "shardb::db",
                            collection = collection.name(),
                            "Syncing collection"
                        );
                        collection.sync().map_err(|e| e.to_string())
                    });
                    (collection.name().to_string(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err("sync thread panicked".to_string()));
                    (name, result)
                })
                .collect()
        });

        let mut report = SyncReport::default();
        for (name, result) in results {
            match result {
                Ok(()) => report.synced.push(name),
                Err(reason) => {
                    error!(
                        target: "shardb::db",
                        collection = %name,
                        error = %reason,
                        "Collection sync failed"
                    );
                    report.failed.insert(name, reason);
                }
            }
        }
        report.synced.sort();

        self.write_header()?;
        info!(
            target: "shardb::db",
            name = %self.name,
            synced = report.synced.len(),
            failed = report.failed.len(),
            "Database synchronized"
        );
        Ok(report)
    }

    /// Compact every collection, returning the total bytes reclaimed
    ///
    /// The registry stays locked for the whole call. On error, compactions
    /// already finished are kept and no total is reported.
    pub fn optimize(&self) -> Result<u64> {
        let collections = self.collections.write();
        let mut names: Vec<&String> = collections.keys().collect();
        names.sort();

        let mut reclaimed = 0;
        for name in names {
            reclaimed += collections[name].optimize()?;
        }

        info!(target: "shardb::db", name = %self.name, reclaimed, "Database optimized");
        Ok(reclaimed)
    }

    fn write_header(&self) -> Result<()> {
        fs::create_dir_all(self.paths.collections_dir())?;
        let header = DatabaseHeader {
            name: self.name.clone(),
            version: self.version,
            codec: Some(self.codec.codec_id().to_string()),
        };
        write_atomic(
            &self.paths.header(&self.name),
            &serde_json::to_vec_pretty(&header)?,
        )?;
        Ok(())
    }

    fn new_cache(&self) -> CollectionCache {
        CollectionCache::new(self.config.cache_capacity)
    }
}

/// Reject names that are not a single usable path component
fn validate_collection_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
