//! Collections
//!
//! A collection is a named dataset stored in its own directory: one
//! [`ConcurrentMap`] of shards, a read cache, and a JSON descriptor.
//!
//! # Reconstruction
//!
//! Opening an existing collection reattaches every shard and the
//! `map.index` file first, then decodes the descriptor. Only when all of
//! them succeed is the collection assembled; a partial collection is
//! never returned.

use std::any::type_name;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shardb_core::{CustomStructure, Element, Error, Result};
use shardb_durability::{
    CollectionPaths, CompressedPackage, DatabasePaths, StorageCodec, TypeRegistry,
};
use shardb_storage::ConcurrentMap;
use tracing::{debug, info};

use crate::cache::CollectionCache;

/// Persisted collection description (`<name>.json.gzip`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Collection name
    pub name: String,
    /// Collection directory relative to the database root
    pub path: String,
    /// Live element count at the last sync
    pub objects: u64,
}

/// A named, independently persisted dataset
pub struct Collection {
    name: String,
    root: PathBuf,
    paths: CollectionPaths,
    map: ConcurrentMap,
    cache: CollectionCache,
    registry: Arc<TypeRegistry>,
    codec: Arc<dyn StorageCodec>,
    // Serializes sync and optimize of this collection
    sync_lock: Mutex<()>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("path", &self.paths.dir())
            .finish()
    }
}

impl Collection {
    /// Create a new collection with empty shard files under `root`
    ///
    /// Fails with `AlreadyExists` if the collection directory is already on
    /// disk, including collections that were dropped from the registry.
    pub fn create(
        root: &Path,
        name: &str,
        cache: CollectionCache,
        registry: Arc<TypeRegistry>,
        codec: Arc<dyn StorageCodec>,
    ) -> Result<Self> {
        let paths = DatabasePaths::from_root(root).collection(name);
        if paths.dir().exists() {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        let map = ConcurrentMap::create(&paths)?;
        debug!(target: "shardb::collection", collection = name, "Collection created");
        Ok(Collection {
            name: name.to_string(),
            root: root.to_path_buf(),
            paths,
            map,
            cache,
            registry,
            codec,
            sync_lock: Mutex::new(()),
        })
    }

    /// Reconstruct the collection stored in `<root>/collections/<name>`
    pub fn open(
        root: &Path,
        name: &str,
        cache: CollectionCache,
        registry: Arc<TypeRegistry>,
        codec: Arc<dyn StorageCodec>,
    ) -> Result<Self> {
        let paths = DatabasePaths::from_root(root).collection(name);
        let map = ConcurrentMap::open(&paths, root, &codec)?;

        let descriptor_path = paths.descriptor();
        if !descriptor_path.is_file() {
            return Err(Error::corrupted(name, "collection description file missing"));
        }
        let descriptor: CollectionDescriptor = CompressedPackage::new(descriptor_path, Arc::clone(&codec))
            .load_json()
            .map_err(|e| Error::corrupted(name, format!("collection description: {}", e)))?;
        if descriptor.name != name {
            return Err(Error::corrupted(
                name,
                format!("description belongs to collection '{}'", descriptor.name),
            ));
        }

        debug!(
            target: "shardb::collection",
            collection = name,
            objects = descriptor.objects,
            live = map.len(),
            "Collection reconstructed"
        );
        Ok(Collection {
            name: descriptor.name,
            root: root.to_path_buf(),
            paths,
            map,
            cache,
            registry,
            codec,
            sync_lock: Mutex::new(()),
        })
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection directory
    pub fn storage_path(&self) -> &Path {
        self.paths.dir()
    }

    /// Underlying sharded map
    pub fn map(&self) -> &ConcurrentMap {
        &self.map
    }

    /// Element cache
    pub fn cache(&self) -> &CollectionCache {
        &self.cache
    }

    /// Current descriptor
    pub fn descriptor(&self) -> CollectionDescriptor {
        CollectionDescriptor {
            name: self.name.clone(),
            path: DatabasePaths::relative_collection_dir(&self.name)
                .to_string_lossy()
                .into_owned(),
            objects: self.size(),
        }
    }

    // ========================================================================
    // Elements
    // ========================================================================

    /// Store a raw payload under a new identifier
    pub fn insert(&self, payload: impl Into<Vec<u8>>) -> Result<u64> {
        let id = self.map.next_id();
        self.write_element(Element::new(id, payload))?;
        Ok(id)
    }

    /// Store a registered structure under a new identifier
    pub fn insert_structure<T: CustomStructure + 'static>(&self, value: &T) -> Result<u64> {
        let type_name = self.registered_name::<T>()?;
        let payload = bincode::serialize(value)?;
        let id = self.map.next_id();
        self.write_element(Element::structured(id, type_name, value.data_index(), payload))?;
        Ok(id)
    }

    /// Store a raw payload under an explicit identifier, replacing any
    /// previous element
    pub fn put(&self, id: u64, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.write_element(Element::new(id, payload))
    }

    /// Fetch an element
    pub fn get(&self, id: u64) -> Result<Option<Arc<Element>>> {
        if let Some(element) = self.cache.get(id) {
            return Ok(Some(element));
        }
        // Cache fills and cache writes both happen under the shard lock
        self.map
            .get_with(id, |record| -> Result<Arc<Element>> {
                let element = Arc::new(bincode::deserialize::<Element>(&record)?);
                self.cache.insert(Arc::clone(&element));
                Ok(element)
            })?
            .transpose()
    }

    /// Fetch and decode a registered structure
    pub fn get_structure<T: DeserializeOwned + 'static>(&self, id: u64) -> Result<Option<T>> {
        let type_name = self.registered_name::<T>()?;
        let element = match self.get(id)? {
            Some(element) => element,
            None => return Ok(None),
        };
        if element.type_name.as_deref() != Some(type_name.as_str()) {
            return Err(Error::Serialization(format!(
                "element {} holds {:?}, not {}",
                id, element.type_name, type_name
            )));
        }
        Ok(Some(bincode::deserialize(&element.payload)?))
    }

    /// Remove an element
    pub fn remove(&self, id: u64) -> bool {
        self.map.remove_with(id, || self.cache.invalidate(id))
    }

    /// Check if an element exists
    pub fn contains(&self, id: u64) -> bool {
        self.map.contains(id)
    }

    /// Identifiers of all live elements, ascending
    pub fn ids(&self) -> Vec<u64> {
        self.map.keys()
    }

    /// Identifiers of elements whose field index has `field == value`
    pub fn find(&self, field: &str, value: &str) -> Result<Vec<u64>> {
        let mut found = Vec::new();
        for shard in self.map.shards() {
            for (id, record) in shard.records()? {
                let element: Element = bincode::deserialize(&record)?;
                if element.matches(field, value) {
                    found.push(id);
                }
            }
        }
        found.sort_unstable();
        Ok(found)
    }

    /// Number of live elements
    pub fn size(&self) -> u64 {
        self.map.len() as u64
    }

    /// Bytes reclaimable by [`Collection::optimize`]
    pub fn stale_bytes(&self) -> u64 {
        self.map.stale_bytes()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persist shard data, shard metadata, `map.index` and the descriptor
    pub fn sync(&self) -> Result<()> {
        let _guard = self.sync_lock.lock();
        self.map.persist(&self.paths, &self.root, &self.codec)?;
        let descriptor = self.descriptor();
        CompressedPackage::new(self.paths.descriptor(), Arc::clone(&self.codec))
            .save_json(&descriptor)?;
        info!(
            target: "shardb::collection",
            collection = %self.name,
            objects = descriptor.objects,
            "Collection synchronized"
        );
        Ok(())
    }

    /// Rewrite shards holding stale records
    ///
    /// Returns the number of bytes reclaimed. Live elements are untouched.
    pub fn optimize(&self) -> Result<u64> {
        let _guard = self.sync_lock.lock();
        let reclaimed = self.map.compact(&self.paths, &self.codec)?;
        debug!(
            target: "shardb::collection",
            collection = %self.name,
            reclaimed,
            "Collection optimized"
        );
        Ok(reclaimed)
    }

    fn write_element(&self, element: Element) -> Result<()> {
        let record = bincode::serialize(&element)?;
        let id = element.id;
        let element = Arc::new(element);
        self.map
            .insert_with(id, &record, || self.cache.insert(element))?;
        Ok(())
    }

    fn registered_name<T: 'static>(&self) -> Result<String> {
        self.registry
            .name_of::<T>()
            .ok_or_else(|| Error::UnregisteredType(type_name::<T>().to_string()))
    }
}
