//! Sharded concurrent map
//!
//! Partitions a collection's key space across [`SHARD_COUNT`] shards.
//!
//! # Design
//!
//! - Routing: `xxh3(key) % SHARD_COUNT`, stable across processes
//! - Every key operation locks only the owning shard
//! - `counter` is the last issued element identifier and never decreases
//!
//! # Persistence
//!
//! Each shard persists its own data and metadata files. `map.index` holds
//! the counter and the sync destination (the directory compaction writes
//! its temporary files into), relative to the database root.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shardb_core::{Error, Result, ShardOffset, SHARD_COUNT};
use shardb_durability::paths::{parse_shard_data_file_name, shard_data_file_name};
use shardb_durability::{write_atomic, CollectionPaths, EncodedCompressedPackage, StorageCodec};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::shard::{Shard, ShardMeta};

/// Shard ordinal owning `key`
#[inline]
pub fn shard_for(key: u64) -> usize {
    (xxh3_64(&key.to_le_bytes()) % SHARD_COUNT as u64) as usize
}

/// Contents of `map.index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapIndex {
    /// Last issued identifier
    pub counter: u64,
    /// Sync destination relative to the database root
    pub sync_destination: PathBuf,
}

impl MapIndex {
    /// Parse the two-line text form
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut lines = text.lines();
        let counter_line = lines.next().ok_or("map index is empty")?;
        let counter = counter_line
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid counter {:?}: {}", counter_line, e))?;
        let destination = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or("map index has no sync destination")?;
        Ok(MapIndex {
            counter,
            sync_destination: PathBuf::from(destination),
        })
    }

    /// Render the two-line text form
    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n",
            self.counter,
            self.sync_destination.to_string_lossy()
        )
    }

    /// Read `map.index`
    pub fn load(path: &Path, collection: &str) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::corrupted(collection, "map index file missing"))
            }
            Err(e) => return Err(e.into()),
        };
        MapIndex::parse(&text).map_err(|reason| Error::corrupted(collection, reason))
    }

    /// Write `map.index` atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes())?;
        Ok(())
    }
}

/// Sharded map over one collection directory
pub struct ConcurrentMap {
    base_path: PathBuf,
    shards: Vec<Shard>,
    counter: AtomicU64,
    sync_destination: PathBuf,
}

impl ConcurrentMap {
    /// Create a map over already-open data files, one per shard ordinal
    pub fn new(base_path: impl Into<PathBuf>, files: Vec<File>) -> Result<Self> {
        let base_path = base_path.into();
        if files.len() != SHARD_COUNT {
            return Err(Error::corrupted(
                base_path.display().to_string(),
                format!("expected {} shard files, got {}", SHARD_COUNT, files.len()),
            ));
        }
        let shards = files
            .into_iter()
            .enumerate()
            .map(|(id, file)| Shard::new(id, file))
            .collect();
        Ok(ConcurrentMap {
            sync_destination: base_path.clone(),
            base_path,
            shards,
            counter: AtomicU64::new(0),
        })
    }

    /// Create a map from reattached shards
    ///
    /// `shards[i].id()` must equal `i`.
    pub fn from_shards(base_path: impl Into<PathBuf>, shards: Vec<Shard>) -> Result<Self> {
        let base_path = base_path.into();
        if shards.len() != SHARD_COUNT {
            return Err(Error::corrupted(
                base_path.display().to_string(),
                format!("expected {} shards, got {}", SHARD_COUNT, shards.len()),
            ));
        }
        if let Some((slot, shard)) = shards.iter().enumerate().find(|(i, s)| s.id() != *i) {
            return Err(Error::corrupted(
                base_path.display().to_string(),
                format!("shard {} stored in slot {}", shard.id(), slot),
            ));
        }
        Ok(ConcurrentMap {
            sync_destination: base_path.clone(),
            base_path,
            shards,
            counter: AtomicU64::new(0),
        })
    }

    /// Create the data files of a new collection and a map over them
    ///
    /// Fails if any shard data file already exists.
    pub fn create(paths: &CollectionPaths) -> Result<Self> {
        std::fs::create_dir_all(paths.dir())?;
        let files = (0..SHARD_COUNT)
            .map(|i| {
                OpenOptions::new()
                    .create_new(true)
                    .read(true)
                    .write(true)
                    .open(paths.shard_data(i))
            })
            .collect::<std::io::Result<Vec<File>>>()?;
        ConcurrentMap::new(paths.dir(), files)
    }

    /// Reattach the shards and index of an existing collection
    ///
    /// Relative sync destinations are resolved against `root`. Any missing
    /// or undecodable file fails the whole open.
    pub fn open(paths: &CollectionPaths, root: &Path, codec: &Arc<dyn StorageCodec>) -> Result<Self> {
        let name = paths.name();
        let mut file_names = std::fs::read_dir(paths.dir())?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<Vec<String>>>()?;
        if file_names.len() < SHARD_COUNT {
            return Err(Error::corrupted(
                name,
                format!(
                    "invalid amount of files {}, expected at least {}",
                    file_names.len(),
                    SHARD_COUNT
                ),
            ));
        }
        file_names.sort();

        let mut slots: Vec<Option<Shard>> = (0..SHARD_COUNT).map(|_| None).collect();
        for ordinal in file_names.iter().filter_map(|n| parse_shard_data_file_name(n)) {
            if ordinal >= SHARD_COUNT {
                return Err(Error::corrupted(
                    name,
                    format!("unexpected shard ordinal {}", ordinal),
                ));
            }
            if slots[ordinal].is_some() {
                return Err(Error::corrupted(
                    name,
                    format!("more than one data file for shard {}", ordinal),
                ));
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(paths.shard_data(ordinal))?;
            let meta = EncodedCompressedPackage::<ShardMeta>::new(
                paths.shard_meta(ordinal),
                Arc::clone(codec),
            )
            .load()
            .map_err(|e| Error::corrupted(name, format!("shard {} metadata: {}", ordinal, e)))?;

            if meta.id != ordinal {
                return Err(Error::corrupted(
                    name,
                    format!("shard file {} holds metadata for shard {}", ordinal, meta.id),
                ));
            }
            meta.validate(file.metadata()?.len())
                .map_err(|reason| Error::corrupted(name, reason))?;
            slots[ordinal] = Some(Shard::attach(meta, file));
        }

        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for (ordinal, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(shard) => shards.push(shard),
                None => {
                    return Err(Error::corrupted(
                        name,
                        format!("shard {} data file missing", ordinal),
                    ))
                }
            }
        }

        let index = MapIndex::load(&paths.map_index(), name)?;
        let map = ConcurrentMap::from_shards(paths.dir(), shards)?
            .with_sync_destination(root.join(&index.sync_destination));
        // Shard metadata may be newer than map.index
        let highest_key = map.shards.iter().filter_map(|s| s.max_key()).max().unwrap_or(0);
        let counter = index.counter.max(highest_key);
        map.set_counter_index(counter);

        debug!(
            target: "shardb::storage",
            collection = name,
            counter,
            entries = map.len(),
            "Map reattached"
        );
        Ok(map)
    }

    /// Set the directory compaction writes into
    pub fn with_sync_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.sync_destination = destination.into();
        self
    }

    /// Directory holding the shard files
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory compaction writes into
    pub fn sync_destination(&self) -> &Path {
        &self.sync_destination
    }

    /// All shards, indexed by ordinal
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Shard owning `key`
    pub fn shard(&self, key: u64) -> &Shard {
        &self.shards[shard_for(key)]
    }

    // ========================================================================
    // Counter
    // ========================================================================

    /// Set the allocation counter (used when reattaching)
    pub fn set_counter_index(&self, counter: u64) {
        self.counter.store(counter, Ordering::Release);
    }

    /// Last issued identifier
    pub fn counter_index(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Allocate the next identifier
    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    // ========================================================================
    // Key Operations
    // ========================================================================

    /// Write a record for `key`, returning the offset it replaced
    ///
    /// The counter is raised to `key` so later allocations never reuse it.
    pub fn insert(&self, key: u64, record: &[u8]) -> Result<Option<ShardOffset>> {
        let replaced = self.shard(key).write(key, record)?;
        self.counter.fetch_max(key, Ordering::AcqRel);
        Ok(replaced)
    }

    /// Write a record for `key` and run `on_written` while the owning
    /// shard is still locked
    pub fn insert_with(
        &self,
        key: u64,
        record: &[u8],
        on_written: impl FnOnce(),
    ) -> Result<Option<ShardOffset>> {
        let replaced = self.shard(key).write_with(key, record, on_written)?;
        self.counter.fetch_max(key, Ordering::AcqRel);
        Ok(replaced)
    }

    /// Read the record for `key`
    pub fn get(&self, key: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.shard(key).read(key)?)
    }

    /// Read the record for `key` and pass it to `f` while the owning shard
    /// is still locked
    pub fn get_with<R>(&self, key: u64, f: impl FnOnce(Vec<u8>) -> R) -> Result<Option<R>> {
        Ok(self.shard(key).read_with(key, f)?)
    }

    /// Remove `key`
    pub fn remove(&self, key: u64) -> bool {
        self.shard(key).remove(key)
    }

    /// Remove `key` and run `on_removed` while the owning shard is still
    /// locked
    pub fn remove_with(&self, key: u64, on_removed: impl FnOnce()) -> bool {
        self.shard(key).remove_with(key, on_removed)
    }

    /// Check if `key` is live
    pub fn contains(&self, key: u64) -> bool {
        self.shard(key).contains(key)
    }

    /// Live keys across all shards, ascending
    pub fn keys(&self) -> Vec<u64> {
        let mut keys: Vec<u64> = self.shards.iter().flat_map(|s| s.keys()).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    /// Check if the map holds no live keys
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.is_empty())
    }

    /// Bytes reclaimable by compaction
    pub fn stale_bytes(&self) -> u64 {
        self.shards.iter().map(|s| s.stale_bytes()).sum()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persist every shard and then `map.index`
    ///
    /// The index stores the sync destination relative to `root` when it
    /// lies under it.
    pub fn persist(
        &self,
        paths: &CollectionPaths,
        root: &Path,
        codec: &Arc<dyn StorageCodec>,
    ) -> Result<()> {
        for shard in &self.shards {
            let package = EncodedCompressedPackage::new(paths.shard_meta(shard.id()), Arc::clone(codec));
            shard.persist(&package)?;
        }

        let sync_destination = self
            .sync_destination
            .strip_prefix(root)
            .unwrap_or(&self.sync_destination)
            .to_path_buf();
        MapIndex {
            counter: self.counter_index(),
            sync_destination,
        }
        .save(&paths.map_index())
    }

    /// Compact every shard holding stale data
    ///
    /// Returns the total number of bytes reclaimed.
    pub fn compact(&self, paths: &CollectionPaths, codec: &Arc<dyn StorageCodec>) -> Result<u64> {
        std::fs::create_dir_all(&self.sync_destination)?;
        let mut reclaimed = 0;
        for shard in &self.shards {
            let id = shard.id();
            let temp_path = self
                .sync_destination
                .join(format!("{}.compact", shard_data_file_name(id)));
            let package = EncodedCompressedPackage::new(paths.shard_meta(id), Arc::clone(codec));
            reclaimed += shard.compact(&temp_path, &paths.shard_data(id), &package)?;
        }
        Ok(reclaimed)
    }
}
