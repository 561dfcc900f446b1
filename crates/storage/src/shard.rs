//! A single shard: one data file plus its offset index
//!
//! # Design
//!
//! - Records are appended to the data file; the index maps each key to the
//!   byte range of its latest record.
//! - Overwrites and removals leave the old bytes in place and count them as
//!   stale. Compaction rewrites the live records and reclaims them.
//! - `ShardMeta` is the serializable half (index + counters). The file
//!   handle is runtime state and is attached after the metadata is decoded.
//!
//! # Thread Safety
//!
//! One mutex guards the metadata and the file handle together, so the
//! index never points into a file that does not match it. Different shards
//! never contend.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shardb_core::{Result, ShardOffset};
use shardb_durability::EncodedCompressedPackage;
use tracing::debug;

/// Serializable shard state
///
/// Offsets are kept in a `BTreeMap` so that encoding unchanged metadata
/// always yields the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardMeta {
    /// Shard ordinal within its map
    pub id: usize,
    /// Key -> location of the latest record
    pub offsets: BTreeMap<u64, ShardOffset>,
    /// Append position in the data file
    pub end: u64,
    /// Bytes held by overwritten or removed records
    pub stale_bytes: u64,
    /// Number of overwritten or removed records
    pub stale_entries: u64,
}

impl ShardMeta {
    /// Metadata for an empty shard
    pub fn new(id: usize) -> Self {
        ShardMeta {
            id,
            offsets: BTreeMap::new(),
            end: 0,
            stale_bytes: 0,
            stale_entries: 0,
        }
    }

    /// Check that every record lies inside a data file of `file_len` bytes
    pub fn validate(&self, file_len: u64) -> std::result::Result<(), String> {
        if self.end > file_len {
            return Err(format!(
                "shard {} append position {} is past the data file end {}",
                self.id, self.end, file_len
            ));
        }
        let out_of_range = self
            .offsets
            .iter()
            .find(|(_, o)| o.checked_end().map_or(true, |end| end > self.end));
        if let Some((key, offset)) = out_of_range {
            return Err(format!(
                "shard {} key {} points at {}+{} past the append position {}",
                self.id, key, offset.position, offset.length, self.end
            ));
        }
        Ok(())
    }

    fn mark_stale(&mut self, offset: &ShardOffset) {
        self.stale_bytes += offset.length;
        self.stale_entries += 1;
    }
}

struct ShardState {
    meta: ShardMeta,
    file: File,
}

/// One partition of a collection
pub struct Shard {
    id: usize,
    state: Mutex<ShardState>,
}

impl Shard {
    /// Create an empty shard over a freshly created data file
    pub fn new(id: usize, file: File) -> Self {
        Shard::attach(ShardMeta::new(id), file)
    }

    /// Attach a data file to decoded metadata
    pub fn attach(meta: ShardMeta, file: File) -> Self {
        Shard {
            id: meta.id,
            state: Mutex::new(ShardState { meta, file }),
        }
    }

    /// Shard ordinal
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.state.lock().meta.offsets.len()
    }

    /// Check if the shard holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a key is live in this shard
    pub fn contains(&self, key: u64) -> bool {
        self.state.lock().meta.offsets.contains_key(&key)
    }

    /// Live keys in ascending order
    pub fn keys(&self) -> Vec<u64> {
        self.state.lock().meta.offsets.keys().copied().collect()
    }

    /// Current location of a key's record
    pub fn offset(&self, key: u64) -> Option<ShardOffset> {
        self.state.lock().meta.offsets.get(&key).copied()
    }

    /// Bytes reclaimable by compaction
    pub fn stale_bytes(&self) -> u64 {
        self.state.lock().meta.stale_bytes
    }

    /// Copy of the current metadata
    pub fn meta(&self) -> ShardMeta {
        self.state.lock().meta.clone()
    }

    /// Append a record for `key`
    ///
    /// Returns the offset it replaced, if any. The replaced bytes become stale.
    pub fn write(&self, key: u64, record: &[u8]) -> io::Result<Option<ShardOffset>> {
        self.write_with(key, record, || {})
    }

    /// Append a record for `key` and run `on_written` before the shard
    /// lock is released
    pub fn write_with(
        &self,
        key: u64,
        record: &[u8],
        on_written: impl FnOnce(),
    ) -> io::Result<Option<ShardOffset>> {
        let mut state = self.state.lock();
        let position = state.meta.end;

        state.file.seek(SeekFrom::Start(position))?;
        state.file.write_all(record)?;

        let offset = ShardOffset::new(position, record.len() as u64, crc32fast::hash(record));
        state.meta.end = offset.end();
        let replaced = state.meta.offsets.insert(key, offset);
        if let Some(old) = &replaced {
            state.meta.mark_stale(old);
        }
        on_written();
        Ok(replaced)
    }

    /// Read the latest record for `key`
    ///
    /// A checksum mismatch is reported as `InvalidData`.
    pub fn read(&self, key: u64) -> io::Result<Option<Vec<u8>>> {
        self.read_with(key, |record| record)
    }

    /// Read the latest record for `key` and pass it to `f` while the shard
    /// lock is still held
    pub fn read_with<R>(&self, key: u64, f: impl FnOnce(Vec<u8>) -> R) -> io::Result<Option<R>> {
        let mut state = self.state.lock();
        let offset = match state.meta.offsets.get(&key) {
            Some(offset) => *offset,
            None => return Ok(None),
        };
        read_record(&mut state.file, &offset).map(|record| Some(f(record)))
    }

    /// Read every live record in key order
    pub fn records(&self) -> io::Result<Vec<(u64, Vec<u8>)>> {
        let mut state = self.state.lock();
        let offsets: Vec<(u64, ShardOffset)> =
            state.meta.offsets.iter().map(|(k, o)| (*k, *o)).collect();
        offsets
            .into_iter()
            .map(|(key, offset)| read_record(&mut state.file, &offset).map(|r| (key, r)))
            .collect()
    }

    /// Remove `key`; its record becomes stale
    pub fn remove(&self, key: u64) -> bool {
        self.remove_with(key, || {})
    }

    /// Remove `key` and run `on_removed` before the shard lock is released
    ///
    /// `on_removed` runs whether or not the key was live.
    pub fn remove_with(&self, key: u64, on_removed: impl FnOnce()) -> bool {
        let mut state = self.state.lock();
        let removed = match state.meta.offsets.remove(&key) {
            Some(old) => {
                state.meta.mark_stale(&old);
                true
            }
            None => false,
        };
        on_removed();
        removed
    }

    /// Highest live key
    pub fn max_key(&self) -> Option<u64> {
        self.state.lock().meta.offsets.keys().next_back().copied()
    }

    /// Flush the data file and write the metadata package
    ///
    /// The data file is synced first so the persisted metadata never points
    /// at bytes that are not on disk.
    pub fn persist(&self, package: &EncodedCompressedPackage<ShardMeta>) -> Result<()> {
        let state = self.state.lock();
        state.file.sync_data()?;
        package.save(&state.meta)
    }

    /// Rewrite live records into a new data file and reclaim stale bytes
    ///
    /// Live records are copied in key order to `temp_path`, which is synced
    /// and renamed over `data_path`. The new metadata is persisted before
    /// the lock is released. Returns the number of bytes reclaimed.
    pub fn compact(
        &self,
        temp_path: &Path,
        data_path: &Path,
        package: &EncodedCompressedPackage<ShardMeta>,
    ) -> Result<u64> {
        let mut state = self.state.lock();
        let live_bytes: u64 = state.meta.offsets.values().map(|o| o.length).sum();
        if state.meta.end == live_bytes {
            return Ok(0);
        }

        let mut temp = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(temp_path)?;

        let mut offsets = BTreeMap::new();
        let mut position = 0u64;
        let live: Vec<(u64, ShardOffset)> =
            state.meta.offsets.iter().map(|(k, o)| (*k, *o)).collect();
        for (key, old) in live {
            let record = match read_record(&mut state.file, &old) {
                Ok(record) => record,
                Err(e) => {
                    drop(temp);
                    let _ = std::fs::remove_file(temp_path);
                    return Err(e.into());
                }
            };
            temp.write_all(&record)?;
            offsets.insert(key, ShardOffset::new(position, old.length, old.checksum));
            position += old.length;
        }
        temp.sync_all()?;

        std::fs::rename(temp_path, data_path)?;
        if let Some(parent) = data_path.parent() {
            File::open(parent)?.sync_all()?;
        }

        let reclaimed = state.meta.end - position;
        state.file = temp;
        state.meta.offsets = offsets;
        state.meta.end = position;
        state.meta.stale_bytes = 0;
        state.meta.stale_entries = 0;
        package.save(&state.meta)?;

        debug!(
            target: "shardb::storage",
            shard = self.id,
            reclaimed,
            live_bytes = position,
            "Shard compacted"
        );
        Ok(reclaimed)
    }
}

fn read_record(file: &mut File, offset: &ShardOffset) -> io::Result<Vec<u8>> {
    let file_len = file.metadata()?.len();
    if offset.checked_end().map_or(true, |end| end > file_len) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "record at {}+{} is past the data file end {}",
                offset.position, offset.length, file_len
            ),
        ));
    }
    let mut record = vec![0u8; offset.length as usize];
    file.seek(SeekFrom::Start(offset.position))?;
    file.read_exact(&mut record)?;
    if !offset.verify(&record) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "checksum mismatch for record at {}..{}",
                offset.position,
                offset.end()
            ),
        ));
    }
    Ok(record)
}
