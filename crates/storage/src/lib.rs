//! Storage layer for ShardDB
//!
//! This crate implements the sharded persistence of a collection:
//! - Shard: one data file + offset index behind its own lock
//! - ConcurrentMap: fixed shard array, key routing, identifier counter
//! - MapIndex: the `map.index` counter/sync-destination file
//! - Compaction of stale records
//!
//! # Performance
//!
//! - Key operations lock only the owning shard
//! - Different shards never contend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod map;
pub mod shard;

pub use map::{shard_for, ConcurrentMap, MapIndex};
pub use shard::{Shard, ShardMeta};
