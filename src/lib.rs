//! ShardDB - embedded file-backed store with sharded collections
//!
//! A [`Database`] is a registry of named [`Collection`]s. Each collection
//! spreads its elements over a fixed number of shards, and every shard is
//! persisted as an append-only data file plus a compressed metadata file.
//!
//! # Quick Start
//!
//! ```ignore
//! use shardb::{Database, DatabaseConfig};
//!
//! let db = Database::new("app", DatabaseConfig::new("/var/lib/app"))?;
//! let users = db.add_collection("users")?;
//! let id = users.insert(b"alice".to_vec())?;
//! db.sync()?;
//!
//! let db = Database::load("/var/lib/app")?;
//! assert!(db.get_collection("users").unwrap().contains(id));
//! ```

pub use shardb_core::{CustomStructure, Element, Error, FieldIndex, Result, ShardOffset, SHARD_COUNT};
pub use shardb_durability::{
    CompressedPackage, EncodedCompressedPackage, IdentityCodec, StorageCodec, TypeRegistry,
    ZstdCodec,
};
pub use shardb_engine::{
    Collection, CollectionCache, CollectionDescriptor, Database, DatabaseConfig, DatabaseHeader,
    MemoryProfile, SyncReport, DB_VERSION, MAJOR_VERSION_GAP,
};
pub use shardb_storage::{shard_for, ConcurrentMap, Shard, ShardMeta};
