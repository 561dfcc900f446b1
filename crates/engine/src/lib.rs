//! Database engine for ShardDB
//!
//! This crate orchestrates the lower layers:
//! - Database: registry of collections with load, sync and optimize
//! - Collection: element operations over one sharded map
//! - Process setup: type registry, random generator, memory profile
//!
//! The engine is the only component that knows about:
//! - The database header and version checks
//! - Collection reconstruction on load
//! - Parallel synchronization of collections

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod collection;
pub mod config;
pub mod database;
pub mod setup;

pub use cache::CollectionCache;
pub use collection::{Collection, CollectionDescriptor};
pub use config::{DatabaseConfig, DEFAULT_CACHE_CAPACITY};
pub use database::{Database, DatabaseHeader, SyncReport, DB_VERSION, MAJOR_VERSION_GAP};
pub use setup::MemoryProfile;
