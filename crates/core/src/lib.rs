//! Core types for ShardDB
//!
//! This crate defines the foundational types shared by every layer:
//! - Error: Error type hierarchy
//! - ShardOffset: Position of a record inside a shard data file
//! - Element: Unit of data stored in a collection
//! - CustomStructure / FieldIndex: User-defined structures embedded in elements
//! - SHARD_COUNT: Fixed number of shards per collection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{CustomStructure, Element, FieldIndex, ShardOffset, SHARD_COUNT};
