//! Durability layer for ShardDB
//!
//! This crate handles the bytes that touch disk outside of shard data files:
//!
//! - Storage codec abstraction (zstd compression, identity)
//! - Encoded/compressed packages with crash-safe atomic writes
//! - On-disk directory layout
//! - Type registry for structured payloads

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod package;
pub mod paths;
pub mod registry;

pub use codec::{get_codec, CodecError, IdentityCodec, StorageCodec, ZstdCodec};
pub use package::{write_atomic, CompressedPackage, EncodedCompressedPackage};
pub use paths::{CollectionPaths, DatabasePaths, COLLECTIONS_DIR_NAME, HEADER_EXTENSION};
pub use registry::TypeRegistry;
