//! Storage codec abstraction.
//!
//! Every package written by the persistence layer passes through a codec.
//! The default is zstd compression; the identity codec is kept for
//! debugging on-disk files by hand.
//!
//! # Usage
//!
//! ```ignore
//! use shardb_durability::codec::{StorageCodec, ZstdCodec};
//!
//! let codec = ZstdCodec::default();
//! let encoded = codec.encode(b"hello world")?;
//! let decoded = codec.decode(&encoded)?;
//! ```

mod identity;
mod traits;
mod zstd;

pub use self::zstd::{ZstdCodec, DEFAULT_COMPRESSION_LEVEL};
pub use identity::IdentityCodec;
pub use traits::{CodecError, StorageCodec};

/// Get a codec by its identifier.
///
/// # Known Codecs
///
/// - `"identity"`: No-op codec (pass-through)
/// - `"zstd"`: zstd at the default compression level
pub fn get_codec(codec_id: &str) -> Result<Box<dyn StorageCodec>, CodecError> {
    match codec_id {
        "identity" => Ok(Box::new(IdentityCodec)),
        "zstd" => Ok(Box::new(ZstdCodec::default())),
        _ => Err(CodecError::UnknownCodec(codec_id.to_string())),
    }
}
