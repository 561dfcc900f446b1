//! zstd compression codec.

use super::traits::{CodecError, StorageCodec};

/// Compression level used when none is configured
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// zstd codec
///
/// Each call compresses the full buffer as a single zstd frame.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Create a codec with an explicit compression level (1..=22)
    pub fn new(level: i32) -> Self {
        ZstdCodec { level }
    }

    /// Compression level
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        ZstdCodec::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl StorageCodec for ZstdCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        ::zstd::encode_all(data, self.level)
            .map_err(|e| CodecError::encode(e.to_string(), self.codec_id(), data.len()))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        ::zstd::decode_all(data)
            .map_err(|e| CodecError::decode(e.to_string(), self.codec_id(), data.len()))
    }

    fn codec_id(&self) -> &str {
        "zstd"
    }
}
