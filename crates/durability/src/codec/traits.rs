//! Storage codec trait definitions.

/// Storage codec trait.
///
/// All package bytes pass through the codec before they reach disk.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync`: collections are synchronized from
/// several threads at once and share the database's codec.
pub trait StorageCodec: Send + Sync {
    /// Encode bytes for storage.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes from storage.
    ///
    /// Returns an error if the data cannot be decoded (corruption,
    /// wrong codec).
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Unique codec identifier.
    fn codec_id(&self) -> &str;
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Encoding failed.
    #[error("Encode error (codec={codec_id}, data_len={data_len}): {detail}")]
    EncodeError {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the encode
        codec_id: String,
        /// Length of the input
        data_len: usize,
    },

    /// Decoding failed (invalid frame, truncated file).
    ///
    /// Carries the codec identity and data length so callers can
    /// distinguish a wrong-codec error from data corruption.
    #[error("Decode error (codec={codec_id}, data_len={data_len}): {detail}")]
    DecodeError {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the decode
        codec_id: String,
        /// Length of the data that failed to decode
        data_len: usize,
    },

    /// Unknown codec identifier.
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}

impl CodecError {
    /// Create an encode error with full diagnostic context.
    pub fn encode(detail: impl Into<String>, codec_id: impl Into<String>, data_len: usize) -> Self {
        CodecError::EncodeError {
            detail: detail.into(),
            codec_id: codec_id.into(),
            data_len,
        }
    }

    /// Create a decode error with full diagnostic context.
    pub fn decode(detail: impl Into<String>, codec_id: impl Into<String>, data_len: usize) -> Self {
        CodecError::DecodeError {
            detail: detail.into(),
            codec_id: codec_id.into(),
            data_len,
        }
    }
}

impl From<CodecError> for shardb_core::Error {
    fn from(e: CodecError) -> Self {
        shardb_core::Error::Codec(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{IdentityCodec, ZstdCodec};

    // Test that trait is object-safe
    fn _accepts_box_dyn_codec(_codec: Box<dyn StorageCodec>) {}

    #[test]
    fn test_codec_trait_object_safe() {
        let codecs: Vec<Box<dyn StorageCodec>> =
            vec![Box::new(IdentityCodec), Box::new(ZstdCodec::default())];

        for codec in codecs {
            let data = b"test data";
            let encoded = codec.encode(data).unwrap();
            let decoded = codec.decode(&encoded).unwrap();
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::decode("test error", "zstd", 42);
        let msg = err.to_string();
        assert!(msg.contains("test error"));
        assert!(msg.contains("zstd"));
        assert!(msg.contains("42"));

        let err = CodecError::UnknownCodec("mystery".to_string());
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn test_codec_error_into_core_error() {
        let err: shardb_core::Error = CodecError::decode("bad frame", "zstd", 3).into();
        assert!(matches!(err, shardb_core::Error::Codec(_)));
    }
}
