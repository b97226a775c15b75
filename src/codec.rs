//! Payload codecs.
//!
//! The codec is chosen at compile time: producers and consumers that talk
//! to each other must agree on it. `JsonCodec` is the default and the only
//! one readable by non-Rust consumers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "bitcode")]
    #[error("bitcode: {0}")]
    Bitcode(#[from] bitcode::Error),
}

/// Turns payloads into message bytes and back.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Whether encoded bytes represent "no payload".
    fn is_empty(&self, bytes: &[u8]) -> bool {
        bytes.is_empty()
    }
}

/// JSON text codec (`serde_json`).
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn is_empty(&self, bytes: &[u8]) -> bool {
        let text = String::from_utf8_lossy(bytes);
        let trimmed = text.trim();
        trimmed.is_empty() || trimmed == "null"
    }
}

/// Compact binary codec (`bitcode`), for Rust-only deployments.
#[cfg(feature = "bitcode")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BitcodeCodec;

#[cfg(feature = "bitcode")]
impl Codec for BitcodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(bitcode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(bitcode::deserialize(bytes)?)
    }
}
