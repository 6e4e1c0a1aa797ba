//! Body codecs.
//!
//! The pipeline treats a codec as a black box that turns typed values into
//! bytes and back. `JsonCodec` is the default and the only codec the client
//! ships; applications can plug in their own by implementing `Codec`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Failure reported by a `Codec`.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("decode failed")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Encodes request bodies and decodes response bodies.
///
/// Shared by every concurrent call on a client, so implementations must be
/// safe to use from several tasks at once.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// `serde_json` backed codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit indented JSON. Useful when request bodies are logged.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded.map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
