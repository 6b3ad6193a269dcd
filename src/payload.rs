//! JSON payloads exchanged with the engine.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Encoding tag carried by every payload produced by this crate.
pub const JSON_ENCODING: &str = "json/plain";

/// An encoded argument or result as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    encoding: String,
    data: Vec<u8>,
}

impl Payload {
    /// Wraps already-encoded bytes.
    pub fn new(encoding: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            encoding: encoding.into(),
            data,
        }
    }

    /// Encoding tag of this payload.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Raw encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Serializes a value into a JSON [`Payload`].
pub trait AsJsonPayloadExt {
    /// Encodes `self` as JSON.
    fn as_json_payload(&self) -> Result<Payload>;
}

impl<T: Serialize> AsJsonPayloadExt for T {
    fn as_json_payload(&self) -> Result<Payload> {
        let data = serde_json::to_vec(self).map_err(|e| Error::Payload(e.to_string()))?;
        Ok(Payload::new(JSON_ENCODING, data))
    }
}

/// Deserializes a value from a JSON [`Payload`].
pub trait FromJsonPayloadExt: Sized {
    /// Decodes a JSON payload into `Self`.
    fn from_json_payload(payload: &Payload) -> Result<Self>;
}

impl<T: DeserializeOwned> FromJsonPayloadExt for T {
    fn from_json_payload(payload: &Payload) -> Result<Self> {
        if payload.encoding != JSON_ENCODING {
            return Err(Error::Payload(format!(
                "unsupported encoding `{}`",
                payload.encoding
            )));
        }
        serde_json::from_slice(&payload.data).map_err(|e| Error::Payload(e.to_string()))
    }
}
