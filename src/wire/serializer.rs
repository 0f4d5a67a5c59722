//! Wire format serialization abstraction
//!
//! Two payload encodings are supported:
//!
//! - **Postcard** (default): compact binary, used for production streaming
//! - **Json**: human-readable, used for debugging and cross-language clients
//!
//! Both sides of a link must be configured with the same format; the frame
//! header does not carry a format tag.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Supported wire formats
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WireFormat {
    /// Binary format using postcard - fast and compact
    #[default]
    Postcard,
    /// JSON format - human-readable for debugging
    Json,
}

/// Serializer that can handle both formats
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer {
    format: WireFormat,
}

impl Serializer {
    /// Create a new serializer for the given format
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    /// Serialize a payload to bytes
    pub fn serialize<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>> {
        match self.format {
            WireFormat::Postcard => {
                postcard::to_allocvec(msg).map_err(|e| Error::Serialization(e.to_string()))
            }
            WireFormat::Json => {
                serde_json::to_vec(msg).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }

    /// Deserialize bytes to a payload
    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self.format {
            WireFormat::Postcard => {
                postcard::from_bytes(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
            WireFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postcard_roundtrip() {
        let serializer = Serializer::new(WireFormat::Postcard);
        let value: Vec<u32> = vec![1, 2, 3, 4];
        let bytes = serializer.serialize(&value).unwrap();
        let back: Vec<u32> = serializer.deserialize(&bytes).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn test_json_roundtrip() {
        let serializer = Serializer::new(WireFormat::Json);
        let value = String::from("lidar");
        let bytes = serializer.serialize(&value).unwrap();
        let back: String = serializer.deserialize(&bytes).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn test_deserialize_garbage_fails() {
        let serializer = Serializer::new(WireFormat::Json);
        let result: Result<Vec<u32>> = serializer.deserialize(b"not json");
        assert!(result.is_err());
    }
}
