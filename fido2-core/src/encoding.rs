//! Transport encoding for credential material.
//!
//! Every byte-carrying value that crosses the client boundary (key handles,
//! challenges, user handles, credential ids, client data, signatures) uses
//! the same padded URL-safe base64 alphabet, so encoded values can be
//! compared as strings. Decoding is strict: characters outside the alphabet
//! and non-canonical padding are rejected rather than truncated.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::error::{Fido2Error, Result};

/// Encode bytes into the transport alphabet.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(bytes)
}

/// Decode transport text back into bytes.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    decode_field("value", text)
}

/// Decode transport text, naming the offending field on failure.
pub fn decode_field(field: &'static str, text: &str) -> Result<Vec<u8>> {
    URL_SAFE
        .decode(text)
        .map_err(|source| Fido2Error::MalformedEncoding { field, source })
}

/// Serde adapter rendering `Vec<u8>` fields in the transport alphabet.
pub(crate) mod transport {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode(&text).map_err(de::Error::custom)
    }
}
