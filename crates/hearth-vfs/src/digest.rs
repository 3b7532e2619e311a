//! MD5 content digests and their base64 text form.
//!
//! Digests are stored as raw bytes in memory and as standard base64 in
//! documents, which is also the entity tag served to HTTP clients.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};

/// Digest of a complete byte slice.
pub fn md5_of(data: &[u8]) -> Vec<u8> {
    Md5::digest(data).to_vec()
}

/// Incremental digest fed by the staged writer.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Md5,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Digest of everything fed so far. The hasher stays usable.
    pub fn current(&self) -> Vec<u8> {
        self.inner.clone().finalize().to_vec()
    }
}

/// Base64 text of a digest.
pub fn encode(digest: &[u8]) -> String {
    STANDARD.encode(digest)
}

/// Parse the base64 text of a digest.
pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

/// Serde adapter storing `Option<Vec<u8>>` as an optional base64 string.
pub mod base64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&super::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(d)?;
        text.map(|t| super::decode(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
