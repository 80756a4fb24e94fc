use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Length of a hex-encoded SHA-512 digest.
pub const SHA512_HEX_LEN: usize = 128;

/// Lowercase hex SHA-512 of a file's bytes; the dedup key on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Hex-encodes a raw 64-byte digest.
    pub fn from_digest_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() * 2 != SHA512_HEX_LEN {
            return Err(ProtocolError::InvalidDigest(format!(
                "expected {} bytes, got {}",
                SHA512_HEX_LEN / 2,
                bytes.len()
            )));
        }
        Ok(Self(hex::encode(bytes)))
    }

    /// Validates a hex string received from elsewhere.
    ///
    /// Uppercase input is accepted and normalized to lowercase.
    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        if s.len() != SHA512_HEX_LEN {
            return Err(ProtocolError::InvalidDigest(format!(
                "expected {SHA512_HEX_LEN} hex chars, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidDigest("non-hex character".into()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentDigest> for String {
    fn from(value: ContentDigest) -> Self {
        value.0
    }
}
