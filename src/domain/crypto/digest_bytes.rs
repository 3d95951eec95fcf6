use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Length of a SHA-256 digest.
pub const SHA256_LEN: usize = 32;

/// SHA-256 digest bytes as carried in `DigestValue`.
///
/// Invariant: `bytes.len() == SHA256_LEN`.
#[derive(Clone, Eq, PartialEq)]
pub struct DigestBytes {
    bytes: Box<[u8]>,
}

impl DigestBytes {
    pub fn new(bytes: Vec<u8>) -> Result<Self, DigestBytesError> {
        if bytes.len() != SHA256_LEN {
            return Err(DigestBytesError::LengthMismatch {
                expected: SHA256_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Digest of `data`.
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        Self {
            bytes: Sha256::digest(data).to_vec().into_boxed_slice(),
        }
    }

    /// Decode a `DigestValue` element's text.
    pub fn from_base64(text: &str) -> Result<Self, DigestBytesError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| DigestBytesError::Encoding(e.to_string()))?;
        Self::new(bytes)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for DigestBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestBytes(sha256={})", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestBytesError {
    #[error("digest length mismatch (expected {expected}, actual {actual})")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("digest is not valid base64: {0}")]
    Encoding(String),
}
