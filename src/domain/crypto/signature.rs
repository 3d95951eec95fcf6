use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Raw RSA-SHA256 signature over the canonical `SignedInfo`.
#[derive(Clone, Eq, PartialEq)]
pub struct SignatureValue {
    bytes: Box<[u8]>,
}

impl SignatureValue {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    pub fn from_base64(text: &str) -> Result<Self, base64::DecodeError> {
        // SignatureValue text may be wrapped by other signers
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(Self::new(STANDARD.decode(compact)?))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for SignatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureValue(len={})", self.bytes.len())
    }
}
