//! Cryptographic value types used by the XMLDSig engine.
//!
//! Strongly typed wrappers for the SHA-256 digest of a canonical reference,
//! the RSA signature over `SignedInfo` and the certificate chain embedded in
//! `KeyInfo`. They carry bytes only; computing them is the job of
//! [`crate::services::xmldsig`].

mod cert;
mod digest_bytes;
mod signature;

pub use cert::{CertChain, DerCertificate};
pub use digest_bytes::{DigestBytes, DigestBytesError, SHA256_LEN};
pub use signature::SignatureValue;
