//! Error types for SIFEN document preparation and submission.
//!
//! Errors are split into two families. Fatal errors (configuration, credentials,
//! cryptographic material) abort immediately and are never retried. Recoverable
//! errors (bad input, malformed structure, network trouble) may be corrected by
//! the caller or retried by the transport.
//!
//! Protocol outcomes reported by the authority (queued, rejected, malformed)
//! are *not* errors; they are classified into result enums in
//! [`crate::domain::response`].

use thiserror::Error;

/// Result type for SIFEN operations
pub type SifenResult<T> = Result<T, SifenError>;

/// Error family, decided by kind and never by message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    /// Configuration or crypto material problem; hard-fail, no retry.
    Fatal,
    /// Input, structure or transport problem; may be fixed or retried.
    Recoverable,
}

#[derive(Error, Debug, miette::Diagnostic)]
pub enum SifenError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CDC format error: {0}")]
    CdcFormat(String),

    #[error("XML error: {0}")]
    XmlError(String),

    #[error("Structure error: {0}")]
    #[diagnostic(help("run the structural normalizer before signing and packaging"))]
    StructureError(String),

    #[error("Signature error: {0}")]
    SignatureError(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Untrusted certificate refused: {0}")]
    #[diagnostic(help("self-signed or test-only certificates are never accepted for SIFEN"))]
    UntrustedCertificate(String),

    #[error("Credential error: {0}")]
    CredentialError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl SifenError {
    #[must_use]
    pub fn family(&self) -> ErrorFamily {
        match self {
            SifenError::CryptographicError(_)
            | SifenError::CertificateError(_)
            | SifenError::UntrustedCertificate(_)
            | SifenError::CredentialError(_)
            | SifenError::ConfigurationError(_) => ErrorFamily::Fatal,
            SifenError::InvalidInput(_)
            | SifenError::CdcFormat(_)
            | SifenError::XmlError(_)
            | SifenError::StructureError(_)
            | SifenError::SignatureError(_)
            | SifenError::NetworkError(_)
            | SifenError::ProtocolError(_)
            | SifenError::ArchiveError(_)
            | SifenError::IoError(_) => ErrorFamily::Recoverable,
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.family() == ErrorFamily::Fatal
    }

    /// Only network failures qualify for local retry with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SifenError::NetworkError(_))
    }
}

impl From<std::io::Error> for SifenError {
    fn from(error: std::io::Error) -> Self {
        SifenError::IoError(error.to_string())
    }
}

impl From<reqwest::Error> for SifenError {
    fn from(error: reqwest::Error) -> Self {
        SifenError::NetworkError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SifenError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SifenError::CryptographicError(error.to_string())
    }
}

impl From<quick_xml::Error> for SifenError {
    fn from(error: quick_xml::Error) -> Self {
        SifenError::XmlError(error.to_string())
    }
}

impl From<zip::result::ZipError> for SifenError {
    fn from(error: zip::result::ZipError) -> Self {
        SifenError::ArchiveError(error.to_string())
    }
}

impl From<der::Error> for SifenError {
    fn from(error: der::Error) -> Self {
        SifenError::CertificateError(error.to_string())
    }
}

impl From<base64::DecodeError> for SifenError {
    fn from(error: base64::DecodeError) -> Self {
        SifenError::InvalidInput(format!("base64: {error}"))
    }
}
