//! Type-safe wrappers using new-type pattern
//!
//! This module provides type-safe wrappers for values that cross the wire or
//! the configuration boundary, so malformed identifiers are rejected locally
//! before anything is sent to the authority.

use crate::domain::constants;
use crate::infra::error::{SifenError, SifenResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target SIFEN environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Prod,
}

impl Environment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Prod => "prod",
        }
    }

    /// Base URL of the authority's web services for this environment.
    #[must_use]
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Test => constants::SIFEN_TEST_BASE_URL,
            Environment::Prod => constants::SIFEN_PROD_BASE_URL,
        }
    }
}

impl FromStr for Environment {
    type Err = SifenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "dev" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(SifenError::ConfigurationError(format!(
                "Unknown environment '{other}'. Expected 'test' or 'prod'"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation id (`dId`) sent in every SOAP request. Digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: impl AsRef<str>) -> SifenResult<Self> {
        let value = value.as_ref();
        if value.is_empty() || value.len() > constants::CORRELATION_ID_MAX_DIGITS {
            return Err(SifenError::InvalidInput(format!(
                "Correlation id must have 1-{} digits, got {}",
                constants::CORRELATION_ID_MAX_DIGITS,
                value.len()
            )));
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SifenError::InvalidInput(format!(
                "Correlation id must be digits only: {value}"
            )));
        }
        Ok(Self(value.to_string()))
    }

    /// Fresh 15-digit id: `yyMMddHHmmss` plus three random digits.
    #[must_use]
    pub fn generate() -> Self {
        let stamp = chrono::Utc::now().format("%y%m%d%H%M%S");
        let suffix: u16 = rand::thread_rng().gen_range(0..1000);
        Self(format!("{stamp}{suffix:03}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol number (`dProtConsLote`) assigned by the authority to a queued lote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolId(String);

impl ProtocolId {
    pub fn new(value: impl AsRef<str>) -> SifenResult<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SifenError::InvalidInput(format!(
                "Protocol id must be a non-empty digit string: '{value}'"
            )));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProtocolId {
    type Error = SifenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProtocolId> for String {
    fn from(value: ProtocolId) -> Self {
        value.0
    }
}

impl FromStr for ProtocolId {
    type Err = SifenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Password protecting a PKCS#12 bundle or encrypted PEM key.
#[derive(Clone, PartialEq, Eq)]
pub struct CertPassword(String);

impl CertPassword {
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// Never print the secret, not even in debug output.
impl fmt::Debug for CertPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CertPassword([REDACTED])")
    }
}

impl fmt::Display for CertPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[PASSWORD REDACTED]")
    }
}

/// Version of the authority's XML schema (`dVerFor`), e.g. 150.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SchemaVersion(pub u16);

impl SchemaVersion {
    pub const V150: SchemaVersion = SchemaVersion(150);
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::V150
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
