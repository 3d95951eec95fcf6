//! Credential resolution.
//!
//! [`resolve_credentials`] is the single place where certificate files are
//! located, sniffed and checked. It refuses self-signed and test-only
//! certificates, so nothing downstream has to repeat that check. Key material
//! is only loaded on demand through [`CredentialSource::load`], and the PEM
//! form the TLS stack needs is built in memory for one client.

use std::fs;
use std::path::PathBuf;

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

use crate::domain::crypto::{CertChain, DerCertificate};
use crate::domain::types::CertPassword;
use crate::infra::config::CredentialConfig;
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use crate::services::cert_validator::{CertificateUse, CertificateValidator};

const PEM_CERT_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Where a certificate and its key come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Pkcs12 {
        path: PathBuf,
        password: CertPassword,
    },
    /// Certificate (optionally followed by its chain) and key as PEM files.
    /// Both may be the same file.
    PemPair {
        cert_path: PathBuf,
        key_path: PathBuf,
        password: Option<CertPassword>,
    },
}

/// Loaded key, leaf certificate and any chain certificates.
pub struct SigningMaterial {
    pub key: PKey<Private>,
    pub leaf: X509,
    pub chain: Vec<X509>,
}

impl std::fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("key", &"[REDACTED]")
            .field("leaf", &self.leaf.subject_name())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Locate, sniff and vet the configured certificate for `usage`.
///
/// PKCS#12 is tried first, then PEM. A PKCS#12 bundle must come with a
/// password; a wrong password is a credential error. The leaf certificate
/// is checked with [`CertificateValidator::validate`].
pub fn resolve_credentials(
    config: &CredentialConfig,
    usage: CertificateUse,
    logger: &Logger,
) -> SifenResult<CredentialSource> {
    let logger = logger.child("credentials");
    let cert_path = config.cert_path.clone().ok_or_else(|| {
        SifenError::ConfigurationError(format!("no {usage} certificate configured"))
    })?;
    let bytes = fs::read(&cert_path).map_err(|e| {
        SifenError::CredentialError(format!(
            "cannot read {usage} certificate {}: {e}",
            cert_path.display()
        ))
    })?;

    let source = if config.key_path.is_none() && Pkcs12::from_der(&bytes).is_ok() {
        let password = config.password().ok_or_else(|| {
            SifenError::CredentialError(format!(
                "{} is a PKCS#12 bundle but no password was supplied",
                cert_path.display()
            ))
        })?;
        CredentialSource::Pkcs12 {
            path: cert_path,
            password,
        }
    } else if contains(&bytes, PEM_CERT_MARKER) {
        CredentialSource::PemPair {
            key_path: config.key_path.clone().unwrap_or_else(|| cert_path.clone()),
            cert_path,
            password: config.password(),
        }
    } else {
        return Err(SifenError::CredentialError(format!(
            "{} is neither PKCS#12 nor PEM",
            cert_path.display()
        )));
    };

    let material = source.load()?;
    let analysis = CertificateValidator::validate(&material.leaf.to_der()?, usage, &logger)?;
    logger.info(&format!(
        "{usage} credentials: {} (expires in {} days)",
        analysis.subject, analysis.days_until_expiry
    ));
    Ok(source)
}

impl CredentialSource {
    /// Read and decrypt the key material.
    pub fn load(&self) -> SifenResult<SigningMaterial> {
        match self {
            CredentialSource::Pkcs12 { path, password } => {
                let bytes = fs::read(path)?;
                let parsed = Pkcs12::from_der(&bytes)
                    .and_then(|p12| p12.parse2(password.as_str()))
                    .map_err(|_| {
                        SifenError::CredentialError(format!(
                            "cannot open {}: wrong password or damaged bundle",
                            path.display()
                        ))
                    })?;
                let key = parsed.pkey.ok_or_else(|| {
                    SifenError::CredentialError(format!("{} holds no private key", path.display()))
                })?;
                let leaf = parsed.cert.ok_or_else(|| {
                    SifenError::CredentialError(format!("{} holds no certificate", path.display()))
                })?;
                let chain = parsed
                    .ca
                    .map(|stack| stack.into_iter().collect())
                    .unwrap_or_default();
                SigningMaterial::checked(key, leaf, chain)
            }
            CredentialSource::PemPair {
                cert_path,
                key_path,
                password,
            } => {
                let mut certs = X509::stack_from_pem(&fs::read(cert_path)?)?.into_iter();
                let leaf = certs.next().ok_or_else(|| {
                    SifenError::CredentialError(format!(
                        "{} holds no certificate",
                        cert_path.display()
                    ))
                })?;
                let key_pem = fs::read(key_path)?;
                let key = match password {
                    Some(p) => PKey::private_key_from_pem_passphrase(&key_pem, p.as_bytes()),
                    None => PKey::private_key_from_pem(&key_pem),
                }
                .map_err(|_| {
                    SifenError::CredentialError(format!(
                        "cannot read private key from {}",
                        key_path.display()
                    ))
                })?;
                SigningMaterial::checked(key, leaf, certs.collect())
            }
        }
    }
}

impl SigningMaterial {
    fn checked(key: PKey<Private>, leaf: X509, chain: Vec<X509>) -> SifenResult<Self> {
        if !leaf.public_key()?.public_eq(&key) {
            return Err(SifenError::CredentialError(
                "private key does not match the certificate".to_string(),
            ));
        }
        Ok(Self { key, leaf, chain })
    }

    /// Leaf and chain in the domain representation.
    pub fn cert_chain(&self) -> SifenResult<CertChain> {
        let issuers = self
            .chain
            .iter()
            .map(|c| c.to_der().map(DerCertificate::from_der))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CertChain::new(
            DerCertificate::from_der(self.leaf.to_der()?),
            issuers,
        ))
    }

    /// Leaf-first certificate chain PEM and unencrypted PKCS#8 key PEM, as
    /// the TLS identity expects them.
    pub fn identity_pem(&self) -> SifenResult<(Vec<u8>, Vec<u8>)> {
        let mut certs = self.leaf.to_pem()?;
        for extra in &self.chain {
            certs.extend_from_slice(&extra.to_pem()?);
        }
        Ok((certs, self.key.private_key_to_pem_pkcs8()?))
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
