//! Certificate validation service.
//!
//! Certificates used for signing or for the TLS client identity must be
//! issued by a real CA. Self-signed and test-only certificates are refused
//! outright; the authority rejects them anyway, but only after a full
//! round trip.

use crate::domain::constants::TEST_CERTIFICATE_MARKERS;
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use der::oid::AssociatedOid;
use der::{Decode, Encode};
use x509_cert::ext::pkix::KeyUsage;
use x509_cert::Certificate;

/// What a certificate is about to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateUse {
    Signing,
    Transport,
}

impl std::fmt::Display for CertificateUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CertificateUse::Signing => "signing",
            CertificateUse::Transport => "transport",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CertificateAnalysis {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub days_until_expiry: i64,
    pub self_signed: bool,
    /// Marker that flagged the subject as test-only, if any
    pub test_marker: Option<String>,
    /// `None` when the certificate has no KeyUsage extension
    pub can_digital_sign: Option<bool>,
    pub warnings: Vec<String>,
}

pub struct CertificateValidator;

impl CertificateValidator {
    /// Parse and inspect a DER certificate without applying policy.
    pub fn analyze(der_bytes: &[u8]) -> SifenResult<CertificateAnalysis> {
        let certificate = Certificate::from_der(der_bytes)?;
        let tbs = &certificate.tbs_certificate;

        let subject = tbs.subject.to_string();
        let issuer = tbs.issuer.to_string();
        let days_until_expiry = Self::days_until_expiry(&certificate);
        let self_signed = Self::is_self_signed(&certificate, der_bytes);
        let upper = subject.to_uppercase();
        let test_marker = TEST_CERTIFICATE_MARKERS
            .iter()
            .find(|marker| upper.contains(*marker))
            .map(|marker| (*marker).to_string());
        let can_digital_sign = Self::digital_signature_usage(&certificate)?;

        let mut warnings = Vec::new();
        if days_until_expiry < 0 {
            warnings.push("Certificate has expired".to_string());
        } else if days_until_expiry < 30 {
            warnings.push(format!("Certificate expires in {days_until_expiry} days"));
        }
        if self_signed {
            warnings.push("Certificate is self-signed".to_string());
        }
        if let Some(marker) = &test_marker {
            warnings.push(format!("Subject marks a test certificate ({marker})"));
        }
        if can_digital_sign == Some(false) {
            warnings.push("KeyUsage does not allow digitalSignature".to_string());
        }

        Ok(CertificateAnalysis {
            subject,
            issuer,
            serial_number: hex::encode(tbs.serial_number.as_bytes()),
            days_until_expiry,
            self_signed,
            test_marker,
            can_digital_sign,
            warnings,
        })
    }

    /// Analyze and enforce policy for the given use.
    pub fn validate(
        der_bytes: &[u8],
        usage: CertificateUse,
        logger: &Logger,
    ) -> SifenResult<CertificateAnalysis> {
        let analysis = Self::analyze(der_bytes)?;
        logger.debug(&format!(
            "{usage} certificate subject={} issuer={} serial={}",
            analysis.subject, analysis.issuer, analysis.serial_number
        ));

        if analysis.self_signed {
            return Err(SifenError::UntrustedCertificate(format!(
                "{usage} certificate '{}' is self-signed",
                analysis.subject
            )));
        }
        if let Some(marker) = &analysis.test_marker {
            return Err(SifenError::UntrustedCertificate(format!(
                "{usage} certificate '{}' is test-only ({marker})",
                analysis.subject
            )));
        }
        if analysis.days_until_expiry < 0 {
            return Err(SifenError::CertificateError(format!(
                "{usage} certificate '{}' has expired",
                analysis.subject
            )));
        }
        if usage == CertificateUse::Signing && analysis.can_digital_sign == Some(false) {
            return Err(SifenError::CertificateError(format!(
                "certificate '{}' is not allowed to sign (KeyUsage)",
                analysis.subject
            )));
        }
        for warning in &analysis.warnings {
            logger.warn(&format!("{usage} certificate: {warning}"));
        }
        Ok(analysis)
    }

    fn days_until_expiry(certificate: &Certificate) -> i64 {
        let not_after = certificate
            .tbs_certificate
            .validity
            .not_after
            .to_unix_duration()
            .as_secs();
        let now = chrono::Utc::now().timestamp();
        let not_after = i64::try_from(not_after).unwrap_or(i64::MAX);
        not_after.saturating_sub(now).div_euclid(86_400)
    }

    /// Issuer equals subject and the certificate verifies under its own key.
    fn is_self_signed(certificate: &Certificate, der_bytes: &[u8]) -> bool {
        let tbs = &certificate.tbs_certificate;
        let same_name = match (tbs.subject.to_der(), tbs.issuer.to_der()) {
            (Ok(subject), Ok(issuer)) => subject == issuer,
            _ => false,
        };
        if !same_name {
            return false;
        }
        // a CA may reuse its name for a cross certificate; confirm with the key
        openssl::x509::X509::from_der(der_bytes)
            .and_then(|x509| {
                let key = x509.public_key()?;
                x509.verify(&key)
            })
            .unwrap_or(true)
    }

    fn digital_signature_usage(certificate: &Certificate) -> SifenResult<Option<bool>> {
        let Some(extensions) = &certificate.tbs_certificate.extensions else {
            return Ok(None);
        };
        match extensions.iter().find(|ext| ext.extn_id == KeyUsage::OID) {
            Some(ext) => {
                let usage = KeyUsage::from_der(ext.extn_value.as_bytes())?;
                Ok(Some(usage.digital_signature() || usage.non_repudiation()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::asn1::Asn1Time;
    use openssl::hash::MessageDigest;
    use openssl::pkey::PKey;
    use openssl::rsa::Rsa;
    use openssl::x509::{X509NameBuilder, X509};

    fn self_signed(cn: &str) -> Vec<u8> {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        builder.build().to_der().unwrap()
    }

    #[test]
    fn self_signed_certificates_are_refused() {
        let der = self_signed("Empresa SA");
        let analysis = CertificateValidator::analyze(&der).unwrap();
        assert!(analysis.self_signed);
        assert!(analysis.days_until_expiry > 300);
        assert!(matches!(
            CertificateValidator::validate(&der, CertificateUse::Signing, &Logger::default()),
            Err(SifenError::UntrustedCertificate(_))
        ));
    }

    #[test]
    fn test_markers_are_detected() {
        let analysis = CertificateValidator::analyze(&self_signed("Certificado de Prueba")).unwrap();
        assert_eq!(analysis.test_marker.as_deref(), Some("CERTIFICADO DE PRUEBA"));
    }

    #[test]
    fn garbage_is_a_certificate_error() {
        assert!(matches!(
            CertificateValidator::analyze(b"not a certificate"),
            Err(SifenError::CertificateError(_))
        ));
    }
}
