use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// DER certificate as it appears in `X509Certificate`.
#[derive(Clone, PartialEq, Eq)]
pub struct DerCertificate(Box<[u8]>);

impl DerCertificate {
    #[must_use]
    pub fn from_der(der: Vec<u8>) -> Self {
        Self(der.into_boxed_slice())
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Single-line base64, no PEM armor.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl fmt::Debug for DerCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerCertificate(len={})", self.0.len())
    }
}

/// Signer certificate plus the issuers shipped with the key.
///
/// Only the signer goes into `KeyInfo`.
#[derive(Debug, Clone)]
pub struct CertChain {
    signer: DerCertificate,
    issuers: Vec<DerCertificate>,
}

impl CertChain {
    #[must_use]
    pub fn new(signer: DerCertificate, issuers: Vec<DerCertificate>) -> Self {
        Self { signer, issuers }
    }

    #[must_use]
    pub fn signer(&self) -> &DerCertificate {
        &self.signer
    }

    #[must_use]
    pub fn issuers(&self) -> &[DerCertificate] {
        &self.issuers
    }

    /// Text of the single `X509Certificate` element.
    #[must_use]
    pub fn key_info_value(&self) -> String {
        self.signer.to_base64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_info_holds_only_the_signer() {
        let chain = CertChain::new(
            DerCertificate::from_der(vec![0x30, 0x03, 0x02, 0x01, 0x01]),
            vec![DerCertificate::from_der(vec![0x30, 0x00])],
        );
        assert_eq!(chain.key_info_value(), "MAMCAQE=");
        assert_eq!(chain.issuers().len(), 1);
        assert_eq!(format!("{:?}", chain.signer()), "DerCertificate(len=5)");
    }
}
