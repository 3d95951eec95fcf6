//! Throwaway certificate authority for tests.
//!
//! Self-signed certificates are refused by the credential resolver, so every
//! test that needs key material gets a leaf issued by a freshly generated CA.

use std::fs;
use std::path::{Path, PathBuf};

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::symm::Cipher;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Name, X509NameBuilder, X509};
use sifen_signer::SigningMaterial;

pub struct TestPki {
    pub ca_key: PKey<Private>,
    pub ca_cert: X509,
    pub leaf_key: PKey<Private>,
    pub leaf_cert: X509,
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().expect("name builder");
    builder.append_entry_by_text("C", "PY").expect("country");
    builder.append_entry_by_text("CN", common_name).expect("cn");
    builder.build()
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).expect("rsa")).expect("pkey")
}

/// CA plus a leaf for `subject`, valid for `days` from now (negative values
/// produce an already expired leaf).
pub fn issue(subject: &str, days: i64) -> TestPki {
    let ca_key = rsa_key();
    let ca_name = name("Autoridad Certificadora Ejemplo");
    let mut ca = X509::builder().expect("builder");
    ca.set_version(2).unwrap();
    ca.set_serial_number(&BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    ca.set_subject_name(&ca_name).unwrap();
    ca.set_issuer_name(&ca_name).unwrap();
    ca.set_pubkey(&ca_key).unwrap();
    ca.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    ca.set_not_after(&Asn1Time::days_from_now(3650).unwrap()).unwrap();
    ca.append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    ca.sign(&ca_key, MessageDigest::sha256()).unwrap();
    let ca_cert = ca.build();

    let leaf_key = rsa_key();
    let mut leaf = X509::builder().expect("builder");
    leaf.set_version(2).unwrap();
    leaf.set_serial_number(&BigNum::from_u32(4242).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    leaf.set_subject_name(&name(subject)).unwrap();
    leaf.set_issuer_name(ca_cert.subject_name()).unwrap();
    leaf.set_pubkey(&leaf_key).unwrap();
    if days >= 0 {
        leaf.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        leaf.set_not_after(&Asn1Time::days_from_now(u32::try_from(days).unwrap()).unwrap())
            .unwrap();
    } else {
        let now = chrono::Utc::now().timestamp();
        leaf.set_not_before(&Asn1Time::from_unix(now + days * 86_400 * 2).unwrap())
            .unwrap();
        leaf.set_not_after(&Asn1Time::from_unix(now + days * 86_400).unwrap())
            .unwrap();
    }
    leaf.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .non_repudiation()
            .key_encipherment()
            .build()
            .unwrap(),
    )
    .unwrap();
    leaf.sign(&ca_key, MessageDigest::sha256()).unwrap();

    TestPki {
        ca_key,
        ca_cert,
        leaf_key,
        leaf_cert: leaf.build(),
    }
}

/// Leaf valid for a year.
pub fn company() -> TestPki {
    issue("Comercial Ejemplo SA", 365)
}

impl TestPki {
    pub fn material(&self) -> SigningMaterial {
        SigningMaterial {
            key: self.leaf_key.clone(),
            leaf: self.leaf_cert.clone(),
            chain: vec![self.ca_cert.clone()],
        }
    }

    pub fn write_pkcs12(&self, dir: &Path, password: &str) -> PathBuf {
        let mut ca = Stack::new().unwrap();
        ca.push(self.ca_cert.clone()).unwrap();
        let bundle = Pkcs12::builder()
            .name("sifen")
            .pkey(&self.leaf_key)
            .cert(&self.leaf_cert)
            .ca(ca)
            .build2(password)
            .expect("pkcs12");
        let path = dir.join("firma.p12");
        fs::write(&path, bundle.to_der().unwrap()).unwrap();
        path
    }

    /// Certificate chain PEM and key PEM, the key encrypted when a
    /// passphrase is given.
    pub fn write_pem(&self, dir: &Path, passphrase: Option<&str>) -> (PathBuf, PathBuf) {
        let cert_path = dir.join("firma.crt.pem");
        let key_path = dir.join("firma.key.pem");
        let mut chain = self.leaf_cert.to_pem().unwrap();
        chain.extend(self.ca_cert.to_pem().unwrap());
        fs::write(&cert_path, chain).unwrap();
        let key = match passphrase {
            Some(p) => self
                .leaf_key
                .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), p.as_bytes())
                .unwrap(),
            None => self.leaf_key.private_key_to_pem_pkcs8().unwrap(),
        };
        fs::write(&key_path, key).unwrap();
        (cert_path, key_path)
    }
}

/// PKCS#12 holding a self-signed certificate.
pub fn write_self_signed_pkcs12(dir: &Path, password: &str) -> PathBuf {
    let key = rsa_key();
    let subject = name("Comercial Ejemplo SA");
    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let bundle = Pkcs12::builder()
        .name("self")
        .pkey(&key)
        .cert(&cert)
        .build2(password)
        .unwrap();
    let path = dir.join("self.p12");
    fs::write(&path, bundle.to_der().unwrap()).unwrap();
    path
}
