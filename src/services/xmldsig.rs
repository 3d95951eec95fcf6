//! Enveloped XMLDSig over the `DE` element.
//!
//! Profile required by the authority:
//! - Exclusive C14N without comments for both `DE` and `SignedInfo`
//! - SHA-256 reference digest, RSA-SHA256 signature (PKCS#1 v1.5)
//! - transforms: enveloped-signature, then exc-c14n
//! - `Reference URI="#<CDC>"`, `KeyInfo` holding only the leaf certificate
//! - `Signature` in the default DSig namespace, inserted as the sibling
//!   right after `DE` inside `rDE`
//!
//! Signing returns a new tree; the input is never modified.

use crate::domain::constants::{
    ALG_ENVELOPED_SIGNATURE, ALG_EXC_C14N, ALG_RSA_SHA256, ALG_SHA256, DE, RDE,
};
use crate::domain::crypto::{CertChain, DigestBytes, SignatureValue};
use crate::domain::verification::SignatureReport;
use crate::domain::xml::{exclusive_c14n, parse_document, Element, Node, QName};
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use crate::services::ordering::is_signature;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, Private};
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;

/// Produces enveloped signatures with one key and certificate.
pub struct XmlSigner<'a> {
    key: &'a PKey<Private>,
    chain: &'a CertChain,
    logger: Logger,
}

impl<'a> XmlSigner<'a> {
    pub fn new(key: &'a PKey<Private>, chain: &'a CertChain, logger: &Logger) -> SifenResult<Self> {
        if key.id() != Id::RSA {
            return Err(SifenError::CryptographicError(format!(
                "signing key must be RSA, got {:?}",
                key.id()
            )));
        }
        Ok(Self {
            key,
            chain,
            logger: logger.child("xmldsig"),
        })
    }

    /// Sign the `DE` inside `rde` and return the signed copy.
    pub fn sign(&self, rde: &Element) -> SifenResult<Element> {
        if !rde.is(&QName::sifen(RDE)) {
            return Err(SifenError::StructureError(format!(
                "signing expects an rDE root, got <{}>",
                rde.qname()
            )));
        }
        if rde.child_elements().any(|c| is_signature(&c.qname())) {
            return Err(SifenError::StructureError(
                "rDE is already signed".to_string(),
            ));
        }
        let de_index = rde
            .child_position(&QName::sifen(DE))
            .ok_or_else(|| SifenError::StructureError("rDE has no DE".to_string()))?;
        let de = rde
            .find_child(&QName::sifen(DE))
            .ok_or_else(|| SifenError::StructureError("rDE has no DE".to_string()))?;
        let id = de
            .attribute("Id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SifenError::StructureError("DE has no Id attribute".to_string()))?;

        let digest = DigestBytes::sha256(exclusive_c14n(de).as_bytes());
        let signed_info = signed_info(id, &digest);
        let signature_value = self.sign_bytes(exclusive_c14n(&signed_info).as_bytes())?;

        let signature = Element::with_default_namespace(&QName::dsig("Signature"))
            .child(signed_info)
            .child(Element::text_leaf(
                &QName::dsig("SignatureValue"),
                signature_value.to_base64(),
            ))
            .child(key_info(self.chain));

        let mut signed = rde.clone();
        signed
            .children
            .insert(de_index + 1, Node::Element(signature));

        self.logger.info(&format!(
            "signed DE Id={id} digest={}",
            digest.to_hex()
        ));
        Ok(signed)
    }

    fn sign_bytes(&self, data: &[u8]) -> SifenResult<SignatureValue> {
        let mut signer = Signer::new(MessageDigest::sha256(), self.key)?;
        signer.update(data)?;
        Ok(SignatureValue::new(signer.sign_to_vec()?))
    }
}

fn algorithm(local: &str, uri: &str) -> Element {
    let mut element = Element::new(&QName::dsig(local));
    element.set_attribute("Algorithm", uri);
    element
}

fn signed_info(id: &str, digest: &DigestBytes) -> Element {
    let mut reference = Element::new(&QName::dsig("Reference"));
    reference.set_attribute("URI", format!("#{id}"));
    let reference = reference
        .child(
            Element::new(&QName::dsig("Transforms"))
                .child(algorithm("Transform", ALG_ENVELOPED_SIGNATURE))
                .child(algorithm("Transform", ALG_EXC_C14N)),
        )
        .child(algorithm("DigestMethod", ALG_SHA256))
        .child(Element::text_leaf(
            &QName::dsig("DigestValue"),
            digest.to_base64(),
        ));

    Element::new(&QName::dsig("SignedInfo"))
        .child(algorithm("CanonicalizationMethod", ALG_EXC_C14N))
        .child(algorithm("SignatureMethod", ALG_RSA_SHA256))
        .child(reference)
}

fn key_info(chain: &CertChain) -> Element {
    Element::new(&QName::dsig("KeyInfo")).child(
        Element::new(&QName::dsig("X509Data")).child(Element::text_leaf(
            &QName::dsig("X509Certificate"),
            chain.key_info_value(),
        )),
    )
}

/// Verify every `Signature` in a serialized document.
///
/// Input that cannot be parsed yields an all-false report.
#[must_use]
pub fn verify(xml: &str) -> SignatureReport {
    match parse_document(xml) {
        Ok(root) => verify_tree(&root),
        Err(e) => SignatureReport {
            problems: vec![format!("document does not parse: {e}")],
            ..SignatureReport::default()
        },
    }
}

/// Shorthand for `verify(xml).success()`.
#[must_use]
pub fn is_valid(xml: &str) -> bool {
    verify(xml).success()
}

/// Verify every `Signature` in an already parsed tree.
#[must_use]
pub fn verify_tree(root: &Element) -> SignatureReport {
    let rdes: Vec<&Element> = root.descendants_named(&QName::sifen(RDE));
    let signed: Vec<&Element> = rdes
        .into_iter()
        .filter(|rde| rde.child_elements().any(|c| is_signature(&c.qname())))
        .collect();

    if signed.is_empty() {
        return SignatureReport {
            problems: vec!["no Signature found".to_string()],
            ..SignatureReport::default()
        };
    }

    let mut report = SignatureReport {
        structure_ok: true,
        digest_ok: true,
        signature_ok: true,
        certificate_present: true,
        problems: Vec::new(),
    };
    for rde in signed {
        verify_one(rde, &mut report);
    }
    report
}

fn verify_one(rde: &Element, report: &mut SignatureReport) {
    let children: Vec<&Element> = rde.child_elements().collect();
    let Some(sig_index) = children.iter().position(|c| is_signature(&c.qname())) else {
        return;
    };
    let signature = children[sig_index];
    if children.iter().filter(|c| is_signature(&c.qname())).count() != 1 {
        fail_structure(report, "rDE carries more than one Signature");
    }
    if signature.prefix.is_some() {
        fail_structure(report, "Signature uses a namespace prefix");
    }

    let de = match sig_index.checked_sub(1).map(|i| children[i]) {
        Some(prev) if prev.is(&QName::sifen(DE)) => prev,
        _ => {
            fail_structure(report, "Signature is not the sibling right after DE");
            report.digest_ok = false;
            report.signature_ok = false;
            return;
        }
    };

    let Some(signed_info) = signature.find_child(&QName::dsig("SignedInfo")) else {
        fail_structure(report, "Signature has no SignedInfo");
        report.digest_ok = false;
        report.signature_ok = false;
        return;
    };
    check_algorithms(signed_info, report);

    let id = de.attribute("Id").unwrap_or_default();
    let reference = signed_info.find_child(&QName::dsig("Reference"));
    if reference.and_then(|r| r.attribute("URI")) != Some(format!("#{id}").as_str()) {
        fail_structure(report, &format!("Reference URI does not point at DE Id '{id}'"));
    }

    let declared = reference
        .and_then(|r| r.find_child(&QName::dsig("DigestValue")))
        .map(Element::text)
        .and_then(|text| DigestBytes::from_base64(&text).ok());
    let computed = DigestBytes::sha256(exclusive_c14n(de).as_bytes());
    if declared.as_ref() != Some(&computed) {
        report.digest_ok = false;
        report
            .problems
            .push(format!("digest mismatch for DE Id '{id}'"));
    }

    let certificate = signature
        .find_descendant(&QName::dsig("X509Certificate"))
        .map(Element::text)
        .and_then(|text| {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD.decode(compact).ok()
        })
        .and_then(|der| X509::from_der(&der).ok());
    let Some(certificate) = certificate else {
        report.certificate_present = false;
        report.signature_ok = false;
        report
            .problems
            .push("KeyInfo has no usable X509Certificate".to_string());
        return;
    };

    let value = signature
        .find_child(&QName::dsig("SignatureValue"))
        .and_then(|e| SignatureValue::from_base64(&e.text()).ok());
    let valid = value.is_some_and(|value| {
        check_signature(&certificate, exclusive_c14n(signed_info).as_bytes(), &value)
            .unwrap_or(false)
    });
    if !valid {
        report.signature_ok = false;
        report
            .problems
            .push(format!("SignatureValue does not verify for DE Id '{id}'"));
    }
}

fn check_signature(certificate: &X509, data: &[u8], value: &SignatureValue) -> SifenResult<bool> {
    let public_key = certificate.public_key()?;
    let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key)?;
    verifier.update(data)?;
    Ok(verifier.verify(value.as_slice())?)
}

fn check_algorithms(signed_info: &Element, report: &mut SignatureReport) {
    let algorithm_of = |parent: &Element, local: &str| {
        parent
            .find_child(&QName::dsig(local))
            .and_then(|e| e.attribute("Algorithm"))
            .map(str::to_string)
    };
    if algorithm_of(signed_info, "CanonicalizationMethod").as_deref() != Some(ALG_EXC_C14N) {
        fail_structure(report, "CanonicalizationMethod is not exclusive C14N");
    }
    if algorithm_of(signed_info, "SignatureMethod").as_deref() != Some(ALG_RSA_SHA256) {
        fail_structure(report, "SignatureMethod is not RSA-SHA256");
    }
    let Some(reference) = signed_info.find_child(&QName::dsig("Reference")) else {
        fail_structure(report, "SignedInfo has no Reference");
        return;
    };
    if algorithm_of(reference, "DigestMethod").as_deref() != Some(ALG_SHA256) {
        fail_structure(report, "DigestMethod is not SHA-256");
    }
    let transforms: Vec<&str> = reference
        .find_child(&QName::dsig("Transforms"))
        .map(|t| {
            t.child_elements()
                .filter_map(|e| e.attribute("Algorithm"))
                .collect()
        })
        .unwrap_or_default();
    if transforms != [ALG_ENVELOPED_SIGNATURE, ALG_EXC_C14N] {
        fail_structure(report, "Transforms must be enveloped-signature then exc-c14n");
    }
}

fn fail_structure(report: &mut SignatureReport, problem: &str) {
    report.structure_ok = false;
    report.problems.push(problem.to_string());
}
