//! End-to-end signing: build or parse, normalize, sign, verify.

mod common;

use sifen_signer::domain::xml::{parse_document, QName};
use sifen_signer::services::xmldsig;
use sifen_signer::{Logger, OrderingTable, SchemaVersion, SignWorkflow, VerifyWorkflow};

fn workflow(pki: &common::pki::TestPki) -> SignWorkflow {
    SignWorkflow::new(
        &pki.material(),
        OrderingTable::seeded(),
        SchemaVersion::V150,
        &Logger::default(),
    )
    .unwrap()
}

#[test]
fn built_document_signs_and_verifies() {
    let pki = common::pki::company();
    let signed = workflow(&pki)
        .build_and_sign(&common::sample_fields(), common::signed_at())
        .unwrap();

    assert_eq!(signed.cdc.as_str(), common::SAMPLE_CDC);
    assert!(signed
        .xml
        .starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><rDE"#));
    let report = xmldsig::verify(&signed.xml);
    assert!(report.success(), "{:?}", report.problems);
}

#[test]
fn signature_is_default_namespace_sibling_after_de() {
    let pki = common::pki::company();
    let signed = workflow(&pki)
        .build_and_sign(&common::sample_fields(), common::signed_at())
        .unwrap();

    let names: Vec<&str> = signed
        .rde
        .child_elements()
        .map(|c| c.local.as_str())
        .collect();
    assert_eq!(names, ["dVerFor", "DE", "Signature"]);
    assert!(signed
        .xml
        .contains(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#));
    assert!(!signed.xml.contains("ds:Signature"));
    assert!(signed
        .xml
        .contains(&format!(r##"URI="#{}""##, common::SAMPLE_CDC)));
}

#[test]
fn signing_is_deterministic() {
    let pki = common::pki::company();
    let signer = workflow(&pki);
    let first = signer
        .build_and_sign(&common::sample_fields(), common::signed_at())
        .unwrap();
    let second = signer
        .build_and_sign(&common::sample_fields(), common::signed_at())
        .unwrap();
    assert_eq!(first.xml, second.xml);
}

#[test]
fn tampering_breaks_the_digest() {
    let pki = common::pki::company();
    let signed = workflow(&pki)
        .build_and_sign(&common::sample_fields(), common::signed_at())
        .unwrap();

    let tampered = signed.xml.replace("Cliente SA", "Cliente SRL");
    assert_ne!(tampered, signed.xml);
    let report = xmldsig::verify(&tampered);
    assert!(!report.digest_ok);
    assert!(!report.success());
}

#[test]
fn signed_document_survives_a_reparse() {
    let pki = common::pki::company();
    let signed = workflow(&pki)
        .build_and_sign(&common::sample_fields(), common::signed_at())
        .unwrap();
    let reparsed = parse_document(&signed.xml).unwrap();
    assert!(xmldsig::verify_tree(&reparsed).success());

    let report = VerifyWorkflow::new().run(&signed.xml);
    assert!(report.success(), "{report:?}");
}

#[test]
fn unsigned_xml_is_normalized_before_signing() {
    let pki = common::pki::company();
    let signer = workflow(&pki);
    let (mut rde, _) = sifen_signer::services::build_rde(
        &common::sample_fields(),
        common::signed_at(),
        &Logger::default(),
    )
    .unwrap();

    let timb = rde.find_parent_of_mut(&QName::sifen("dNumTim")).unwrap();
    assert_eq!(timb.local, "gTimb");
    timb.children.swap(1, 2);

    // pretty-printed by hand, with a comment
    let messy = rde
        .to_xml()
        .replace("<gTimb>", "<gTimb>\n    <!-- timbrado -->\n    ")
        .replace("><", ">\n  <");
    let signed = signer.sign_xml(&messy).unwrap();

    assert!(!signed.xml.contains("<!--"));
    assert!(!signed.xml.contains(">\n"));
    assert!(xmldsig::is_valid(&signed.xml));
    let timbrado: Vec<String> = signed
        .rde
        .find_descendant(&QName::sifen("gTimb"))
        .unwrap()
        .child_elements()
        .map(|c| c.local.clone())
        .collect();
    assert_eq!(timbrado[..3], ["iTiDE", "dDesTiDE", "dNumTim"]);
}

#[test]
fn already_signed_documents_are_not_signed_again() {
    let pki = common::pki::company();
    let signer = workflow(&pki);
    let signed = signer
        .build_and_sign(&common::sample_fields(), common::signed_at())
        .unwrap();
    assert!(signer.sign_xml(&signed.xml).is_err());
}
