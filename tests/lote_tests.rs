//! Lote packaging of signed documents.

mod common;

use sifen_signer::domain::xml::{parse_document, Node};
use sifen_signer::services::lote;
use sifen_signer::{
    CorrelationId, Logger, OrderingTable, SchemaVersion, SifenError, SignWorkflow, SignedDocument,
};

fn signed_sample() -> SignedDocument {
    let pki = common::pki::company();
    SignWorkflow::new(
        &pki.material(),
        OrderingTable::seeded(),
        SchemaVersion::V150,
        &Logger::default(),
    )
    .unwrap()
    .build_and_sign(&common::sample_fields(), common::signed_at())
    .unwrap()
}

#[test]
fn archive_holds_one_stored_entry() {
    let signed = signed_sample();
    let id = CorrelationId::new("251230101600123").unwrap();
    let package = lote::assemble(&signed.rde, &id, &Logger::default()).unwrap();

    let entries = lote::entries(&package.zip_bytes).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "lote.xml");
    assert!(entries[0].stored);

    let xml = lote::unpack(&package.zip_bytes).unwrap();
    assert_eq!(xml, package.lote_xml);
    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><rLoteDE"#));
    assert_eq!(xml.matches("<rLoteDE").count(), 1);
    assert_eq!(lote::unpack_base64(&package.base64).unwrap(), xml);
}

#[test]
fn soap_body_carries_id_and_payload_once() {
    let signed = signed_sample();
    let id = CorrelationId::new("251230101600123").unwrap();
    let package = lote::assemble(&signed.rde, &id, &Logger::default()).unwrap();

    assert_eq!(package.soap_body.matches("<dId>").count(), 1);
    assert!(package.soap_body.contains("<dId>251230101600123</dId>"));
    assert_eq!(package.soap_body.matches("<xDE>").count(), 1);
    assert!(package
        .soap_body
        .contains(&format!("<xDE>{}</xDE>", package.base64)));
}

#[test]
fn packaged_signature_still_verifies() {
    let signed = signed_sample();
    let package =
        lote::assemble(&signed.rde, &CorrelationId::generate(), &Logger::default()).unwrap();
    let report = sifen_signer::services::xmldsig::verify(&package.lote_xml);
    assert!(report.success(), "{:?}", report.problems);
}

#[test]
fn unsigned_documents_are_refused() {
    let (rde, _) = sifen_signer::services::build_rde(
        &common::sample_fields(),
        common::signed_at(),
        &Logger::default(),
    )
    .unwrap();
    let err = lote::assemble(&rde, &CorrelationId::generate(), &Logger::default()).unwrap_err();
    assert!(matches!(err, SifenError::StructureError(ref m) if m.contains("no Signature")));
}

#[test]
fn comments_are_refused_not_stripped() {
    let mut rde = signed_sample().rde;
    rde.children.push(Node::Comment(" late edit ".to_string()));
    assert!(matches!(
        lote::assemble(&rde, &CorrelationId::generate(), &Logger::default()),
        Err(SifenError::StructureError(_))
    ));
}

#[test]
fn an_existing_wrapper_is_not_wrapped_again() {
    let signed = signed_sample();
    let first =
        lote::assemble(&signed.rde, &CorrelationId::generate(), &Logger::default()).unwrap();
    let lote_root = parse_document(&first.lote_xml).unwrap();
    let second =
        lote::assemble(&lote_root, &CorrelationId::generate(), &Logger::default()).unwrap();
    assert_eq!(first.lote_xml, second.lote_xml);
}

#[test]
fn correlation_ids_are_digits_only() {
    assert!(CorrelationId::new("12a").is_err());
    assert!(CorrelationId::new("1234567890123456").is_err());
    let generated = CorrelationId::generate();
    assert_eq!(generated.as_str().len(), 15);
    assert!(generated.as_str().bytes().all(|b| b.is_ascii_digit()));
}
