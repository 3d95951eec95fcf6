//! SOAP 1.2 request envelopes and response extraction.
//!
//! Requests are built as element trees and serialized, so every value is
//! escaped the same way as signed documents. Responses are read by local
//! name only: the authority answers with varying prefixes (`ns2:`, `env:`)
//! and this layer must not care.

use crate::domain::cdc::Cdc;
use crate::domain::constants::SOAP12_NS;
use crate::domain::types::{CorrelationId, ProtocolId};
use crate::domain::xml::{parse_document, serialize_document, Element, NamespaceDecl, QName};
use crate::infra::error::SifenResult;

const SOAP_PREFIX: &str = "soap";

fn soap_element(local: &str) -> Element {
    let mut element = Element::new(&QName::new(Some(SOAP12_NS), local));
    element.prefix = Some(SOAP_PREFIX.to_string());
    element
}

fn envelope(operation: Element) -> String {
    let mut env = soap_element("Envelope");
    env.namespace_decls.push(NamespaceDecl {
        prefix: Some(SOAP_PREFIX.to_string()),
        uri: SOAP12_NS.to_string(),
    });
    env.push(soap_element("Header"));
    env.push(soap_element("Body").child(operation));
    serialize_document(&env)
}

/// `rEnvioLote`: asynchronous batch reception.
#[must_use]
pub fn receive_lote_request(correlation_id: &CorrelationId, zip_base64: &str) -> String {
    let operation = Element::with_default_namespace(&QName::sifen("rEnvioLote"))
        .child(Element::text_leaf(&QName::sifen("dId"), correlation_id.as_str()))
        .child(Element::text_leaf(&QName::sifen("xDE"), zip_base64));
    envelope(operation)
}

/// `rEnviConsLoteDe`: status of a queued lote.
#[must_use]
pub fn query_lote_request(correlation_id: &CorrelationId, protocol: &ProtocolId) -> String {
    let operation = Element::with_default_namespace(&QName::sifen("rEnviConsLoteDe"))
        .child(Element::text_leaf(&QName::sifen("dId"), correlation_id.as_str()))
        .child(Element::text_leaf(
            &QName::sifen("dProtConsLote"),
            protocol.as_str(),
        ));
    envelope(operation)
}

/// `rEnviConsDeRequest`: individual document query by CDC.
#[must_use]
pub fn query_document_request(correlation_id: &CorrelationId, cdc: &Cdc) -> String {
    let operation = Element::with_default_namespace(&QName::sifen("rEnviConsDeRequest"))
        .child(Element::text_leaf(&QName::sifen("dId"), correlation_id.as_str()))
        .child(Element::text_leaf(&QName::sifen("dCDC"), cdc.as_str()));
    envelope(operation)
}

/// Per-document block of a lote or DE query response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawDocumentResult {
    pub cdc: String,
    pub state: String,
    pub code: String,
    pub message: String,
}

/// Fields pulled out of any authority response body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    pub fault: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub protocol: Option<String>,
    pub documents: Vec<RawDocumentResult>,
}

/// Extract the outcome fields from a response body.
///
/// Lote-level codes are read from `dCodRes`/`dMsgRes` or their lote-query
/// variants `dCodResLot`/`dMsgResLot`. Per-document results come from
/// `gResProcLote` (lote query) or `rProtDe` (synchronous and DE query).
pub fn parse_response(body: &str) -> SifenResult<ParsedResponse> {
    let root = parse_document(body.trim_start_matches('\u{feff}'))?;
    let mut parsed = ParsedResponse::default();

    if let Some(fault) = find_local(&root, "Fault") {
        let text = find_local(fault, "Text")
            .or_else(|| find_local(fault, "faultstring"))
            .map(|e| e.text().trim().to_string())
            .unwrap_or_default();
        let code = find_local(fault, "Value").map(|e| e.text().trim().to_string());
        parsed.fault = Some(match code {
            Some(code) if !code.is_empty() => format!("{code}: {text}"),
            _ => text,
        });
        return Ok(parsed);
    }

    let blocks = document_blocks(&root);
    parsed.code = top_level_text(&root, &["dCodResLot", "dCodRes"], &blocks);
    parsed.message = top_level_text(&root, &["dMsgResLot", "dMsgRes"], &blocks);
    parsed.protocol = find_local(&root, "dProtConsLote")
        .map(|e| e.text().trim().to_string())
        .filter(|p| !p.is_empty());
    parsed.documents = blocks.into_iter().map(document_result).collect();

    // DE queries return the stored document as escaped XML inside xContenDE
    if let Some(content) = find_local(&root, "xContenDE") {
        let inner = content.text();
        if inner.trim_start().starts_with('<') {
            let embedded = parse_document(inner.trim())?;
            parsed
                .documents
                .extend(document_blocks(&embedded).into_iter().map(document_result));
        }
    }
    Ok(parsed)
}

fn document_blocks(root: &Element) -> Vec<&Element> {
    collect_local(root, "gResProcLote")
        .into_iter()
        .chain(collect_local(root, "rProtDe"))
        .collect()
}

fn document_result(block: &Element) -> RawDocumentResult {
    let result = find_local(block, "gResProc");
    RawDocumentResult {
        cdc: find_local(block, "id")
            .or_else(|| find_local(block, "Id"))
            .map(|e| e.text().trim().to_string())
            .unwrap_or_default(),
        state: text_of(block, "dEstRes"),
        code: result.map(|r| text_of(r, "dCodRes")).unwrap_or_default(),
        message: result.map(|r| text_of(r, "dMsgRes")).unwrap_or_default(),
    }
}

/// First match for any of `names` that is not inside a per-document block.
fn top_level_text(root: &Element, names: &[&str], blocks: &[&Element]) -> Option<String> {
    names.iter().find_map(|name| {
        let mut found = Vec::new();
        collect_into(root, name, &mut found);
        found
            .into_iter()
            .find(|el| !blocks.iter().any(|b| contains(b, el)))
            .map(|el| el.text().trim().to_string())
    })
}

fn contains(ancestor: &Element, target: &Element) -> bool {
    std::ptr::eq(ancestor, target) || ancestor.child_elements().any(|c| contains(c, target))
}

fn collect_into<'a>(element: &'a Element, local: &str, out: &mut Vec<&'a Element>) {
    if element.local == local {
        out.push(element);
    }
    for child in element.child_elements() {
        collect_into(child, local, out);
    }
}

fn find_local<'a>(element: &'a Element, local: &str) -> Option<&'a Element> {
    if element.local == local {
        return Some(element);
    }
    element.child_elements().find_map(|c| find_local(c, local))
}

fn collect_local<'a>(element: &'a Element, local: &str) -> Vec<&'a Element> {
    let mut out = Vec::new();
    collect_into(element, local, &mut out);
    out
}

fn text_of(element: &Element, local: &str) -> String {
    find_local(element, local)
        .map(|e| e.text().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_request_shape() {
        let id = CorrelationId::new("250101120000123").unwrap();
        let xml = receive_lote_request(&id, "UEsDBA==");
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">"#));
        assert!(xml.contains(r#"<rEnvioLote xmlns="http://ekuatia.set.gov.py/sifen/xsd"><dId>250101120000123</dId><xDE>UEsDBA==</xDE></rEnvioLote>"#));
        assert_eq!(xml.matches("<dId>").count(), 1);
    }

    #[test]
    fn parses_lote_receipt() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?><env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Header/><env:Body><ns2:rResEnviLoteDe xmlns:ns2="http://ekuatia.set.gov.py/sifen/xsd"><ns2:dFecProc>2025-12-30T10:20:00-03:00</ns2:dFecProc><ns2:dCodRes>0300</ns2:dCodRes><ns2:dMsgRes>Lote recibido con éxito</ns2:dMsgRes><ns2:dProtConsLote>1234567890</ns2:dProtConsLote><ns2:dTpoProces>0</ns2:dTpoProces></ns2:rResEnviLoteDe></env:Body></env:Envelope>"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("0300"));
        assert_eq!(parsed.protocol.as_deref(), Some("1234567890"));
        assert!(parsed.documents.is_empty());
    }

    #[test]
    fn parses_concluded_lote_documents() {
        let body = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body><ns2:rResEnviConsLoteDe xmlns:ns2="http://ekuatia.set.gov.py/sifen/xsd"><ns2:dCodResLot>0362</ns2:dCodResLot><ns2:dMsgResLot>Procesamiento concluido</ns2:dMsgResLot><ns2:gResProcLote><ns2:id>01045547378001001000000112025123011234567895</ns2:id><ns2:dEstRes>Rechazado</ns2:dEstRes><ns2:gResProc><ns2:dCodRes>0160</ns2:dCodRes><ns2:dMsgRes>XML malformado: [El elemento esperado es: dDesTiDE en lugar de: dNumTim]</ns2:dMsgRes></ns2:gResProc></ns2:gResProcLote></ns2:rResEnviConsLoteDe></env:Body></env:Envelope>"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("0362"));
        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(parsed.documents[0].code, "0160");
        assert_eq!(parsed.documents[0].state, "Rechazado");
    }

    #[test]
    fn parses_document_embedded_in_query_answer() {
        let body = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body><ns2:rEnviConsDeResponse xmlns:ns2="http://ekuatia.set.gov.py/sifen/xsd"><ns2:dCodRes>0422</ns2:dCodRes><ns2:dMsgRes>CDC encontrado</ns2:dMsgRes><ns2:xContenDE>&lt;rContDe&gt;&lt;rProtDe&gt;&lt;Id&gt;01045547378001001000000112025123011234567895&lt;/Id&gt;&lt;dEstRes&gt;Aprobado&lt;/dEstRes&gt;&lt;gResProc&gt;&lt;dCodRes&gt;0260&lt;/dCodRes&gt;&lt;dMsgRes&gt;Autorización del DE satisfactoria&lt;/dMsgRes&gt;&lt;/gResProc&gt;&lt;/rProtDe&gt;&lt;/rContDe&gt;</ns2:xContenDE></ns2:rEnviConsDeResponse></env:Body></env:Envelope>"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("0422"));
        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(
            parsed.documents[0].cdc,
            "01045547378001001000000112025123011234567895"
        );
        assert_eq!(parsed.documents[0].code, "0260");
    }

    #[test]
    fn parses_fault() {
        let body = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body><env:Fault><env:Code><env:Value>env:Sender</env:Value></env:Code><env:Reason><env:Text xml:lang="es">XML mal formado</env:Text></env:Reason></env:Fault></env:Body></env:Envelope>"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.fault.as_deref(), Some("env:Sender: XML mal formado"));
    }
}
