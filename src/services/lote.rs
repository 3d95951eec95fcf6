//! Lote assembly: signed `rDE` to `rLoteDE` XML, single-entry ZIP, base64,
//! SOAP body.
//!
//! The assembler checks and never repairs. A tree that still has comments,
//! whitespace between tags, a missing or misplaced `Signature` or a
//! reference mismatch is refused with a structure error.

use std::io::{Cursor, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::domain::constants::{LOTE_ENTRY_NAME, LOTE_ROOT, XML_DECLARATION};
use crate::domain::types::CorrelationId;
use crate::domain::xml::{serialize_document, Element};
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use crate::services::normalizer::{structural_violations, wrap_if_needed};
use crate::services::soap;

/// Everything produced for one submission.
#[derive(Debug, Clone)]
pub struct LotePackage {
    pub correlation_id: CorrelationId,
    /// `rLoteDE` document as stored in the archive
    pub lote_xml: String,
    pub zip_bytes: Vec<u8>,
    pub base64: String,
    /// Complete `rEnvioLote` SOAP envelope
    pub soap_body: String,
}

/// Name and method of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub stored: bool,
    pub size: u64,
}

/// Build the lote package for one signed document.
pub fn assemble(
    signed: &Element,
    correlation_id: &CorrelationId,
    logger: &Logger,
) -> SifenResult<LotePackage> {
    let lote = wrap_if_needed(signed.clone())?;
    let violations = structural_violations(&lote);
    if !violations.is_empty() {
        return Err(SifenError::StructureError(violations.join("; ")));
    }

    let lote_xml = serialize_document(&lote);
    let expected_head = format!("{XML_DECLARATION}<{LOTE_ROOT}");
    if !lote_xml.starts_with(&expected_head) {
        return Err(SifenError::StructureError(format!(
            "lote must start with {expected_head}"
        )));
    }
    if lote_xml.matches(&format!("<{LOTE_ROOT}")).count() != 1 {
        return Err(SifenError::StructureError(
            "rLoteDE appears more than once".to_string(),
        ));
    }

    let zip_bytes = zip_single_entry(&lote_xml)?;
    let base64 = STANDARD.encode(&zip_bytes);
    let soap_body = soap::receive_lote_request(correlation_id, &base64);

    logger.info(&format!(
        "assembled lote dId={correlation_id}: {} bytes xml, {} bytes zip",
        lote_xml.len(),
        zip_bytes.len()
    ));
    Ok(LotePackage {
        correlation_id: correlation_id.clone(),
        lote_xml,
        zip_bytes,
        base64,
        soap_body,
    })
}

fn zip_single_entry(content: &str) -> SifenResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file(LOTE_ENTRY_NAME, options)?;
    writer.write_all(content.as_bytes())?;
    Ok(writer.finish()?.into_inner())
}

/// Read the entries of a lote archive.
pub fn entries(zip_bytes: &[u8]) -> SifenResult<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    let mut list = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        list.push(ArchiveEntry {
            name: file.name().to_string(),
            stored: file.compression() == CompressionMethod::Stored,
            size: file.size(),
        });
    }
    Ok(list)
}

/// Extract the `rLoteDE` XML, insisting on the single-entry layout.
pub fn unpack(zip_bytes: &[u8]) -> SifenResult<String> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    if archive.len() != 1 {
        return Err(SifenError::ArchiveError(format!(
            "lote archive must hold exactly one entry, found {}",
            archive.len()
        )));
    }
    let mut file = archive.by_index(0)?;
    if file.name() != LOTE_ENTRY_NAME {
        return Err(SifenError::ArchiveError(format!(
            "unexpected entry name '{}'",
            file.name()
        )));
    }
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Decode the base64 `xDE` payload and unpack it.
pub fn unpack_base64(encoded: &str) -> SifenResult<String> {
    unpack(&STANDARD.decode(encoded.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::xml::parse_document;

    const SIGNED_SHAPE: &str = r##"<rDE xmlns="http://ekuatia.set.gov.py/sifen/xsd"><dVerFor>150</dVerFor><DE Id="1"><dDVId>1</dDVId></DE><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo><Reference URI="#1"/></SignedInfo></Signature></rDE>"##;

    fn id() -> CorrelationId {
        CorrelationId::new("202512301015001").unwrap()
    }

    #[test]
    fn single_stored_entry() {
        let signed = parse_document(SIGNED_SHAPE).unwrap();
        let package = assemble(&signed, &id(), &Logger::default()).unwrap();
        let list = entries(&package.zip_bytes).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "lote.xml");
        assert!(list[0].stored);
        assert_eq!(unpack(&package.zip_bytes).unwrap(), package.lote_xml);
        assert_eq!(unpack_base64(&package.base64).unwrap(), package.lote_xml);
        assert!(package
            .lote_xml
            .starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><rLoteDE"#));
        assert!(package.soap_body.contains(&format!("<xDE>{}</xDE>", package.base64)));
    }

    #[test]
    fn refuses_unsigned_or_dirty_trees() {
        let unsigned = parse_document(
            r#"<rDE xmlns="http://ekuatia.set.gov.py/sifen/xsd"><DE Id="1"/></rDE>"#,
        )
        .unwrap();
        assert!(matches!(
            assemble(&unsigned, &id(), &Logger::default()),
            Err(SifenError::StructureError(_))
        ));

        let dirty = parse_document(&SIGNED_SHAPE.replace("<dVerFor>", "\n<dVerFor>")).unwrap();
        assert!(matches!(
            assemble(&dirty, &id(), &Logger::default()),
            Err(SifenError::StructureError(_))
        ));

        let mismatched = parse_document(&SIGNED_SHAPE.replace("URI=\"#1\"", "URI=\"#2\"")).unwrap();
        assert!(assemble(&mismatched, &id(), &Logger::default()).is_err());
    }
}
