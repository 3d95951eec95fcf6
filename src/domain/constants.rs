//! Centralized constants for namespaces, algorithm URIs, endpoints and
//! authority response codes.
//! Keep this intentionally small; only broadly reused literals should live here.

// === Namespaces ===

/// SIFEN document schema namespace
pub const SIFEN_NS: &str = "http://ekuatia.set.gov.py/sifen/xsd";

/// XML digital signature namespace
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Schema instance namespace (carrier of `schemaLocation`)
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Reserved `xml:` prefix namespace
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// SOAP 1.2 envelope namespace
pub const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

// === XMLDSig algorithm identifiers ===

pub const ALG_EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const ALG_ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const ALG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const ALG_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

// === Document shape ===

/// The only XML declaration ever emitted (double quotes, no standalone).
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Fixed entry name inside the lote archive
pub const LOTE_ENTRY_NAME: &str = "lote.xml";

/// Batch wrapper root element
pub const LOTE_ROOT: &str = "rLoteDE";

/// Versioned document wrapper element
pub const RDE: &str = "rDE";

/// Signed document element
pub const DE: &str = "DE";

/// `dId` is at most 15 digits
pub const CORRELATION_ID_MAX_DIGITS: usize = 15;

// === CDC ===

/// Digits before the check digit
pub const CDC_PAYLOAD_LEN: usize = 43;

/// Full CDC length including check digit
pub const CDC_LEN: usize = 44;

/// Cyclic weights applied right-to-left
pub const CDC_WEIGHTS: [u32; 8] = [2, 3, 4, 5, 6, 7, 8, 9];

// === Endpoints ===

pub const SIFEN_TEST_BASE_URL: &str = "https://sifen-test.set.gov.py";
pub const SIFEN_PROD_BASE_URL: &str = "https://sifen.set.gov.py";
pub const PATH_RECEIVE_LOTE: &str = "/de/ws/async/recibe-lote.wsdl";
pub const PATH_QUERY_LOTE: &str = "/de/ws/consultas/consulta-lote.wsdl";
pub const PATH_QUERY_DE: &str = "/de/ws/consultas/consulta.wsdl";
pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

// === Authority response codes ===

/// DE authorized
pub const CODE_DE_APPROVED: &str = "0260";
/// DE authorized with observation
pub const CODES_DE_APPROVED_WITH_OBSERVATION: &[&str] = &["0261", "0262"];
/// Lote received and queued
pub const CODE_LOTE_QUEUED: &str = "0300";
/// Lote not queued for processing
pub const CODE_LOTE_NOT_QUEUED: &str = "0301";
/// Lote number unknown
pub const CODE_LOTE_UNKNOWN: &str = "0360";
/// Lote still processing
pub const CODE_LOTE_PROCESSING: &str = "0361";
/// Lote processing concluded
pub const CODE_LOTE_CONCLUDED: &str = "0362";
/// Lote query outside the allowed window; query each CDC individually
pub const CODE_LOTE_WINDOW_EXPIRED: &str = "0364";
/// XML malformed
pub const CODE_XML_MALFORMED: &str = "0160";
/// Individual query: CDC not found
pub const CODE_DE_NOT_FOUND: &str = "0420";
/// Individual query: CDC found
pub const CODE_DE_FOUND: &str = "0422";

// === Certificate policy ===

/// Subject fragments identifying throwaway or test-only certificates.
pub const TEST_CERTIFICATE_MARKERS: &[&str] = &[
    "TEST CERTIFICATE",
    "CERTIFICADO DE PRUEBA",
    "SELF-SIGNED",
    "DO NOT TRUST",
    "LOCALHOST",
];
