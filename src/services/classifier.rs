//! Response classification.
//!
//! Maps authority result codes and messages onto [`ResponseClass`] and builds
//! the closed result enums. Business rejections and technical malformations
//! are kept strictly apart: only the latter feed the auto-fix loop.

use crate::domain::constants::{
    CODES_DE_APPROVED_WITH_OBSERVATION, CODE_DE_APPROVED, CODE_DE_FOUND, CODE_DE_NOT_FOUND,
    CODE_LOTE_CONCLUDED, CODE_LOTE_NOT_QUEUED, CODE_LOTE_PROCESSING, CODE_LOTE_QUEUED,
    CODE_LOTE_UNKNOWN, CODE_LOTE_WINDOW_EXPIRED, CODE_XML_MALFORMED,
};
use crate::domain::response::{
    DocumentOutcome, ResponseClass, ResponseStatus, StatusResult, SubmissionResult,
};
use crate::domain::types::ProtocolId;
use crate::services::error_parser::{is_malformation_text, parse_expected_found};
use crate::services::soap::{ParsedResponse, RawDocumentResult};

const NOT_ENABLED_MARKER: &str = "no habilitado";

/// Class of a single (code, message) pair.
#[must_use]
pub fn classify_code(code: &str, message: &str) -> ResponseClass {
    let code = code.trim();
    if code == CODE_DE_APPROVED || CODES_DE_APPROVED_WITH_OBSERVATION.contains(&code) {
        return ResponseClass::AcceptedFinal;
    }
    if message.to_lowercase().contains(NOT_ENABLED_MARKER) {
        return ResponseClass::BusinessRejection;
    }
    match code {
        CODE_LOTE_QUEUED | CODE_LOTE_PROCESSING => ResponseClass::AcceptedQueued,
        CODE_LOTE_CONCLUDED => ResponseClass::AcceptedFinal,
        CODE_LOTE_WINDOW_EXPIRED => ResponseClass::TimeWindowExpired,
        CODE_LOTE_NOT_QUEUED if is_malformation_text(message) => {
            ResponseClass::TechnicalMalformation
        }
        CODE_LOTE_NOT_QUEUED | CODE_LOTE_UNKNOWN => ResponseClass::BusinessRejection,
        CODE_XML_MALFORMED => ResponseClass::TechnicalMalformation,
        other => match other.parse::<u32>() {
            Ok(100..=199) => ResponseClass::TechnicalMalformation,
            Ok(n) if n >= 1000 => ResponseClass::BusinessRejection,
            _ if parse_expected_found(message).is_some() => ResponseClass::TechnicalMalformation,
            _ => ResponseClass::Unknown,
        },
    }
}

fn fault_class(fault: &str) -> (ResponseClass, ResponseStatus) {
    let status = ResponseStatus::new("fault", fault);
    if is_malformation_text(fault) {
        (ResponseClass::TechnicalMalformation, status)
    } else {
        (ResponseClass::Unknown, status)
    }
}

/// Classify the answer to `rEnvioLote`.
#[must_use]
pub fn classify_submission(parsed: &ParsedResponse) -> SubmissionResult {
    if let Some(fault) = &parsed.fault {
        return match fault_class(fault) {
            (ResponseClass::TechnicalMalformation, status) => {
                SubmissionResult::TechnicalMalformation {
                    pair: parse_expected_found(fault),
                    status,
                }
            }
            _ => SubmissionResult::Unknown {
                detail: format!("SOAP fault: {fault}"),
            },
        };
    }

    let first_document = parsed.documents.first();
    let Some(code) = parsed
        .code
        .clone()
        .or_else(|| first_document.map(|d| d.code.clone()))
        .filter(|c| !c.is_empty())
    else {
        return SubmissionResult::Unknown {
            detail: "response carries no result code".to_string(),
        };
    };
    let message = parsed
        .message
        .clone()
        .or_else(|| first_document.map(|d| d.message.clone()))
        .unwrap_or_default();
    let status = ResponseStatus::new(code.as_str(), message.as_str());

    match classify_code(&code, &message) {
        ResponseClass::AcceptedQueued => match parsed.protocol.as_deref().map(ProtocolId::new) {
            Some(Ok(protocol)) => SubmissionResult::Queued { protocol, status },
            _ => SubmissionResult::Unknown {
                detail: format!("lote queued ({status}) without a usable protocol number"),
            },
        },
        ResponseClass::AcceptedFinal => SubmissionResult::Accepted { status },
        ResponseClass::BusinessRejection => SubmissionResult::BusinessRejection { status },
        ResponseClass::TechnicalMalformation => SubmissionResult::TechnicalMalformation {
            pair: parse_expected_found(&message),
            status,
        },
        ResponseClass::TimeWindowExpired | ResponseClass::Unknown => SubmissionResult::Unknown {
            detail: format!("unexpected submission answer {status}"),
        },
    }
}

fn document_outcome(raw: &RawDocumentResult) -> DocumentOutcome {
    let class = if raw.code.is_empty() && raw.state.eq_ignore_ascii_case("aprobado") {
        ResponseClass::AcceptedFinal
    } else {
        classify_code(&raw.code, &raw.message)
    };
    DocumentOutcome {
        cdc: raw.cdc.clone(),
        state: raw.state.clone(),
        status: ResponseStatus::new(raw.code.as_str(), raw.message.as_str()),
        pair: if class == ResponseClass::TechnicalMalformation {
            parse_expected_found(&raw.message)
        } else {
            None
        },
        class,
    }
}

/// Classify the answer to `rEnviConsLoteDe`.
#[must_use]
pub fn classify_status(parsed: &ParsedResponse) -> StatusResult {
    if let Some(fault) = &parsed.fault {
        return status_from_fault(fault);
    }
    let Some(code) = parsed.code.clone().filter(|c| !c.is_empty()) else {
        return StatusResult::Unknown {
            detail: "response carries no result code".to_string(),
        };
    };
    let message = parsed.message.clone().unwrap_or_default();
    let status = ResponseStatus::new(code.as_str(), message.as_str());

    if code == CODE_LOTE_CONCLUDED || !parsed.documents.is_empty() {
        return StatusResult::Completed {
            documents: parsed.documents.iter().map(document_outcome).collect(),
            status,
        };
    }
    status_from_class(classify_code(&code, &message), status)
}

/// Classify the answer to `rEnviConsDeRequest` for `cdc`.
#[must_use]
pub fn classify_document_query(parsed: &ParsedResponse, cdc: &str) -> StatusResult {
    if let Some(fault) = &parsed.fault {
        return status_from_fault(fault);
    }
    let code = parsed.code.clone().unwrap_or_default();
    let message = parsed.message.clone().unwrap_or_default();
    let status = ResponseStatus::new(code.as_str(), message.as_str());

    if !parsed.documents.is_empty() {
        return StatusResult::Completed {
            documents: parsed.documents.iter().map(document_outcome).collect(),
            status,
        };
    }
    let class = match code.as_str() {
        // only authorized documents are stored by the authority
        CODE_DE_FOUND => ResponseClass::AcceptedFinal,
        CODE_DE_NOT_FOUND => ResponseClass::BusinessRejection,
        "" => {
            return StatusResult::Unknown {
                detail: "response carries no result code".to_string(),
            }
        }
        _ => classify_code(&code, &message),
    };
    match class {
        ResponseClass::AcceptedFinal => StatusResult::Completed {
            documents: vec![DocumentOutcome::approved(cdc, status.clone())],
            status,
        },
        class => status_from_class(class, status),
    }
}

fn status_from_fault(fault: &str) -> StatusResult {
    match fault_class(fault) {
        (ResponseClass::TechnicalMalformation, status) => StatusResult::TechnicalMalformation {
            pair: parse_expected_found(fault),
            status,
        },
        _ => StatusResult::Unknown {
            detail: format!("SOAP fault: {fault}"),
        },
    }
}

fn status_from_class(class: ResponseClass, status: ResponseStatus) -> StatusResult {
    match class {
        ResponseClass::AcceptedQueued => StatusResult::Processing { status },
        ResponseClass::TimeWindowExpired => StatusResult::RequiresIndividualQuery { status },
        ResponseClass::BusinessRejection => StatusResult::BusinessRejection { status },
        ResponseClass::TechnicalMalformation => StatusResult::TechnicalMalformation {
            pair: parse_expected_found(&status.message),
            status,
        },
        ResponseClass::AcceptedFinal => StatusResult::Unknown {
            detail: format!("acceptance {status} without per-document results"),
        },
        ResponseClass::Unknown => StatusResult::Unknown {
            detail: format!("unexpected status answer {status}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(code: &str, message: &str) -> ParsedResponse {
        ParsedResponse {
            code: Some(code.to_string()),
            message: Some(message.to_string()),
            ..ParsedResponse::default()
        }
    }

    #[test]
    fn code_table() {
        assert_eq!(classify_code("0260", ""), ResponseClass::AcceptedFinal);
        assert_eq!(classify_code("0262", ""), ResponseClass::AcceptedFinal);
        assert_eq!(classify_code("0300", ""), ResponseClass::AcceptedQueued);
        assert_eq!(classify_code("0361", ""), ResponseClass::AcceptedQueued);
        assert_eq!(classify_code("0364", ""), ResponseClass::TimeWindowExpired);
        assert_eq!(classify_code("0160", "XML malformado"), ResponseClass::TechnicalMalformation);
        assert_eq!(classify_code("0141", ""), ResponseClass::TechnicalMalformation);
        assert_eq!(classify_code("0360", ""), ResponseClass::BusinessRejection);
        assert_eq!(classify_code("1305", "RUC inactivo"), ResponseClass::BusinessRejection);
        assert_eq!(classify_code("0999", "?"), ResponseClass::Unknown);
    }

    #[test]
    fn not_queued_depends_on_message() {
        assert_eq!(
            classify_code("0301", "Lote no encolado: XML malformado"),
            ResponseClass::TechnicalMalformation
        );
        assert_eq!(
            classify_code("0301", "Lote no encolado para procesamiento"),
            ResponseClass::BusinessRejection
        );
        assert_eq!(
            classify_code("0160", "RUC no habilitado para facturación electrónica"),
            ResponseClass::BusinessRejection
        );
    }

    #[test]
    fn queued_submission_requires_protocol() {
        let mut response = parsed("0300", "Lote recibido");
        assert!(matches!(
            classify_submission(&response),
            SubmissionResult::Unknown { .. }
        ));
        response.protocol = Some("98765".to_string());
        match classify_submission(&response) {
            SubmissionResult::Queued { protocol, .. } => assert_eq!(protocol.as_str(), "98765"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_submission_carries_pair() {
        let response = parsed(
            "0160",
            "XML malformado: [El elemento esperado es: dDesTiDE en lugar de: dNumTim]",
        );
        match classify_submission(&response) {
            SubmissionResult::TechnicalMalformation { pair: Some(pair), .. } => {
                assert_eq!(pair.expected, "dDesTiDE");
                assert_eq!(pair.found, "dNumTim");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn faults_split_by_text() {
        let response = ParsedResponse {
            fault: Some("XML mal formado".to_string()),
            ..ParsedResponse::default()
        };
        assert_eq!(
            classify_submission(&response).class(),
            ResponseClass::TechnicalMalformation
        );
        let response = ParsedResponse {
            fault: Some("Internal server error".to_string()),
            ..ParsedResponse::default()
        };
        assert_eq!(classify_status(&response).class(), ResponseClass::Unknown);
    }

    #[test]
    fn concluded_lote_lists_documents() {
        let mut response = parsed("0362", "Procesamiento de lote concluido");
        response.documents.push(RawDocumentResult {
            cdc: "1".repeat(44),
            state: "Aprobado".into(),
            code: "0260".into(),
            message: "Autorización del DE satisfactoria".into(),
        });
        let result = classify_status(&response);
        assert_eq!(result.class(), ResponseClass::AcceptedFinal);

        assert!(matches!(
            classify_status(&parsed("0361", "en procesamiento")),
            StatusResult::Processing { .. }
        ));
        assert!(matches!(
            classify_status(&parsed("0364", "extemporánea")),
            StatusResult::RequiresIndividualQuery { .. }
        ));
    }

    #[test]
    fn document_query_codes() {
        let cdc = "0".repeat(44);
        assert_eq!(
            classify_document_query(&parsed("0422", "CDC encontrado"), &cdc).class(),
            ResponseClass::AcceptedFinal
        );
        assert_eq!(
            classify_document_query(&parsed("0420", "CDC inexistente"), &cdc).class(),
            ResponseClass::BusinessRejection
        );

        match classify_document_query(&parsed("0260", "Autorización satisfactoria"), &cdc) {
            StatusResult::Completed { documents, .. } => {
                assert_eq!(documents.len(), 1);
                assert_eq!(documents[0].cdc, cdc);
                assert!(documents[0].accepted());
            }
            other => panic!("expected completed, got {other:?}"),
        }
    }

    #[test]
    fn lote_level_acceptance_without_documents_is_unknown() {
        assert_eq!(
            classify_status(&parsed("0362", "Procesamiento de lote concluido")).class(),
            ResponseClass::Unknown
        );
        assert_eq!(
            classify_status(&parsed("0260", "Autorización satisfactoria")).class(),
            ResponseClass::Unknown
        );
    }
}
