//! In-memory transport answering from a script.

use std::collections::VecDeque;

use sifen_signer::domain::response::{ExpectedFound, ResponseStatus, StatusResult, SubmissionResult};
use sifen_signer::services::lote::LotePackage;
use sifen_signer::{Cdc, ProtocolId, SifenError, SifenResult, SifenTransport};

#[derive(Default)]
pub struct ScriptedTransport {
    pub submissions: VecDeque<SubmissionResult>,
    pub lote_answers: VecDeque<StatusResult>,
    pub document_answers: VecDeque<StatusResult>,
    /// Every package handed to `submit_lote`, in order
    pub sent: Vec<LotePackage>,
    pub lote_queries: Vec<ProtocolId>,
    pub document_queries: Vec<Cdc>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_submit(mut self, result: SubmissionResult) -> Self {
        self.submissions.push_back(result);
        self
    }

    pub fn on_lote_query(mut self, result: StatusResult) -> Self {
        self.lote_answers.push_back(result);
        self
    }

    pub fn on_document_query(mut self, result: StatusResult) -> Self {
        self.document_answers.push_back(result);
        self
    }
}

fn exhausted(what: &str) -> SifenError {
    SifenError::NetworkError(format!("script has no more {what} answers"))
}

impl SifenTransport for ScriptedTransport {
    fn submit_lote(&mut self, package: &LotePackage) -> SifenResult<SubmissionResult> {
        self.sent.push(package.clone());
        self.submissions.pop_front().ok_or_else(|| exhausted("submit"))
    }

    fn query_lote(&mut self, protocol: &ProtocolId) -> SifenResult<StatusResult> {
        self.lote_queries.push(protocol.clone());
        self.lote_answers.pop_front().ok_or_else(|| exhausted("lote query"))
    }

    fn query_document(&mut self, cdc: &Cdc) -> SifenResult<StatusResult> {
        self.document_queries.push(cdc.clone());
        self.document_answers
            .pop_front()
            .ok_or_else(|| exhausted("document query"))
    }
}

pub fn status(code: &str, message: &str) -> ResponseStatus {
    ResponseStatus::new(code, message)
}

pub fn accepted() -> SubmissionResult {
    SubmissionResult::Accepted {
        status: status("0260", "Autorización del DE satisfactoria"),
    }
}

pub fn queued(protocol: &str) -> SubmissionResult {
    SubmissionResult::Queued {
        protocol: ProtocolId::new(protocol).expect("protocol"),
        status: status("0300", "Lote recibido con éxito"),
    }
}

/// Technical rejection as the authority words it.
pub fn misplaced(expected: &str, found: &str) -> SubmissionResult {
    SubmissionResult::TechnicalMalformation {
        status: status(
            "0160",
            &format!("XML malformado: [El elemento esperado es: {expected} en lugar de: {found}]"),
        ),
        pair: Some(ExpectedFound {
            expected: expected.to_string(),
            found: found.to_string(),
        }),
    }
}

pub fn business_rejection() -> SubmissionResult {
    SubmissionResult::BusinessRejection {
        status: status("1001", "RUC del emisor no habilitado para emitir DE"),
    }
}

pub fn processing() -> StatusResult {
    StatusResult::Processing {
        status: status("0361", "Lote en procesamiento"),
    }
}
