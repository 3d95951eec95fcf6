//! Classified authority responses.
//!
//! Anything the authority answers over a healthy HTTP exchange is a *result*,
//! never an error: it is parsed from the SOAP body and mapped to one of the
//! closed enums below. Transport failures stay in [`crate::infra::error`].

use crate::domain::types::ProtocolId;
use crate::infra::error::SifenError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response taxonomy shared by submission, lote polling and DE queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseClass {
    AcceptedFinal,
    AcceptedQueued,
    BusinessRejection,
    TechnicalMalformation,
    TimeWindowExpired,
    Unknown,
}

impl ResponseClass {
    /// The request reached a working validator that gave a definite answer.
    #[must_use]
    pub fn channel_healthy(&self) -> bool {
        matches!(
            self,
            ResponseClass::AcceptedFinal
                | ResponseClass::AcceptedQueued
                | ResponseClass::BusinessRejection
                | ResponseClass::TimeWindowExpired
        )
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, ResponseClass::AcceptedFinal | ResponseClass::AcceptedQueued)
    }

    /// A final answer about one document.
    #[must_use]
    pub fn is_verdict(&self) -> bool {
        matches!(
            self,
            ResponseClass::AcceptedFinal
                | ResponseClass::BusinessRejection
                | ResponseClass::TechnicalMalformation
        )
    }
}

impl fmt::Display for ResponseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResponseClass::AcceptedFinal => "accepted",
            ResponseClass::AcceptedQueued => "queued",
            ResponseClass::BusinessRejection => "business-rejection",
            ResponseClass::TechnicalMalformation => "technical-malformation",
            ResponseClass::TimeWindowExpired => "time-window-expired",
            ResponseClass::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Code and message pair as reported by the authority (`dCodRes`/`dMsgRes`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub code: String,
    pub message: String,
}

impl ResponseStatus {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Element names extracted from a schema-order complaint: `expected` must be
/// placed where `found` was seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedFound {
    pub expected: String,
    pub found: String,
}

impl fmt::Display for ExpectedFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected <{}> before <{}>", self.expected, self.found)
    }
}

/// Outcome of `rEnvioLote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Queued {
        protocol: ProtocolId,
        status: ResponseStatus,
    },
    Accepted {
        status: ResponseStatus,
    },
    BusinessRejection {
        status: ResponseStatus,
    },
    TechnicalMalformation {
        status: ResponseStatus,
        pair: Option<ExpectedFound>,
    },
    Unknown {
        detail: String,
    },
}

impl SubmissionResult {
    #[must_use]
    pub fn class(&self) -> ResponseClass {
        match self {
            SubmissionResult::Queued { .. } => ResponseClass::AcceptedQueued,
            SubmissionResult::Accepted { .. } => ResponseClass::AcceptedFinal,
            SubmissionResult::BusinessRejection { .. } => ResponseClass::BusinessRejection,
            SubmissionResult::TechnicalMalformation { .. } => ResponseClass::TechnicalMalformation,
            SubmissionResult::Unknown { .. } => ResponseClass::Unknown,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<&ResponseStatus> {
        match self {
            SubmissionResult::Queued { status, .. }
            | SubmissionResult::Accepted { status }
            | SubmissionResult::BusinessRejection { status }
            | SubmissionResult::TechnicalMalformation { status, .. } => Some(status),
            SubmissionResult::Unknown { .. } => None,
        }
    }
}

/// Per-document result inside a concluded lote or an individual DE query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub cdc: String,
    /// `dEstRes`, e.g. "Aprobado" or "Rechazado"
    pub state: String,
    pub status: ResponseStatus,
    pub class: ResponseClass,
    pub pair: Option<ExpectedFound>,
}

impl DocumentOutcome {
    /// Approval of `cdc` reported without a per-document block.
    #[must_use]
    pub fn approved(cdc: impl Into<String>, status: ResponseStatus) -> Self {
        Self {
            cdc: cdc.into(),
            state: "Aprobado".to_string(),
            status,
            class: ResponseClass::AcceptedFinal,
            pair: None,
        }
    }

    #[must_use]
    pub fn accepted(&self) -> bool {
        self.class == ResponseClass::AcceptedFinal
    }
}

/// Outcome of `rEnviConsLoteDe` or `rEnviConsDeRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusResult {
    Processing {
        status: ResponseStatus,
    },
    Completed {
        status: ResponseStatus,
        documents: Vec<DocumentOutcome>,
    },
    RequiresIndividualQuery {
        status: ResponseStatus,
    },
    BusinessRejection {
        status: ResponseStatus,
    },
    TechnicalMalformation {
        status: ResponseStatus,
        pair: Option<ExpectedFound>,
    },
    Unknown {
        detail: String,
    },
}

impl StatusResult {
    /// Aggregate class; a concluded lote takes the worst per-document class.
    ///
    /// A concluded lote without documents, or with any document that is not
    /// accepted, business-rejected or malformed, is `Unknown`.
    #[must_use]
    pub fn class(&self) -> ResponseClass {
        match self {
            StatusResult::Processing { .. } => ResponseClass::AcceptedQueued,
            StatusResult::Completed { documents, .. } => {
                let has = |class| documents.iter().any(|d| d.class == class);
                if has(ResponseClass::TechnicalMalformation) {
                    ResponseClass::TechnicalMalformation
                } else if documents.is_empty()
                    || documents.iter().any(|d| !d.class.is_verdict())
                {
                    ResponseClass::Unknown
                } else if has(ResponseClass::BusinessRejection) {
                    ResponseClass::BusinessRejection
                } else {
                    ResponseClass::AcceptedFinal
                }
            }
            StatusResult::RequiresIndividualQuery { .. } => ResponseClass::TimeWindowExpired,
            StatusResult::BusinessRejection { .. } => ResponseClass::BusinessRejection,
            StatusResult::TechnicalMalformation { .. } => ResponseClass::TechnicalMalformation,
            StatusResult::Unknown { .. } => ResponseClass::Unknown,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<&ResponseStatus> {
        match self {
            StatusResult::Processing { status }
            | StatusResult::Completed { status, .. }
            | StatusResult::RequiresIndividualQuery { status }
            | StatusResult::BusinessRejection { status }
            | StatusResult::TechnicalMalformation { status, .. } => Some(status),
            StatusResult::Unknown { .. } => None,
        }
    }

    /// First expected/found pair reported, at lote level or on any document.
    #[must_use]
    pub fn malformation_pair(&self) -> Option<&ExpectedFound> {
        match self {
            StatusResult::TechnicalMalformation { pair, .. } => pair.as_ref(),
            StatusResult::Completed { documents, .. } => {
                documents.iter().find_map(|d| d.pair.as_ref())
            }
            _ => None,
        }
    }
}

/// Process exit classes for the caller-facing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Accepted, queued on submit, or rejected by business rules over a
    /// healthy channel.
    Success,
    /// Technical rejection, exhausted retries, still processing.
    Failure,
    /// Configuration or certificate hard-fail.
    Fatal,
}

impl ExitClass {
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            ExitClass::Success => 0,
            ExitClass::Failure => 1,
            ExitClass::Fatal => 2,
        }
    }

    /// Terminal class after a submit: a queued lote counts as success.
    #[must_use]
    pub fn from_submission(result: &SubmissionResult) -> Self {
        match result.class() {
            ResponseClass::AcceptedFinal
            | ResponseClass::AcceptedQueued
            | ResponseClass::BusinessRejection => ExitClass::Success,
            _ => ExitClass::Failure,
        }
    }

    /// Terminal class after polling: still processing is a failure.
    #[must_use]
    pub fn from_status(result: &StatusResult) -> Self {
        match result.class() {
            ResponseClass::AcceptedFinal | ResponseClass::BusinessRejection => {
                ExitClass::Success
            }
            _ => ExitClass::Failure,
        }
    }

    #[must_use]
    pub fn from_error(error: &SifenError) -> Self {
        if error.is_fatal() {
            ExitClass::Fatal
        } else {
            ExitClass::Failure
        }
    }
}
