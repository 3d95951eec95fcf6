//! Submission Record: the only persisted, mutable entity.
//!
//! Created when a lote is queued and updated by every poll until it reaches a
//! terminal state.

use crate::domain::response::{ResponseClass, StatusResult};
use crate::domain::types::{Environment, ProtocolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStatus {
    Queued,
    Processing,
    Done,
    Error,
    RequiresIndividualQuery,
}

impl SubmissionStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Done | SubmissionStatus::Error | SubmissionStatus::RequiresIndividualQuery
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub protocol: ProtocolId,
    pub environment: Environment,
    pub correlation_id: String,
    /// CDCs of the documents carried by the lote
    pub cdcs: Vec<String>,
    pub status: SubmissionStatus,
    pub last_code: Option<String>,
    pub last_message: Option<String>,
    /// Number of status polls performed so far
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRecord {
    #[must_use]
    pub fn new(
        protocol: ProtocolId,
        environment: Environment,
        correlation_id: impl Into<String>,
        cdcs: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            protocol,
            environment,
            correlation_id: correlation_id.into(),
            cdcs,
            status: SubmissionStatus::Queued,
            last_code: None,
            last_message: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold one poll result into the record.
    pub fn record_poll(&mut self, result: &StatusResult) {
        self.attempts += 1;
        self.updated_at = Utc::now();
        match result.status() {
            Some(status) => {
                self.last_code = Some(status.code.clone());
                self.last_message = Some(status.message.clone());
            }
            None => {
                if let StatusResult::Unknown { detail } = result {
                    self.last_message = Some(detail.clone());
                }
            }
        }
        self.status = match result.class() {
            ResponseClass::AcceptedQueued => SubmissionStatus::Processing,
            ResponseClass::AcceptedFinal | ResponseClass::BusinessRejection => {
                SubmissionStatus::Done
            }
            ResponseClass::TimeWindowExpired => SubmissionStatus::RequiresIndividualQuery,
            ResponseClass::TechnicalMalformation | ResponseClass::Unknown => {
                SubmissionStatus::Error
            }
        };
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::response::ResponseStatus;

    fn record() -> SubmissionRecord {
        SubmissionRecord::new(
            ProtocolId::new("1234567").unwrap(),
            Environment::Test,
            "250101120000123",
            vec![],
        )
    }

    #[test]
    fn poll_transitions() {
        let mut rec = record();
        assert_eq!(rec.status, SubmissionStatus::Queued);

        rec.record_poll(&StatusResult::Processing {
            status: ResponseStatus::new("0361", "en procesamiento"),
        });
        assert_eq!(rec.status, SubmissionStatus::Processing);
        assert!(!rec.is_terminal());

        rec.record_poll(&StatusResult::RequiresIndividualQuery {
            status: ResponseStatus::new("0364", "extemporaneo"),
        });
        assert_eq!(rec.status, SubmissionStatus::RequiresIndividualQuery);
        assert_eq!(rec.attempts, 2);
        assert_eq!(rec.last_code.as_deref(), Some("0364"));
        assert!(rec.is_terminal());
    }

    #[test]
    fn serializes_status_in_kebab_case() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(json.contains("\"status\":\"queued\""));
        let back: SubmissionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record_with_times(&back));
    }

    fn record_with_times(other: &SubmissionRecord) -> SubmissionRecord {
        let mut rec = record();
        rec.created_at = other.created_at;
        rec.updated_at = other.updated_at;
        rec
    }
}
