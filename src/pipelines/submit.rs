//! Submission workflow: package a signed document, send it, and open a
//! submission record when the lote is queued.

use crate::adapters::submission_store::SubmissionStore;
use crate::adapters::transport::SifenTransport;
use crate::domain::constants::DE;
use crate::domain::response::SubmissionResult;
use crate::domain::submission::SubmissionRecord;
use crate::domain::types::{CorrelationId, Environment};
use crate::domain::xml::{parse_document, Element, QName};
use crate::infra::error::SifenResult;
use crate::infra::logging::Logger;
use crate::services::lote::{self, LotePackage};

/// What a submit produced.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub package: LotePackage,
    pub result: SubmissionResult,
    /// Present when the lote was queued
    pub record: Option<SubmissionRecord>,
}

pub struct SubmitWorkflow<'a, T: SifenTransport> {
    transport: T,
    environment: Environment,
    store: Option<&'a SubmissionStore>,
    logger: Logger,
}

impl<'a, T: SifenTransport> SubmitWorkflow<'a, T> {
    pub fn new(transport: T, environment: Environment, logger: &Logger) -> Self {
        Self {
            transport,
            environment,
            store: None,
            logger: logger.child("submit"),
        }
    }

    /// Persist a record for every queued lote.
    #[must_use]
    pub fn with_store(mut self, store: &'a SubmissionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Assemble and send one signed document.
    pub fn submit(
        &mut self,
        signed: &Element,
        correlation_id: &CorrelationId,
    ) -> SifenResult<SubmitOutcome> {
        let package = lote::assemble(signed, correlation_id, &self.logger)?;
        self.submit_package(package)
    }

    /// Send an already assembled package.
    pub fn submit_package(&mut self, package: LotePackage) -> SifenResult<SubmitOutcome> {
        let result = self.transport.submit_lote(&package)?;
        if let Some(status) = result.status() {
            self.logger
                .info(&format!("dId={} -> {} {status}", package.correlation_id, result.class()));
        }

        let record = match &result {
            SubmissionResult::Queued { protocol, status } => {
                let mut record = SubmissionRecord::new(
                    protocol.clone(),
                    self.environment,
                    package.correlation_id.as_str(),
                    document_ids(&package),
                );
                record.last_code = Some(status.code.clone());
                record.last_message = Some(status.message.clone());
                if let Some(store) = self.store {
                    store.save(&record)?;
                }
                Some(record)
            }
            _ => None,
        };
        Ok(SubmitOutcome {
            package,
            result,
            record,
        })
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

fn document_ids(package: &LotePackage) -> Vec<String> {
    parse_document(&package.lote_xml)
        .map(|root| {
            root.descendants_named(&QName::sifen(DE))
                .into_iter()
                .filter_map(|de| de.attribute("Id").map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
