//! Lote status polling.
//!
//! Queries a queued lote until it reaches a terminal state or the attempt
//! budget runs out. When the authority answers that the lote can no longer be
//! queried (0364), every CDC in the record is queried individually and the
//! answers are folded into one result.

use std::thread;
use std::time::Duration;

use crate::adapters::submission_store::SubmissionStore;
use crate::adapters::transport::SifenTransport;
use crate::domain::cdc::Cdc;
use crate::domain::response::{ResponseClass, StatusResult};
use crate::domain::submission::SubmissionRecord;
use crate::infra::config::SifenConfiguration;
use crate::infra::error::SifenResult;
use crate::infra::logging::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl From<&SifenConfiguration> for PollOptions {
    fn from(cfg: &SifenConfiguration) -> Self {
        Self {
            interval: cfg.poll_interval(),
            max_attempts: cfg.max_poll_attempts.max(1),
        }
    }
}

/// Poll `record` until terminal. The record is updated (and saved when a
/// store is given) after every answer.
///
/// Returns the last result; a lote still processing when the budget runs
/// out comes back as [`StatusResult::Processing`].
pub fn poll_until_terminal<T: SifenTransport + ?Sized>(
    transport: &mut T,
    record: &mut SubmissionRecord,
    options: PollOptions,
    store: Option<&SubmissionStore>,
    logger: &Logger,
) -> SifenResult<StatusResult> {
    let logger = logger.child("poll");
    let mut polls = 0;
    loop {
        polls += 1;
        let result = transport.query_lote(&record.protocol)?;
        record.record_poll(&result);
        if let Some(store) = store {
            store.save(record)?;
        }
        logger.info(&format!(
            "protocol {} poll {polls}/{}: {} ({:?})",
            record.protocol,
            options.max_attempts,
            result.class(),
            record.status
        ));

        match result.class() {
            ResponseClass::AcceptedQueued if polls < options.max_attempts => {
                thread::sleep(options.interval);
            }
            ResponseClass::AcceptedQueued => {
                logger.warn(&format!(
                    "protocol {} still processing after {polls} polls",
                    record.protocol
                ));
                return Ok(result);
            }
            ResponseClass::TimeWindowExpired => {
                return query_individually(transport, record, result, &logger);
            }
            _ => return Ok(result),
        }
    }
}

/// Fold per-CDC queries into one `Completed` result. The first answer that
/// is not a completed document is returned as-is.
fn query_individually<T: SifenTransport + ?Sized>(
    transport: &mut T,
    record: &SubmissionRecord,
    expired: StatusResult,
    logger: &Logger,
) -> SifenResult<StatusResult> {
    let Some(status) = expired.status().cloned() else {
        return Ok(expired);
    };
    if record.cdcs.is_empty() {
        logger.warn("lote query window expired and no CDCs are on record");
        return Ok(expired);
    }

    let mut documents = Vec::with_capacity(record.cdcs.len());
    for code in &record.cdcs {
        let cdc = Cdc::parse(code)?;
        logger.info(&format!("querying CDC {cdc} individually"));
        match transport.query_document(&cdc)? {
            StatusResult::Completed { documents: found, .. } => documents.extend(found),
            other => return Ok(other),
        }
    }
    Ok(StatusResult::Completed { status, documents })
}
