//! Transport seam between the pipelines and the authority.
//!
//! The pipelines only talk to [`SifenTransport`]; the mTLS SOAP client is one
//! implementation, scripted transports in tests are another.

use crate::domain::cdc::Cdc;
use crate::domain::response::{StatusResult, SubmissionResult};
use crate::domain::types::ProtocolId;
use crate::infra::error::SifenResult;
use crate::services::lote::LotePackage;

/// Operations offered by the authority's web services.
pub trait SifenTransport {
    /// Send a lote for asynchronous processing.
    ///
    /// # Errors
    ///
    /// Returns error only when no classifiable response was obtained
    /// (network failure after retries, unreadable body). Rejections are
    /// results, not errors.
    fn submit_lote(&mut self, package: &LotePackage) -> SifenResult<SubmissionResult>;

    /// Ask for the processing state of a queued lote.
    ///
    /// # Errors
    ///
    /// Same contract as [`SifenTransport::submit_lote`].
    fn query_lote(&mut self, protocol: &ProtocolId) -> SifenResult<StatusResult>;

    /// Ask for the state of one document by its CDC.
    ///
    /// # Errors
    ///
    /// Same contract as [`SifenTransport::submit_lote`].
    fn query_document(&mut self, cdc: &Cdc) -> SifenResult<StatusResult>;
}

impl<T: SifenTransport + ?Sized> SifenTransport for &mut T {
    fn submit_lote(&mut self, package: &LotePackage) -> SifenResult<SubmissionResult> {
        (**self).submit_lote(package)
    }

    fn query_lote(&mut self, protocol: &ProtocolId) -> SifenResult<StatusResult> {
        (**self).query_lote(protocol)
    }

    fn query_document(&mut self, cdc: &Cdc) -> SifenResult<StatusResult> {
        (**self).query_document(cdc)
    }
}
