//! SIFEN Signer Library
//!
//! Builds, signs and submits electronic tax documents for Paraguay's SIFEN
//! service. Documents are signed with enveloped XMLDSig (exclusive C14N,
//! SHA-256, RSA-SHA256), packaged as a single-entry ZIP lote and sent over
//! mutual TLS. Technical rejections of the form "expected X instead of Y"
//! can be corrected automatically by the auto-fix loop.
//!
//! Layers:
//! - [`domain`]: CDC, XML tree and canonicalization, response and record types
//! - [`services`]: stateless building blocks (builder, normalizer, signer, lote)
//! - [`adapters`]: credentials, HTTP transport, submission store
//! - [`pipelines`]: sign, submit, poll, verify and auto-fix workflows
//! - [`infra`]: configuration, errors and the logger handle

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use adapters::{
    resolve_credentials, CredentialSource, SifenHttpClient, SifenHttpConfig, SifenTransport,
    SigningMaterial, SubmissionStore,
};
pub use domain::cdc::{Cdc, CdcFields, ValidationResult};
pub use domain::document::DocumentFields;
pub use domain::response::{
    ExitClass, ExpectedFound, ResponseClass, ResponseStatus, StatusResult, SubmissionResult,
};
pub use domain::submission::{SubmissionRecord, SubmissionStatus};
pub use domain::types::{CertPassword, CorrelationId, Environment, ProtocolId, SchemaVersion};
pub use infra::config::{ConfigManager, ExportFormat, SifenConfiguration};
pub use infra::error::{SifenError, SifenResult};
pub use infra::logging::Logger;
pub use pipelines::{
    AutofixLoop, AutofixOptions, AutofixOutcome, AutofixReport, PollOptions, SignWorkflow,
    SignedDocument, SubmitWorkflow, VerifyWorkflow,
};
pub use services::OrderingTable;
