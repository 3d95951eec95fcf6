//! Workflow pipelines orchestrating stateless services.

pub mod autofix;
pub mod poll;
pub mod sign;
pub mod submit;
pub mod verify;

pub use autofix::{AutofixLoop, AutofixOptions, AutofixOutcome, AutofixReport, AutofixState};
pub use poll::{poll_until_terminal, PollOptions};
pub use sign::{document_cdc, unwrap_single, SignWorkflow, SignedDocument};
pub use submit::{SubmitOutcome, SubmitWorkflow};
pub use verify::{DocumentReport, VerifyWorkflow};
