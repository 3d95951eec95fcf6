//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - Certificate and key loading (PKCS#12 or PEM) with trust checks
//! - mTLS SOAP communication with the authority, with retry logic
//! - The transport trait the pipelines are written against
//! - File persistence of submission records

pub mod credentials;
pub mod sifen_http_client;
pub mod submission_store;
pub mod transport;

pub use credentials::{resolve_credentials, CredentialSource, SigningMaterial};
pub use sifen_http_client::{SifenHttpClient, SifenHttpConfig};
pub use submission_store::SubmissionStore;
pub use transport::SifenTransport;
