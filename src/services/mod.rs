//! Service layer module root.
//! Contains the document, signature, packaging and response services.

pub mod cert_validator;
pub mod classifier;
pub mod de_builder;
pub mod error_parser;
pub mod lote;
pub mod normalizer;
pub mod ordering;
pub mod soap;
pub mod xmldsig;

pub use cert_validator::{CertificateAnalysis, CertificateUse, CertificateValidator};
pub use classifier::{classify_code, classify_document_query, classify_status, classify_submission};
pub use de_builder::build_rde;
pub use error_parser::{is_malformation_text, parse_expected_found};
pub use lote::{assemble, LotePackage};
pub use normalizer::{normalize, structural_violations, wrap_if_needed, NormalizeReport};
pub use ordering::OrderingTable;
pub use xmldsig::XmlSigner;
