//! `VerifyWorkflow`: high-level facade for checking a signed document.
//!
//! Combines the signature check with the CDC and packaging rules so a file
//! can be vetted locally before anything is sent.

use crate::domain::cdc::{self, ValidationResult};
use crate::domain::constants::DE;
use crate::domain::verification::SignatureReport;
use crate::domain::xml::{parse_document, QName};
use crate::services::normalizer::{structural_violations, wrap_if_needed};
use crate::services::xmldsig::verify_tree;

/// Everything known about a signed document.
#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    pub signature: SignatureReport,
    /// CDC check of `DE@Id`, when present and well formed
    pub cdc: Option<ValidationResult>,
    /// Reasons the document could not be packaged as-is
    pub structure: Vec<String>,
}

impl DocumentReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.signature.success() && self.cdc.as_ref().is_some_and(|c| c.ok) && self.structure.is_empty()
    }
}

#[derive(Default)]
pub struct VerifyWorkflow;

impl VerifyWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run all checks over a serialized `rDE` or `rLoteDE`.
    #[must_use]
    pub fn run(&self, xml: &str) -> DocumentReport {
        let root = match parse_document(xml) {
            Ok(root) => root,
            Err(e) => {
                return DocumentReport {
                    structure: vec![format!("document does not parse: {e}")],
                    ..DocumentReport::default()
                }
            }
        };

        let cdc = root
            .find_descendant(&QName::sifen(DE))
            .and_then(|de| de.attribute("Id"))
            .and_then(|id| cdc::validate(id).ok());
        let structure = match wrap_if_needed(root.clone()) {
            Ok(lote) => structural_violations(&lote),
            Err(e) => vec![e.to_string()],
        };

        DocumentReport {
            signature: verify_tree(&root),
            cdc,
            structure,
        }
    }
}
