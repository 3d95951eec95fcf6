//! `SignWorkflow` orchestrates the build, normalize and sign steps.
//!
//! Normalization always happens before signing; once a tree is signed it is
//! handed on unchanged.

use chrono::NaiveDateTime;
use openssl::pkey::{PKey, Private};

use crate::adapters::credentials::SigningMaterial;
use crate::domain::cdc::Cdc;
use crate::domain::constants::{DE, LOTE_ROOT, RDE, SIFEN_NS};
use crate::domain::crypto::CertChain;
use crate::domain::document::DocumentFields;
use crate::domain::types::SchemaVersion;
use crate::domain::xml::{parse_document, serialize_document, Element, NamespaceDecl, QName};
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use crate::services::de_builder::build_rde;
use crate::services::normalizer::{normalize, NormalizeReport};
use crate::services::ordering::OrderingTable;
use crate::services::xmldsig::XmlSigner;

/// A signed `rDE`, its CDC and its serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocument {
    pub rde: Element,
    pub cdc: Cdc,
    pub xml: String,
}

pub struct SignWorkflow {
    key: PKey<Private>,
    chain: CertChain,
    table: OrderingTable,
    version: SchemaVersion,
    logger: Logger,
}

impl SignWorkflow {
    pub fn new(
        material: &SigningMaterial,
        table: OrderingTable,
        version: SchemaVersion,
        logger: &Logger,
    ) -> SifenResult<Self> {
        let chain = material.cert_chain()?;
        let logger = logger.child("sign");
        logger.debug(format!(
            "signer certificate {} bytes, {} issuer(s) in bundle",
            chain.signer().as_der().len(),
            chain.issuers().len()
        ));
        Ok(Self {
            key: material.key.clone(),
            chain,
            table,
            version,
            logger,
        })
    }

    #[must_use]
    pub fn table(&self) -> &OrderingTable {
        &self.table
    }

    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Build a document from fields, then sign it.
    pub fn build_and_sign(
        &self,
        fields: &DocumentFields,
        signed_at: NaiveDateTime,
    ) -> SifenResult<SignedDocument> {
        let (rde, _) = build_rde(fields, signed_at, &self.logger)?;
        self.sign_tree(rde)
    }

    /// Parse, normalize and sign an unsigned document.
    pub fn sign_xml(&self, xml: &str) -> SifenResult<SignedDocument> {
        self.sign_tree(parse_document(xml)?)
    }

    /// Normalize and sign. An `rLoteDE` holding one unsigned `rDE` is
    /// unwrapped first; wrapping happens again at packaging time.
    pub fn sign_tree(&self, root: Element) -> SifenResult<SignedDocument> {
        let mut rde = unwrap_single(root)?;
        self.prepare(&mut rde);
        self.sign_variant(&rde)
    }

    /// Run the structural normalizer with this workflow's table.
    pub fn prepare(&self, rde: &mut Element) -> NormalizeReport {
        normalize(rde, &self.table, self.version, &self.logger)
    }

    /// Sign an already normalized `rDE` without touching its structure.
    pub fn sign_variant(&self, rde: &Element) -> SifenResult<SignedDocument> {
        let cdc = document_cdc(rde)?;
        let signer = XmlSigner::new(&self.key, &self.chain, &self.logger)?;
        let signed = signer.sign(rde)?;
        let xml = serialize_document(&signed);
        Ok(SignedDocument {
            rde: signed,
            cdc,
            xml,
        })
    }
}

/// CDC carried in `DE@Id`, which must have a valid check digit.
pub fn document_cdc(rde: &Element) -> SifenResult<Cdc> {
    let id = rde
        .find_descendant(&QName::sifen(DE))
        .and_then(|de| de.attribute("Id"))
        .ok_or_else(|| SifenError::StructureError("DE has no Id attribute".to_string()))?;
    Cdc::parse(id)
}

/// Take the `rDE` out of an `rLoteDE` that holds exactly one; any other
/// root is returned unchanged.
pub fn unwrap_single(root: Element) -> SifenResult<Element> {
    if !root.is(&QName::sifen(LOTE_ROOT)) {
        return Ok(root);
    }
    let mut wrappers: Vec<Element> = root
        .child_elements()
        .filter(|c| c.is(&QName::sifen(RDE)))
        .cloned()
        .collect();
    if wrappers.len() != 1 {
        return Err(SifenError::StructureError(format!(
            "can only sign a lote with one rDE, found {}",
            wrappers.len()
        )));
    }
    let mut rde = wrappers.remove(0);
    if !rde
        .namespace_decls
        .iter()
        .any(|d| d.prefix.is_none() && d.uri == SIFEN_NS)
    {
        rde.namespace_decls.push(NamespaceDecl {
            prefix: None,
            uri: SIFEN_NS.to_string(),
        });
    }
    Ok(rde)
}
