//! Auto-fix loop.
//!
//! Submits a document and, when the validator rejects it with an
//! "expected element X instead of Y" complaint, moves or inserts X right
//! before Y, re-signs and resubmits. Any other rejection ends the loop.
//!
//! ```text
//! Assembling -> Signing -> Submitting -> AwaitingResult
//!     ^                                      |
//!     +------------- Correcting <------------+--> Accepted | FatalError | Exhausted
//! ```
//!
//! The ordering table is applied once, before the first iteration. From then
//! on the only structural changes are the corrections themselves, so every
//! variant differs from the previous one by exactly one move or insert.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::adapters::transport::SifenTransport;
use crate::domain::response::{
    DocumentOutcome, ExpectedFound, ResponseClass, StatusResult, SubmissionResult,
};
use crate::domain::submission::SubmissionRecord;
use crate::domain::types::{CorrelationId, Environment};
use crate::domain::xml::{serialize_document, Element, Node, QName};
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use crate::pipelines::poll::{poll_until_terminal, PollOptions};
use crate::pipelines::sign::{SignWorkflow, SignedDocument};
use crate::services::lote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutofixState {
    Assembling,
    Signing,
    Submitting,
    AwaitingResult,
    Correcting,
    Accepted,
    FatalError,
    Exhausted,
}

impl AutofixState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AutofixState::Accepted | AutofixState::FatalError | AutofixState::Exhausted
        )
    }
}

/// What a correction did to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum CorrectionAction {
    /// `expected` already existed under the parent and was moved
    Moved,
    /// `expected` was created with this text
    Inserted { placeholder: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub pair: ExpectedFound,
    pub parent: String,
    pub action: CorrectionAction,
    /// How many `found` elements the document holds; only the first is used
    pub found_count: usize,
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            CorrectionAction::Moved => write!(
                f,
                "moved <{}> before <{}> in <{}>",
                self.pair.expected, self.pair.found, self.parent
            ),
            CorrectionAction::Inserted { placeholder } => write!(
                f,
                "inserted <{}>{} before <{}> in <{}>",
                self.pair.expected,
                placeholder
                    .as_deref()
                    .map(|p| format!("={p}"))
                    .unwrap_or_default(),
                self.pair.found,
                self.parent
            ),
        }
    }
}

/// One line of the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    pub iteration: u32,
    /// Literal validator text, empty when the iteration was accepted
    pub error_text: String,
    pub correction: Option<Correction>,
    /// SHA-256 (hex) of the variant produced by this iteration
    pub variant_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutofixOutcome {
    Accepted {
        signed: SignedDocument,
        status: StatusResult,
    },
    FatalError {
        reason: String,
    },
    Exhausted {
        reason: String,
    },
}

impl AutofixOutcome {
    #[must_use]
    pub fn state(&self) -> AutofixState {
        match self {
            AutofixOutcome::Accepted { .. } => AutofixState::Accepted,
            AutofixOutcome::FatalError { .. } => AutofixState::FatalError,
            AutofixOutcome::Exhausted { .. } => AutofixState::Exhausted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutofixReport {
    pub outcome: AutofixOutcome,
    pub session: Vec<SessionEntry>,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct AutofixOptions {
    pub max_iterations: u32,
    pub environment: Environment,
    pub poll: PollOptions,
}

/// Drives one document to acceptance through a [`SifenTransport`].
pub struct AutofixLoop<'a, T: SifenTransport> {
    transport: T,
    signer: &'a SignWorkflow,
    options: AutofixOptions,
    state: AutofixState,
    logger: Logger,
}

impl<'a, T: SifenTransport> AutofixLoop<'a, T> {
    pub fn new(transport: T, signer: &'a SignWorkflow, options: AutofixOptions, logger: &Logger) -> Self {
        Self {
            transport,
            signer,
            options,
            state: AutofixState::Assembling,
            logger: logger.child("autofix"),
        }
    }

    #[must_use]
    pub fn state(&self) -> AutofixState {
        self.state
    }

    fn enter(&mut self, state: AutofixState) {
        self.logger.debug(&format!("{:?} -> {state:?}", self.state));
        self.state = state;
    }

    /// Run the loop on an unsigned `rDE`.
    pub fn run(&mut self, unsigned: Element) -> SifenResult<AutofixReport> {
        let mut variant = unsigned;
        self.signer.prepare(&mut variant);

        let mut session = Vec::new();
        let mut previous_pair: Option<ExpectedFound> = None;
        let mut iteration = 0;

        let outcome = loop {
            if iteration >= self.options.max_iterations {
                break AutofixOutcome::Exhausted {
                    reason: format!("no acceptance after {iteration} iterations"),
                };
            }
            iteration += 1;

            self.enter(AutofixState::Assembling);
            let hash = variant_hash(&variant);
            self.enter(AutofixState::Signing);
            let signed = self.signer.sign_variant(&variant)?;
            self.enter(AutofixState::Submitting);
            let package = lote::assemble(&signed.rde, &CorrelationId::generate(), &self.logger)?;
            let result = self.transport.submit_lote(&package)?;
            self.enter(AutofixState::AwaitingResult);

            let verdict = match result {
                SubmissionResult::Accepted { status } => {
                    Verdict::Accepted(StatusResult::Completed {
                        documents: vec![DocumentOutcome::approved(
                            signed.cdc.as_str(),
                            status.clone(),
                        )],
                        status,
                    })
                }
                SubmissionResult::Queued { protocol, .. } => {
                    let mut record = SubmissionRecord::new(
                        protocol,
                        self.options.environment,
                        package.correlation_id.as_str(),
                        vec![signed.cdc.as_str().to_string()],
                    );
                    let status = poll_until_terminal(
                        &mut self.transport,
                        &mut record,
                        self.options.poll,
                        None,
                        &self.logger,
                    )?;
                    Verdict::from_status(status)
                }
                SubmissionResult::TechnicalMalformation { status, pair } => match pair {
                    Some(pair) => Verdict::Correct(status.message, pair),
                    None => Verdict::Fatal(format!("malformation without element pair: {status}")),
                },
                SubmissionResult::BusinessRejection { status } => {
                    Verdict::Fatal(format!("business rejection {status}"))
                }
                SubmissionResult::Unknown { detail } => {
                    Verdict::Fatal(format!("unclassified response: {detail}"))
                }
            };

            match verdict {
                Verdict::Accepted(status) => {
                    self.log_iteration(&mut session, iteration, String::new(), None, hash);
                    break AutofixOutcome::Accepted {
                        signed,
                        status,
                    };
                }
                Verdict::Pending(reason) => {
                    self.log_iteration(&mut session, iteration, reason.clone(), None, hash);
                    break AutofixOutcome::Exhausted { reason };
                }
                Verdict::Fatal(reason) => {
                    self.log_iteration(&mut session, iteration, reason.clone(), None, hash);
                    break AutofixOutcome::FatalError { reason };
                }
                Verdict::Correct(error_text, pair) => {
                    self.enter(AutofixState::Correcting);
                    if previous_pair.as_ref() == Some(&pair) {
                        self.log_iteration(&mut session, iteration, error_text, None, hash);
                        break AutofixOutcome::Exhausted {
                            reason: format!("same complaint twice in a row: {pair}"),
                        };
                    }
                    let correction = match apply_correction(&mut variant, &pair) {
                        Ok(correction) if correction.found_count > 1 => {
                            self.logger.warn(format!(
                                "<{}> occurs {} times, corrected under the first <{}>",
                                pair.found, correction.found_count, correction.parent
                            ));
                            correction
                        }
                        Ok(correction) => correction,
                        Err(e) => {
                            self.log_iteration(&mut session, iteration, error_text, None, hash);
                            break AutofixOutcome::FatalError {
                                reason: format!("cannot apply {pair}: {e}"),
                            };
                        }
                    };
                    let new_hash = variant_hash(&variant);
                    let unchanged = new_hash == hash;
                    self.log_iteration(
                        &mut session,
                        iteration,
                        error_text,
                        Some(correction),
                        new_hash,
                    );
                    if unchanged {
                        break AutofixOutcome::Exhausted {
                            reason: format!("correction for {pair} left the document unchanged"),
                        };
                    }
                    previous_pair = Some(pair);
                }
            }
        };

        self.enter(outcome.state());
        Ok(AutofixReport {
            outcome,
            session,
            iterations: iteration,
        })
    }

    fn log_iteration(
        &self,
        session: &mut Vec<SessionEntry>,
        iteration: u32,
        error_text: String,
        correction: Option<Correction>,
        variant_hash: String,
    ) {
        self.logger.info(&format!(
            "iteration {iteration}: error={error_text:?} correction={} variant={variant_hash}",
            correction
                .as_ref()
                .map_or_else(|| "none".to_string(), ToString::to_string)
        ));
        session.push(SessionEntry {
            iteration,
            error_text,
            correction,
            variant_hash,
        });
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

enum Verdict {
    Accepted(StatusResult),
    Pending(String),
    Correct(String, ExpectedFound),
    Fatal(String),
}

impl Verdict {
    fn from_status(status: StatusResult) -> Self {
        match status.class() {
            ResponseClass::AcceptedFinal => Verdict::Accepted(status),
            ResponseClass::AcceptedQueued => {
                Verdict::Pending("lote still processing when the poll budget ran out".to_string())
            }
            ResponseClass::TechnicalMalformation => {
                let message = rejection_text(&status);
                match status.malformation_pair().cloned() {
                    Some(pair) => Verdict::Correct(message, pair),
                    None => Verdict::Fatal(format!("malformation without element pair: {message}")),
                }
            }
            class => Verdict::Fatal(format!("{class}: {}", rejection_text(&status))),
        }
    }
}

/// Message of the first rejected document, else the lote-level message.
fn rejection_text(status: &StatusResult) -> String {
    if let StatusResult::Completed { documents, .. } = status {
        if let Some(doc) = documents.iter().find(|d| !d.accepted()) {
            return doc.status.message.clone();
        }
    }
    match status {
        StatusResult::Unknown { detail } => detail.clone(),
        other => other
            .status()
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}

/// SHA-256 hex of the serialized variant.
#[must_use]
pub fn variant_hash(root: &Element) -> String {
    hex::encode(Sha256::digest(serialize_document(root).as_bytes()))
}

/// Text given to an element that has to be created from nothing.
#[must_use]
pub fn placeholder_for(local: &str) -> &'static str {
    match local {
        "dDesTiDE" => "Factura electrónica",
        "iTiDE" | "iTipEmi" | "iTipTra" | "iTImp" | "dSisFact" | "iCondOpe" | "iNatRec"
        | "iTiOpe" | "iIndPres" => "1",
        "dDesTipEmi" => "Normal",
        "dDesTipTra" => "Venta de mercadería",
        "dDesTImp" => "IVA",
        "cMoneOpe" => "PYG",
        "dDesMoneOpe" => "Guarani",
        "dDCondOpe" => "Contado",
        "dDesIndPres" => "Operación presencial",
        "cPaisRec" => "PRY",
        "dDesPaisRe" => "Paraguay",
        "dVerFor" => "150",
        _ => "0",
    }
}

/// Group elements (`gXxx`) hold children, never text.
fn is_group(local: &str) -> bool {
    let mut chars = local.chars();
    chars.next() == Some('g') && chars.next().is_some_and(char::is_uppercase)
}

/// Place `expected` immediately before `found` under `found`'s parent.
///
/// An `expected` element already present elsewhere is moved there, a sibling
/// of `found` first, otherwise the first one in the document that does not
/// enclose `found`. Only when none exists is a new element inserted.
pub fn apply_correction(root: &mut Element, pair: &ExpectedFound) -> SifenResult<Correction> {
    let found = QName::sifen(pair.found.as_str());
    let expected = QName::sifen(pair.expected.as_str());
    let found_count = root.descendants_named(&found).len();
    let parent = root.find_parent_of(&found).ok_or_else(|| {
        SifenError::StructureError(format!("element <{}> not present", pair.found))
    })?;

    let existing = if parent.find_child(&expected).is_some() {
        root.find_parent_of_mut(&found).and_then(|p| {
            let index = p.child_position(&expected)?;
            match p.children.remove(index) {
                Node::Element(el) => Some(el),
                _ => None,
            }
        })
    } else if root
        .descendants_named(&expected)
        .first()
        .is_some_and(|e| e.find_descendant(&found).is_none())
    {
        root.remove_descendant(&expected)
    } else {
        None
    };

    let (element, action) = match existing {
        Some(existing) => (existing, CorrectionAction::Moved),
        None if is_group(&pair.expected) => (
            Element::new(&expected),
            CorrectionAction::Inserted { placeholder: None },
        ),
        None => {
            let text = placeholder_for(&pair.expected);
            (
                Element::text_leaf(&expected, text),
                CorrectionAction::Inserted {
                    placeholder: Some(text.to_string()),
                },
            )
        }
    };

    let parent = root.find_parent_of_mut(&found).ok_or_else(|| {
        SifenError::StructureError(format!("element <{}> vanished", pair.found))
    })?;
    let target = parent.child_position(&found).ok_or_else(|| {
        SifenError::StructureError(format!("element <{}> vanished", pair.found))
    })?;
    parent.children.insert(target, Node::Element(element));

    Ok(Correction {
        pair: pair.clone(),
        parent: parent.local.clone(),
        action,
        found_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::xml::parse_document;

    fn pair(expected: &str, found: &str) -> ExpectedFound {
        ExpectedFound {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    const GTIMB: &str = r#"<rDE xmlns="http://ekuatia.set.gov.py/sifen/xsd"><DE Id="1"><gTimb><iTiDE>1</iTiDE><dNumTim>12345678</dNumTim><dDesTiDE>Factura electrónica</dDesTiDE></gTimb></DE></rDE>"#;

    fn child_names(root: &Element, parent: &str) -> Vec<String> {
        root.find_descendant(&QName::sifen(parent))
            .unwrap()
            .child_elements()
            .map(|c| c.local.clone())
            .collect()
    }

    #[test]
    fn moves_existing_element_before_found() {
        let mut root = parse_document(GTIMB).unwrap();
        let correction = apply_correction(&mut root, &pair("dDesTiDE", "dNumTim")).unwrap();
        assert_eq!(correction.action, CorrectionAction::Moved);
        assert_eq!(correction.parent, "gTimb");
        assert_eq!(child_names(&root, "gTimb"), ["iTiDE", "dDesTiDE", "dNumTim"]);
    }

    #[test]
    fn inserts_missing_element_with_placeholder() {
        let mut root = parse_document(GTIMB).unwrap();
        let correction = apply_correction(&mut root, &pair("dEst", "dDesTiDE")).unwrap();
        assert_eq!(
            correction.action,
            CorrectionAction::Inserted {
                placeholder: Some("0".to_string())
            }
        );
        assert_eq!(
            child_names(&root, "gTimb"),
            ["iTiDE", "dNumTim", "dEst", "dDesTiDE"]
        );
    }

    #[test]
    fn element_under_another_parent_is_moved_not_duplicated() {
        let mut root = parse_document(
            r#"<rDE xmlns="http://ekuatia.set.gov.py/sifen/xsd"><DE Id="1"><gOpeDE><iTipEmi>1</iTipEmi><dDesTiDE>Factura electrónica</dDesTiDE></gOpeDE><gTimb><iTiDE>1</iTiDE><dNumTim>12345678</dNumTim></gTimb></DE></rDE>"#,
        )
        .unwrap();
        let correction = apply_correction(&mut root, &pair("dDesTiDE", "dNumTim")).unwrap();
        assert_eq!(correction.action, CorrectionAction::Moved);
        assert_eq!(correction.parent, "gTimb");
        assert_eq!(child_names(&root, "gTimb"), ["iTiDE", "dDesTiDE", "dNumTim"]);
        assert_eq!(child_names(&root, "gOpeDE"), ["iTipEmi"]);
        let moved = root.descendants_named(&QName::sifen("dDesTiDE"));
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].text(), "Factura electrónica");
    }

    #[test]
    fn enclosing_element_is_not_moved_into_itself() {
        let mut root = parse_document(GTIMB).unwrap();
        let correction = apply_correction(&mut root, &pair("gTimb", "dNumTim")).unwrap();
        assert_eq!(
            correction.action,
            CorrectionAction::Inserted { placeholder: None }
        );
        assert_eq!(root.descendants_named(&QName::sifen("gTimb")).len(), 2);
    }

    #[test]
    fn repeated_found_is_counted() {
        let mut root = parse_document(
            r#"<rDE xmlns="http://ekuatia.set.gov.py/sifen/xsd"><DE Id="1"><gDtipDE><gCamItem><dCodInt>A</dCodInt><dDesProSer>Uno</dDesProSer></gCamItem><gCamItem><dCodInt>B</dCodInt><dDesProSer>Dos</dDesProSer></gCamItem></gDtipDE></DE></rDE>"#,
        )
        .unwrap();
        let correction = apply_correction(&mut root, &pair("dParAranc", "dDesProSer")).unwrap();
        assert_eq!(correction.found_count, 2);
        assert_eq!(correction.parent, "gCamItem");
        assert_eq!(root.descendants_named(&QName::sifen("dParAranc")).len(), 1);

        let mut single = parse_document(GTIMB).unwrap();
        let correction = apply_correction(&mut single, &pair("dDesTiDE", "dNumTim")).unwrap();
        assert_eq!(correction.found_count, 1);
    }

    #[test]
    fn groups_are_inserted_empty() {
        let mut root = parse_document(GTIMB).unwrap();
        apply_correction(&mut root, &pair("gOpeDE", "gTimb")).unwrap();
        let inserted = root.find_descendant(&QName::sifen("gOpeDE")).unwrap();
        assert!(inserted.children.is_empty());
    }

    #[test]
    fn missing_found_is_a_structure_error() {
        let mut root = parse_document(GTIMB).unwrap();
        assert!(matches!(
            apply_correction(&mut root, &pair("dEst", "dNoSuch")),
            Err(SifenError::StructureError(_))
        ));
    }

    #[test]
    fn hash_tracks_content() {
        let mut root = parse_document(GTIMB).unwrap();
        let before = variant_hash(&root);
        assert_eq!(before.len(), 64);
        apply_correction(&mut root, &pair("dDesTiDE", "dNumTim")).unwrap();
        assert_ne!(variant_hash(&root), before);
    }

    #[test]
    fn placeholders_and_groups() {
        assert_eq!(placeholder_for("dDesTiDE"), "Factura electrónica");
        assert_eq!(placeholder_for("dWhatever"), "0");
        assert!(is_group("gCamIVA"));
        assert!(!is_group("gross"));
        assert!(!is_group("dDesTiDE"));
    }
}
