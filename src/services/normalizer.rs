//! Structural normalizer.
//!
//! Brings a document tree into the exact shape the validator accepts before
//! it is signed: canonical child order, no comments, no whitespace between
//! tags, no unused or repeated namespace declarations and no
//! `xsi:schemaLocation` below the root. Each pass is callable on its own;
//! [`normalize`] runs them all in a fixed order.
//!
//! Once a document is signed the only permitted change is wrapping its `rDE`
//! in `rLoteDE`, which leaves the signed `DE` bytes untouched.

use crate::domain::constants::{DE, LOTE_ROOT, RDE, SIFEN_NS, XSI_NS};
use crate::domain::types::SchemaVersion;
use crate::domain::xml::{Element, NamespaceDecl, Node, QName};
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use crate::services::ordering::{is_signature, OrderingTable};

/// Counters for what a normalization run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub comments_removed: usize,
    pub whitespace_removed: usize,
    pub schema_locations_removed: usize,
    pub declarations_pruned: usize,
    pub parents_reordered: usize,
}

impl NormalizeReport {
    #[must_use]
    pub fn changed(&self) -> bool {
        *self != NormalizeReport::default()
    }
}

/// Run every pass. The tree is modified in place.
pub fn normalize(
    root: &mut Element,
    table: &OrderingTable,
    version: SchemaVersion,
    logger: &Logger,
) -> NormalizeReport {
    let report = NormalizeReport {
        comments_removed: remove_comments(root),
        whitespace_removed: strip_insignificant_whitespace(root),
        schema_locations_removed: strip_inner_schema_location(root),
        declarations_pruned: prune_namespace_declarations(root),
        parents_reordered: reorder_tree(root, table, version),
    };
    if report.changed() {
        logger.debug(&format!("normalized <{}>: {report:?}", root.local));
    }
    report
}

/// Relocate `parent`'s element children to follow `order`.
///
/// Matching is by (namespace, local name). Children missing from `order`
/// keep their relative order after the ordered ones; absent names are simply
/// skipped. Text and comment nodes stay in their slots. Returns whether
/// anything moved.
pub fn reorder_siblings(parent: &mut Element, order: &[QName]) -> bool {
    let rank = |el: &Element| {
        order
            .iter()
            .position(|name| el.is(name))
            .unwrap_or(order.len())
    };

    let slots: Vec<usize> = parent
        .children
        .iter()
        .enumerate()
        .filter(|(_, node)| matches!(node, Node::Element(_)))
        .map(|(i, _)| i)
        .collect();
    let mut elements: Vec<Element> = slots
        .iter()
        .filter_map(|&i| match &parent.children[i] {
            Node::Element(el) => Some(el.clone()),
            _ => None,
        })
        .collect();

    let before: Vec<QName> = elements.iter().map(Element::qname).collect();
    elements.sort_by_key(|el| rank(el));
    let moved = elements
        .iter()
        .zip(&before)
        .any(|(el, name)| !el.is(name));
    if !moved {
        return false;
    }
    for (slot, element) in slots.into_iter().zip(elements) {
        parent.children[slot] = Node::Element(element);
    }
    true
}

/// Apply the table to every element that has an entry. Returns the number
/// of parents whose children moved.
pub fn reorder_tree(root: &mut Element, table: &OrderingTable, version: SchemaVersion) -> usize {
    let mut count = 0;
    if let Some(order) = table.lookup(version, &root.qname()) {
        if reorder_siblings(root, order) {
            count += 1;
        }
    }
    for child in root.child_elements_mut() {
        count += reorder_tree(child, table, version);
    }
    count
}

/// Remove whitespace-only text nodes from elements that have element
/// children. Leaf text is never touched.
pub fn strip_insignificant_whitespace(root: &mut Element) -> usize {
    let mut removed = 0;
    if root.child_elements().next().is_some() {
        let before = root.children.len();
        root.children
            .retain(|node| !matches!(node, Node::Text(t) if t.trim().is_empty()));
        removed += before - root.children.len();
    }
    for child in root.child_elements_mut() {
        removed += strip_insignificant_whitespace(child);
    }
    removed
}

/// Drop all comment nodes.
pub fn remove_comments(root: &mut Element) -> usize {
    let before = root.children.len();
    root.children.retain(|node| !matches!(node, Node::Comment(_)));
    let mut removed = before - root.children.len();
    for child in root.child_elements_mut() {
        removed += remove_comments(child);
    }
    removed
}

/// Remove `xsi:schemaLocation` from every element except the root.
pub fn strip_inner_schema_location(root: &mut Element) -> usize {
    fn strip(element: &mut Element) -> usize {
        let before = element.attributes.len();
        element.attributes.retain(|a| {
            !(a.local == "schemaLocation" && a.namespace.as_deref() == Some(XSI_NS))
        });
        let mut removed = before - element.attributes.len();
        for child in element.child_elements_mut() {
            removed += strip(child);
        }
        removed
    }
    root.child_elements_mut().map(strip).sum()
}

/// Remove namespace declarations that repeat a binding already in scope or
/// that nothing in their subtree uses.
pub fn prune_namespace_declarations(root: &mut Element) -> usize {
    prune(root, &[])
}

fn prune(element: &mut Element, in_scope: &[NamespaceDecl]) -> usize {
    let before = element.namespace_decls.len();
    let decls = std::mem::take(&mut element.namespace_decls);
    for decl in decls {
        let redundant = in_scope
            .iter()
            .rev()
            .find(|d| d.prefix == decl.prefix)
            .is_some_and(|d| d.uri == decl.uri);
        if !redundant && subtree_uses(element, &decl) {
            element.namespace_decls.push(decl);
        }
    }
    let mut removed = before - element.namespace_decls.len();

    let mut scope = in_scope.to_vec();
    scope.extend(element.namespace_decls.iter().cloned());
    for child in element.child_elements_mut() {
        removed += prune(child, &scope);
    }
    removed
}

fn subtree_uses(element: &Element, decl: &NamespaceDecl) -> bool {
    let uri = (!decl.uri.is_empty()).then_some(decl.uri.as_str());
    let element_uses = element.prefix == decl.prefix && element.namespace.as_deref() == uri;
    let attribute_uses = decl.prefix.is_some()
        && element
            .attributes
            .iter()
            .any(|a| a.prefix == decl.prefix && a.namespace.as_deref() == uri);
    element_uses
        || attribute_uses
        || element.child_elements().any(|child| {
            // a child re-declaring the prefix shadows this binding
            let shadowed = child.namespace_decls.iter().any(|d| d.prefix == decl.prefix);
            !shadowed && subtree_uses(child, decl)
        })
}

/// Normalize the root to the `rLoteDE` shape.
///
/// A bare `rDE` is wrapped; an existing `rLoteDE` is checked. Every `rDE`
/// must hold exactly one `DE`, so the number of wrapper references always
/// equals the number of documents. A bare `DE` or a nested `rLoteDE` is a
/// structure error.
pub fn wrap_if_needed(root: Element) -> SifenResult<Element> {
    let lote = QName::sifen(LOTE_ROOT);
    let rde = QName::sifen(RDE);

    let wrapped = if root.is(&lote) {
        if root.child_elements().any(|c| c.find_descendant(&lote).is_some()) {
            return Err(SifenError::StructureError(
                "rLoteDE is wrapped twice".to_string(),
            ));
        }
        root
    } else if root.is(&rde) {
        let mut wrapper = Element::with_default_namespace(&lote);
        let mut inner = root;
        inner
            .namespace_decls
            .retain(|d| !(d.prefix.is_none() && d.uri == SIFEN_NS));
        wrapper.push(inner);
        wrapper
    } else if root.is(&QName::sifen(DE)) {
        return Err(SifenError::StructureError(
            "bare DE found; documents must be inside rDE before signing".to_string(),
        ));
    } else {
        return Err(SifenError::StructureError(format!(
            "unexpected root element <{}>",
            root.qname()
        )));
    };

    check_document_count(&wrapped)?;
    Ok(wrapped)
}

fn check_document_count(lote: &Element) -> SifenResult<()> {
    let rde = QName::sifen(RDE);
    let de = QName::sifen(DE);
    let wrappers: Vec<&Element> = lote.child_elements().filter(|c| c.is(&rde)).collect();
    if wrappers.is_empty() {
        return Err(SifenError::StructureError(
            "rLoteDE contains no rDE".to_string(),
        ));
    }
    let documents = lote.descendants_named(&de).len();
    if wrappers.iter().any(|w| w.child_elements().filter(|c| c.is(&de)).count() != 1)
        || documents != wrappers.len()
    {
        return Err(SifenError::StructureError(format!(
            "reference count mismatch: {} rDE wrappers for {documents} DE",
            wrappers.len()
        )));
    }
    Ok(())
}

/// Every rule a lote payload must satisfy, as human-readable violations.
/// An empty list means the tree is ready to package.
#[must_use]
pub fn structural_violations(root: &Element) -> Vec<String> {
    let mut problems = Vec::new();
    collect_node_violations(root, &mut problems);

    for rde in root.descendants_named(&QName::sifen(RDE)) {
        let children: Vec<&Element> = rde.child_elements().collect();
        let de_positions: Vec<usize> = children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is(&QName::sifen(DE)))
            .map(|(i, _)| i)
            .collect();
        let signatures: Vec<usize> = children
            .iter()
            .enumerate()
            .filter(|(_, c)| is_signature(&c.qname()))
            .map(|(i, _)| i)
            .collect();
        match (de_positions.as_slice(), signatures.as_slice()) {
            ([de], [sig]) if *sig == de + 1 => {
                let id = children[*de].attribute("Id").unwrap_or_default();
                let signature = children[*sig];
                if signature.prefix.is_some() {
                    problems.push("Signature must use the default namespace, not a prefix".into());
                }
                let uri = signature
                    .find_descendant(&QName::dsig("Reference"))
                    .and_then(|r| r.attribute("URI"));
                if id.is_empty() || uri != Some(format!("#{id}").as_str()) {
                    problems.push(format!(
                        "Signature reference {uri:?} does not match DE Id '{id}'"
                    ));
                }
            }
            ([_], []) => problems.push("rDE has no Signature".into()),
            ([_], [_]) => problems.push("Signature is not the sibling right after DE".into()),
            ([_], _) => problems.push("rDE has more than one Signature".into()),
            _ => problems.push(format!("rDE holds {} DE elements", de_positions.len())),
        }
    }
    problems
}

fn collect_node_violations(element: &Element, problems: &mut Vec<String>) {
    let has_elements = element.child_elements().next().is_some();
    for node in &element.children {
        match node {
            Node::Comment(_) => problems.push(format!("comment inside <{}>", element.local)),
            Node::Text(t) if has_elements && t.trim().is_empty() => {
                problems.push(format!("whitespace between tags inside <{}>", element.local));
            }
            _ => {}
        }
    }
    for child in element.child_elements() {
        collect_node_violations(child, problems);
    }
}
