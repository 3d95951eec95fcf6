//! Minimal owned XML element tree.
//!
//! Only what signing and structural normalization need: elements with
//! namespace-resolved names, attributes, namespace declarations, text and
//! comments. Processing instructions and DOCTYPEs are not part of SIFEN
//! documents; PIs are dropped on parse and DOCTYPEs are rejected.
//!
//! Every element stores its resolved namespace URI next to its prefix, so
//! matching is always done on the (namespace, local-name) pair and the
//! canonicalizer never has to re-resolve prefixes.

mod c14n;
mod parse;

pub use c14n::exclusive_c14n;
pub use parse::parse_document;

use crate::domain::constants::{DSIG_NS, SIFEN_NS, XML_DECLARATION};
use std::fmt::Write as _;

/// Namespace-qualified element name used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    #[must_use]
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.into(),
        }
    }

    /// Name in the SIFEN document namespace.
    #[must_use]
    pub fn sifen(local: impl Into<String>) -> Self {
        Self::new(Some(SIFEN_NS), local)
    }

    /// Name in the XMLDSig namespace.
    #[must_use]
    pub fn dsig(local: impl Into<String>) -> Self {
        Self::new(Some(DSIG_NS), local)
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
    pub value: String,
}

impl Attribute {
    #[must_use]
    pub fn plain(local: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: None,
            value: value.into(),
        }
    }

    fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

/// `xmlns` (prefix `None`) or `xmlns:prefix` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
    pub namespace_decls: Vec<NamespaceDecl>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// Unprefixed element in the given namespace, without declarations.
    #[must_use]
    pub fn new(name: &QName) -> Self {
        Self {
            prefix: None,
            local: name.local.clone(),
            namespace: name.namespace.clone(),
            namespace_decls: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element that declares its own namespace as the default.
    #[must_use]
    pub fn with_default_namespace(name: &QName) -> Self {
        let mut element = Self::new(name);
        if let Some(uri) = &name.namespace {
            element.namespace_decls.push(NamespaceDecl {
                prefix: None,
                uri: uri.clone(),
            });
        }
        element
    }

    /// Leaf element holding a single text node.
    #[must_use]
    pub fn text_leaf(name: &QName, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.into()));
        element
    }

    #[must_use]
    pub fn qname(&self) -> QName {
        QName {
            namespace: self.namespace.clone(),
            local: self.local.clone(),
        }
    }

    /// True when namespace and local name both match.
    #[must_use]
    pub fn is(&self, name: &QName) -> bool {
        self.local == name.local && self.namespace == name.namespace
    }

    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }

    /// Value of an un-namespaced attribute.
    #[must_use]
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local == local)
            .map(|a| a.value.as_str())
    }

    pub fn set_attribute(&mut self, local: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.local == local)
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute::plain(local, value)),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    #[must_use]
    pub fn child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    #[must_use]
    pub fn find_child(&self, name: &QName) -> Option<&Element> {
        self.child_elements().find(|c| c.is(name))
    }

    pub fn find_child_mut(&mut self, name: &QName) -> Option<&mut Element> {
        self.child_elements_mut().find(|c| c.is(name))
    }

    /// Index into `children` of the first child element with this name.
    #[must_use]
    pub fn child_position(&self, name: &QName) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(el) if el.is(name)))
    }

    /// Depth-first search including `self`.
    #[must_use]
    pub fn find_descendant(&self, name: &QName) -> Option<&Element> {
        if self.is(name) {
            return Some(self);
        }
        self.child_elements().find_map(|c| c.find_descendant(name))
    }

    /// All elements with this name, document order, including `self`.
    #[must_use]
    pub fn descendants_named(&self, name: &QName) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &QName, out: &mut Vec<&'a Element>) {
        if self.is(name) {
            out.push(self);
        }
        for child in self.child_elements() {
            child.collect_named(name, out);
        }
    }

    /// Element carrying `Id="<id>"`, searched depth-first.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        if self.attribute("Id") == Some(id) {
            return Some(self);
        }
        self.child_elements().find_map(|c| c.find_by_id(id))
    }

    /// Closest element (possibly `self`) that has a direct child with this name.
    pub fn find_parent_of_mut(&mut self, name: &QName) -> Option<&mut Element> {
        if self.child_elements().any(|c| c.is(name)) {
            return Some(self);
        }
        for child in self.child_elements_mut() {
            if let Some(parent) = child.find_parent_of_mut(name) {
                return Some(parent);
            }
        }
        None
    }

    /// Detach the first element with this name below `self`, in document
    /// order. `self` itself is never removed.
    pub fn remove_descendant(&mut self, name: &QName) -> Option<Element> {
        for index in 0..self.children.len() {
            let matched = match &mut self.children[index] {
                Node::Element(child) if child.is(name) => true,
                Node::Element(child) => {
                    if let Some(removed) = child.remove_descendant(name) {
                        return Some(removed);
                    }
                    false
                }
                _ => false,
            };
            if matched {
                return match self.children.remove(index) {
                    Node::Element(el) => Some(el),
                    _ => None,
                };
            }
        }
        None
    }

    #[must_use]
    pub fn find_parent_of(&self, name: &QName) -> Option<&Element> {
        if self.child_elements().any(|c| c.is(name)) {
            return Some(self);
        }
        self.child_elements().find_map(|c| c.find_parent_of(name))
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text of the first descendant with the given name.
    #[must_use]
    pub fn descendant_text(&self, name: &QName) -> Option<String> {
        self.find_descendant(name).map(Element::text)
    }

    /// Serialize this subtree as written (prefixes and declarations kept).
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

/// Serialize a full document: fixed declaration immediately followed by the
/// root element, no whitespace in between.
#[must_use]
pub fn serialize_document(root: &Element) -> String {
    let mut out = String::from(XML_DECLARATION);
    write_element(root, &mut out);
    out
}

fn write_element(element: &Element, out: &mut String) {
    let name = element.qualified_name();
    out.push('<');
    out.push_str(&name);
    for decl in &element.namespace_decls {
        match &decl.prefix {
            Some(p) => {
                let _ = write!(out, " xmlns:{p}=\"{}\"", escape_attribute(&decl.uri));
            }
            None => {
                let _ = write!(out, " xmlns=\"{}\"", escape_attribute(&decl.uri));
            }
        }
    }
    for attr in &element.attributes {
        let _ = write!(
            out,
            " {}=\"{}\"",
            attr.qualified_name(),
            escape_attribute(&attr.value)
        );
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            Node::Element(el) => write_element(el, out),
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Comment(comment) => {
                let _ = write!(out, "<!--{comment}-->");
            }
        }
    }
    let _ = write!(out, "</{name}>");
}

/// Text escaping shared by the serializer and the canonicalizer.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        parse_document(
            r#"<rDE xmlns="http://ekuatia.set.gov.py/sifen/xsd"><dVerFor>150</dVerFor><DE Id="1"><gTimb><dNumTim>12345678</dNumTim></gTimb></DE></rDE>"#,
        )
        .unwrap()
    }

    #[test]
    fn lookups_use_namespace_and_local_name() {
        let root = sample();
        assert!(root.find_descendant(&QName::sifen("dNumTim")).is_some());
        assert!(root.find_descendant(&QName::new(None, "dNumTim")).is_none());
        assert_eq!(root.find_by_id("1").map(|e| e.local.as_str()), Some("DE"));
    }

    #[test]
    fn find_parent_of_returns_direct_parent() {
        let mut root = sample();
        let parent = root.find_parent_of_mut(&QName::sifen("dNumTim")).unwrap();
        assert_eq!(parent.local, "gTimb");
    }

    #[test]
    fn remove_descendant_takes_the_first_in_document_order() {
        let mut root = parse_document(
            r#"<a xmlns="http://ekuatia.set.gov.py/sifen/xsd"><b><x>1</x></b><x>2</x></a>"#,
        )
        .unwrap();
        let x = QName::sifen("x");
        assert_eq!(root.remove_descendant(&x).map(|e| e.text()).as_deref(), Some("1"));
        assert_eq!(root.descendants_named(&x).len(), 1);
        assert!(root.remove_descendant(&QName::sifen("a")).is_none());
    }

    #[test]
    fn serialization_is_stable() {
        let root = sample();
        let once = serialize_document(&root);
        let twice = serialize_document(&parse_document(&once).unwrap());
        assert_eq!(once, twice);
        assert!(once.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><rDE"#));
    }

    #[test]
    fn escaping() {
        let el = Element::text_leaf(&QName::sifen("dNomEmi"), "A & B <C>");
        assert_eq!(el.to_xml(), "<dNomEmi>A &amp; B &lt;C&gt;</dNomEmi>");
    }
}
