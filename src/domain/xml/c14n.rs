//! Exclusive XML Canonicalization 1.0 (without comments, empty prefix list).

use super::{escape_attribute, escape_text, Element, Node};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Canonical form of `element` and its subtree.
///
/// Only namespaces visibly utilized by an element (its own prefix and the
/// prefixes of its attributes) are rendered, and only when an output ancestor
/// has not already rendered the same binding. Declarations come first sorted
/// by prefix with the default namespace leading, then attributes sorted by
/// namespace URI and local name. Comments are dropped and empty elements are
/// written as start/end pairs.
#[must_use]
pub fn exclusive_c14n(element: &Element) -> String {
    let mut out = String::new();
    write_canonical(element, &BTreeMap::new(), &mut out);
    out
}

fn write_canonical(element: &Element, rendered: &BTreeMap<String, String>, out: &mut String) {
    // prefix ("" = default) -> uri
    let mut utilized: BTreeMap<String, String> = BTreeMap::new();
    utilized.insert(
        element.prefix.clone().unwrap_or_default(),
        element.namespace.clone().unwrap_or_default(),
    );
    for attr in &element.attributes {
        if let (Some(prefix), Some(ns)) = (&attr.prefix, &attr.namespace) {
            if prefix != "xml" {
                utilized.insert(prefix.clone(), ns.clone());
            }
        }
    }

    let mut scope = rendered.clone();
    let mut declarations = Vec::new();
    for (prefix, uri) in utilized {
        let already = rendered.get(&prefix);
        if already == Some(&uri) {
            continue;
        }
        // An empty default only needs undeclaring if an ancestor set one.
        if prefix.is_empty() && uri.is_empty() && already.map_or(true, String::is_empty) {
            continue;
        }
        declarations.push((prefix.clone(), uri.clone()));
        scope.insert(prefix, uri);
    }

    let name = element.qualified_name();
    out.push('<');
    out.push_str(&name);
    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            let _ = write!(out, " xmlns=\"{}\"", escape_attribute(uri));
        } else {
            let _ = write!(out, " xmlns:{prefix}=\"{}\"", escape_attribute(uri));
        }
    }

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_ns = a.namespace.as_deref().unwrap_or("");
        let b_ns = b.namespace.as_deref().unwrap_or("");
        (a_ns, a.local.as_str()).cmp(&(b_ns, b.local.as_str()))
    });
    for attr in attributes {
        let qualified = match &attr.prefix {
            Some(p) => format!("{p}:{}", attr.local),
            None => attr.local.clone(),
        };
        let _ = write!(out, " {qualified}=\"{}\"", escape_attribute(&attr.value));
    }
    out.push('>');

    for child in &element.children {
        match child {
            Node::Element(el) => write_canonical(el, &scope, out),
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Comment(_) => {}
        }
    }
    let _ = write!(out, "</{name}>");
}
