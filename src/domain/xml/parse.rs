//! Namespace-resolving parser on top of `quick-xml` events.

use super::{Attribute, Element, NamespaceDecl, Node};
use crate::domain::constants::XML_NS;
use crate::infra::error::{SifenError, SifenResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parse a complete document and return its root element.
///
/// The XML declaration is discarded (the serializer always writes its own),
/// comments are kept so the normalizer can report and remove them, and
/// whitespace text is preserved verbatim.
pub fn parse_document(xml: &str) -> SifenResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut scopes: Vec<Vec<NamespaceDecl>> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let element = open_element(&start, &mut scopes)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, &mut scopes)?;
                scopes.pop();
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SifenError::XmlError("unbalanced end tag".to_string()))?;
                scopes.pop();
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| SifenError::XmlError(format!("bad text: {e}")))?;
                push_text(&text, &mut stack)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| SifenError::XmlError(format!("CDATA is not UTF-8: {e}")))?;
                push_text(&text, &mut stack)?;
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&comment).into_owned();
                    parent.children.push(Node::Comment(text));
                }
            }
            Event::DocType(_) => {
                return Err(SifenError::XmlError(
                    "DOCTYPE declarations are not accepted".to_string(),
                ))
            }
            Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(SifenError::XmlError(format!(
            "unexpected end of document, <{}> not closed",
            stack.last().map(Element::qualified_name).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| SifenError::XmlError("document has no root element".to_string()))
}

fn open_element(start: &BytesStart<'_>, scopes: &mut Vec<Vec<NamespaceDecl>>) -> SifenResult<Element> {
    let raw_name = utf8(start.name().as_ref())?;
    let mut decls = Vec::new();
    let mut raw_attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| SifenError::XmlError(format!("bad attribute: {e}")))?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| SifenError::XmlError(format!("bad attribute value: {e}")))?
            .into_owned();
        if key == "xmlns" {
            decls.push(NamespaceDecl { prefix: None, uri: value });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            decls.push(NamespaceDecl {
                prefix: Some(prefix.to_string()),
                uri: value,
            });
        } else {
            raw_attributes.push((key, value));
        }
    }
    scopes.push(decls.clone());

    let (prefix, local) = split_name(&raw_name);
    let namespace = match &prefix {
        Some(p) => Some(resolve(scopes, Some(p)).ok_or_else(|| {
            SifenError::XmlError(format!("undeclared namespace prefix '{p}' on <{raw_name}>"))
        })?),
        None => resolve(scopes, None).filter(|uri| !uri.is_empty()),
    };

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let (attr_prefix, attr_local) = split_name(&key);
        let attr_namespace = match &attr_prefix {
            Some(p) => Some(resolve(scopes, Some(p)).ok_or_else(|| {
                SifenError::XmlError(format!("undeclared namespace prefix '{p}' on @{key}"))
            })?),
            None => None,
        };
        attributes.push(Attribute {
            prefix: attr_prefix,
            local: attr_local,
            namespace: attr_namespace,
            value,
        });
    }

    Ok(Element {
        prefix,
        local,
        namespace,
        namespace_decls: decls,
        attributes,
        children: Vec::new(),
    })
}

fn resolve(scopes: &[Vec<NamespaceDecl>], prefix: Option<&String>) -> Option<String> {
    if prefix.map(String::as_str) == Some("xml") {
        return Some(XML_NS.to_string());
    }
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter())
        .find(|decl| decl.prefix.as_ref() == prefix)
        .map(|decl| decl.uri.clone())
}

fn split_name(raw: &str) -> (Option<String>, String) {
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw.to_string()),
    }
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> SifenResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_some() {
                return Err(SifenError::XmlError(
                    "document has more than one root element".to_string(),
                ));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

fn push_text(text: &str, stack: &mut [Element]) -> SifenResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            if let Some(Node::Text(existing)) = parent.children.last_mut() {
                existing.push_str(text);
            } else {
                parent.children.push(Node::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(SifenError::XmlError(
            "text content outside the root element".to_string(),
        )),
    }
}

fn utf8(bytes: &[u8]) -> SifenResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| SifenError::XmlError(format!("name is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{DSIG_NS, SIFEN_NS};

    #[test]
    fn resolves_default_and_prefixed_namespaces() {
        let root = parse_document(
            r#"<?xml version='1.0' encoding='UTF-8'?>
<ns2:rRetEnviDe xmlns:ns2="http://ekuatia.set.gov.py/sifen/xsd"><ns2:dCodRes>0160</ns2:dCodRes><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"/></ns2:rRetEnviDe>"#,
        )
        .unwrap();
        assert_eq!(root.namespace.as_deref(), Some(SIFEN_NS));
        assert_eq!(root.prefix.as_deref(), Some("ns2"));
        let signature = root.child_elements().nth(1).unwrap();
        assert_eq!(signature.namespace.as_deref(), Some(DSIG_NS));
    }

    #[test]
    fn keeps_comments_and_whitespace() {
        let root = parse_document("<a>\n  <!-- note --><b>x &amp; y</b>\n</a>").unwrap();
        assert!(root.children.iter().any(|n| matches!(n, Node::Comment(_))));
        assert!(matches!(&root.children[0], Node::Text(t) if t.trim().is_empty()));
        assert_eq!(root.child_elements().next().unwrap().text(), "x & y");
    }

    #[test]
    fn rejects_undeclared_prefix_and_doctype() {
        assert!(parse_document("<p:a/>").is_err());
        assert!(parse_document("<!DOCTYPE a><a/>").is_err());
        assert!(parse_document("<a>").is_err());
    }
}
