//! Minimal owned element tree built from quick-xml events
//!
//! Parsing is lenient: end-tag names are not checked and elements still open
//! at the end of input are closed implicitly. References are decoded one at a
//! time; the predefined and numeric ones become text, while DTD entities the
//! dumps use without declaring (such as `&lsquo;`) are kept as
//! [`XmlNode::EntityRef`] and written back unchanged.

use crate::types::Mapping;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::Value;

/// A node of the tree
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    /// Undeclared entity reference, stored as written (`&lsquo;`)
    EntityRef(String),
}

/// An element with its attributes and children in document order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Parse the first root element of `text`
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().check_end_names = false;

        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;

            match event {
                Event::Start(ref e) => stack.push(element_from_start(e)),
                Event::Empty(ref e) => {
                    let element = element_from_start(e);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(XmlNode::Element(element)),
                            None => return Ok(element),
                        }
                    }
                }
                Event::Text(ref e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_raw_text(&String::from_utf8_lossy(e));
                    }
                }
                Event::CData(ref e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(String::from_utf8_lossy(e).into_owned());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        // Close whatever is still open
        let mut root = stack.pop().ok_or_else(|| "no root element".to_string())?;
        while let Some(mut parent) = stack.pop() {
            parent.children.push(XmlNode::Element(root));
            root = parent;
        }
        Ok(root)
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if let Some(XmlNode::Text(existing)) = self.children.last_mut() {
            existing.push_str(&text);
        } else {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Decode escaped character data reference by reference
    fn push_raw_text(&mut self, raw: &str) {
        let mut rest = raw;
        while let Some((before, reference, after)) = next_reference(rest) {
            self.push_text(before.to_string());
            match reference {
                Reference::Decoded(text) => self.push_text(text),
                Reference::Unresolved(name) => {
                    self.children.push(XmlNode::EntityRef(name.to_string()))
                }
            }
            rest = after;
        }
        self.push_text(rest.to_string());
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) | XmlNode::EntityRef(_) => None,
        })
    }

    /// First direct child element with this name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// First descendant element with this name, depth-first in document order
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.find_where(&|e: &XmlElement| e.name == name)
    }

    /// First descendant element accepted by `matches`, depth-first in document order
    pub fn find_where(&self, matches: &dyn Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        for element in self.elements() {
            if matches(element) {
                return Some(element);
            }
            if let Some(found) = element.find_where(matches) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text of all descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::EntityRef(name) => push_entity(out, name),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Serialized XML of the children, markup included
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            node.write_xml(&mut out);
        }
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&quick_xml::escape::escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            node.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Render as `{name: value}` following the xmltodict conventions:
    /// attributes become `@name` keys, repeated children become arrays, and
    /// an attribute-less leaf collapses to its text (or `null` when empty).
    pub fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        mapping.insert(self.name.clone(), self.value());
        mapping
    }

    fn value(&self) -> Value {
        // Character data between child elements, each run trimmed
        let mut text = String::new();
        let mut run = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) => run.push_str(t),
                XmlNode::EntityRef(name) => push_entity(&mut run, name),
                XmlNode::Element(_) => {
                    text.push_str(run.trim());
                    run.clear();
                }
            }
        }
        text.push_str(run.trim());
        let has_elements = self.elements().next().is_some();

        if self.attributes.is_empty() && !has_elements {
            return if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
        }

        let mut object = Mapping::new();
        for (key, value) in &self.attributes {
            object.insert(format!("@{}", key), Value::String(value.clone()));
        }
        for element in self.elements() {
            let value = element.value();
            match object.get_mut(&element.name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    object.insert(element.name.clone(), value);
                }
            }
        }
        if !text.is_empty() {
            object.insert("#text".to_string(), Value::String(text));
        }
        Value::Object(object)
    }
}

impl XmlNode {
    fn write_xml(&self, out: &mut String) {
        match self {
            XmlNode::Text(text) => out.push_str(&quick_xml::escape::escape(text.as_str())),
            XmlNode::EntityRef(name) => push_entity(out, name),
            XmlNode::Element(element) => element.write_xml(out),
        }
    }
}

fn push_entity(out: &mut String, name: &str) {
    out.push('&');
    out.push_str(name);
    out.push(';');
}

enum Reference<'a> {
    Decoded(String),
    Unresolved(&'a str),
}

/// Split `raw` at its first well-formed reference: `(before, reference, after)`.
/// A bare `&` that does not start a reference stays in `before`.
fn next_reference(raw: &str) -> Option<(&str, Reference<'_>, &str)> {
    let mut offset = 0;
    loop {
        let start = offset + raw[offset..].find('&')?;
        let body = &raw[start + 1..];
        let end = body.find(|c: char| c == ';' || c == '&' || c.is_whitespace());
        match end {
            Some(end) if end > 0 && body[end..].starts_with(';') => {
                let name = &body[..end];
                let reference = match quick_xml::escape::unescape(&raw[start..start + end + 2]) {
                    Ok(decoded) => Reference::Decoded(decoded.into_owned()),
                    Err(_) => Reference::Unresolved(name),
                };
                return Some((&raw[..start], reference, &body[end + 1..]));
            }
            _ => offset = start + 1,
        }
    }
}

/// Attribute values have no node structure, so undeclared entities stay literal
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some((before, reference, after)) = next_reference(rest) {
        out.push_str(before);
        match reference {
            Reference::Decoded(text) => out.push_str(&text),
            Reference::Unresolved(name) => push_entity(&mut out, name),
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn element_from_start(start: &BytesStart<'_>) -> XmlElement {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let attributes = start
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = unescape_lenient(&String::from_utf8_lossy(&attr.value));
            (key, value)
        })
        .collect();

    XmlElement {
        name,
        attributes,
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_navigate() {
        let root = XmlElement::parse(
            r#"<doc id="d1"><meta><title>Widget</title></meta><body><title>Inner</title></body></doc>"#,
        )
        .unwrap();

        assert_eq!(root.name, "doc");
        assert_eq!(root.attr("id"), Some("d1"));
        assert!(root.child("title").is_none());
        assert_eq!(root.find("title").unwrap().text(), "Widget");
        assert_eq!(root.child("body").unwrap().find("title").unwrap().text(), "Inner");
    }

    #[test]
    fn test_unknown_entity_kept_as_text() {
        let root = XmlElement::parse("<p>the &lsquo;widget&rsquo; &amp; more</p>").unwrap();
        assert_eq!(root.text(), "the &lsquo;widget&rsquo; & more");
    }

    #[test]
    fn test_known_references_decoded_next_to_unknown_ones() {
        let root =
            XmlElement::parse("<abstract><p>Nuts &amp; bolts &lsquo;x&rsquo; &#x3c;5&#62;</p></abstract>")
                .unwrap();
        let paragraph = root.child("p").unwrap();

        assert_eq!(paragraph.text(), "Nuts & bolts &lsquo;x&rsquo; <5>");
        assert_eq!(
            paragraph.inner_xml(),
            "Nuts &amp; bolts &lsquo;x&rsquo; &lt;5&gt;"
        );
        assert_eq!(
            root.inner_xml(),
            "<p>Nuts &amp; bolts &lsquo;x&rsquo; &lt;5&gt;</p>"
        );
    }

    #[test]
    fn test_stray_ampersand_is_literal() {
        let root = XmlElement::parse("<p a=\"R&amp;D &mdash;\">A & B &amp; C</p>").unwrap();
        assert_eq!(root.attr("a"), Some("R&D &mdash;"));
        assert_eq!(root.text(), "A & B & C");
    }

    #[test]
    fn test_mapping_text_keeps_unknown_entity() {
        let root = XmlElement::parse("<orgname>Sm&ouml;rg &amp; Co</orgname>").unwrap();
        assert_eq!(
            Value::Object(root.to_mapping()),
            json!({"orgname": "Sm&ouml;rg & Co"})
        );
    }

    #[test]
    fn test_unclosed_elements_are_closed() {
        let root = XmlElement::parse("<a><b>text").unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.child("b").unwrap().text(), "text");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(XmlElement::parse("   ").is_err());
    }

    #[test]
    fn test_inner_xml_keeps_inline_markup() {
        let root = XmlElement::parse(r#"<p id="p-0001">A <b>bold</b> claim &amp; <br/>more</p>"#)
            .unwrap();
        assert_eq!(root.inner_xml(), "A <b>bold</b> claim &amp; <br/>more");
    }

    #[test]
    fn test_mapping_follows_xmltodict() {
        let root = XmlElement::parse(
            r#"<inventor sequence="001"><addressbook><last-name>Doe</last-name><first-name>Jane</first-name></addressbook><residence/><note>a</note><note>b</note></inventor>"#,
        )
        .unwrap();

        let mapping = root.to_mapping();
        assert_eq!(
            Value::Object(mapping),
            json!({
                "inventor": {
                    "@sequence": "001",
                    "addressbook": {"last-name": "Doe", "first-name": "Jane"},
                    "residence": null,
                    "note": ["a", "b"]
                }
            })
        );
    }

    #[test]
    fn test_mixed_content_gets_text_key() {
        let root = XmlElement::parse(r#"<main-group kind="x">21<sub>7</sub></main-group>"#).unwrap();
        assert_eq!(
            Value::Object(root.to_mapping()),
            json!({"main-group": {"@kind": "x", "sub": "7", "#text": "21"}})
        );
    }
}
