//! Minimal XML element tree for the persisted block format.
//!
//! Only what the block format needs: elements, attributes (order kept),
//! and text. No namespaces beyond a plain `xmlns` attribute, no DTDs.
//! Parsing lives in `dom_parser`; this module owns the tree and emission.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Write;

/// One child of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with ordered attributes and mixed children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`XmlElement::set_attr`].
    pub fn with_attr(mut self, key: &str, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder form of [`XmlElement::push_text`].
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    /// Builder form of [`XmlElement::push_child`].
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_child(child);
        self
    }

    /// Set or overwrite an attribute, keeping first-insertion order.
    pub fn set_attr(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Child elements in document order (text nodes skipped).
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given tag name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Compact single-line serialization.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(128);
        write_element(&mut out, self, None);
        out
    }

    /// Indented serialization, two spaces per level.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::with_capacity(256);
        write_element(&mut out, self, Some(0));
        out
    }
}

// ─── Emission ───────────────────────────────────────────────────────────

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// `depth` is `None` for compact output.
fn write_element(out: &mut String, el: &XmlElement, depth: Option<usize>) {
    if let Some(d) = depth {
        indent(out, d);
    }
    out.push('<');
    out.push_str(&el.name);
    for (k, v) in &el.attributes {
        let _ = write!(out, " {k}=\"{}\"", xml_escape_attr(v));
    }

    if el.children.is_empty() {
        out.push_str("/>");
        if depth.is_some() {
            out.push('\n');
        }
        return;
    }
    out.push('>');

    let text_only = el.children.iter().all(|c| matches!(c, XmlNode::Text(_)));
    if text_only || depth.is_none() {
        for child in &el.children {
            match child {
                XmlNode::Text(t) => out.push_str(&xml_escape(t)),
                XmlNode::Element(e) => write_element(out, e, None),
            }
        }
    } else if let Some(d) = depth {
        out.push('\n');
        for child in &el.children {
            match child {
                XmlNode::Element(e) => write_element(out, e, Some(d + 1)),
                XmlNode::Text(t) => {
                    let t = t.trim();
                    if !t.is_empty() {
                        indent(out, d + 1);
                        out.push_str(&xml_escape(t));
                        out.push('\n');
                    }
                }
            }
        }
        indent(out, d);
    }

    let _ = write!(out, "</{}>", el.name);
    if depth.is_some() {
        out.push('\n');
    }
}

/// Escape text content.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value. Like [`xml_escape`] but also encodes
/// quotes and line breaks so the value survives a round trip.
pub fn xml_escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

// Event JSON carries XML snapshots as text, matching the persisted format.

impl Serialize for XmlElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_xml_string())
    }
}

impl<'de> Deserialize<'de> for XmlElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::dom_parser::parse_xml(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compact_emission() {
        let el = XmlElement::new("block")
            .with_attr("type", "text")
            .with_child(XmlElement::new("field").with_attr("name", "TEXT").with_text("a < b"));
        assert_eq!(
            el.to_xml_string(),
            r#"<block type="text"><field name="TEXT">a &lt; b</field></block>"#
        );
    }

    #[test]
    fn pretty_emission_keeps_text_inline() {
        let el = XmlElement::new("xml").with_child(
            XmlElement::new("block")
                .with_attr("type", "math_number")
                .with_child(XmlElement::new("field").with_attr("name", "NUM").with_text("42")),
        );
        assert_eq!(
            el.to_pretty_string(),
            "<xml>\n  <block type=\"math_number\">\n    <field name=\"NUM\">42</field>\n  </block>\n</xml>\n"
        );
    }

    #[test]
    fn set_attr_overwrites_in_place() {
        let mut el = XmlElement::new("block").with_attr("x", 1).with_attr("y", 2);
        el.set_attr("x", 5);
        assert_eq!(el.attributes[0], ("x".to_string(), "5".to_string()));
        assert_eq!(el.remove_attr("y").as_deref(), Some("2"));
        assert_eq!(el.attr("y"), None);
    }

    #[test]
    fn attribute_escaping() {
        assert_eq!(xml_escape_attr("say \"hi\"\n"), "say &quot;hi&quot;&#xA;");
    }
}
