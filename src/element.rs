//! A small, generic element tree.
//!
//! The same type describes the input graph (`<graph>`, `<node>`, `<edge>`,
//! `<subgraph>`) and the emitted SVG document. Input trees are usually read
//! from XML or JSON; output trees are serialized with [`Element::to_xml`].

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

#[derive(Debug, thiserror::Error)]
pub enum ElementError {
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid JSON element tree: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            AttrValue::Str(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            AttrValue::Number(value) => Some(*value != 0.0),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            AttrValue::Number(value) => Some(*value as f32),
            AttrValue::Str(value) => value.trim().trim_end_matches("px").parse::<f32>().ok(),
            AttrValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(value) => write!(f, "{value}"),
            AttrValue::Number(value) => f.write_str(&fmt_num(*value)),
            AttrValue::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<&String> for AttrValue {
    fn from(value: &String) -> Self {
        AttrValue::Str(value.clone())
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::Number(value as f64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Number(value as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attrs: Vec<(String, AttrValue)>,
    #[serde(default)]
    pub children: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter. Setting an existing key replaces it.
    pub fn attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.attrs.push((key.to_string(), value));
        }
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// String view of an attribute. Numbers and booleans are rendered.
    pub fn attr_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| value.to_string())
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AttrValue::as_bool)
    }

    pub fn attr_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(AttrValue::as_f32)
    }

    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Depth-first search for the first descendant (or self) matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pred))
    }

    /// Depth-first collection of every descendant (or self) with `tag`.
    pub fn find_all<'a>(&'a self, tag: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_tagged(tag, &mut out);
        out
    }

    fn collect_tagged<'a>(&'a self, tag: &str, out: &mut Vec<&'a Element>) {
        if self.tag == tag {
            out.push(self);
        }
        for child in &self.children {
            child.collect_tagged(tag, out);
        }
    }

    pub fn parse_xml(input: &str) -> Result<Self, ElementError> {
        let doc = roxmltree::Document::parse(input)?;
        Ok(convert_xml_node(doc.root_element()))
    }

    pub fn from_json(input: &str) -> Result<Self, ElementError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", key, escape_xml(&value.to_string()));
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape_xml(text));
        }
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn convert_xml_node(node: roxmltree::Node<'_, '_>) -> Element {
    let mut element = Element::new(node.tag_name().name());
    for attr in node.attributes() {
        element
            .attrs
            .push((attr.name().to_string(), AttrValue::Str(attr.value().to_string())));
    }
    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            element.children.push(convert_xml_node(child));
        } else if child.is_text()
            && let Some(value) = child.text()
        {
            text.push_str(value);
        }
    }
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        element.text = Some(trimmed.to_string());
    }
    element
}

/// Compact number formatting: two decimals at most, trailing zeros dropped.
pub fn fmt_num(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let mut s = format!("{rounded:.2}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_graph_xml() {
        let input = r##"<graph directed="false">
  <node id="A" label="Alpha" width="60"/>
  <subgraph id="g1" label="Group">
    <node id="B"/>
  </subgraph>
  <edge from="A" to="B" arrow-end="true"/>
</graph>"##;
        let root = Element::parse_xml(input).unwrap();
        assert_eq!(root.tag, "graph");
        assert_eq!(root.attr_bool("directed"), Some(false));
        assert_eq!(root.children.len(), 3);
        let node = &root.children[0];
        assert_eq!(node.attr_str("label").as_deref(), Some("Alpha"));
        assert_eq!(node.attr_f32("width"), Some(60.0));
        assert_eq!(root.find_all("node").len(), 2);
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(Element::parse_xml("<graph><node></graph>").is_err());
    }

    #[test]
    fn reads_json_tree() {
        let input = r#"{"tag":"graph","attrs":[["directed",true]],
            "children":[{"tag":"node","attrs":[["id","A"],["width",60]]}]}"#;
        let root = Element::from_json(input).unwrap();
        assert_eq!(root.attr_bool("directed"), Some(true));
        assert_eq!(root.children[0].attr_f32("width"), Some(60.0));
    }

    #[test]
    fn serializes_with_escaping() {
        let el = Element::new("text")
            .attr("x", 1.5f32)
            .attr("fill", "#fff")
            .with_text("a < b & \"c\"");
        assert_eq!(
            el.to_xml(),
            "<text x=\"1.5\" fill=\"#fff\">a &lt; b &amp; &quot;c&quot;</text>"
        );
    }

    #[test]
    fn set_attr_replaces_existing_key() {
        let el = Element::new("rect").attr("width", 10.0f32).attr("width", 20.0f32);
        assert_eq!(el.attrs.len(), 1);
        assert_eq!(el.attr_f32("width"), Some(20.0));
    }

    #[test]
    fn fmt_num_trims_trailing_zeros() {
        assert_eq!(fmt_num(50.0), "50");
        assert_eq!(fmt_num(12.5), "12.5");
        assert_eq!(fmt_num(1.234), "1.23");
        assert_eq!(fmt_num(-0.001), "0");
    }
}
