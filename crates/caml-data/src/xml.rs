//! # Markup Element Tree
//!
//! Order-preserving XML element DOM used by the loader and serializer.
//!
//! ## Responsibilities
//! - **Element Storage**: tag name, insertion-ordered attributes, children.
//! - **Reading**: event-driven parse via `quick-xml` into `XmlElement`.
//! - **Writing**: event-driven serialization, empty elements collapsed.
//!
//! The CAML format carries everything in attributes; text nodes are
//! insignificant whitespace and are discarded on read.

use crate::error::CamlError;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

/// The single default namespace of CAML documents.
pub const CAML_NS: &str = "http://www.apple.com/CoreAnimation/1.0";

/// A parsed markup element: tag, attributes in document order, children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the attribute value, if the attribute is present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets (or replaces) an attribute, keeping first-write order.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.attrs.push((key, value));
        }
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// First child with the given tag name.
    pub fn find_child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given tag name, in document order.
    pub fn find_children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Parses a complete document into its root element.
    pub fn parse(input: &str) -> Result<XmlElement, CamlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Self::from_start(&start)?),
                Ok(Event::Empty(start)) => {
                    let element = Self::from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        // An empty root element is a complete document.
                        None => return Ok(element),
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| CamlError::markup("unmatched closing tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                // Attribute-carried format: whitespace and character data
                // between elements is not part of the model.
                Ok(Event::Text(_)) | Ok(Event::CData(_)) => {}
                Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_))
                | Ok(Event::DocType(_)) => {}
                Ok(Event::Eof) => {
                    return Err(CamlError::markup("unexpected end of document"));
                }
                Err(e) => return Err(CamlError::markup(e.to_string())),
            }
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XmlElement, CamlError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut element = XmlElement::new(name);
        for attr in start.attributes() {
            let attr = attr.map_err(|e| CamlError::markup(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| CamlError::markup(e.to_string()))?
                .into_owned();
            element.attrs.push((key, value));
        }
        Ok(element)
    }

    /// Serializes this element (and subtree) to a markup string.
    pub fn to_xml_string(&self) -> Result<String, CamlError> {
        let mut writer = Writer::new(Vec::new());
        self.write_into(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| CamlError::markup(e.to_string()))
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), CamlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| CamlError::markup(e.to_string()))?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| CamlError::markup(e.to_string()))?;
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| CamlError::markup(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_preserves_attribute_order() {
        let el = XmlElement::parse(r#"<a z="1" b="2" a="3"/>"#).unwrap();
        let keys: Vec<&str> = el.attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["z", "b", "a"]);
    }

    #[test]
    fn parse_nested_children_in_order() {
        let el = XmlElement::parse(r#"<root><x id="1"/><y/><x id="2"/></root>"#).unwrap();
        assert_eq!(el.children.len(), 3);
        assert_eq!(el.children[0].name, "x");
        assert_eq!(el.children[1].name, "y");
        assert_eq!(el.children[2].attr("id"), Some("2"));
        assert_eq!(el.find_children("x").count(), 2);
    }

    #[test]
    fn roundtrip_escapes_attribute_values() {
        let mut el = XmlElement::new("layer");
        el.set_attr("name", "a < b & \"c\"");
        let text = el.to_xml_string().unwrap();
        let back = XmlElement::parse(&text).unwrap();
        assert_eq!(back.attr("name"), Some("a < b & \"c\""));
    }

    #[test]
    fn empty_element_collapses() {
        let mut el = XmlElement::new("caml");
        el.set_attr("xmlns", CAML_NS);
        let text = el.to_xml_string().unwrap();
        assert!(text.ends_with("/>"), "expected self-closing tag: {text}");
    }

    #[test]
    fn truncated_document_is_rejected() {
        assert!(XmlElement::parse("<root><child>").is_err());
        assert!(XmlElement::parse("").is_err());
    }
}
