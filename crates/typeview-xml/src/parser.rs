//! XML parser that builds editable [`XmlDocument`] trees.

use crate::{Error, Result, XmlAttribute, XmlDocument, XmlElement, XmlNode};
use quick_xml::Reader;
use quick_xml::events::{BytesEnd, BytesStart, Event};

/// Parse XML from a string, producing an [`XmlDocument`].
///
/// Character data is kept verbatim (entities still escaped) so that writing
/// the document back reproduces it; attribute values are unescaped.
///
/// # Example
///
/// ```rust
/// use typeview_xml::parse;
///
/// let doc = parse(r#"<svg class="typst-doc"><g/></svg>"#).unwrap();
/// assert_eq!(doc.root.name, "svg");
/// assert!(doc.root.has_class("typst-doc"));
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed, has no root element, or has
/// more than one.
pub fn parse(content: &str) -> Result<XmlDocument> {
    let mut parser = XmlParser::new(content);
    parser.parse()
}

/// Internal parser state.
struct XmlParser<'a> {
    /// The quick-xml reader.
    reader: Reader<&'a [u8]>,

    /// Stack of elements being built.
    stack: Vec<BuildNode>,

    prolog: Vec<XmlNode>,
    epilog: Vec<XmlNode>,
    root: Option<XmlElement>,
}

/// A node being constructed during parsing.
struct BuildNode {
    name: String,
    prefix: Option<String>,
    attributes: Vec<XmlAttribute>,

    /// Byte offset where this element started (the `<` character).
    start_offset: usize,

    /// Child nodes accumulated so far.
    children: Vec<XmlNode>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            stack: Vec::new(),
            prolog: Vec::new(),
            epilog: Vec::new(),
            root: None,
        }
    }

    fn parse(&mut self) -> Result<XmlDocument> {
        loop {
            // Capture position before reading the event
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let (name, prefix) = split_name(e.name().as_ref());
                    let attributes = parse_attributes(&e, event_start)?;
                    self.stack.push(BuildNode {
                        name,
                        prefix,
                        attributes,
                        start_offset: event_start,
                        children: Vec::new(),
                    });
                }
                Ok(Event::End(e)) => {
                    let element = self.handle_end(e)?;
                    self.attach(XmlNode::Element(element))?;
                }
                Ok(Event::Empty(e)) => {
                    let element = self.handle_empty(e, event_start)?;
                    self.attach(XmlNode::Element(element))?;
                }
                Ok(Event::Text(e)) => {
                    self.attach(XmlNode::Text(String::from_utf8_lossy(&e).into_owned()))?;
                }
                Ok(Event::CData(e)) => {
                    self.attach(XmlNode::CData(String::from_utf8_lossy(&e).into_owned()))?;
                }
                Ok(Event::Comment(e)) => {
                    self.attach(XmlNode::Comment(String::from_utf8_lossy(&e).into_owned()))?;
                }
                Ok(Event::PI(e)) => {
                    self.attach(XmlNode::ProcessingInstruction(
                        String::from_utf8_lossy(&e).into_owned(),
                    ))?;
                }
                Ok(Event::Decl(e)) => {
                    self.attach(XmlNode::Declaration(String::from_utf8_lossy(&e).into_owned()))?;
                }
                Ok(Event::DocType(e)) => {
                    self.attach(XmlNode::DocType(
                        String::from_utf8_lossy(&e).trim().to_string(),
                    ))?;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        // Check for unclosed elements
        if let Some(node) = self.stack.last() {
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", qualified(&node.name, &node.prefix)),
            });
        }

        let root = self.root.take().ok_or(Error::EmptyDocument)?;
        Ok(XmlDocument {
            prolog: std::mem::take(&mut self.prolog),
            root,
            epilog: std::mem::take(&mut self.epilog),
        })
    }

    /// Add a finished node to the open element, or around the root when no
    /// element is open.
    fn attach(&mut self, node: XmlNode) -> Result<()> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }
        match node {
            XmlNode::Element(element) => {
                if self.root.is_some() {
                    return Err(Error::MultipleRoots);
                }
                self.root = Some(element);
            }
            other if self.root.is_none() => self.prolog.push(other),
            other => self.epilog.push(other),
        }
        Ok(())
    }

    fn handle_end(&mut self, e: BytesEnd<'_>) -> Result<XmlElement> {
        let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        let node = self.stack.pop().ok_or_else(|| {
            Error::InvalidStructure(format!("Unexpected closing tag </{}>", end_name))
        })?;

        let start_name = qualified(&node.name, &node.prefix);
        if start_name != end_name {
            return Err(Error::MismatchedEndTag {
                expected: start_name,
                found: end_name,
            });
        }

        let end_offset = self.reader.buffer_position() as usize;
        Ok(XmlElement {
            name: node.name,
            prefix: node.prefix,
            attributes: node.attributes,
            children: node.children,
            source_range: Some(node.start_offset..end_offset),
        })
    }

    fn handle_empty(&mut self, e: BytesStart<'_>, event_start: usize) -> Result<XmlElement> {
        let (name, prefix) = split_name(e.name().as_ref());
        let attributes = parse_attributes(&e, event_start)?;
        let end_offset = self.reader.buffer_position() as usize;

        Ok(XmlElement {
            name,
            prefix,
            attributes,
            children: Vec::new(),
            source_range: Some(event_start..end_offset),
        })
    }
}

fn split_name(raw: &[u8]) -> (String, Option<String>) {
    let full_name = String::from_utf8_lossy(raw);
    match full_name.find(':') {
        Some(pos) => (
            full_name[pos + 1..].to_string(),
            Some(full_name[..pos].to_string()),
        ),
        None => (full_name.into_owned(), None),
    }
}

fn qualified(name: &str, prefix: &Option<String>) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    }
}

fn parse_attributes(e: &BytesStart<'_>, tag_start: usize) -> Result<Vec<XmlAttribute>> {
    let mut attributes = Vec::new();

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let (name, prefix) = split_name(attr.key.as_ref());

        let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
            message: format!("Invalid attribute value: {}", err),
            position: Some(tag_start as u64),
        })?;

        attributes.push(XmlAttribute {
            name,
            prefix,
            value: value.into_owned(),
        });
    }

    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let doc = parse("<svg/>").unwrap();
        assert_eq!(doc.root.name, "svg");
        assert!(doc.root.is_empty());
        assert_eq!(doc.root.source_range, Some(0..6));
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse(r#"<svg><g class="typst-page"><path d="M0 0"/></g></svg>"#).unwrap();
        let pages = doc.root.descendants_with_class("typst-page");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].get_children("path").len(), 1);
    }

    #[test]
    fn test_parse_unescapes_attributes_but_not_text() {
        let doc = parse(r#"<text title="a &amp; b">x &lt; y</text>"#).unwrap();
        assert_eq!(doc.root.get_attribute("title"), Some("a & b"));
        assert_eq!(doc.root.children, vec![XmlNode::Text("x &lt; y".into())]);
        assert_eq!(doc.root.text_content(), "x < y");
    }

    #[test]
    fn test_parse_namespace_prefix() {
        let doc = parse(
            r##"<svg xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#g1"/></svg>"##,
        )
        .unwrap();
        let uses = doc.root.get_children("use");
        assert_eq!(uses[0].get_attribute("xlink:href"), Some("#g1"));
        assert_eq!(
            doc.root.get_attribute("xmlns:xlink"),
            Some("http://www.w3.org/1999/xlink")
        );
    }

    #[test]
    fn test_prolog_and_epilog_are_kept() {
        let doc = parse("<?xml version=\"1.0\"?>\n<!-- head --><svg/>\n").unwrap();
        assert!(matches!(doc.prolog[0], XmlNode::Declaration(_)));
        assert!(
            doc.prolog
                .iter()
                .any(|n| matches!(n, XmlNode::Comment(c) if c == " head "))
        );
        assert_eq!(doc.epilog, vec![XmlNode::Text("\n".into())]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("").unwrap_err(), Error::EmptyDocument);
        assert_eq!(parse("<a/><b/>").unwrap_err(), Error::MultipleRoots);
        assert!(parse("<svg><g>").is_err());
        assert!(parse("<svg></g>").is_err());
        assert!(parse("not xml at all").is_err());
    }
}
