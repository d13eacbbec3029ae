//! Serialization of [`XmlDocument`] trees back to markup.

use crate::{XmlDocument, XmlElement, XmlNode};
use quick_xml::escape::escape;

impl XmlDocument {
    /// Write the document, including prolog and epilog, back to a string.
    ///
    /// Parsing the result yields an equal tree (up to `source_range`).
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            write_node(node, &mut out);
        }
        write_element(&self.root, &mut out);
        for node in &self.epilog {
            write_node(node, &mut out);
        }
        out
    }
}

impl XmlElement {
    /// Write this element and its subtree to a string.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn write_element(element: &XmlElement, out: &mut String) {
    let name = element.qualified_name();
    out.push('<');
    out.push_str(&name);
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.qualified_name());
        out.push_str("=\"");
        out.push_str(&escape(attr.value.as_str()));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn write_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Element(element) => write_element(element, out),
        XmlNode::Text(raw) => out.push_str(raw),
        XmlNode::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        XmlNode::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        XmlNode::ProcessingInstruction(text) | XmlNode::Declaration(text) => {
            out.push_str("<?");
            out.push_str(text);
            out.push_str("?>");
        }
        XmlNode::DocType(text) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(text);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{XmlElement, XmlNode, parse};

    #[test]
    fn test_write_built_element() {
        let rect = XmlElement::new("rect")
            .with_attribute("fill", "white")
            .with_attribute("data-note", "a<b & \"c\"");
        let g = XmlElement::new("g").with_child(rect);

        assert_eq!(
            g.to_xml_string(),
            r#"<g><rect fill="white" data-note="a&lt;b &amp; &quot;c&quot;"/></g>"#
        );
    }

    #[test]
    fn test_rewrite_preserves_untouched_content() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 10 10\"><style>.a { fill: red; }</style><!-- c --><text>x &amp; y</text><![CDATA[raw <data>]]></svg>";
        let doc = parse(source).unwrap();
        assert_eq!(doc.to_xml_string(), source);
    }

    #[test]
    fn test_edits_survive_round_trip() {
        let mut doc = parse(r#"<svg viewBox="0 0 10 10"><g class="typst-page"/></svg>"#).unwrap();
        doc.root.set_attribute("viewBox", "0 0 10 40");
        doc.root
            .prepend_child(XmlNode::Element(XmlElement::new("defs")));

        let written = doc.to_xml_string();
        assert_eq!(
            written,
            r#"<svg viewBox="0 0 10 40"><defs/><g class="typst-page"/></svg>"#
        );

        let reparsed = parse(&written).unwrap();
        assert_eq!(reparsed.root.get_attribute("viewBox"), Some("0 0 10 40"));
        assert_eq!(reparsed.root.elements().count(), 2);
    }
}
