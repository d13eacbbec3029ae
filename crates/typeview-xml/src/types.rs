//! Core types for editable XML trees.

use std::ops::Range;

/// A parsed XML document.
///
/// Everything outside the root element (declaration, comments, doctype,
/// whitespace) is kept in `prolog` and `epilog` so the document can be
/// written back without losing it.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Nodes before the root element.
    pub prolog: Vec<XmlNode>,

    /// The root element of the document.
    pub root: XmlElement,

    /// Nodes after the root element.
    pub epilog: Vec<XmlNode>,
}

/// An XML element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// The local name of the element (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g., "svg" in `<svg:g>`).
    pub prefix: Option<String>,

    /// Attributes of this element, in source order.
    pub attributes: Vec<XmlAttribute>,

    /// Child nodes, in source order.
    pub children: Vec<XmlNode>,

    /// Byte range of the element in the parsed input.
    ///
    /// `None` for elements built in code.
    pub source_range: Option<Range<usize>>,
}

/// An XML attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    /// The local name of the attribute (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g., "xlink" in `xlink:href`).
    pub prefix: Option<String>,

    /// The attribute value (after unescaping XML entities).
    pub value: String,
}

/// A single node in element content or around the root.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// A child element.
    Element(XmlElement),

    /// Character data, stored exactly as it appeared in the source
    /// (entities still escaped).
    Text(String),

    /// `<![CDATA[...]]>` content.
    CData(String),

    /// `<!--...-->` content.
    Comment(String),

    /// Processing instruction content, without `<?` and `?>`.
    ProcessingInstruction(String),

    /// XML declaration content, without `<?` and `?>`.
    Declaration(String),

    /// DOCTYPE content, without `<!DOCTYPE` and `>`.
    DocType(String),
}

impl XmlDocument {
    /// Create a document with no prolog or epilog.
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }
}

fn split_qualified(qualified: &str) -> (String, Option<String>) {
    match qualified.find(':') {
        Some(pos) => (
            qualified[pos + 1..].to_string(),
            Some(qualified[..pos].to_string()),
        ),
        None => (qualified.to_string(), None),
    }
}

fn join_qualified(name: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    }
}

impl XmlAttribute {
    /// Create an attribute from a possibly prefixed name.
    pub fn new(qualified_name: &str, value: impl Into<String>) -> Self {
        let (name, prefix) = split_qualified(qualified_name);
        Self {
            name,
            prefix,
            value: value.into(),
        }
    }

    /// The name as written in the source, including any prefix.
    pub fn qualified_name(&self) -> String {
        join_qualified(&self.name, self.prefix.as_deref())
    }

    fn matches(&self, qualified_name: &str) -> bool {
        match &self.prefix {
            Some(prefix) => {
                qualified_name
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix(':'))
                    == Some(self.name.as_str())
            }
            None => qualified_name == self.name,
        }
    }
}

impl XmlElement {
    /// Create an empty element from a possibly prefixed name.
    pub fn new(qualified_name: &str) -> Self {
        let (name, prefix) = split_qualified(qualified_name);
        Self {
            name,
            prefix,
            attributes: Vec::new(),
            children: Vec::new(),
            source_range: None,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, qualified_name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(qualified_name, value);
        self
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// The name as written in the source, including any prefix.
    pub fn qualified_name(&self) -> String {
        join_qualified(&self.name, self.prefix.as_deref())
    }

    /// Get an attribute value by (qualified) name.
    pub fn get_attribute(&self, qualified_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.matches(qualified_name))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing value in place or appending.
    pub fn set_attribute(&mut self, qualified_name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.matches(qualified_name))
        {
            Some(existing) => existing.value = value,
            None => self
                .attributes
                .push(XmlAttribute::new(qualified_name, value)),
        }
    }

    /// Remove an attribute, returning its value if it was present.
    pub fn remove_attribute(&mut self, qualified_name: &str) -> Option<String> {
        let index = self
            .attributes
            .iter()
            .position(|a| a.matches(qualified_name))?;
        Some(self.attributes.remove(index).value)
    }

    /// Whether the whitespace-separated `class` attribute contains `token`.
    pub fn has_class(&self, token: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == token))
    }

    /// Check if this element has no children at all.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Iterate over direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterate mutably over direct child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Get direct child elements with a given local name.
    pub fn get_children(&self, name: &str) -> Vec<&XmlElement> {
        self.elements().filter(|e| e.name == name).collect()
    }

    /// Insert a node as the first child.
    pub fn prepend_child(&mut self, node: XmlNode) {
        self.children.insert(0, node);
    }

    /// Append a node as the last child.
    pub fn push_child(&mut self, node: XmlNode) {
        self.children.push(node);
    }

    /// All descendant elements (not including `self`) in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Descendant elements whose class list contains `token`, in document order.
    pub fn descendants_with_class(&self, token: &str) -> Vec<&XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|e| e.has_class(token))
            .collect()
    }

    /// Visit every descendant element (not including `self`) mutably, in
    /// document order. Children are visited after their parent's callback
    /// returns, so the callback may add or remove children.
    pub fn for_each_descendant_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut XmlElement),
    {
        for child in self.elements_mut() {
            f(child);
            child.for_each_descendant_mut(f);
        }
    }

    /// Concatenated, unescaped character data of this element and its
    /// descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_descendants<'a>(element: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    for child in element.elements() {
        out.push(child);
        collect_descendants(child, out);
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Text(raw) => match quick_xml::escape::unescape(raw) {
                Ok(text) => out.push_str(&text),
                Err(_) => out.push_str(raw),
            },
            XmlNode::CData(text) => out.push_str(text),
            XmlNode::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}
