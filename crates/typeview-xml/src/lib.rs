//! Editable XML trees for typeview.
//!
//! This crate wraps [`quick-xml`] to parse a document into an owned tree of
//! [`XmlElement`]s that can be inspected, modified, and written back out. It
//! exists for one job: post-processing the SVG the typesetting engine emits
//! (stacking pages, adding page backgrounds and shadows) without resorting to
//! string surgery.
//!
//! # Example
//!
//! ```rust
//! use typeview_xml::{parse, XmlElement, XmlNode};
//!
//! let mut doc = parse(r#"<svg><g class="typst-page"/></svg>"#).unwrap();
//! for page in doc.root.elements_mut().filter(|e| e.has_class("typst-page")) {
//!     page.set_attribute("transform", "translate(0, 20)");
//! }
//! doc.root.prepend_child(XmlNode::Element(XmlElement::new("defs")));
//!
//! assert_eq!(
//!     doc.to_xml_string(),
//!     r#"<svg><defs/><g class="typst-page" transform="translate(0, 20)"/></svg>"#
//! );
//! ```

pub mod error;
pub mod parser;
pub mod types;
pub mod writer;

// Re-export main types
pub use error::{Error, Result};
pub use parser::parse;
pub use types::{XmlAttribute, XmlDocument, XmlElement, XmlNode};
