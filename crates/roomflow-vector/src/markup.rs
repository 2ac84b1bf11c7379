//! Generic markup-tree reader.
//!
//! The ingestion pipeline only needs element names, attribute values, and
//! children in document order, so parsing is isolated behind this owned tree
//! and the pipeline has no dependence on any particular XML library.

use std::collections::HashMap;

/// One element of a parsed markup document.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupElement {
    name: String,
    attributes: HashMap<String, String>,
    children: Vec<MarkupElement>,
}

impl MarkupElement {
    /// The element's local tag name (namespace prefixes stripped).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// An attribute value by local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[MarkupElement] {
        &self.children
    }

    /// This element and all elements below it, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Depth-first, document-order traversal over a markup tree.
pub struct Descendants<'a> {
    stack: Vec<&'a MarkupElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a MarkupElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// Parse a markup document into an owned element tree. Returns `None` when
/// the text is not well-formed markup.
pub fn parse_markup(text: &str) -> Option<MarkupElement> {
    let document = roxmltree::Document::parse(text).ok()?;
    Some(convert(document.root_element()))
}

fn convert(node: roxmltree::Node<'_, '_>) -> MarkupElement {
    MarkupElement {
        name: node.tag_name().name().to_string(),
        attributes: node
            .attributes()
            .map(|attribute| (attribute.name().to_string(), attribute.value().to_string()))
            .collect(),
        children: node
            .children()
            .filter(roxmltree::Node::is_element)
            .map(convert)
            .collect(),
    }
}
