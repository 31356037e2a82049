//! Materialized stanza representation
//!
//! An owned element tree: tag name, attributes, and child nodes (elements
//! and text). One stanza is small and handed to the caller whole, so a
//! plain owned tree is used rather than an arena.

use std::fmt;

/// A parsed attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name (may include a namespace-style prefix)
    pub name: String,
    /// Attribute value, verbatim (entities are not interpreted)
    pub value: String,
}

/// A child of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A nested element
    Element(Element),
    /// Character data, verbatim
    Text(String),
}

/// A complete XML element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<Attribute>,
    /// Child nodes in document order
    pub children: Vec<Node>,
}

impl Element {
    /// Create an element with no attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Tag name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// All attributes in document order
    #[inline]
    pub fn attrs(&self) -> &[Attribute] {
        &self.attributes
    }

    /// All child nodes in document order
    #[inline]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Iterate over element children only
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First element child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.name == name)
    }

    /// Concatenated direct text children
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// Check if the element has no children
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for Element {
    /// Serialize back to XML. Empty elements collapse to `<name/>`; text
    /// and attribute values are written verbatim, mirroring what the
    /// fragment parser accepts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for attr in &self.attributes {
            write!(f, " {}=\"{}\"", attr.name, attr.value)?;
        }
        if self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.name)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Element(el) => write!(f, "{el}"),
            Node::Text(t) => write!(f, "{t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iq_with_text() -> Element {
        let mut el = Element::new("iq");
        el.attributes.push(Attribute {
            name: "type".to_string(),
            value: "get".to_string(),
        });
        el.children.push(Node::Text("text".to_string()));
        el
    }

    #[test]
    fn test_attr_lookup() {
        let el = iq_with_text();
        assert_eq!(el.attr("type"), Some("get"));
        assert_eq!(el.attr("id"), None);
    }

    #[test]
    fn test_text_concatenation() {
        let mut el = Element::new("body");
        el.children.push(Node::Text("a".to_string()));
        el.children.push(Node::Element(Element::new("br")));
        el.children.push(Node::Text("b".to_string()));
        assert_eq!(el.text(), "ab");
    }

    #[test]
    fn test_child_lookup() {
        let mut msg = Element::new("message");
        msg.children.push(Node::Element(Element::new("body")));
        assert_eq!(msg.child("body").map(Element::name), Some("body"));
        assert!(msg.child("subject").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(iq_with_text().to_string(), "<iq type=\"get\">text</iq>");
        assert_eq!(Element::new("ping").to_string(), "<ping/>");
    }

    #[test]
    fn test_display_nested() {
        let mut msg = Element::new("message");
        let mut body = Element::new("body");
        body.children.push(Node::Text("hi".to_string()));
        msg.children.push(Node::Element(body));
        assert_eq!(msg.to_string(), "<message><body>hi</body></message>");
    }
}
