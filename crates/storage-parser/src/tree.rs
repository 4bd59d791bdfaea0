//! Element tree types
//!
//! Mixed content is kept in document order, so text between elements and
//! CDATA bodies survive exactly as they appeared.

use serde::Serialize;

/// A node of parsed markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Element(Element),
    Text { value: String },
    #[serde(rename = "cdata")]
    CData { value: String },
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this is text made of whitespace only
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text { value } if value.trim().is_empty())
    }
}

/// An element with ordered attributes and mixed children
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Element {
    /// Qualified name, prefix included (`ac:structured-macro`)
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value by qualified name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Tag name without a namespace prefix
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    /// First descendant element with the given name, depth first
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendant text and CDATA, verbatim
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Text of the `ac:parameter` child named `name`
    pub fn macro_parameter(&self, name: &str) -> Option<String> {
        self.children_named("ac:parameter")
            .find(|p| p.attr("ac:name") == Some(name))
            .map(Element::text_content)
    }

    /// Whether the element has no children other than blank text
    pub fn is_empty(&self) -> bool {
        self.children.iter().all(Node::is_blank_text)
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(e) => collect_text(&e.children, out),
            Node::Text { value } | Node::CData { value } => out.push_str(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_parameter() {
        let element = Element::new("ac:structured-macro")
            .with_attr("ac:name", "code")
            .with_child(Node::Element(
                Element::new("ac:parameter")
                    .with_attr("ac:name", "language")
                    .with_child(Node::text("rust")),
            ));
        assert_eq!(element.macro_parameter("language").as_deref(), Some("rust"));
        assert_eq!(element.macro_parameter("title"), None);
        assert_eq!(element.local_name(), "structured-macro");
    }

    #[test]
    fn test_text_content_includes_cdata() {
        let element = Element::new("p")
            .with_child(Node::text("a "))
            .with_child(Node::CData {
                value: "<b>".to_string(),
            });
        assert_eq!(element.text_content(), "a <b>");
    }
}
