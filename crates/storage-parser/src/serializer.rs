//! Re-emit parsed trees as markup

use crate::tree::{Element, Node};

/// Serializer options
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    /// Drop `confluence*` class tokens and redundant `colspan`/`rowspan`
    pub strip_confluence_classes: bool,
}

/// Serialize nodes back to markup
pub fn serialize(nodes: &[Node], options: &SerializeOptions) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, options, &mut out);
    }
    out
}

/// Serialize a single element, tags included
pub fn serialize_element(element: &Element, options: &SerializeOptions) -> String {
    let mut out = String::new();
    write_element(element, options, &mut out);
    out
}

fn write_node(node: &Node, options: &SerializeOptions, out: &mut String) {
    match node {
        Node::Element(element) => write_element(element, options, out),
        Node::Text { value } => out.push_str(&escape_text(value)),
        Node::CData { value } => out.push_str(&cdata(value)),
    }
}

fn write_element(element: &Element, options: &SerializeOptions, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        let value = if options.strip_confluence_classes {
            match strip_attr(key, value) {
                Some(value) => value,
                None => continue,
            }
        } else {
            value.clone()
        };
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(&value));
        out.push('"');
    }

    if element.children.is_empty() && self_closes(&element.name) {
        out.push_str(" />");
        return;
    }

    out.push('>');
    for child in &element.children {
        write_node(child, options, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

/// Returns the value to keep, or `None` to drop the attribute
fn strip_attr(key: &str, value: &str) -> Option<String> {
    match key {
        "class" => {
            let kept: Vec<&str> = value
                .split_whitespace()
                .filter(|token| !token.starts_with("confluence"))
                .collect();
            (!kept.is_empty()).then(|| kept.join(" "))
        }
        "colspan" | "rowspan" if value.trim() == "1" => None,
        _ => Some(value.to_string()),
    }
}

/// Empty elements written as `<x />`: HTML voids and vendor elements
fn self_closes(name: &str) -> bool {
    name.contains(':')
        || matches!(
            name.to_ascii_lowercase().as_str(),
            "br" | "hr" | "img" | "col" | "input" | "meta" | "link" | "area" | "wbr" | "source"
        )
}

/// Escape text content
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a double-quoted attribute value
pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Wrap text in CDATA sections, splitting any `]]>` it contains
pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn round(markup: &str, options: &SerializeOptions) -> String {
        serialize(&parse(markup).unwrap(), options)
    }

    #[test]
    fn test_serialize_preserves_structure() {
        let markup = r#"<table><tbody><tr><td class="x">a &amp; b</td></tr></tbody></table>"#;
        assert_eq!(round(markup, &SerializeOptions::default()), markup);
    }

    #[test]
    fn test_serialize_self_closing() {
        assert_eq!(
            round(
                r#"<p>a<br>b</p><ac:image><ri:attachment ri:filename="x.png"></ri:attachment></ac:image>"#,
                &SerializeOptions::default()
            ),
            r#"<p>a<br />b</p><ac:image><ri:attachment ri:filename="x.png" /></ac:image>"#
        );
    }

    #[test]
    fn test_strip_confluence_classes() {
        let options = SerializeOptions {
            strip_confluence_classes: true,
        };
        assert_eq!(
            round(
                r#"<table class="confluenceTable wrapped"><tr><th class="confluenceTh" colspan="1">h</th><td colspan="2">c</td></tr></table>"#,
                &options
            ),
            r#"<table class="wrapped"><tr><th>h</th><td colspan="2">c</td></tr></table>"#
        );
    }

    #[test]
    fn test_cdata_split() {
        assert_eq!(cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
        let nodes = parse(&format!("<x>{}</x>", cdata("a]]>b"))).unwrap();
        assert_eq!(nodes[0].as_element().unwrap().text_content(), "a]]>b");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"say "hi" & <go>"#), "say &quot;hi&quot; &amp; &lt;go&gt;");
    }
}
