//! Lenient tree builder over quick-xml events
//!
//! Storage markup is a fragment, not a document: it has many roots, uses the
//! `ac:` and `ri:` prefixes without declaring them, and mixes in HTML habits
//! such as unclosed `<br>`. The reader is configured to tolerate all of that
//! and the element stack here repairs the nesting.

use quick_xml::Reader;
use quick_xml::encoding::EncodingError;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::entities::{decode_entity, unescape};
use crate::tree::{Element, Node};

/// Name of the synthetic element wrapped around every fragment
const ROOT: &str = "confmd-root";

/// Namespace declarations carried by the synthetic root
const ROOT_NAMESPACES: &str = r#"xmlns:ac="http://atlassian.com/content" xmlns:ri="http://atlassian.com/resource/identifier""#;

/// Elements that never take children
const VOID_ELEMENTS: &[&str] = &[
    "br", "hr", "img", "col", "input", "meta", "link", "area", "wbr", "source",
];

/// Parser errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed markup at byte {position}: {source}")]
    Xml {
        /// Byte offset into the original fragment
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

impl ParseError {
    fn position(&self) -> Option<usize> {
        match self {
            ParseError::Xml { position, .. } => Some(*position),
            ParseError::Encoding(_) => None,
        }
    }
}

/// Parse result type
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a fragment, failing on tokenizer errors.
///
/// Nesting problems are still repaired: unmatched closing tags are ignored
/// and elements left open are closed at the end of input.
pub fn parse(markup: &str) -> ParseResult<Vec<Node>> {
    let mut builder = TreeBuilder::new();
    build(markup, &mut builder)?;
    Ok(builder.finish())
}

/// Parse a fragment, never failing.
///
/// On a tokenizer error the tree built so far is kept and the rest of the
/// input is appended as text.
pub fn parse_lenient(markup: &str) -> Vec<Node> {
    let mut builder = TreeBuilder::new();
    if let Err(error) = build(markup, &mut builder) {
        let mut offset = error.position().unwrap_or(0).min(markup.len());
        while !markup.is_char_boundary(offset) {
            offset -= 1;
        }
        builder.close_all();
        builder.text(&markup[offset..]);
    }
    builder.finish()
}

fn build(markup: &str, builder: &mut TreeBuilder) -> ParseResult<()> {
    let prefix = format!("<{ROOT} {ROOT_NAMESPACES}>");
    let wrapped = format!("{prefix}{markup}</{ROOT}>");

    let mut reader = Reader::from_str(&wrapped);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(source) => {
                let position = usize::try_from(reader.error_position())
                    .unwrap_or(usize::MAX)
                    .saturating_sub(prefix.len());
                return Err(ParseError::Xml { position, source });
            }
        };

        match event {
            Event::Start(e) => {
                let element = decode_element(&reader, &e)?;
                if element.name == ROOT {
                    continue;
                }
                if is_void(&element.name) {
                    builder.append(Node::Element(element));
                } else {
                    builder.open(element);
                }
            }
            Event::Empty(e) => {
                let element = decode_element(&reader, &e)?;
                if element.name != ROOT {
                    builder.append(Node::Element(element));
                }
            }
            Event::End(e) => {
                let qname = e.name();
                let name = reader.decoder().decode(qname.as_ref())?;
                if name != ROOT {
                    builder.close(&name);
                }
            }
            Event::Text(e) => builder.text(&e.decode()?),
            Event::GeneralRef(e) => builder.text(&decode_entity(&e.decode()?)),
            Event::CData(e) => builder.append(Node::CData {
                value: e.decode()?.into_owned(),
            }),
            Event::Eof => break,
            // Comments, declarations and processing instructions carry no content
            _ => {}
        }
    }
    Ok(())
}

fn decode_element(reader: &Reader<&[u8]>, start: &BytesStart) -> ParseResult<Element> {
    let decoder = reader.decoder();
    let mut element = Element::new(decoder.decode(start.name().as_ref())?);
    for attr in start.html_attributes().flatten() {
        let key = decoder.decode(attr.key.as_ref())?;
        let value = decoder.decode(&attr.value)?;
        element.attrs.push((key.into_owned(), unescape(&value)));
    }
    Ok(element)
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.eq_ignore_ascii_case(name))
}

/// Element stack with a document node at the bottom
struct TreeBuilder {
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Element::default()],
        }
    }

    fn current(&mut self) -> &mut Element {
        // The document element is never popped
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn open(&mut self, element: Element) {
        self.stack.push(element);
    }

    fn append(&mut self, node: Node) {
        self.current().children.push(node);
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let children = &mut self.current().children;
        if let Some(Node::Text { value }) = children.last_mut() {
            value.push_str(text);
        } else {
            children.push(Node::text(text));
        }
    }

    /// Close the nearest open element named `name` and everything inside it
    fn close(&mut self, name: &str) {
        let Some(position) = self.stack.iter().rposition(|e| e.name == name) else {
            return;
        };
        if position == 0 {
            return;
        }
        while self.stack.len() > position {
            self.pop();
        }
    }

    fn close_all(&mut self) {
        while self.stack.len() > 1 {
            self.pop();
        }
    }

    fn pop(&mut self) {
        if let Some(element) = self.stack.pop() {
            self.current().children.push(Node::Element(element));
        }
    }

    fn finish(mut self) -> Vec<Node> {
        self.close_all();
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }
}
