//! storage-parser: Lenient parser for Confluence storage-format markup
//!
//! This crate provides:
//! - A forgiving element-tree parser built on quick-xml
//! - HTML and XML character reference decoding
//! - Re-serialization of parsed trees
//!
//! # Example
//!
//! ```
//! use storage_parser::{parse, Node};
//!
//! let nodes = parse(r#"<p>Hello&nbsp;<strong>world</strong></p>"#).unwrap();
//! assert_eq!(nodes.len(), 1);
//! let p = nodes[0].as_element().unwrap();
//! assert_eq!(p.text_content(), "Hello\u{a0}world");
//! ```

pub mod entities;
pub mod parser;
pub mod serializer;
pub mod tree;

pub use entities::{decode_entity, unescape};
pub use parser::{ParseError, ParseResult, parse, parse_lenient};
pub use serializer::{
    SerializeOptions, cdata, escape_attr, escape_text, serialize, serialize_element,
};
pub use tree::{Element, Node};
