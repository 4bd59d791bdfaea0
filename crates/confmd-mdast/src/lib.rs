//! confmd-mdast: document model and Markdown writer for confmd
//!
//! This crate provides:
//! - The document model shared by storage markup and Markdown
//! - Serialization of that model to Markdown
//!
//! ## Example
//!
//! ```rust
//! use confmd_mdast::{Block, Inline, Root, WriterOptions, mdast_to_markdown};
//!
//! let doc = Root::new(vec![
//!     Block::heading(1, vec![Inline::text("Hello")]),
//!     Block::paragraph(vec![Inline::text("World")]),
//! ]);
//!
//! let md = mdast_to_markdown(&doc, &WriterOptions::default());
//! assert_eq!(md, "# Hello\n\nWorld\n");
//! ```

pub mod mdast;
pub mod writer;

pub use mdast::{
    AttachmentRecord, AttachmentRef, Block, Blockquote, Callout, CalloutKind, CodeBlock, Expand,
    Heading, Image, ImageSource, Inline, Link, List, ListItem, Marked, Page, Paragraph,
    RawPassthrough, Root, Table, TableCell, TableRow, TaskItem, TaskList, Text, for_each_image,
    for_each_image_mut, plain_text, push_text,
};
pub use writer::{
    DEFAULT_ATTACHMENTS_DIR, Frontmatter, WriterOptions, blocks_to_markdown, mdast_to_markdown,
};
