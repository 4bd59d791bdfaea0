//! Document model types
//!
//! A tagged tree holding the content both formats can express. Storage
//! markup and Markdown are read into it and written out of it.

use serde::{Deserialize, Serialize};

/// Root node of a converted document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Root {
    pub children: Vec<Block>,
}

impl Root {
    pub fn new(children: Vec<Block>) -> Self {
        Self { children }
    }
}

/// A block-level node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Heading(Heading),
    Paragraph(Paragraph),
    List(List),
    Table(Table),
    CodeBlock(CodeBlock),
    Callout(Callout),
    TaskList(TaskList),
    Expand(Expand),
    Image(Image),
    ThematicBreak,
    Blockquote(Blockquote),
    TableOfContents,
    RawPassthrough(RawPassthrough),
}

/// Heading node (levels 1 to 6)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub children: Vec<Inline>,
}

/// Paragraph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub children: Vec<Inline>,
}

/// List node (ordered or unordered)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

/// List item node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

impl ListItem {
    /// The nested list of a wrapper item.
    ///
    /// A wrapper item holds nothing but one nested list. It attaches that
    /// list to the previous item and renders no marker of its own.
    pub fn wrapper_list(&self) -> Option<&List> {
        match self.blocks.as_slice() {
            [Block::List(list)] => Some(list),
            _ => None,
        }
    }

    pub fn is_wrapper(&self) -> bool {
        self.wrapper_list().is_some()
    }
}

/// Table node
///
/// Rows are a best-effort decomposition. `literal` keeps the markup span the
/// table was read from, used when no rows could be recovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<TableRow>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub literal: String,
}

/// Table row node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

/// Table cell node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub header: bool,
    #[serde(default = "one")]
    pub colspan: u32,
    #[serde(default = "one")]
    pub rowspan: u32,
    pub blocks: Vec<Block>,
}

fn one() -> u32 {
    1
}

/// Code block node
///
/// `content` is kept byte-exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub language: String,
    pub content: String,
}

/// Admonition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalloutKind {
    Note,
    Warning,
    Success,
}

impl CalloutKind {
    pub const ALL: [CalloutKind; 3] = [CalloutKind::Note, CalloutKind::Warning, CalloutKind::Success];

    /// Marker name used in `> [!KIND]` blockquotes
    pub fn as_str(self) -> &'static str {
        match self {
            CalloutKind::Note => "NOTE",
            CalloutKind::Warning => "WARNING",
            CalloutKind::Success => "SUCCESS",
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == marker)
    }

    /// Kind for a storage-format admonition macro name
    pub fn from_macro(name: &str) -> Self {
        match name {
            "warning" => CalloutKind::Warning,
            "tip" => CalloutKind::Success,
            _ => CalloutKind::Note,
        }
    }

    /// Storage-format macro name written for this kind
    pub fn macro_name(self) -> &'static str {
        match self {
            CalloutKind::Note => "info",
            CalloutKind::Warning => "warning",
            CalloutKind::Success => "tip",
        }
    }
}

/// Callout node (`> [!KIND] Title`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callout {
    pub kind: CalloutKind,
    pub title: String,
    pub body: Vec<Block>,
}

/// Task list node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub items: Vec<TaskItem>,
}

/// A single task with its completion state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub done: bool,
    pub text: String,
}

/// Collapsible section node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expand {
    pub title: String,
    pub body: Vec<Block>,
}

/// Blockquote node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blockquote {
    pub body: Vec<Block>,
}

/// Markup with no structured representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPassthrough {
    pub markup: String,
}

/// Image node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub alt: String,
    pub source: ImageSource,
}

/// Where an image's bytes live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageSource {
    Attachment(AttachmentRef),
    External { url: String },
}

/// Reference to a page attachment
///
/// Reading storage markup makes the remote side authoritative, reading
/// Markdown makes `local_relative_path` authoritative. Only the reconciler
/// fills in the other side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub filename: String,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub local_relative_path: Option<String>,
}

impl AttachmentRef {
    /// A reference read from storage markup
    pub fn remote(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            remote_id: None,
            local_relative_path: None,
        }
    }

    /// A reference read from Markdown; the filename is the path's last segment
    pub fn local(path: impl Into<String>) -> Self {
        let path = path.into();
        let filename = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path.as_str())
            .to_string();
        Self {
            filename,
            remote_id: None,
            local_relative_path: Some(path),
        }
    }
}

/// Attachment as listed by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    pub id: String,
    #[serde(alias = "title")]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_ref: Option<String>,
}

impl AttachmentRecord {
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            download_ref: None,
        }
    }
}

/// A page and its converted body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub body: Vec<Block>,
    pub attachments: Vec<AttachmentRef>,
}

impl Page {
    /// Build a page, collecting the attachment references used by its body
    pub fn new(title: impl Into<String>, body: Vec<Block>) -> Self {
        let mut attachments: Vec<AttachmentRef> = Vec::new();
        for_each_image(&body, &mut |image| {
            if let ImageSource::Attachment(reference) = &image.source
                && !attachments.contains(reference)
            {
                attachments.push(reference.clone());
            }
        });
        Self {
            title: title.into(),
            body,
            attachments,
        }
    }
}

/// An inline node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text(Text),
    Bold(Marked),
    Italic(Marked),
    Strike(Marked),
    Underline(Marked),
    InlineCode(Text),
    LineBreak,
    Link(Link),
    Image(Image),
}

/// Text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
}

/// Children of a formatting mark (bold, italic, strike, underline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marked {
    pub children: Vec<Inline>,
}

/// Link node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub children: Vec<Inline>,
}

// Convenience constructors
impl Block {
    pub fn heading(level: u8, children: Vec<Inline>) -> Self {
        Block::Heading(Heading { level, children })
    }

    pub fn paragraph(children: Vec<Inline>) -> Self {
        Block::Paragraph(Paragraph { children })
    }

    pub fn list(ordered: bool, items: Vec<ListItem>) -> Self {
        Block::List(List { ordered, items })
    }

    pub fn code(language: impl Into<String>, content: impl Into<String>) -> Self {
        Block::CodeBlock(CodeBlock {
            language: language.into(),
            content: content.into(),
        })
    }

    pub fn callout(kind: CalloutKind, title: impl Into<String>, body: Vec<Block>) -> Self {
        Block::Callout(Callout {
            kind,
            title: title.into(),
            body,
        })
    }

    pub fn task_list(items: Vec<TaskItem>) -> Self {
        Block::TaskList(TaskList { items })
    }

    pub fn expand(title: impl Into<String>, body: Vec<Block>) -> Self {
        Block::Expand(Expand {
            title: title.into(),
            body,
        })
    }

    pub fn blockquote(body: Vec<Block>) -> Self {
        Block::Blockquote(Blockquote { body })
    }

    pub fn table(rows: Vec<TableRow>) -> Self {
        Block::Table(Table {
            rows,
            literal: String::new(),
        })
    }

    pub fn raw(markup: impl Into<String>) -> Self {
        Block::RawPassthrough(RawPassthrough {
            markup: markup.into(),
        })
    }

    pub fn image(alt: impl Into<String>, source: ImageSource) -> Self {
        Block::Image(Image {
            alt: alt.into(),
            source,
        })
    }
}

impl ListItem {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// An item holding a single paragraph
    pub fn text(children: Vec<Inline>) -> Self {
        Self {
            blocks: vec![Block::paragraph(children)],
        }
    }
}

impl TaskItem {
    pub fn new(done: bool, text: impl Into<String>) -> Self {
        Self {
            done,
            text: text.into(),
        }
    }
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }
}

impl TableCell {
    pub fn new(header: bool, blocks: Vec<Block>) -> Self {
        Self {
            header,
            colspan: 1,
            rowspan: 1,
            blocks,
        }
    }
}

impl Inline {
    pub fn text(s: impl Into<String>) -> Self {
        Inline::Text(Text { value: s.into() })
    }

    pub fn bold(children: Vec<Inline>) -> Self {
        Inline::Bold(Marked { children })
    }

    pub fn italic(children: Vec<Inline>) -> Self {
        Inline::Italic(Marked { children })
    }

    pub fn strike(children: Vec<Inline>) -> Self {
        Inline::Strike(Marked { children })
    }

    pub fn underline(children: Vec<Inline>) -> Self {
        Inline::Underline(Marked { children })
    }

    pub fn code(value: impl Into<String>) -> Self {
        Inline::InlineCode(Text {
            value: value.into(),
        })
    }

    pub fn link(href: impl Into<String>, children: Vec<Inline>) -> Self {
        Inline::Link(Link {
            href: href.into(),
            children,
        })
    }

    pub fn image(alt: impl Into<String>, source: ImageSource) -> Self {
        Inline::Image(Image {
            alt: alt.into(),
            source,
        })
    }
}

/// Append text, merging with a trailing text node
pub fn push_text(children: &mut Vec<Inline>, s: &str) {
    if s.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = children.last_mut() {
        last.value.push_str(s);
    } else {
        children.push(Inline::text(s));
    }
}

/// Plain text of an inline run (marks dropped, breaks as spaces)
pub fn plain_text(children: &[Inline]) -> String {
    let mut out = String::new();
    collect_plain_text(children, &mut out);
    out
}

fn collect_plain_text(children: &[Inline], out: &mut String) {
    for child in children {
        match child {
            Inline::Text(t) | Inline::InlineCode(t) => out.push_str(&t.value),
            Inline::Bold(m) | Inline::Italic(m) | Inline::Strike(m) | Inline::Underline(m) => {
                collect_plain_text(&m.children, out);
            }
            Inline::Link(l) => collect_plain_text(&l.children, out),
            Inline::LineBreak => out.push(' '),
            Inline::Image(img) => out.push_str(&img.alt),
        }
    }
}

/// Visit every image in a block tree, inline or block-level
pub fn for_each_image(blocks: &[Block], f: &mut dyn FnMut(&Image)) {
    for block in blocks {
        match block {
            Block::Heading(Heading { children, .. }) | Block::Paragraph(Paragraph { children }) => {
                inline_images(children, f);
            }
            Block::List(list) => {
                for item in &list.items {
                    for_each_image(&item.blocks, f);
                }
            }
            Block::Table(table) => {
                for cell in table.rows.iter().flat_map(|r| &r.cells) {
                    for_each_image(&cell.blocks, f);
                }
            }
            Block::Callout(Callout { body, .. })
            | Block::Expand(Expand { body, .. })
            | Block::Blockquote(Blockquote { body }) => for_each_image(body, f),
            Block::Image(image) => f(image),
            Block::CodeBlock(_)
            | Block::TaskList(_)
            | Block::ThematicBreak
            | Block::TableOfContents
            | Block::RawPassthrough(_) => {}
        }
    }
}

fn inline_images(children: &[Inline], f: &mut dyn FnMut(&Image)) {
    for child in children {
        match child {
            Inline::Image(image) => f(image),
            Inline::Bold(m) | Inline::Italic(m) | Inline::Strike(m) | Inline::Underline(m) => {
                inline_images(&m.children, f);
            }
            Inline::Link(l) => inline_images(&l.children, f),
            Inline::Text(_) | Inline::InlineCode(_) | Inline::LineBreak => {}
        }
    }
}

/// Mutable counterpart of [`for_each_image`]
pub fn for_each_image_mut(blocks: &mut [Block], f: &mut dyn FnMut(&mut Image)) {
    for block in blocks {
        match block {
            Block::Heading(Heading { children, .. }) | Block::Paragraph(Paragraph { children }) => {
                inline_images_mut(children, f);
            }
            Block::List(list) => {
                for item in &mut list.items {
                    for_each_image_mut(&mut item.blocks, f);
                }
            }
            Block::Table(table) => {
                for cell in table.rows.iter_mut().flat_map(|r| &mut r.cells) {
                    for_each_image_mut(&mut cell.blocks, f);
                }
            }
            Block::Callout(Callout { body, .. })
            | Block::Expand(Expand { body, .. })
            | Block::Blockquote(Blockquote { body }) => for_each_image_mut(body, f),
            Block::Image(image) => f(image),
            Block::CodeBlock(_)
            | Block::TaskList(_)
            | Block::ThematicBreak
            | Block::TableOfContents
            | Block::RawPassthrough(_) => {}
        }
    }
}

fn inline_images_mut(children: &mut [Inline], f: &mut dyn FnMut(&mut Image)) {
    for child in children {
        match child {
            Inline::Image(image) => f(image),
            Inline::Bold(m) | Inline::Italic(m) | Inline::Strike(m) | Inline::Underline(m) => {
                inline_images_mut(&mut m.children, f);
            }
            Inline::Link(l) => inline_images_mut(&mut l.children, f),
            Inline::Text(_) | Inline::InlineCode(_) | Inline::LineBreak => {}
        }
    }
}
