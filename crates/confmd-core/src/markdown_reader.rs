//! Markdown to document model conversion
//!
//! pulldown-cmark events are folded into the model with an explicit frame
//! stack. Block containers collect blocks, everything else collects inlines.

use std::collections::BTreeMap;

use confmd_mdast::{
    Block, CalloutKind, Inline, ListItem, TableCell, TableRow, TaskItem, plain_text, push_text,
};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Deserializer, Serialize};

use crate::convert::{Origin, callout_marker, image_source, read_nodes};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;

/// Frontmatter of a Markdown page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub page_id: Option<String>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Metadata {
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Page ids are often written unquoted
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Split a leading `---` metadata block from the body.
///
/// A `---` followed by a blank line is a thematic break, not frontmatter.
pub fn split_frontmatter(markdown: &str) -> (Option<&str>, &str) {
    let text = markdown.strip_prefix('\u{feff}').unwrap_or(markdown);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };
    if rest.starts_with('\n') || rest.starts_with("\r\n") {
        return (None, text);
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body.trim_start_matches(['\n', '\r']));
        }
        offset += line.len();
    }
    (None, text)
}

/// Read Markdown into blocks, discarding diagnostics
pub fn read_markdown(markdown: &str) -> Vec<Block> {
    read_markdown_with(markdown, &mut Diagnostics::new())
}

/// Read Markdown into blocks. Frontmatter is skipped; see
/// [`split_frontmatter`].
pub fn read_markdown_with(markdown: &str, diagnostics: &mut Diagnostics) -> Vec<Block> {
    let (_, body) = split_frontmatter(markdown);
    read_body(body, diagnostics)
}

/// Read Markdown that has no frontmatter
pub(crate) fn read_body(body: &str, diagnostics: &mut Diagnostics) -> Vec<Block> {
    let mut reader = MarkdownReader::new(diagnostics);
    for event in Parser::new_ext(body, parser_options()) {
        reader.event(event);
    }
    reader.finish()
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

enum FrameKind {
    Root,
    Paragraph,
    Heading(u8),
    BlockQuote {
        callout: Option<(CalloutKind, String)>,
    },
    List {
        ordered: bool,
        items: Vec<(Option<bool>, ListItem)>,
    },
    Item {
        task: Option<bool>,
    },
    CodeBlock {
        language: String,
        content: String,
    },
    HtmlBlock {
        markup: String,
    },
    Table {
        rows: Vec<TableRow>,
    },
    TableRow {
        header: bool,
        cells: Vec<TableCell>,
    },
    TableCell {
        header: bool,
    },
    /// Opened by a `<details>` HTML block
    Expand {
        title: String,
    },
    Mark(fn(Vec<Inline>) -> Inline),
    Link {
        href: String,
    },
    Image {
        target: String,
    },
    Metadata,
    Transparent,
}

struct Frame {
    kind: FrameKind,
    /// The event that closes this frame; `None` for frames opened by HTML
    end: Option<TagEnd>,
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
}

impl Frame {
    fn new(kind: FrameKind, end: Option<TagEnd>) -> Self {
        Self {
            kind,
            end,
            blocks: Vec::new(),
            inlines: Vec::new(),
        }
    }

    fn is_container(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::Root
                | FrameKind::BlockQuote { .. }
                | FrameKind::Item { .. }
                | FrameKind::Expand { .. }
                | FrameKind::TableCell { .. }
        )
    }

    /// Blocks of a container, with trailing loose inlines as a paragraph
    fn into_blocks(self) -> Vec<Block> {
        let mut blocks = self.blocks;
        blocks.extend(paragraph_block(self.inlines));
        blocks
    }
}

struct MarkdownReader<'d> {
    stack: Vec<Frame>,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> MarkdownReader<'d> {
    fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            stack: vec![Frame::new(FrameKind::Root, None)],
            diagnostics,
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Html(text) => self.push_str(&text),
            Event::Code(code) => self.push_inline(Inline::code(code.to_string())),
            Event::InlineHtml(html) => self.inline_html(&html),
            Event::SoftBreak => self.push_str("\n"),
            Event::HardBreak => self.push_inline(Inline::LineBreak),
            Event::Rule => self.push_block(Block::ThematicBreak),
            Event::TaskListMarker(done) => {
                let item = self
                    .stack
                    .iter_mut()
                    .rev()
                    .find_map(|frame| match &mut frame.kind {
                        FrameKind::Item { task } => Some(task),
                        _ => None,
                    });
                if let Some(task) = item {
                    *task = Some(done);
                }
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let end = Some(tag.to_end());
        let kind = match tag {
            Tag::Paragraph => FrameKind::Paragraph,
            Tag::Heading { level, .. } => FrameKind::Heading(level as u8),
            Tag::BlockQuote(_) => FrameKind::BlockQuote { callout: None },
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or_default().to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                FrameKind::CodeBlock {
                    language,
                    content: String::new(),
                }
            }
            Tag::HtmlBlock => FrameKind::HtmlBlock {
                markup: String::new(),
            },
            Tag::List(start) => FrameKind::List {
                ordered: start.is_some(),
                items: Vec::new(),
            },
            Tag::Item => FrameKind::Item { task: None },
            Tag::Table(_) => FrameKind::Table { rows: Vec::new() },
            Tag::TableHead => FrameKind::TableRow {
                header: true,
                cells: Vec::new(),
            },
            Tag::TableRow => FrameKind::TableRow {
                header: false,
                cells: Vec::new(),
            },
            Tag::TableCell => FrameKind::TableCell {
                header: matches!(
                    self.stack.last(),
                    Some(Frame {
                        kind: FrameKind::TableRow { header: true, .. },
                        ..
                    })
                ),
            },
            Tag::Emphasis => FrameKind::Mark(Inline::italic),
            Tag::Strong => FrameKind::Mark(Inline::bold),
            Tag::Strikethrough => FrameKind::Mark(Inline::strike),
            Tag::Link { dest_url, .. } => FrameKind::Link {
                href: dest_url.to_string(),
            },
            Tag::Image { dest_url, .. } => FrameKind::Image {
                target: dest_url.to_string(),
            },
            Tag::MetadataBlock(_) => FrameKind::Metadata,
            _ => FrameKind::Transparent,
        };

        if matches!(
            kind,
            FrameKind::Paragraph
                | FrameKind::Heading(_)
                | FrameKind::BlockQuote { .. }
                | FrameKind::CodeBlock { .. }
                | FrameKind::HtmlBlock { .. }
                | FrameKind::List { .. }
                | FrameKind::Table { .. }
        ) {
            self.flush_pending();
        }
        self.stack.push(Frame::new(kind, end));
    }

    /// Close frames up to and including the one `tag` ends. Frames opened
    /// by HTML and left open are closed on the way.
    fn end(&mut self, tag: TagEnd) {
        while self.stack.len() > 1 {
            let matched = self.stack.last().is_some_and(|frame| frame.end == Some(tag));
            self.close_top();
            if matched {
                return;
            }
        }
    }

    fn finish(mut self) -> Vec<Block> {
        while self.stack.len() > 1 {
            self.close_top();
        }
        self.stack
            .pop()
            .map(Frame::into_blocks)
            .unwrap_or_default()
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push_str(&mut self, text: &str) {
        let frame = self.top();
        match &mut frame.kind {
            FrameKind::CodeBlock { content, .. } => content.push_str(text),
            FrameKind::HtmlBlock { markup } => markup.push_str(text),
            FrameKind::Metadata => {}
            _ => push_text(&mut frame.inlines, text),
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        let frame = self.top();
        if !matches!(
            frame.kind,
            FrameKind::CodeBlock { .. } | FrameKind::HtmlBlock { .. } | FrameKind::Metadata
        ) {
            frame.inlines.push(inline);
        }
    }

    fn push_block(&mut self, block: Block) {
        self.flush_pending();
        self.top().blocks.push(block);
    }

    /// Loose inline content of a tight list item becomes a paragraph before
    /// the next block
    fn flush_pending(&mut self) {
        let frame = self.top();
        if frame.is_container() && !frame.inlines.is_empty() {
            let inlines = std::mem::take(&mut frame.inlines);
            frame.blocks.extend(paragraph_block(inlines));
        }
    }

    fn close_top(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let Frame {
            kind,
            blocks,
            inlines,
            ..
        } = frame;

        match kind {
            FrameKind::Root => self.stack.push(Frame {
                kind: FrameKind::Root,
                end: None,
                blocks,
                inlines,
            }),
            FrameKind::Paragraph => self.close_paragraph(inlines),
            FrameKind::Heading(level) => {
                self.push_block(Block::heading(level, finish_inlines(inlines)));
            }
            FrameKind::BlockQuote { callout } => {
                let mut body = blocks;
                body.extend(paragraph_block(inlines));
                let block = match callout {
                    Some((kind, title)) => Block::callout(kind, title, body),
                    None => Block::blockquote(body),
                };
                self.push_block(block);
            }
            FrameKind::List { ordered, items } => self.push_block(build_list(ordered, items)),
            FrameKind::Item { task } => {
                let mut item_blocks = blocks;
                item_blocks.extend(paragraph_block(inlines));
                match &mut self.top().kind {
                    FrameKind::List { items, .. } => items.push((task, ListItem::new(item_blocks))),
                    _ => {
                        for block in item_blocks {
                            self.push_block(block);
                        }
                    }
                }
            }
            FrameKind::CodeBlock {
                language,
                mut content,
            } => {
                // The writer always ends content with one newline
                if content.ends_with('\n') {
                    content.pop();
                }
                self.push_block(Block::code(language, content));
            }
            FrameKind::HtmlBlock { markup } => self.html_block(&markup),
            FrameKind::Table { rows } => self.push_block(Block::table(rows)),
            FrameKind::TableRow { cells, .. } => {
                if let FrameKind::Table { rows } = &mut self.top().kind {
                    rows.push(TableRow::new(cells));
                }
            }
            FrameKind::TableCell { header } => {
                let mut cell_blocks = blocks;
                cell_blocks.extend(paragraph_block(inlines));
                if let FrameKind::TableRow { cells, .. } = &mut self.top().kind {
                    cells.push(TableCell::new(header, cell_blocks));
                }
            }
            FrameKind::Expand { title } => {
                let mut body = blocks;
                body.extend(paragraph_block(inlines));
                self.push_block(Block::expand(title, body));
            }
            FrameKind::Mark(wrap) => {
                if !inlines.is_empty() {
                    self.push_inline(wrap(inlines));
                }
            }
            FrameKind::Link { href } => self.push_inline(Inline::link(href, inlines)),
            FrameKind::Image { target } => {
                let alt = plain_text(&inlines).replace('\n', " ");
                self.push_inline(Inline::image(alt, image_source(&target, Origin::Markdown)));
            }
            FrameKind::Metadata => {}
            FrameKind::Transparent => {
                for block in blocks {
                    self.push_block(block);
                }
                for inline in inlines {
                    match inline {
                        Inline::Text(text) => self.push_str(&text.value),
                        other => self.push_inline(other),
                    }
                }
            }
        }
    }

    /// The first paragraph of a blockquote may open a callout: its first
    /// line holds the marker and title, the rest is body
    fn close_paragraph(&mut self, mut inlines: Vec<Inline>) {
        let opens_quote = matches!(
            self.stack.last(),
            Some(Frame {
                kind: FrameKind::BlockQuote { callout: None },
                blocks,
                ..
            }) if blocks.is_empty()
        );
        if opens_quote && let Some((kind, title, rest)) = split_callout(&inlines) {
            if let FrameKind::BlockQuote { callout } = &mut self.top().kind {
                *callout = Some((kind, title));
            }
            inlines = rest;
        }
        if let Some(block) = paragraph_block(inlines) {
            self.push_block(block);
        }
    }

    fn html_block(&mut self, markup: &str) {
        let trimmed = markup.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.is_empty() || (lower.starts_with("<!--") && lower.ends_with("-->")) {
            // Language hints and list separators
            return;
        }

        if lower.starts_with("<details") && !lower.contains("</details") {
            let title = summary_title(trimmed).unwrap_or_else(|| "Details".to_string());
            self.stack.push(Frame::new(FrameKind::Expand { title }, None));
            return;
        }

        if lower.starts_with("</details") {
            if matches!(self.top().kind, FrameKind::Expand { .. }) {
                self.close_top();
            }
            return;
        }

        if lower.starts_with("<table") || lower.starts_with("<details") {
            match storage_parser::parse(trimmed) {
                Ok(nodes) => {
                    for block in read_nodes(&nodes, Origin::Markdown, self.diagnostics) {
                        self.push_block(block);
                    }
                }
                Err(error) => {
                    tracing::debug!(%error, "Keeping unparsable HTML block");
                    self.diagnostics.push(Diagnostic::MalformedTable);
                    self.push_block(Block::raw(trimmed));
                }
            }
            return;
        }

        let element = html_tag_name(trimmed).unwrap_or_default();
        self.diagnostics.push(Diagnostic::RawPassthrough { element });
        self.push_block(Block::raw(trimmed));
    }

    fn inline_html(&mut self, html: &str) {
        let trimmed = html.trim();
        if trimmed.starts_with("<!--") {
            return;
        }
        match html_tag_name(trimmed).as_deref() {
            Some("br") => self.push_inline(Inline::LineBreak),
            Some("u") => self.stack.push(Frame::new(FrameKind::Mark(Inline::underline), None)),
            Some("/u") => {
                let open = self.stack.iter().rposition(|frame| {
                    frame.end.is_none() && matches!(frame.kind, FrameKind::Mark(_))
                });
                if let Some(index) = open {
                    while self.stack.len() > index {
                        self.close_top();
                    }
                }
            }
            _ => self.diagnostics.push(Diagnostic::UnsupportedInline {
                markup: trimmed.to_string(),
            }),
        }
    }
}

/// Lowercase tag name of an HTML tag, `/name` for closing tags
fn html_tag_name(html: &str) -> Option<String> {
    let inner = html.strip_prefix('<')?;
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == ':' || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(if closing { format!("/{name}") } else { name })
}

fn summary_title(markup: &str) -> Option<String> {
    let start = markup.find("<summary>")? + "<summary>".len();
    let end = markup[start..].find("</summary>")? + start;
    Some(storage_parser::unescape(markup[start..end].trim()))
}

/// Split `[!KIND] title` off the first line of a paragraph
fn split_callout(inlines: &[Inline]) -> Option<(CalloutKind, String, Vec<Inline>)> {
    let Some(Inline::Text(first)) = inlines.first() else {
        return None;
    };
    callout_marker(&first.value)?;

    let mut title_part = Vec::new();
    let mut rest = Vec::new();
    let mut in_title = true;
    for inline in inlines {
        if !in_title {
            rest.push(inline.clone());
            continue;
        }
        match inline {
            Inline::Text(text) if text.value.contains('\n') => {
                let (before, after) = text.value.split_once('\n').unwrap_or((&text.value, ""));
                push_text(&mut title_part, before);
                push_text(&mut rest, after);
                in_title = false;
            }
            other => title_part.push(other.clone()),
        }
    }

    let plain = plain_text(&title_part);
    let (kind, title) = callout_marker(&plain)?;
    Some((kind, title.trim().to_string(), rest))
}

/// Block for a run of inlines: a block image, a TOC placeholder or a
/// paragraph
fn paragraph_block(inlines: Vec<Inline>) -> Option<Block> {
    let mut inlines = finish_inlines(inlines);
    if inlines.is_empty() {
        return None;
    }
    if let [Inline::Text(text)] = inlines.as_slice()
        && text.value.trim() == "[TOC]"
    {
        return Some(Block::TableOfContents);
    }
    if matches!(inlines.as_slice(), [Inline::Image(_)])
        && let Some(Inline::Image(image)) = inlines.pop()
    {
        return Some(Block::Image(image));
    }
    Some(Block::paragraph(inlines))
}

/// Soft breaks become spaces
fn finish_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            Inline::Text(text) => push_text(&mut out, &text.value.replace('\n', " ")),
            Inline::Bold(m) => out.push(Inline::bold(finish_inlines(m.children))),
            Inline::Italic(m) => out.push(Inline::italic(finish_inlines(m.children))),
            Inline::Strike(m) => out.push(Inline::strike(finish_inlines(m.children))),
            Inline::Underline(m) => out.push(Inline::underline(finish_inlines(m.children))),
            Inline::Link(link) => out.push(Inline::link(link.href, finish_inlines(link.children))),
            other => out.push(other),
        }
    }
    out
}

/// A bullet list where every item has a checkbox is a task list
fn build_list(ordered: bool, items: Vec<(Option<bool>, ListItem)>) -> Block {
    if !ordered && !items.is_empty() && items.iter().all(|(task, _)| task.is_some()) {
        let tasks = items
            .into_iter()
            .map(|(task, item)| {
                let text = item
                    .blocks
                    .iter()
                    .filter_map(|block| match block {
                        Block::Paragraph(p) => Some(plain_text(&p.children)),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                TaskItem::new(task == Some(true), text.trim())
            })
            .collect();
        return Block::task_list(tasks);
    }

    let items = items
        .into_iter()
        .map(|(task, mut item)| {
            if let Some(done) = task {
                let marker = if done { "[x]" } else { "[ ]" };
                match item.blocks.first_mut() {
                    Some(Block::Paragraph(p)) => {
                        p.children.insert(0, Inline::text(format!("{marker} ")));
                        p.children = finish_inlines(std::mem::take(&mut p.children));
                    }
                    _ => item
                        .blocks
                        .insert(0, Block::paragraph(vec![Inline::text(marker)])),
                }
            }
            item
        })
        .collect();
    Block::list(ordered, items)
}
