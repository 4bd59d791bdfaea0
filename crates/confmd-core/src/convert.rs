//! Storage format to document model conversion
//!
//! Walks the element tree from `storage-parser` with a closed set of
//! handlers. Inline content accumulates into the current paragraph and any
//! block element flushes it. Unknown plain elements are transparent; unknown
//! macros become passthrough blocks.

use std::path::Path;

use confmd_mdast::{
    AttachmentRef, Block, CalloutKind, Image, ImageSource, Inline, ListItem, Table, TableCell,
    TableRow, TaskItem, plain_text, push_text,
};
use percent_encoding::percent_decode_str;
use storage_parser::{Element, Node, SerializeOptions, serialize_element};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;

/// Deepest list nesting kept; deeper lists are flattened
pub const MAX_LIST_DEPTH: usize = 32;

/// Elements that end the current paragraph and carry their own content
const BLOCK_CONTAINERS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "main",
    "header",
    "footer",
    "center",
    "body",
    "html",
    "ac:layout",
    "ac:layout-section",
    "ac:layout-cell",
    "ac:rich-text-body",
];

/// Macros that sit inside running text
const INLINE_MACROS: &[&str] = &["status", "anchor"];

/// Macros that always render as blocks
const BLOCK_MACROS: &[&str] = &[
    "code", "noformat", "info", "note", "tip", "warning", "panel", "expand", "toc",
];

/// Where the markup being read came from.
///
/// Literal table blocks in Markdown go through the same handlers; image
/// paths found there are local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Storage,
    Markdown,
}

/// State handed down the tree walk
#[derive(Debug, Clone, Copy)]
struct ReadContext {
    list_depth: usize,
    origin: Origin,
    /// Inside the running text of a `p`
    in_paragraph: bool,
}

impl ReadContext {
    fn new(origin: Origin) -> Self {
        Self {
            list_depth: 0,
            origin,
            in_paragraph: false,
        }
    }

    fn with_paragraph(self, in_paragraph: bool) -> Self {
        Self {
            in_paragraph,
            ..self
        }
    }

    fn enter_list(self) -> Self {
        Self {
            list_depth: self.list_depth + 1,
            ..self
        }
    }
}

/// Convert storage markup to blocks, discarding diagnostics
pub fn read_storage(markup: &str) -> Vec<Block> {
    read_storage_with(markup, &mut Diagnostics::new())
}

/// Convert storage markup to blocks. Never fails; malformed markup is
/// repaired or kept as text.
pub fn read_storage_with(markup: &str, diagnostics: &mut Diagnostics) -> Vec<Block> {
    let nodes = storage_parser::parse_lenient(markup);
    read_nodes(&nodes, Origin::Storage, diagnostics)
}

/// Convert storage markup to blocks, failing on tokenizer errors
pub fn read_storage_strict(markup: &str, diagnostics: &mut Diagnostics) -> Result<Vec<Block>> {
    let nodes = storage_parser::parse(markup)?;
    Ok(read_nodes(&nodes, Origin::Storage, diagnostics))
}

/// Convert already parsed nodes
pub fn read_nodes(nodes: &[Node], origin: Origin, diagnostics: &mut Diagnostics) -> Vec<Block> {
    let mut converter = Converter { diagnostics };
    converter.convert_blocks(nodes, ReadContext::new(origin))
}

/// Image source for an `img` target or Markdown image destination
pub fn image_source(target: &str, origin: Origin) -> ImageSource {
    let target = target.trim();
    if is_external(target) {
        return ImageSource::External {
            url: target.to_string(),
        };
    }
    let path = target.split(['?', '#']).next().unwrap_or(target);
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let filename = decoded.rsplit(['/', '\\']).next().unwrap_or(&decoded).to_string();
    let reference = match origin {
        Origin::Storage => AttachmentRef::remote(filename),
        Origin::Markdown => AttachmentRef {
            filename,
            remote_id: None,
            local_relative_path: Some(target.to_string()),
        },
    };
    ImageSource::Attachment(reference)
}

fn is_external(target: &str) -> bool {
    target.contains("://") || target.starts_with("data:") || target.starts_with("//")
}

/// Converter state
struct Converter<'d> {
    diagnostics: &'d mut Diagnostics,
}

impl Converter<'_> {
    fn convert_blocks(&mut self, nodes: &[Node], ctx: ReadContext) -> Vec<Block> {
        let ctx = ctx.with_paragraph(false);
        let mut result = Vec::new();
        let mut current_para: Vec<Inline> = Vec::new();
        self.walk(nodes, ctx, &mut current_para, &mut result);
        flush_paragraph(&mut current_para, &mut result);
        result
    }

    fn walk(
        &mut self,
        nodes: &[Node],
        ctx: ReadContext,
        para: &mut Vec<Inline>,
        result: &mut Vec<Block>,
    ) {
        for node in nodes {
            match node {
                Node::Text { value } => append_text(para, value),
                Node::CData { value } => push_text(para, value),
                Node::Element(element) => self.walk_element(element, ctx, para, result),
            }
        }
    }

    fn walk_element(
        &mut self,
        element: &Element,
        ctx: ReadContext,
        para: &mut Vec<Inline>,
        result: &mut Vec<Block>,
    ) {
        let name = element.name.as_str();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                flush_paragraph(para, result);
                let level = name[1..].parse().unwrap_or(1);
                let mut children = self.convert_inlines(&element.children, ctx);
                tidy_inlines(&mut children);
                result.push(Block::heading(level, children));
            }
            "ul" | "ol" => {
                flush_paragraph(para, result);
                result.push(self.convert_list(element, ctx));
            }
            "table" => {
                flush_paragraph(para, result);
                result.push(self.convert_table(element, ctx));
            }
            "pre" => {
                flush_paragraph(para, result);
                result.push(Block::code(pre_language(element), element.text_content()));
            }
            "blockquote" => {
                flush_paragraph(para, result);
                result.push(self.convert_blockquote(element, ctx));
            }
            "hr" => {
                flush_paragraph(para, result);
                result.push(Block::ThematicBreak);
            }
            "details" => {
                flush_paragraph(para, result);
                result.push(self.convert_details(element, ctx));
            }
            "ac:task-list" => {
                flush_paragraph(para, result);
                result.push(convert_task_list(element));
            }
            // Only block macros break running text
            "ac:structured-macro" | "ac:macro"
                if is_block_macro(element)
                    || !(is_inline_macro(element) || ctx.in_paragraph || has_text(para)) =>
            {
                flush_paragraph(para, result);
                self.convert_macro(element, ctx, result);
            }
            _ if BLOCK_CONTAINERS.contains(&name) => {
                flush_paragraph(para, result);
                self.walk(&element.children, ctx.with_paragraph(name == "p"), para, result);
                flush_paragraph(para, result);
            }
            _ if contains_block(element) => self.walk(&element.children, ctx, para, result),
            _ => self.convert_inline_element(element, ctx, para),
        }
    }

    fn convert_inlines(&mut self, nodes: &[Node], ctx: ReadContext) -> Vec<Inline> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                Node::Text { value } => append_text(&mut out, value),
                Node::CData { value } => push_text(&mut out, value),
                Node::Element(element) => self.convert_inline_element(element, ctx, &mut out),
            }
        }
        out
    }

    fn convert_inline_element(&mut self, element: &Element, ctx: ReadContext, out: &mut Vec<Inline>) {
        match element.name.as_str() {
            "strong" | "b" => {
                let children = self.convert_inlines(&element.children, ctx);
                push_marked(out, children, Inline::bold);
            }
            "em" | "i" | "cite" => {
                let children = self.convert_inlines(&element.children, ctx);
                push_marked(out, children, Inline::italic);
            }
            "s" | "del" | "strike" => {
                let children = self.convert_inlines(&element.children, ctx);
                push_marked(out, children, Inline::strike);
            }
            "u" | "ins" => {
                let children = self.convert_inlines(&element.children, ctx);
                push_marked(out, children, Inline::underline);
            }
            "code" | "tt" | "kbd" | "samp" => {
                let text = element.text_content();
                if !text.is_empty() {
                    out.push(Inline::code(text));
                }
            }
            "br" => out.push(Inline::LineBreak),
            "a" => {
                if let Some(link) = self.convert_anchor(element, ctx) {
                    out.push(link);
                }
            }
            "ac:link" => {
                if let Some(link) = self.convert_ac_link(element, ctx) {
                    out.push(link);
                }
            }
            "img" => {
                if let Some(src) = element.attr("src").filter(|s| !s.trim().is_empty()) {
                    out.push(Inline::image(
                        element.attr("alt").unwrap_or_default(),
                        image_source(src, ctx.origin),
                    ));
                }
            }
            "ac:image" => out.push(Inline::Image(self.convert_ac_image(element))),
            "ac:emoticon" => {
                if let Some(fallback) = element.attr("ac:emoji-fallback") {
                    push_text(out, fallback);
                }
            }
            "ac:structured-macro" | "ac:macro" => self.convert_inline_macro(element, ctx, out),
            // Editor prompts, never page content
            "ac:placeholder" => {}
            _ => self.merge_inlines(&element.children, ctx, out),
        }
    }

    /// Convert nodes and splice the result into the surrounding text
    fn merge_inlines(&mut self, nodes: &[Node], ctx: ReadContext, out: &mut Vec<Inline>) {
        for child in self.convert_inlines(nodes, ctx) {
            match child {
                Inline::Text(text) => append_text(out, &text.value),
                other => out.push(other),
            }
        }
    }

    fn convert_anchor(&mut self, element: &Element, ctx: ReadContext) -> Option<Inline> {
        let href = element.attr("href").map(str::trim).filter(|h| !h.is_empty());
        let mut children = self.convert_inlines(&element.children, ctx);
        tidy_inlines(&mut children);
        if children.is_empty() {
            // Named anchors without text
            let href = href?;
            children.push(Inline::text(href));
        }
        Some(Inline::link(href.unwrap_or("#"), children))
    }

    fn convert_ac_link(&mut self, element: &Element, ctx: ReadContext) -> Option<Inline> {
        let href = element
            .attr("ac:anchor")
            .map_or_else(|| "#".to_string(), |anchor| format!("#{anchor}"));

        let mut children = if let Some(body) = element.child("ac:plain-text-link-body") {
            vec![Inline::text(body.text_content())]
        } else if let Some(body) = element.child("ac:link-body") {
            self.convert_inlines(&body.children, ctx)
        } else {
            Vec::new()
        };
        tidy_inlines(&mut children);

        if children.is_empty() {
            let label = element
                .child("ri:page")
                .and_then(|p| p.attr("ri:content-title"))
                .or_else(|| {
                    element
                        .child("ri:attachment")
                        .and_then(|a| a.attr("ri:filename"))
                })
                .or_else(|| element.attr("ac:anchor"))?;
            children.push(Inline::text(label));
        }
        Some(Inline::link(href, children))
    }

    fn convert_ac_image(&mut self, element: &Element) -> Image {
        if let Some(url) = element.child("ri:url").and_then(|u| u.attr("ri:value")) {
            return Image {
                alt: image_alt(element).unwrap_or_default().to_string(),
                source: ImageSource::External {
                    url: url.to_string(),
                },
            };
        }

        let filename = element
            .child("ri:attachment")
            .and_then(|a| a.attr("ri:filename"))
            .map(str::trim)
            .filter(|f| !f.is_empty());
        let alt = image_alt(element);

        let (filename, alt) = match (filename, alt) {
            (Some(filename), Some(alt)) => (filename.to_string(), alt.to_string()),
            (Some(filename), None) => (filename.to_string(), file_stem(filename)),
            (None, alt) => {
                let alt = alt.unwrap_or_default();
                let filename = derive_filename(alt);
                self.diagnostics.push(Diagnostic::DerivedAttachmentName {
                    filename: filename.clone(),
                });
                (filename, alt.to_string())
            }
        };

        Image {
            alt,
            source: ImageSource::Attachment(AttachmentRef::remote(filename)),
        }
    }

    fn convert_inline_macro(&mut self, element: &Element, ctx: ReadContext, out: &mut Vec<Inline>) {
        let name = element.attr("ac:name").unwrap_or_default();
        match name {
            "status" => {
                if let Some(title) = element.macro_parameter("title") {
                    append_text(out, &title);
                }
            }
            "anchor" => {}
            "code" | "noformat" => {
                let body = plain_text_body(element);
                if !body.is_empty() {
                    out.push(Inline::code(body));
                }
            }
            _ => {
                self.diagnostics.push(Diagnostic::RawPassthrough {
                    element: macro_label(element),
                });
                match element.child("ac:rich-text-body") {
                    Some(body) => self.merge_inlines(&body.children, ctx, out),
                    None => append_text(out, &element.text_content()),
                }
            }
        }
    }

    fn convert_macro(&mut self, element: &Element, ctx: ReadContext, result: &mut Vec<Block>) {
        let name = element.attr("ac:name").unwrap_or_default();
        match name {
            "code" => {
                let language = element
                    .macro_parameter("language")
                    .map(|l| l.trim().to_string())
                    .unwrap_or_default();
                result.push(Block::code(language, plain_text_body(element)));
            }
            "noformat" => result.push(Block::code("", plain_text_body(element))),
            "info" | "note" | "tip" | "warning" | "panel" => {
                result.push(self.convert_callout(element, CalloutKind::from_macro(name), ctx));
            }
            "expand" => {
                let title = element
                    .macro_parameter("title")
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Details".to_string());
                let body = self.convert_blocks(rich_text_body(element), ctx);
                result.push(Block::expand(title, body));
            }
            "toc" => result.push(Block::TableOfContents),
            _ => {
                self.diagnostics.push(Diagnostic::RawPassthrough {
                    element: macro_label(element),
                });
                result.push(Block::raw(serialize_element(
                    element,
                    &SerializeOptions::default(),
                )));
            }
        }
    }

    /// The title comes from the `title` parameter, else from the first
    /// paragraph of the body.
    fn convert_callout(&mut self, element: &Element, kind: CalloutKind, ctx: ReadContext) -> Block {
        let body = rich_text_body(element);

        if let Some(title) = element
            .macro_parameter("title")
            .map(|t| normalize_whitespace(&t).trim().to_string())
            .filter(|t| !t.is_empty())
        {
            return Block::callout(kind, title, self.convert_blocks(body, ctx));
        }

        if let Some(index) = body.iter().position(|n| !n.is_blank_text())
            && let Node::Element(first) = &body[index]
            && first.name == "p"
            && !contains_block(first)
        {
            let title = normalize_whitespace(&first.text_content()).trim().to_string();
            return Block::callout(kind, title, self.convert_blocks(&body[index + 1..], ctx));
        }

        Block::callout(kind, "", self.convert_blocks(body, ctx))
    }

    fn convert_list(&mut self, element: &Element, ctx: ReadContext) -> Block {
        let ordered = element.name == "ol";
        let inner = ctx.enter_list();
        let mut items = Vec::new();

        for node in &element.children {
            let Node::Element(child) = node else {
                continue;
            };
            // Stray children such as a nested `ul` become wrapper items
            let blocks = if child.name == "li" {
                self.convert_blocks(&child.children, inner)
            } else {
                self.convert_blocks(std::slice::from_ref(node), inner)
            };

            if inner.list_depth >= MAX_LIST_DEPTH && blocks.iter().any(|b| matches!(b, Block::List(_)))
            {
                self.diagnostics.push_once(Diagnostic::ListDepthExceeded);
                let (nested, rest): (Vec<Block>, Vec<Block>) = blocks
                    .into_iter()
                    .partition(|b| matches!(b, Block::List(_)));
                if !rest.is_empty() {
                    items.push(ListItem::new(rest));
                }
                for block in nested {
                    if let Block::List(list) = block {
                        items.extend(list.items);
                    }
                }
                continue;
            }

            items.push(ListItem::new(blocks));
        }

        Block::list(ordered, items)
    }

    fn convert_table(&mut self, element: &Element, ctx: ReadContext) -> Block {
        let literal = serialize_element(
            element,
            &SerializeOptions {
                strip_confluence_classes: true,
            },
        );
        let mut rows = Vec::new();
        self.collect_rows(element, ctx, &mut rows);
        Block::Table(Table { rows, literal })
    }

    fn collect_rows(&mut self, element: &Element, ctx: ReadContext, rows: &mut Vec<TableRow>) {
        for child in element.elements() {
            match child.name.as_str() {
                "tr" => {
                    let row = self.convert_row(child, ctx);
                    rows.push(row);
                }
                "thead" | "tbody" | "tfoot" => self.collect_rows(child, ctx, rows),
                // colgroup, caption
                _ => {}
            }
        }
    }

    fn convert_row(&mut self, row: &Element, ctx: ReadContext) -> TableRow {
        let mut cells = Vec::new();
        for cell in row.elements() {
            if cell.name != "td" && cell.name != "th" {
                continue;
            }
            cells.push(TableCell {
                header: cell.name == "th",
                colspan: span(cell.attr("colspan")),
                rowspan: span(cell.attr("rowspan")),
                blocks: self.convert_blocks(&cell.children, ctx),
            });
        }
        TableRow::new(cells)
    }

    /// A blockquote opening with `[!KIND]` is a callout written as HTML
    fn convert_blockquote(&mut self, element: &Element, ctx: ReadContext) -> Block {
        if let Some(index) = element.children.iter().position(|n| !n.is_blank_text())
            && let Node::Element(first) = &element.children[index]
            && first.name == "p"
        {
            let text = normalize_whitespace(&first.text_content());
            if let Some((kind, title)) = callout_marker(text.trim_start()) {
                let body = self.convert_blocks(&element.children[index + 1..], ctx);
                return Block::callout(kind, title.trim(), body);
            }
        }
        Block::blockquote(self.convert_blocks(&element.children, ctx))
    }

    fn convert_details(&mut self, element: &Element, ctx: ReadContext) -> Block {
        let title = element
            .child("summary")
            .map(|s| normalize_whitespace(&s.text_content()).trim().to_string())
            .unwrap_or_else(|| "Details".to_string());
        let body: Vec<Node> = element
            .children
            .iter()
            .filter(|n| !matches!(n, Node::Element(e) if e.name == "summary"))
            .cloned()
            .collect();
        Block::expand(title, self.convert_blocks(&body, ctx))
    }
}

/// Split `[!KIND] rest` into the kind and the rest
pub(crate) fn callout_marker(text: &str) -> Option<(CalloutKind, &str)> {
    let rest = text.strip_prefix("[!")?;
    let (marker, title) = rest.split_once(']')?;
    let kind = CalloutKind::from_marker(marker)?;
    Some((kind, title))
}

fn convert_task_list(element: &Element) -> Block {
    let items = element
        .children_named("ac:task")
        .map(|task| {
            let done = task
                .child("ac:task-status")
                .is_some_and(|s| s.text_content().trim() == "complete");
            let text = task
                .child("ac:task-body")
                .map(|b| normalize_whitespace(&b.text_content()).trim().to_string())
                .unwrap_or_default();
            TaskItem::new(done, text)
        })
        .collect();
    Block::task_list(items)
}

fn has_text(para: &[Inline]) -> bool {
    para.iter()
        .any(|inline| !matches!(inline, Inline::Text(text) if text.value.trim().is_empty()))
}

fn flush_paragraph(para: &mut Vec<Inline>, result: &mut Vec<Block>) {
    let mut children = std::mem::take(para);
    tidy_inlines(&mut children);
    if children.is_empty() {
        return;
    }
    // A paragraph holding one image is a block image
    if matches!(children.as_slice(), [Inline::Image(_)])
        && let Some(Inline::Image(image)) = children.pop()
    {
        result.push(Block::Image(image));
        return;
    }
    result.push(Block::paragraph(children));
}

/// Trim whitespace at the edges of a run and around line breaks, and drop
/// breaks at either end
fn tidy_inlines(children: &mut Vec<Inline>) {
    for i in 0..children.len() {
        if !matches!(children[i], Inline::LineBreak) {
            continue;
        }
        if i > 0
            && let Inline::Text(text) = &mut children[i - 1]
        {
            text.value = text.value.trim_end_matches(is_space).to_string();
        }
        if let Some(Inline::Text(text)) = children.get_mut(i + 1) {
            text.value = text.value.trim_start_matches(is_space).to_string();
        }
    }
    children.retain(|c| !matches!(c, Inline::Text(t) if t.value.is_empty()));
    while matches!(children.first(), Some(Inline::LineBreak)) {
        children.remove(0);
    }
    while matches!(children.last(), Some(Inline::LineBreak)) {
        children.pop();
    }
    if let Some(Inline::Text(text)) = children.first_mut() {
        text.value = text.value.trim_start_matches(is_space).to_string();
    }
    if let Some(Inline::Text(text)) = children.last_mut() {
        text.value = text.value.trim_end_matches(is_space).to_string();
    }
    children.retain(|c| !matches!(c, Inline::Text(t) if t.value.is_empty()));
}

fn is_space(c: char) -> bool {
    c.is_ascii_whitespace()
}

/// Wrap marked children, moving edge spaces outside the mark
fn push_marked(out: &mut Vec<Inline>, mut children: Vec<Inline>, wrap: fn(Vec<Inline>) -> Inline) {
    let mut leading = false;
    if let Some(Inline::Text(text)) = children.first_mut()
        && text.value.starts_with(is_space)
    {
        text.value = text.value.trim_start_matches(is_space).to_string();
        leading = true;
    }
    let mut trailing = false;
    if let Some(Inline::Text(text)) = children.last_mut()
        && text.value.ends_with(is_space)
    {
        text.value = text.value.trim_end_matches(is_space).to_string();
        trailing = true;
    }
    children.retain(|c| !matches!(c, Inline::Text(t) if t.value.is_empty()));

    if leading {
        append_text(out, " ");
    }
    if !children.is_empty() {
        out.push(wrap(children));
        if trailing {
            append_text(out, " ");
        }
    }
}

/// Append text with whitespace runs collapsed, also across the junction
/// with the previous text node
fn append_text(out: &mut Vec<Inline>, text: &str) {
    let normalized = normalize_whitespace(text);
    let normalized = match out.last() {
        Some(Inline::Text(last)) if last.value.ends_with(' ') => {
            normalized.strip_prefix(' ').unwrap_or(&normalized)
        }
        _ => normalized.as_str(),
    };
    push_text(out, normalized);
}

/// Collapse runs of ASCII whitespace to one space, keeping the edges
fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn is_inline_macro(element: &Element) -> bool {
    element
        .attr("ac:name")
        .is_some_and(|name| INLINE_MACROS.contains(&name))
}

fn is_block_macro(element: &Element) -> bool {
    element
        .attr("ac:name")
        .is_some_and(|name| BLOCK_MACROS.contains(&name))
}

fn macro_label(element: &Element) -> String {
    element
        .attr("ac:name")
        .map_or_else(|| element.name.clone(), str::to_string)
}

/// Whether an element has block-level descendants. Macros other than
/// the block macros are opaque.
fn contains_block(element: &Element) -> bool {
    element.elements().any(|child| {
        let name = child.name.as_str();
        if matches!(name, "ac:structured-macro" | "ac:macro") {
            return is_block_macro(child);
        }
        matches!(
            name,
            "h1" | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "ul"
                | "ol"
                | "table"
                | "pre"
                | "blockquote"
                | "hr"
                | "details"
                | "ac:task-list"
        ) || BLOCK_CONTAINERS.contains(&name)
            || contains_block(child)
    })
}

fn rich_text_body(element: &Element) -> &[Node] {
    element
        .child("ac:rich-text-body")
        .map(|body| body.children.as_slice())
        .unwrap_or_default()
}

fn plain_text_body(element: &Element) -> String {
    element
        .child("ac:plain-text-body")
        .map(Element::text_content)
        .unwrap_or_default()
}

/// Language of a `pre` block: `brush: x;` params or a `language-x` class
fn pre_language(element: &Element) -> String {
    for attr in ["class", "data-syntaxhighlighter-params"] {
        if let Some(language) = element.attr(attr).and_then(brush_language) {
            return language;
        }
    }
    std::iter::once(element)
        .chain(element.find("code"))
        .filter_map(|e| e.attr("class"))
        .flat_map(str::split_whitespace)
        .find_map(|token| token.strip_prefix("language-"))
        .map(str::to_string)
        .unwrap_or_default()
}

fn brush_language(value: &str) -> Option<String> {
    value
        .split(';')
        .find_map(|part| {
            let (key, language) = part.split_once(':')?;
            (key.trim() == "brush").then(|| language.trim().to_string())
        })
        .filter(|language| !language.is_empty())
}

fn image_alt(element: &Element) -> Option<&str> {
    element
        .attr("ac:alt")
        .or_else(|| element.attr("ac:title"))
        .filter(|alt| !alt.trim().is_empty())
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// Attachment name for an image macro that lost its filename
fn derive_filename(alt: &str) -> String {
    let base = alt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace(['/', '\\'], "_");
    let base = if base.is_empty() {
        "image".to_string()
    } else {
        base
    };
    if Path::new(&base).extension().is_some() {
        base
    } else {
        format!("{base}.png")
    }
}

fn span(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}
