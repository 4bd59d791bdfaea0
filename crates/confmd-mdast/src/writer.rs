//! Document model to Markdown writer
//!
//! Blocks render to strings and containers prefix their children's lines,
//! so list items and callouts nest without tracking a global indent. Tables
//! switch the walk into literal mode, where every descendant renders as
//! markup instead of Markdown syntax.

use crate::mdast::{
    Block, Callout, CodeBlock, Expand, Image, ImageSource, Inline, List, Root, Table, TableCell,
    TaskList,
};

/// Default local directory for page attachments
pub const DEFAULT_ATTACHMENTS_DIR: &str = "_attachments";

/// Options for the Markdown writer
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Add YAML frontmatter
    pub frontmatter: Option<Frontmatter>,
    /// Emit `<!-- language: lang-xxx -->` before fenced code with a language
    pub language_hints: bool,
    /// Directory used for attachment images without a reconciled path
    pub attachments_dir: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            frontmatter: None,
            language_hints: true,
            attachments_dir: DEFAULT_ATTACHMENTS_DIR.to_string(),
        }
    }
}

/// YAML frontmatter content
#[derive(Debug, Clone, Default)]
pub struct Frontmatter {
    pub title: Option<String>,
    /// Remote page identifier
    pub page_id: Option<String>,
}

/// Convert a document to Markdown
pub fn mdast_to_markdown(root: &Root, options: &WriterOptions) -> String {
    let writer = Writer::new(options);
    writer.write_root(root)
}

/// Convert a block sequence to Markdown
pub fn blocks_to_markdown(blocks: &[Block], options: &WriterOptions) -> String {
    let writer = Writer::new(options);
    writer.write_document(blocks)
}

/// Rendering state handed down the tree walk.
///
/// Copied into each call, so a table's literal mode ends with the table.
#[derive(Debug, Clone, Copy, Default)]
struct RenderContext {
    /// Render markup instead of Markdown syntax
    literal: bool,
    /// Hard breaks are not allowed (headings)
    single_line: bool,
}

impl RenderContext {
    fn with_literal(self) -> Self {
        Self {
            literal: true,
            ..self
        }
    }

    fn with_single_line(self) -> Self {
        Self {
            single_line: true,
            ..self
        }
    }
}

/// Markdown writer
struct Writer<'a> {
    options: &'a WriterOptions,
}

impl<'a> Writer<'a> {
    fn new(options: &'a WriterOptions) -> Self {
        Self { options }
    }

    fn write_root(&self, root: &Root) -> String {
        self.write_document(&root.children)
    }

    fn write_document(&self, blocks: &[Block]) -> String {
        let mut output = String::new();
        if let Some(fm) = &self.options.frontmatter {
            write_frontmatter(&mut output, fm);
        }
        output.push_str(&self.write_blocks(blocks, RenderContext::default(), false));
        let mut output = normalize_blank_lines(&output);
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output
    }

    /// Render blocks separated by blank lines.
    ///
    /// With `tight`, lists directly follow the previous block, which is how
    /// sub-lists attach to the paragraph of a list item.
    fn write_blocks(&self, blocks: &[Block], ctx: RenderContext, tight: bool) -> String {
        if ctx.literal {
            return blocks
                .iter()
                .map(|b| self.write_block(b, ctx))
                .collect::<Vec<_>>()
                .concat();
        }

        let mut output = String::new();
        let mut previous: Option<ListFlavor> = None;
        for block in blocks {
            let rendered = self.write_block(block, ctx);
            if rendered.is_empty() {
                continue;
            }
            let flavor = ListFlavor::of(block);
            if !output.is_empty() {
                if flavor.is_some() && flavor == previous {
                    // Two adjacent lists with the same marker would merge
                    output.push_str("\n\n<!-- -->\n\n");
                } else if tight && flavor.is_some() {
                    output.push('\n');
                } else {
                    output.push_str("\n\n");
                }
            }
            output.push_str(&rendered);
            previous = flavor;
        }
        output
    }

    fn write_block(&self, block: &Block, ctx: RenderContext) -> String {
        if ctx.literal {
            return self.write_block_literal(block, ctx);
        }
        match block {
            Block::Heading(h) => {
                let text = self.write_inlines(&h.children, ctx.with_single_line());
                let marker = "#".repeat(usize::from(h.level.clamp(1, 6)));
                if text.is_empty() {
                    marker
                } else {
                    format!("{marker} {text}")
                }
            }
            Block::Paragraph(p) => self.write_paragraph(&p.children, ctx),
            Block::List(l) => self.write_list(l, ctx),
            Block::Table(t) => self.write_table(t, ctx.with_literal()),
            Block::CodeBlock(c) => self.write_code(c),
            Block::Callout(c) => self.write_callout(c, ctx),
            Block::TaskList(t) => write_task_list(t),
            Block::Expand(e) => self.write_expand(e, ctx),
            Block::Image(img) => self.write_image(img, ctx),
            Block::ThematicBreak => "---".to_string(),
            Block::Blockquote(b) => {
                let body = self.write_blocks(&b.body, ctx, false);
                prefix_lines(&body, "> ", ">")
            }
            Block::TableOfContents => "[TOC]".to_string(),
            // Passthrough markup has no Markdown form
            Block::RawPassthrough(_) => String::new(),
        }
    }

    fn write_list(&self, list: &List, ctx: RenderContext) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut ordinal = 0usize;
        let mut marker_width = 0usize;

        for item in &list.items {
            if let Some(nested) = item.wrapper_list() {
                // Attaches to the previous item, or stands alone at the top
                let body = self.write_list(nested, ctx);
                lines.push(indent_lines(&body, marker_width));
                continue;
            }

            let marker = if list.ordered {
                ordinal += 1;
                format!("{ordinal}. ")
            } else {
                "- ".to_string()
            };
            marker_width = marker.len();

            let body = self.write_blocks(&item.blocks, ctx, true);
            if body.is_empty() {
                lines.push(marker.trim_end().to_string());
            } else {
                lines.push(hang_lines(&marker, &body));
            }
        }

        lines.join("\n")
    }

    fn write_code(&self, c: &CodeBlock) -> String {
        let fence = "`".repeat(calculate_fence_length(&c.content));
        let language = c.language.split_whitespace().next().unwrap_or("");

        let mut output = String::new();
        if self.options.language_hints && !language.is_empty() {
            output.push_str(&format!("<!-- language: lang-{language} -->\n"));
        }
        output.push_str(&fence);
        output.push_str(language);
        output.push('\n');
        // Always one newline after the content, so a trailing newline in the
        // content itself survives the round trip
        output.push_str(&c.content);
        output.push('\n');
        output.push_str(&fence);
        output
    }

    fn write_callout(&self, c: &Callout, ctx: RenderContext) -> String {
        let mut output = format!("[!{}]", c.kind.as_str());
        let title = escape_text(c.title.trim(), true);
        if !title.is_empty() {
            output.push(' ');
            output.push_str(&title);
        }

        let body = self.write_blocks(&c.body, ctx, false);
        if !body.is_empty() {
            // A paragraph continues the title line; anything else needs a
            // break so it cannot turn the title into a setext heading
            if matches!(c.body.first(), Some(Block::Paragraph(_))) {
                output.push('\n');
            } else {
                output.push_str("\n\n");
            }
            output.push_str(&body);
        }

        prefix_lines(&output, "> ", ">")
    }

    fn write_expand(&self, e: &Expand, ctx: RenderContext) -> String {
        let mut output = format!(
            "<details>\n<summary>{}</summary>",
            escape_html(e.title.trim())
        );
        let body = self.write_blocks(&e.body, ctx, false);
        if !body.is_empty() {
            output.push_str("\n\n");
            output.push_str(&body);
        }
        output.push_str("\n\n</details>");
        output
    }

    fn write_image(&self, img: &Image, ctx: RenderContext) -> String {
        let target = self.image_target(&img.source);
        if ctx.literal {
            return format!(
                r#"<img src="{}" alt="{}" />"#,
                escape_attr(&target),
                escape_attr(&img.alt)
            );
        }
        format!(
            "![{}]({})",
            escape_text(&img.alt, false),
            link_destination(&target)
        )
    }

    fn image_target(&self, source: &ImageSource) -> String {
        match source {
            ImageSource::Attachment(reference) => match &reference.local_relative_path {
                Some(path) => path.clone(),
                None => format!("{}/{}", self.options.attachments_dir, reference.filename),
            },
            ImageSource::External { url } => url.clone(),
        }
    }

    /// Paragraph lines never start indented; four spaces would open a code block
    fn write_paragraph(&self, inlines: &[Inline], ctx: RenderContext) -> String {
        self.write_inlines(inlines, ctx)
            .split('\n')
            .map(|line| line.trim_start_matches([' ', '\t']))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn write_inlines(&self, inlines: &[Inline], ctx: RenderContext) -> String {
        let mut output = String::new();
        for inline in inlines {
            self.write_inline(inline, ctx, &mut output);
        }
        output
    }

    fn write_inline(&self, inline: &Inline, ctx: RenderContext, output: &mut String) {
        if ctx.literal {
            self.write_inline_literal(inline, ctx, output);
            return;
        }
        match inline {
            Inline::Text(t) => {
                let at_line_start = output.is_empty() || output.ends_with('\n');
                output.push_str(&escape_text(&t.value, at_line_start));
            }
            Inline::Bold(m) | Inline::Underline(m) => {
                self.write_delimited(&m.children, "**", ctx, output);
            }
            Inline::Italic(m) => self.write_delimited(&m.children, "*", ctx, output),
            Inline::Strike(m) => self.write_delimited(&m.children, "~~", ctx, output),
            Inline::InlineCode(c) => write_inline_code(&c.value, output),
            Inline::LineBreak => {
                if ctx.single_line {
                    output.push(' ');
                } else {
                    output.push_str("\\\n");
                }
            }
            Inline::Link(l) => {
                output.push('[');
                output.push_str(&self.write_inlines(&l.children, ctx));
                output.push_str("](");
                output.push_str(&link_destination(&l.href));
                output.push(')');
            }
            Inline::Image(img) => output.push_str(&self.write_image(img, ctx)),
        }
    }

    /// Wrap content in a delimiter run, keeping surrounding spaces outside
    /// so the run stays left- and right-flanking
    fn write_delimited(
        &self,
        children: &[Inline],
        delimiter: &str,
        ctx: RenderContext,
        output: &mut String,
    ) {
        let inner = self.write_inlines(children, ctx);
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            output.push_str(&inner);
            return;
        }
        let leading = &inner[..inner.len() - inner.trim_start().len()];
        let trailing = &inner[inner.trim_end().len()..];
        output.push_str(leading);
        output.push_str(delimiter);
        output.push_str(trimmed);
        output.push_str(delimiter);
        output.push_str(trailing);
    }

    // Literal (markup) rendering, used inside tables

    fn write_table(&self, t: &Table, ctx: RenderContext) -> String {
        if t.rows.is_empty() {
            return drop_blank_lines(&t.literal);
        }
        let mut output = String::from("<table>\n<tbody>\n");
        for row in &t.rows {
            output.push_str("<tr>\n");
            for cell in &row.cells {
                output.push_str(&self.write_cell(cell, ctx));
                output.push('\n');
            }
            output.push_str("</tr>\n");
        }
        output.push_str("</tbody>\n</table>");
        output
    }

    fn write_cell(&self, cell: &TableCell, ctx: RenderContext) -> String {
        let tag = if cell.header { "th" } else { "td" };
        let mut attrs = String::new();
        if cell.colspan > 1 {
            attrs.push_str(&format!(r#" colspan="{}""#, cell.colspan));
        }
        if cell.rowspan > 1 {
            attrs.push_str(&format!(r#" rowspan="{}""#, cell.rowspan));
        }
        let content = match cell.blocks.as_slice() {
            [Block::Paragraph(p)] => self.write_inlines(&p.children, ctx),
            blocks => self.write_blocks(blocks, ctx, false),
        };
        format!("<{tag}{attrs}>{content}</{tag}>")
    }

    fn write_block_literal(&self, block: &Block, ctx: RenderContext) -> String {
        match block {
            Block::Heading(h) => {
                let level = h.level.clamp(1, 6);
                format!(
                    "<h{level}>{}</h{level}>",
                    self.write_inlines(&h.children, ctx)
                )
            }
            Block::Paragraph(p) => format!("<p>{}</p>", self.write_inlines(&p.children, ctx)),
            Block::List(l) => {
                let tag = if l.ordered { "ol" } else { "ul" };
                let mut output = format!("<{tag}>");
                for item in &l.items {
                    output.push_str("<li>");
                    output.push_str(&self.write_item_literal(&item.blocks, ctx));
                    output.push_str("</li>");
                }
                output.push_str(&format!("</{tag}>"));
                output
            }
            Block::Table(t) => self.write_table(t, ctx),
            Block::CodeBlock(c) => {
                let class = if c.language.is_empty() {
                    String::new()
                } else {
                    format!(r#" class="language-{}""#, escape_attr(&c.language))
                };
                format!(
                    "<pre><code{class}>{}</code></pre>",
                    escape_html_lines(&c.content)
                )
            }
            Block::Callout(c) => {
                let mut output = format!(
                    "<blockquote><p>[!{}] {}</p>",
                    c.kind.as_str(),
                    escape_html(c.title.trim())
                );
                output.push_str(&self.write_blocks(&c.body, ctx, false));
                output.push_str("</blockquote>");
                output
            }
            Block::TaskList(t) => write_task_list_literal(t),
            Block::Expand(e) => format!(
                "<details><summary>{}</summary>{}</details>",
                escape_html(e.title.trim()),
                self.write_blocks(&e.body, ctx, false)
            ),
            Block::Image(img) => self.write_image(img, ctx),
            Block::ThematicBreak => "<hr />".to_string(),
            Block::Blockquote(b) => format!(
                "<blockquote>{}</blockquote>",
                self.write_blocks(&b.body, ctx, false)
            ),
            Block::TableOfContents => r#"<ac:structured-macro ac:name="toc" />"#.to_string(),
            Block::RawPassthrough(r) => drop_blank_lines(&r.markup),
        }
    }

    fn write_item_literal(&self, blocks: &[Block], ctx: RenderContext) -> String {
        match blocks.split_first() {
            Some((Block::Paragraph(p), rest)) => {
                let mut output = self.write_inlines(&p.children, ctx);
                output.push_str(&self.write_blocks(rest, ctx, false));
                output
            }
            _ => self.write_blocks(blocks, ctx, false),
        }
    }

    fn write_inline_literal(&self, inline: &Inline, ctx: RenderContext, output: &mut String) {
        let wrap = |tag: &str, children: &[Inline], output: &mut String| {
            output.push_str(&format!("<{tag}>"));
            output.push_str(&self.write_inlines(children, ctx));
            output.push_str(&format!("</{tag}>"));
        };
        match inline {
            Inline::Text(t) => output.push_str(&escape_html(&t.value.replace('\n', " "))),
            Inline::Bold(m) => wrap("strong", &m.children, output),
            Inline::Italic(m) => wrap("em", &m.children, output),
            Inline::Strike(m) => wrap("s", &m.children, output),
            Inline::Underline(m) => wrap("u", &m.children, output),
            Inline::InlineCode(c) => {
                output.push_str("<code>");
                output.push_str(&escape_html_lines(&c.value));
                output.push_str("</code>");
            }
            Inline::LineBreak => output.push_str("<br />"),
            Inline::Link(l) => {
                output.push_str(&format!(r#"<a href="{}">"#, escape_attr(&l.href)));
                output.push_str(&self.write_inlines(&l.children, ctx));
                output.push_str("</a>");
            }
            Inline::Image(img) => output.push_str(&self.write_image(img, ctx)),
        }
    }
}

/// Marker family of list-like blocks; adjacent lists of one family merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFlavor {
    Bullet,
    Ordered,
}

impl ListFlavor {
    fn of(block: &Block) -> Option<Self> {
        match block {
            Block::List(l) if l.ordered => Some(ListFlavor::Ordered),
            Block::List(_) | Block::TaskList(_) => Some(ListFlavor::Bullet),
            _ => None,
        }
    }
}

fn write_task_list(t: &TaskList) -> String {
    t.items
        .iter()
        .map(|item| {
            let mark = if item.done { 'x' } else { ' ' };
            let text = escape_text(item.text.trim(), false);
            format!("- [{mark}] {text}").trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_task_list_literal(t: &TaskList) -> String {
    let mut output = String::from("<ac:task-list>");
    for item in &t.items {
        let status = if item.done { "complete" } else { "incomplete" };
        output.push_str(&format!(
            "<ac:task><ac:task-status>{status}</ac:task-status><ac:task-body>{}</ac:task-body></ac:task>",
            escape_html(&item.text)
        ));
    }
    output.push_str("</ac:task-list>");
    output
}

fn write_frontmatter(output: &mut String, fm: &Frontmatter) {
    if fm.title.is_none() && fm.page_id.is_none() {
        return;
    }
    output.push_str("---\n");
    if let Some(title) = &fm.title {
        output.push_str(&format!(r#"title: "{}""#, escape_yaml_string(title)));
        output.push('\n');
    }
    if let Some(page_id) = &fm.page_id {
        output.push_str(&format!(r#"page_id: "{}""#, escape_yaml_string(page_id)));
        output.push('\n');
    }
    output.push_str("---\n\n");
}

fn write_inline_code(value: &str, output: &mut String) {
    // `foo``bar` would parse as a single code span
    if output.ends_with('`') {
        output.push(' ');
    }

    let mut longest = 0;
    let mut run = 0;
    for c in value.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest + 1);
    let padded = longest > 0
        || (value.starts_with(' ') && value.ends_with(' ') && !value.trim().is_empty());
    output.push_str(&fence);
    if padded {
        output.push(' ');
    }
    output.push_str(value);
    if padded {
        output.push(' ');
    }
    output.push_str(&fence);
}

/// Prefix the first line with `marker` and indent the rest to match
fn hang_lines(marker: &str, body: &str) -> String {
    let indent = " ".repeat(marker.len());
    let mut output = String::new();
    for (i, line) in body.split('\n').enumerate() {
        if i == 0 {
            output.push_str(marker);
        } else {
            output.push('\n');
            if !line.is_empty() {
                output.push_str(&indent);
            }
        }
        output.push_str(line);
    }
    output
}

fn indent_lines(body: &str, width: usize) -> String {
    if width == 0 {
        return body.to_string();
    }
    prefix_lines(body, &" ".repeat(width), "")
}

fn prefix_lines(body: &str, prefix: &str, empty_prefix: &str) -> String {
    body.split('\n')
        .map(|line| {
            if line.is_empty() {
                empty_prefix.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn drop_blank_lines(markup: &str) -> String {
    markup
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of blank lines to a single blank line, leaving fenced code
/// untouched
fn normalize_blank_lines(markdown: &str) -> String {
    let mut output = String::with_capacity(markdown.len());
    let mut open_fence: Option<usize> = None;
    let mut blank_run = 0;

    for line in markdown.split('\n') {
        let fence = fence_run(line);
        match (open_fence, fence) {
            (None, Some(len)) => open_fence = Some(len),
            (Some(open), Some(len)) if len >= open && is_closing_fence(line) => open_fence = None,
            _ => {}
        }

        if open_fence.is_none() && fence.is_none() && line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        output.push_str(line);
        output.push('\n');
    }
    output.pop();
    output
}

/// Length of a backtick fence opening this line, after container prefixes
fn fence_run(line: &str) -> Option<usize> {
    let content = line.trim_start_matches([' ', '>']);
    let len = content.chars().take_while(|&c| c == '`').count();
    (len >= 3).then_some(len)
}

fn is_closing_fence(line: &str) -> bool {
    line.trim_start_matches([' ', '>'])
        .trim_start_matches('`')
        .trim()
        .is_empty()
}

fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Calculate the minimum fence length needed for a code block.
///
/// The fence must be longer than any sequence of consecutive backticks in the content.
/// Returns at least 3 (the minimum for a valid fenced code block).
fn calculate_fence_length(content: &str) -> usize {
    let mut max_backticks = 0;
    let mut current_run = 0;

    for c in content.chars() {
        if c == '`' {
            current_run += 1;
            max_backticks = max_backticks.max(current_run);
        } else {
            current_run = 0;
        }
    }

    3.max(max_backticks + 1)
}

/// Backslash-escape characters Markdown would read as syntax.
///
/// With `at_line_start`, block markers at the start of the text are
/// escaped too.
fn escape_text(text: &str, at_line_start: bool) -> String {
    let mut output = String::with_capacity(text.len());
    let mut line_start = at_line_start;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        let starts_line = line_start;
        line_start = c == '\n';
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '~' => output.push('\\'),
            '&' if looks_like_entity(&text[i + 1..]) => output.push('\\'),
            '#' | '>' | '+' | '-' | '=' | '|' if starts_line => output.push('\\'),
            '0'..='9' if starts_line => {
                let digits = text[i..].bytes().take_while(u8::is_ascii_digit).count();
                if matches!(text.as_bytes().get(i + digits), Some(b'.' | b')')) {
                    output.push_str(&text[i..i + digits]);
                    output.push('\\');
                    for _ in 1..digits {
                        chars.next();
                    }
                    continue;
                }
            }
            _ => {}
        }
        output.push(c);
    }
    output
}

/// Whether text after `&` would be read as a character reference
fn looks_like_entity(rest: &str) -> bool {
    let name = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'#')
        .count();
    name > 0 && rest.as_bytes().get(name) == Some(&b';')
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escaped text that stays on one line of an HTML block
fn escape_html_lines(text: &str) -> String {
    escape_html(text)
        .replace('\r', "&#13;")
        .replace('\n', "&#10;")
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

/// Link destination, angle-bracketed when it would not parse bare
fn link_destination(url: &str) -> String {
    if url.is_empty()
        || url
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>'))
    {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}
