//! Document model to storage format
//!
//! Inverse of [`crate::convert`]: every block maps onto the XHTML tag or
//! macro the storage reader turns back into the same block.

use confmd_mdast::{
    AttachmentRecord, Block, Callout, Expand, Image, ImageSource, Inline, List, Table, TaskList,
};
use storage_parser::{cdata, escape_attr, escape_text};

use crate::attachments::resolve_for_remote;
use crate::diagnostics::{Diagnostic, Diagnostics};

/// Storage writer settings
#[derive(Debug, Clone, Copy)]
pub struct StorageWriterOptions<'a> {
    /// Emit `ac:task-id` elements in task lists
    pub task_ids: bool,
    /// Attachments already on the page, for resolving image references
    pub attachments: &'a [AttachmentRecord],
}

impl Default for StorageWriterOptions<'_> {
    fn default() -> Self {
        Self {
            task_ids: true,
            attachments: &[],
        }
    }
}

/// Storage markup plus the local files it needs uploaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageOutput {
    pub markup: String,
    /// Local relative paths of attachment images, in document order
    pub uploads: Vec<String>,
}

/// Write blocks as storage markup
pub fn write_storage(
    blocks: &[Block],
    options: &StorageWriterOptions<'_>,
    diagnostics: &mut Diagnostics,
) -> StorageOutput {
    let mut writer = StorageWriter {
        options,
        diagnostics,
        uploads: Vec::new(),
        next_task_id: 1,
    };
    let mut markup = String::new();
    writer.write_blocks(blocks, &mut markup);
    StorageOutput {
        markup,
        uploads: writer.uploads,
    }
}

struct StorageWriter<'a, 'd> {
    options: &'a StorageWriterOptions<'a>,
    diagnostics: &'d mut Diagnostics,
    uploads: Vec<String>,
    next_task_id: u32,
}

impl StorageWriter<'_, '_> {
    fn write_blocks(&mut self, blocks: &[Block], out: &mut String) {
        for block in blocks {
            self.write_block(block, out);
        }
    }

    fn write_block(&mut self, block: &Block, out: &mut String) {
        match block {
            Block::Heading(h) => {
                let level = h.level.clamp(1, 6);
                out.push_str(&format!("<h{level}>"));
                self.write_inlines(&h.children, out);
                out.push_str(&format!("</h{level}>"));
            }
            Block::Paragraph(p) => {
                out.push_str("<p>");
                self.write_inlines(&p.children, out);
                out.push_str("</p>");
            }
            Block::List(list) => self.write_list(list, out),
            Block::Table(table) => self.write_table(table, out),
            Block::CodeBlock(code) => {
                out.push_str(r#"<ac:structured-macro ac:name="code">"#);
                let language = code.language.trim();
                if !language.is_empty() {
                    write_parameter("language", language, out);
                }
                out.push_str("<ac:plain-text-body>");
                out.push_str(&cdata(&code.content));
                out.push_str("</ac:plain-text-body></ac:structured-macro>");
            }
            Block::Callout(callout) => self.write_callout(callout, out),
            Block::TaskList(tasks) => self.write_task_list(tasks, out),
            Block::Expand(expand) => self.write_expand(expand, out),
            Block::Image(image) => {
                out.push_str("<p>");
                self.write_image(image, out);
                out.push_str("</p>");
            }
            Block::ThematicBreak => out.push_str("<hr />"),
            Block::Blockquote(quote) => {
                out.push_str("<blockquote>");
                self.write_blocks(&quote.body, out);
                out.push_str("</blockquote>");
            }
            Block::TableOfContents => out.push_str(r#"<ac:structured-macro ac:name="toc" />"#),
            Block::RawPassthrough(raw) => out.push_str(&raw.markup),
        }
    }

    /// The first paragraph of an item is written bare
    fn write_list(&mut self, list: &List, out: &mut String) {
        let tag = if list.ordered { "ol" } else { "ul" };
        out.push_str(&format!("<{tag}>"));
        for item in &list.items {
            out.push_str("<li>");
            match item.blocks.split_first() {
                Some((Block::Paragraph(p), rest)) => {
                    self.write_inlines(&p.children, out);
                    self.write_blocks(rest, out);
                }
                _ => self.write_blocks(&item.blocks, out),
            }
            out.push_str("</li>");
        }
        out.push_str(&format!("</{tag}>"));
    }

    fn write_table(&mut self, table: &Table, out: &mut String) {
        if table.rows.is_empty() {
            out.push_str(&table.literal);
            return;
        }
        out.push_str("<table><tbody>");
        for row in &table.rows {
            out.push_str("<tr>");
            for cell in &row.cells {
                let tag = if cell.header { "th" } else { "td" };
                out.push('<');
                out.push_str(tag);
                if cell.colspan > 1 {
                    out.push_str(&format!(r#" colspan="{}""#, cell.colspan));
                }
                if cell.rowspan > 1 {
                    out.push_str(&format!(r#" rowspan="{}""#, cell.rowspan));
                }
                out.push('>');
                match cell.blocks.as_slice() {
                    [Block::Paragraph(p)] => self.write_inlines(&p.children, out),
                    blocks => self.write_blocks(blocks, out),
                }
                out.push_str(&format!("</{tag}>"));
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody></table>");
    }

    /// The title goes in a leading paragraph of the body
    fn write_callout(&mut self, callout: &Callout, out: &mut String) {
        out.push_str(&format!(
            r#"<ac:structured-macro ac:name="{}"><ac:rich-text-body><p>"#,
            callout.kind.macro_name()
        ));
        out.push_str(&escape_text(callout.title.trim()));
        out.push_str("</p>");
        self.write_blocks(&callout.body, out);
        out.push_str("</ac:rich-text-body></ac:structured-macro>");
    }

    fn write_task_list(&mut self, tasks: &TaskList, out: &mut String) {
        out.push_str("<ac:task-list>");
        for item in &tasks.items {
            out.push_str("<ac:task>");
            if self.options.task_ids {
                out.push_str(&format!("<ac:task-id>{}</ac:task-id>", self.next_task_id));
                self.next_task_id += 1;
            }
            let status = if item.done { "complete" } else { "incomplete" };
            out.push_str(&format!("<ac:task-status>{status}</ac:task-status>"));
            out.push_str("<ac:task-body>");
            out.push_str(&escape_text(item.text.trim()));
            out.push_str("</ac:task-body></ac:task>");
        }
        out.push_str("</ac:task-list>");
    }

    fn write_expand(&mut self, expand: &Expand, out: &mut String) {
        out.push_str(r#"<ac:structured-macro ac:name="expand">"#);
        write_parameter("title", expand.title.trim(), out);
        out.push_str("<ac:rich-text-body>");
        self.write_blocks(&expand.body, out);
        out.push_str("</ac:rich-text-body></ac:structured-macro>");
    }

    fn write_image(&mut self, image: &Image, out: &mut String) {
        out.push_str(&format!(r#"<ac:image ac:alt="{}">"#, escape_attr(&image.alt)));
        match &image.source {
            ImageSource::Attachment(reference) => {
                let reconciled = resolve_for_remote(reference, self.options.attachments);
                if let Some(kind) = reconciled.kind
                    && kind.is_heuristic()
                {
                    self.diagnostics.push(Diagnostic::HeuristicAttachmentMatch {
                        reference: reference.filename.clone(),
                        resolved: reconciled.reference.filename.clone(),
                        kind,
                    });
                }
                if let Some(path) = &reference.local_relative_path
                    && !self.uploads.contains(path)
                {
                    self.uploads.push(path.clone());
                }
                out.push_str(&format!(
                    r#"<ri:attachment ri:filename="{}" />"#,
                    escape_attr(&reconciled.reference.filename)
                ));
            }
            ImageSource::External { url } => {
                out.push_str(&format!(r#"<ri:url ri:value="{}" />"#, escape_attr(url)));
            }
        }
        out.push_str("</ac:image>");
    }

    fn write_inlines(&mut self, inlines: &[Inline], out: &mut String) {
        for inline in inlines {
            self.write_inline(inline, out);
        }
    }

    fn write_inline(&mut self, inline: &Inline, out: &mut String) {
        let wrap = |this: &mut Self, tag: &str, children: &[Inline], out: &mut String| {
            out.push_str(&format!("<{tag}>"));
            this.write_inlines(children, out);
            out.push_str(&format!("</{tag}>"));
        };
        match inline {
            Inline::Text(text) => out.push_str(&escape_text(&text.value)),
            Inline::Bold(m) => wrap(self, "strong", &m.children, out),
            Inline::Italic(m) => wrap(self, "em", &m.children, out),
            Inline::Strike(m) => wrap(self, "s", &m.children, out),
            Inline::Underline(m) => wrap(self, "u", &m.children, out),
            Inline::InlineCode(code) => {
                out.push_str("<code>");
                out.push_str(&escape_text(&code.value));
                out.push_str("</code>");
            }
            Inline::LineBreak => out.push_str("<br />"),
            Inline::Link(link) => {
                out.push_str(&format!(r#"<a href="{}">"#, escape_attr(&link.href)));
                self.write_inlines(&link.children, out);
                out.push_str("</a>");
            }
            Inline::Image(image) => self.write_image(image, out),
        }
    }
}

fn write_parameter(name: &str, value: &str, out: &mut String) {
    out.push_str(&format!(
        r#"<ac:parameter ac:name="{name}">{}</ac:parameter>"#,
        escape_text(value)
    ));
}
