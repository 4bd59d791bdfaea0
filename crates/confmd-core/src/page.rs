//! Page-level pipelines
//!
//! `pull_page` turns storage markup into Markdown and `push_page` goes the
//! other way. Both reconcile attachment images against the page's records
//! and return every degraded-fidelity outcome alongside the converted text.

use std::sync::LazyLock;

use confmd_mdast::{
    AttachmentRecord, Block, Frontmatter, ImageSource, Inline, Page, WriterOptions,
    blocks_to_markdown, for_each_image_mut, plain_text,
};
use regex::Regex;
use serde::Serialize;

use crate::attachments::{ReconcileOptions, resolve_for_local};
use crate::convert::read_storage_with;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, Result};
use crate::markdown_reader::{Metadata, read_body, split_frontmatter};
use crate::storage_writer::{StorageWriterOptions, write_storage};

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("invalid filename regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));
static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w-]").expect("invalid slug regex"));
static HYPHEN_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-+").expect("invalid hyphen regex"));

const MAX_FILENAME_CHARS: usize = 100;

/// Options for storage to Markdown conversion
#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Emit YAML frontmatter with the title and page id
    pub frontmatter: bool,
    /// Prepend the page title as a level-1 heading
    pub title_heading: bool,
    pub language_hints: bool,
    pub reconcile: ReconcileOptions,
    /// Remote page id for the frontmatter
    pub page_id: Option<String>,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            frontmatter: true,
            title_heading: false,
            language_hints: true,
            reconcile: ReconcileOptions::default(),
            page_id: None,
        }
    }
}

/// Result of [`pull_page`]
#[derive(Debug, Clone, Serialize)]
pub struct PullOutput {
    pub markdown: String,
    pub page: Page,
    /// Local attachment paths the Markdown points at, in document order
    pub referenced: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Options for Markdown to storage conversion
#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Take a leading level-1 heading as the title and drop it from the body
    pub title_heading: bool,
    /// Number tasks with `ac:task-id`
    pub task_ids: bool,
    /// Fail on unreadable frontmatter instead of ignoring it
    pub strict_frontmatter: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            title_heading: false,
            task_ids: true,
            strict_frontmatter: false,
        }
    }
}

/// Result of [`push_page`]
#[derive(Debug, Clone, Serialize)]
pub struct PushOutput {
    /// Title from the frontmatter or the leading heading
    pub title: Option<String>,
    pub page_id: Option<String>,
    pub storage: String,
    pub page: Page,
    /// Local files to upload as attachments
    pub uploads: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Convert a page's storage markup to Markdown.
///
/// Attachment images are resolved against `records` and point at their
/// local copies afterwards. Nothing here fails; unresolvable content shows
/// up in [`PullOutput::diagnostics`].
pub fn pull_page(
    title: &str,
    storage: &str,
    records: &[AttachmentRecord],
    options: &PullOptions,
) -> PullOutput {
    let mut diagnostics = Diagnostics::new();
    let mut body = read_storage_with(storage, &mut diagnostics);

    let mut referenced: Vec<String> = Vec::new();
    for_each_image_mut(&mut body, &mut |image| {
        let ImageSource::Attachment(reference) = &image.source else {
            return;
        };
        let reconciled = resolve_for_local(reference, records, &options.reconcile);
        let Some(kind) = reconciled.kind else {
            diagnostics.push(Diagnostic::UnresolvedAttachment {
                reference: reference.filename.clone(),
            });
            return;
        };
        let Some(path) = reconciled.reference.local_relative_path.clone() else {
            return;
        };
        if kind.is_heuristic() {
            let resolved = path.rsplit('/').next().unwrap_or(&path).to_string();
            diagnostics.push(Diagnostic::HeuristicAttachmentMatch {
                reference: reference.filename.clone(),
                resolved,
                kind,
            });
        }
        if !referenced.contains(&path) {
            referenced.push(path);
        }
        image.source = ImageSource::Attachment(reconciled.reference);
    });

    if contains_underline(&body) {
        diagnostics.push_once(Diagnostic::UnderlineDowngraded);
    }

    let writer_options = WriterOptions {
        frontmatter: options.frontmatter.then(|| Frontmatter {
            title: (!title.is_empty()).then(|| title.to_string()),
            page_id: options.page_id.clone(),
        }),
        language_hints: options.language_hints,
        attachments_dir: options.reconcile.attachments_dir.clone(),
    };
    let markdown = if options.title_heading && !title.trim().is_empty() {
        body.insert(0, Block::heading(1, vec![Inline::text(title.trim())]));
        let markdown = blocks_to_markdown(&body, &writer_options);
        body.remove(0);
        markdown
    } else {
        blocks_to_markdown(&body, &writer_options)
    };

    tracing::debug!(
        title,
        attachments = referenced.len(),
        diagnostics = diagnostics.len(),
        "Pulled page"
    );
    PullOutput {
        markdown,
        page: Page::new(title, body),
        referenced,
        diagnostics: diagnostics.into_vec(),
    }
}

/// Convert a Markdown page to storage markup.
///
/// Fails only on a document model that breaks the node contract, or on
/// unreadable frontmatter when [`PushOptions::strict_frontmatter`] is set.
pub fn push_page(
    markdown: &str,
    records: &[AttachmentRecord],
    options: &PushOptions,
) -> Result<PushOutput> {
    let mut diagnostics = Diagnostics::new();
    let (yaml, body) = split_frontmatter(markdown);
    let metadata = match yaml.map(Metadata::parse).transpose() {
        Ok(metadata) => metadata.unwrap_or_default(),
        Err(err) if !options.strict_frontmatter => {
            tracing::warn!(error = %err, "Ignoring unreadable frontmatter");
            Metadata::default()
        }
        Err(err) => return Err(err),
    };

    let mut blocks = read_body(body, &mut diagnostics);
    let mut title = metadata.title;
    if options.title_heading
        && let Some(Block::Heading(heading)) = blocks.first()
        && heading.level == 1
    {
        let heading_title = plain_text(&heading.children).trim().to_string();
        blocks.remove(0);
        title.get_or_insert(heading_title);
    }

    validate(&blocks)?;
    let output = write_storage(
        &blocks,
        &StorageWriterOptions {
            task_ids: options.task_ids,
            attachments: records,
        },
        &mut diagnostics,
    );

    tracing::debug!(
        title = title.as_deref().unwrap_or_default(),
        uploads = output.uploads.len(),
        "Pushed page"
    );
    Ok(PushOutput {
        page: Page::new(title.clone().unwrap_or_default(), blocks),
        title,
        page_id: metadata.page_id,
        storage: output.markup,
        uploads: output.uploads,
        diagnostics: diagnostics.into_vec(),
    })
}

/// Check the node contract: heading levels within 1..=6 and table spans of
/// at least one
pub fn validate(blocks: &[Block]) -> Result<()> {
    for block in blocks {
        match block {
            Block::Heading(heading) if !(1..=6).contains(&heading.level) => {
                return Err(Error::InvalidModel(format!(
                    "heading level {} outside 1..=6",
                    heading.level
                )));
            }
            Block::List(list) => {
                for item in &list.items {
                    validate(&item.blocks)?;
                }
            }
            Block::Table(table) => {
                for cell in table.rows.iter().flat_map(|row| &row.cells) {
                    if cell.colspan == 0 || cell.rowspan == 0 {
                        return Err(Error::InvalidModel("table cell span of zero".into()));
                    }
                    validate(&cell.blocks)?;
                }
            }
            Block::Callout(callout) => validate(&callout.body)?,
            Block::Expand(expand) => validate(&expand.body)?,
            Block::Blockquote(quote) => validate(&quote.body)?,
            _ => {}
        }
    }
    Ok(())
}

/// Deserialize a block sequence, rejecting unknown node types
pub fn blocks_from_json(json: &str) -> Result<Vec<Block>> {
    let blocks: Vec<Block> =
        serde_json::from_str(json).map_err(|err| Error::InvalidModel(err.to_string()))?;
    validate(&blocks)?;
    Ok(blocks)
}

pub fn blocks_to_json(blocks: &[Block]) -> Result<String> {
    Ok(serde_json::to_string_pretty(blocks)?)
}

/// Make a page title usable as a file name
pub fn safe_filename(title: &str) -> String {
    let name = UNSAFE_FILENAME_CHARS.replace_all(title, "_");
    if name.chars().count() > MAX_FILENAME_CHARS {
        let mut truncated: String = name.chars().take(MAX_FILENAME_CHARS - 3).collect();
        truncated.push_str("...");
        truncated
    } else {
        name.into_owned()
    }
}

/// Lowercase, hyphen-separated form of a title
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let hyphenated = WHITESPACE_RUN.replace_all(&lower, "-");
    let cleaned = NON_SLUG_CHARS.replace_all(&hyphenated, "");
    let collapsed = HYPHEN_RUN.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

fn contains_underline(blocks: &[Block]) -> bool {
    blocks.iter().any(|block| match block {
        Block::Heading(heading) => inlines_underline(&heading.children),
        Block::Paragraph(paragraph) => inlines_underline(&paragraph.children),
        Block::List(list) => list.items.iter().any(|item| contains_underline(&item.blocks)),
        Block::Table(table) => table
            .rows
            .iter()
            .flat_map(|row| &row.cells)
            .any(|cell| contains_underline(&cell.blocks)),
        Block::Callout(callout) => contains_underline(&callout.body),
        Block::Expand(expand) => contains_underline(&expand.body),
        Block::Blockquote(quote) => contains_underline(&quote.body),
        _ => false,
    })
}

fn inlines_underline(children: &[Inline]) -> bool {
    children.iter().any(|child| match child {
        Inline::Underline(_) => true,
        Inline::Bold(m) | Inline::Italic(m) | Inline::Strike(m) => inlines_underline(&m.children),
        Inline::Link(link) => inlines_underline(&link.children),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::{FallbackPolicy, MatchKind};
    use crate::convert::read_storage;
    use crate::markdown_reader::read_markdown;
    use confmd_mdast::{AttachmentRef, CalloutKind, ListItem, TaskItem, push_text};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn md(blocks: &[Block]) -> String {
        blocks_to_markdown(blocks, &WriterOptions::default())
    }

    fn records(names: &[&str]) -> Vec<AttachmentRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| AttachmentRecord::new(format!("att{i}"), *name))
            .collect()
    }

    const DIAGRAM_PAGE: &str = r#"<p>Before</p><ac:image ac:alt="Diagram"><ri:attachment ri:filename="diagram.png" /></ac:image><p><u>under</u></p>"#;

    #[test]
    fn test_pull_reconciles_attachments() {
        let output = pull_page(
            "Design",
            DIAGRAM_PAGE,
            &records(&["diagram-20240131-153000.png"]),
            &PullOptions {
                page_id: Some("42".into()),
                ..Default::default()
            },
        );
        insta::assert_snapshot!(output.markdown, @r#"
        ---
        title: "Design"
        page_id: "42"
        ---

        Before

        ![Diagram](_attachments/diagram-20240131-153000.png)

        **under**
        "#);
        assert_eq!(
            output.referenced,
            vec!["_attachments/diagram-20240131-153000.png".to_string()]
        );
        assert_eq!(
            output.diagnostics,
            vec![
                Diagnostic::HeuristicAttachmentMatch {
                    reference: "diagram.png".into(),
                    resolved: "diagram-20240131-153000.png".into(),
                    kind: MatchKind::TimestampStripped,
                },
                Diagnostic::UnderlineDowngraded,
            ]
        );
        assert_eq!(output.page.title, "Design");
        assert_eq!(output.page.attachments.len(), 1);
    }

    #[test]
    fn test_pull_without_records() {
        let output = pull_page("x", DIAGRAM_PAGE, &[], &PullOptions::default());
        assert!(output.referenced.is_empty());
        assert!(output.diagnostics.contains(&Diagnostic::UnresolvedAttachment {
            reference: "diagram.png".into()
        }));
        assert!(output.markdown.contains("![Diagram](_attachments/diagram.png)"));
    }

    #[test]
    fn test_pull_keep_original_policy() {
        let options = PullOptions {
            frontmatter: false,
            reconcile: ReconcileOptions {
                attachments_dir: "assets".into(),
                fallback: FallbackPolicy::KeepOriginal,
            },
            ..Default::default()
        };
        let output = pull_page("x", DIAGRAM_PAGE, &records(&["other.pdf"]), &options);
        assert!(output.referenced.is_empty());
        assert!(output.markdown.contains("![Diagram](assets/diagram.png)"));
    }

    #[test]
    fn test_pull_dedupes_referenced() {
        let storage = r#"<ac:image><ri:attachment ri:filename="a.png" /></ac:image><ac:image><ri:attachment ri:filename="a.png" /></ac:image>"#;
        let output = pull_page("x", storage, &records(&["a.png"]), &PullOptions::default());
        assert_eq!(output.referenced, vec!["_attachments/a.png".to_string()]);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_pull_title_heading() {
        let options = PullOptions {
            frontmatter: false,
            title_heading: true,
            ..Default::default()
        };
        let output = pull_page("Release notes", "<p>Body</p>", &[], &options);
        assert_eq!(output.markdown, "# Release notes\n\nBody\n");
        assert_eq!(output.page.body, vec![Block::paragraph(vec![Inline::text("Body")])]);
    }

    #[test]
    fn test_push_page() {
        let markdown = "---\ntitle: Design\npage_id: 42\n---\n\nSee ![d](_attachments/diagram.png)\n";
        let output = push_page(
            markdown,
            &records(&["diagram-20240131-153000.png"]),
            &PushOptions::default(),
        )
        .unwrap();
        assert_eq!(output.title.as_deref(), Some("Design"));
        assert_eq!(output.page_id.as_deref(), Some("42"));
        assert_eq!(output.uploads, vec!["_attachments/diagram.png".to_string()]);
        insta::assert_snapshot!(output.storage, @r#"<p>See <ac:image ac:alt="d"><ri:attachment ri:filename="diagram-20240131-153000.png" /></ac:image></p>"#);
        assert_eq!(output.page.title, "Design");
    }

    #[test]
    fn test_push_title_heading() {
        let options = PushOptions {
            title_heading: true,
            ..Default::default()
        };
        let output = push_page("# Release notes\n\nBody\n", &[], &options).unwrap();
        assert_eq!(output.title.as_deref(), Some("Release notes"));
        assert_eq!(output.storage, "<p>Body</p>");

        // Frontmatter wins, the heading is still removed
        let output = push_page("---\ntitle: Other\n---\n# Heading\n", &[], &options).unwrap();
        assert_eq!(output.title.as_deref(), Some("Other"));
        assert_eq!(output.storage, "");

        let output = push_page("## Sub\n", &[], &options).unwrap();
        assert_eq!(output.title, None);
        assert_eq!(output.storage, "<h2>Sub</h2>");
    }

    #[test]
    fn test_push_frontmatter_errors() {
        let markdown = "---\ntitle: [unclosed\n---\n\nBody\n";
        let lenient = push_page(markdown, &[], &PushOptions::default()).unwrap();
        assert_eq!(lenient.title, None);
        assert_eq!(lenient.storage, "<p>Body</p>");

        let strict = PushOptions {
            strict_frontmatter: true,
            ..Default::default()
        };
        assert!(matches!(
            push_page(markdown, &[], &strict),
            Err(Error::Frontmatter(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(validate(&[Block::heading(6, vec![])]).is_ok());
        let nested = Block::callout(CalloutKind::Note, "", vec![Block::heading(7, vec![])]);
        assert!(matches!(validate(&[nested]), Err(Error::InvalidModel(_))));
        assert!(validate(&[Block::heading(0, vec![])]).is_err());
    }

    #[test]
    fn test_blocks_json() {
        let blocks = vec![
            Block::heading(2, vec![Inline::text("Title")]),
            Block::task_list(vec![TaskItem::new(true, "done")]),
        ];
        let json = blocks_to_json(&blocks).unwrap();
        assert_eq!(blocks_from_json(&json).unwrap(), blocks);

        assert!(matches!(
            blocks_from_json(r#"[{"type":"marquee"}]"#),
            Err(Error::InvalidModel(_))
        ));
        assert!(matches!(
            blocks_from_json(r#"[{"type":"heading","level":9,"children":[]}]"#),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename(r#"a/b\c*d?e:f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
        let long = "x".repeat(150);
        let name = safe_filename(&long);
        assert_eq!(name.chars().count(), 100);
        assert!(name.ends_with("..."));
        assert_eq!(safe_filename(&"x".repeat(100)), "x".repeat(100));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Release notes: v2.0! "), "release-notes-v20");
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("Über straße"), "über-straße");
    }

    #[test]
    fn test_wrapper_item_suppression() {
        let blocks = read_storage("<ul><li><ul><li>A</li></ul></li></ul>");
        assert_eq!(md(&blocks), "- A\n");
    }

    #[test]
    fn test_warning_callout_round_trip() {
        let blocks = read_storage(
            r#"<ac:structured-macro ac:name="warning"><ac:parameter ac:name="title">Careful</ac:parameter><ac:rich-text-body><p>Hot surface</p></ac:rich-text-body></ac:structured-macro>"#,
        );
        let markdown = md(&blocks);
        assert_eq!(markdown, "> [!WARNING] Careful\n> Hot surface\n");
        assert_eq!(
            read_markdown(&markdown),
            vec![Block::callout(
                CalloutKind::Warning,
                "Careful",
                vec![Block::paragraph(vec![Inline::text("Hot surface")])]
            )]
        );
    }

    #[test]
    fn test_literal_table_preserves_code() {
        let code = "fn main() {\n\n    println!(\"<&>\");\n}\n";
        let storage = format!(
            r#"<table><tbody><tr><td><ac:structured-macro ac:name="code"><ac:parameter ac:name="language">rust</ac:parameter><ac:plain-text-body><![CDATA[{code}]]></ac:plain-text-body></ac:structured-macro></td></tr></tbody></table>"#
        );
        let markdown = md(&read_storage(&storage));
        let blocks = read_markdown(&markdown);
        let Some(Block::Table(table)) = blocks.first() else {
            panic!("expected a table, got {blocks:?}");
        };
        assert_eq!(table.rows[0].cells[0].blocks, vec![Block::code("rust", code)]);
    }

    #[test]
    fn test_literal_table_preserves_inline_code() {
        let storage = "<table><tbody><tr><td><code>a\n\nb</code></td><td>x</td></tr></tbody></table>";
        let original = read_storage(storage);
        let markdown = md(&original);
        assert!(markdown.contains("<code>a&#10;&#10;b</code>"), "{markdown}");

        let blocks = read_markdown(&markdown);
        assert_eq!(blocks.len(), 1, "{blocks:?}");
        let (Block::Table(table), Block::Table(expected)) = (&blocks[0], &original[0]) else {
            panic!("expected tables, got {blocks:?}");
        };
        assert_eq!(table.rows, expected.rows);
        assert_eq!(table.rows[0].cells.len(), 2);
    }

    #[test]
    fn test_unknown_macro_is_silent() {
        let output = pull_page(
            "x",
            r#"<p>a</p><ac:structured-macro ac:name="jira"><ac:parameter ac:name="key">ABC-1</ac:parameter></ac:structured-macro><p>b</p>"#,
            &[],
            &PullOptions {
                frontmatter: false,
                ..Default::default()
            },
        );
        assert_eq!(output.markdown, "a\n\nb\n");
        assert_eq!(
            output.diagnostics,
            vec![Diagnostic::RawPassthrough {
                element: "jira".into()
            }]
        );
    }

    #[test]
    fn test_attachment_image_path_round_trip() {
        let storage = r#"<ac:image ac:alt="d"><ri:attachment ri:filename="diagram.png" /></ac:image>"#;
        let pulled = pull_page(
            "x",
            storage,
            &records(&["diagram.png"]),
            &PullOptions::default(),
        );
        let pushed = push_page(&pulled.markdown, &records(&["diagram.png"]), &PushOptions::default())
            .unwrap();
        assert_eq!(pushed.storage, format!("<p>{storage}</p>"));
        let Some(Block::Image(image)) = pushed.page.body.first() else {
            panic!("expected an image");
        };
        assert_eq!(
            image.source,
            ImageSource::Attachment(AttachmentRef {
                filename: "diagram.png".into(),
                remote_id: None,
                local_relative_path: Some("_attachments/diagram.png".into()),
            })
        );
    }

    /// Letters mixed with characters Markdown reads as syntax. A run of
    /// `#` alone would close a heading.
    fn word() -> impl Strategy<Value = String> {
        "[a-z0-9*_#&;<>\\[\\]+=|.)-]{1,8}"
            .prop_filter("bare closing sequence", |w| !w.chars().all(|c| c == '#'))
    }

    fn plain_word() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    fn inline() -> impl Strategy<Value = Inline> {
        prop_oneof![
            4 => word().prop_map(Inline::text),
            1 => word().prop_map(|w| Inline::bold(vec![Inline::text(w)])),
            1 => word().prop_map(|w| Inline::italic(vec![Inline::text(w)])),
            1 => word().prop_map(|w| Inline::strike(vec![Inline::text(w)])),
            1 => word().prop_map(Inline::code),
        ]
    }

    /// Space-separated words, some of them marked
    fn inlines() -> impl Strategy<Value = Vec<Inline>> {
        proptest::collection::vec(inline(), 1..5).prop_map(|parts| {
            let mut children = Vec::new();
            for (i, part) in parts.into_iter().enumerate() {
                if i > 0 {
                    push_text(&mut children, " ");
                }
                match part {
                    Inline::Text(text) => push_text(&mut children, &text.value),
                    other => children.push(other),
                }
            }
            children
        })
    }

    fn words() -> impl Strategy<Value = String> {
        proptest::collection::vec(plain_word(), 0..4).prop_map(|w| w.join(" "))
    }

    fn list(depth: u32) -> BoxedStrategy<Block> {
        let item = if depth == 0 {
            inlines().prop_map(ListItem::text).boxed()
        } else {
            (inlines(), proptest::option::of(list(depth - 1)))
                .prop_map(|(text, nested)| {
                    let mut blocks = vec![Block::paragraph(text)];
                    blocks.extend(nested);
                    ListItem::new(blocks)
                })
                .boxed()
        };
        (any::<bool>(), proptest::collection::vec(item, 1..4))
            .prop_map(|(ordered, items)| Block::list(ordered, items))
            .boxed()
    }

    fn code() -> impl Strategy<Value = Block> {
        (
            "[a-z]{0,6}",
            proptest::collection::vec("[a-z =(){};]{0,12}", 0..4),
        )
            .prop_map(|(language, lines)| Block::code(language, lines.join("\n")))
    }

    fn callout() -> impl Strategy<Value = Block> {
        (
            prop_oneof![
                Just(CalloutKind::Note),
                Just(CalloutKind::Warning),
                Just(CalloutKind::Success)
            ],
            words(),
            proptest::collection::vec(inlines().prop_map(Block::paragraph), 1..3),
        )
            .prop_map(|(kind, title, body)| Block::callout(kind, title, body))
    }

    fn task_list() -> impl Strategy<Value = Block> {
        proptest::collection::vec(
            (any::<bool>(), proptest::collection::vec(plain_word(), 1..4)),
            1..4,
        )
        .prop_map(|items| {
            Block::task_list(
                items
                    .into_iter()
                    .map(|(done, text)| TaskItem::new(done, text.join(" ")))
                    .collect(),
            )
        })
    }

    fn document() -> impl Strategy<Value = Vec<Block>> {
        let block = prop_oneof![
            (1u8..=6, inlines()).prop_map(|(level, children)| Block::heading(level, children)),
            inlines().prop_map(Block::paragraph),
            list(2),
            code(),
            callout(),
            task_list(),
        ];
        proptest::collection::vec(block, 0..6)
    }

    proptest! {
        #[test]
        fn prop_markdown_round_trip(blocks in document()) {
            prop_assert_eq!(read_markdown(&md(&blocks)), blocks);
        }

        #[test]
        fn prop_write_idempotent(blocks in document()) {
            let once = md(&blocks);
            prop_assert_eq!(md(&read_markdown(&once)), once);
        }

        #[test]
        fn prop_storage_write_idempotent(blocks in document()) {
            let write = |blocks: &[Block]| {
                write_storage(blocks, &StorageWriterOptions::default(), &mut Diagnostics::new()).markup
            };
            let once = write(&blocks);
            prop_assert_eq!(write(&read_storage(&once)), once);
        }

        #[test]
        fn prop_ordinals(count in 1usize..12, nested_at in 0usize..12, nested_count in 1usize..5) {
            let nested_at = nested_at % count;
            let items = (0..count)
                .map(|i| {
                    let mut blocks = vec![Block::paragraph(vec![Inline::text(format!("item{i}"))])];
                    if i == nested_at {
                        let nested = (0..nested_count)
                            .map(|j| ListItem::text(vec![Inline::text(format!("sub{j}"))]))
                            .collect();
                        blocks.push(Block::list(true, nested));
                    }
                    ListItem::new(blocks)
                })
                .collect();
            let markdown = md(&[Block::list(true, items)]);

            let top: Vec<&str> = markdown
                .lines()
                .filter(|line| !line.starts_with(' ') && !line.is_empty())
                .collect();
            prop_assert_eq!(top.len(), count);
            for (i, line) in top.iter().enumerate() {
                let expected = format!("{}. item{i}", i + 1);
                prop_assert_eq!(*line, expected.as_str());
            }
            let nested: Vec<&str> = markdown
                .lines()
                .filter(|line| line.starts_with(' ') && !line.trim().is_empty())
                .map(str::trim_start)
                .collect();
            prop_assert_eq!(nested.len(), nested_count);
            for (j, line) in nested.iter().enumerate() {
                let expected = format!("{}. sub{j}", j + 1);
                prop_assert_eq!(*line, expected.as_str());
            }
        }
    }
}
