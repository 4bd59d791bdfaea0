//! confmd-core: Confluence storage format to Markdown conversion
//!
//! This crate provides:
//! - Storage format reader (storage markup to document model)
//! - Markdown reader (Markdown to document model)
//! - Storage format writer (document model to storage markup)
//! - Attachment reconciliation against a page's stored attachments
//! - Page-level pull and push pipelines with diagnostics

pub mod attachments;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod markdown_reader;
pub mod page;
pub mod storage_writer;

pub use attachments::{
    FallbackPolicy, MatchKind, ReconcileOptions, Reconciled, find_match, resolve_for_local,
    resolve_for_remote, strip_timestamp,
};
pub use convert::{Origin, read_storage, read_storage_strict, read_storage_with};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{Error, Result};
pub use markdown_reader::{Metadata, read_markdown, read_markdown_with, split_frontmatter};
pub use page::{
    PullOptions, PullOutput, PushOptions, PushOutput, blocks_from_json, blocks_to_json,
    pull_page, push_page, safe_filename, slugify, validate,
};
pub use storage_writer::{StorageOutput, StorageWriterOptions, write_storage};

pub use confmd_mdast as mdast;
