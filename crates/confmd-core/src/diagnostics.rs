//! Degraded-fidelity outcomes recorded during a conversion

use std::fmt;

use serde::Serialize;

use crate::attachments::MatchKind;

/// Something a conversion could not carry over exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Diagnostic {
    /// An unrecognized macro kept as passthrough markup
    RawPassthrough { element: String },
    /// Inline HTML in Markdown with no model equivalent
    UnsupportedInline { markup: String },
    /// Underline written as bold
    UnderlineDowngraded,
    HeuristicAttachmentMatch {
        reference: String,
        resolved: String,
        kind: MatchKind,
    },
    /// No attachment records to match against
    UnresolvedAttachment { reference: String },
    /// Image macro without a filename; the name came from its alt text
    DerivedAttachmentName { filename: String },
    MalformedTable,
    ListDepthExceeded,
}

impl Diagnostic {
    /// Low-confidence outcomes that deserve a warning
    pub fn is_warning(&self) -> bool {
        match self {
            Diagnostic::RawPassthrough { .. } | Diagnostic::DerivedAttachmentName { .. } => true,
            Diagnostic::HeuristicAttachmentMatch { kind, .. } => *kind == MatchKind::Fallback,
            _ => false,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::RawPassthrough { element } => {
                write!(f, "unrecognized macro `{element}` kept as passthrough")
            }
            Diagnostic::UnsupportedInline { markup } => {
                write!(f, "unsupported inline markup `{markup}` dropped")
            }
            Diagnostic::UnderlineDowngraded => write!(f, "underline written as bold"),
            Diagnostic::HeuristicAttachmentMatch {
                reference,
                resolved,
                kind,
            } => write!(f, "attachment `{reference}` matched `{resolved}` ({kind})"),
            Diagnostic::UnresolvedAttachment { reference } => {
                write!(f, "attachment `{reference}` left unresolved")
            }
            Diagnostic::DerivedAttachmentName { filename } => {
                write!(f, "image without filename, derived `{filename}` from alt text")
            }
            Diagnostic::MalformedTable => write!(f, "malformed table kept as passthrough"),
            Diagnostic::ListDepthExceeded => write!(f, "deeply nested list flattened"),
        }
    }
}

/// Diagnostics collected over one conversion call
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            tracing::warn!(%diagnostic, "Degraded conversion");
        } else {
            tracing::debug!(%diagnostic, "Degraded conversion");
        }
        self.entries.push(diagnostic);
    }

    /// Record a diagnostic unless an equal one is already present
    pub fn push_once(&mut self, diagnostic: Diagnostic) {
        if !self.entries.contains(&diagnostic) {
            self.push(diagnostic);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
