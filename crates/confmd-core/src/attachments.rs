//! Attachment reconciliation
//!
//! The remote side appends `-YYYYMMDD-HHMMSS` to attachment names on upload,
//! while documents keep referring to the name the file had before. Matching
//! walks an ordered list of rules and the first one that hits wins:
//!
//! 1. exact filename
//! 2. substring, either way
//! 3. equal after stripping the timestamp suffix from both names
//! 4. substring after stripping
//! 5. the first record, unless the fallback policy says otherwise
//!
//! With no records at all the reference is kept unresolved.

use std::fmt;
use std::sync::LazyLock;

use confmd_mdast::{AttachmentRecord, AttachmentRef, DEFAULT_ATTACHMENTS_DIR};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Server-added upload timestamp right before the extension
static TIMESTAMP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d{8}-\d{6}(\.\w+)$").expect("invalid timestamp regex"));

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    Exact,
    Contains,
    TimestampStripped,
    TimestampStrippedContains,
    /// First record taken without any name evidence
    Fallback,
}

impl MatchKind {
    /// Anything but an exact match is a guess
    pub fn is_heuristic(self) -> bool {
        self != MatchKind::Exact
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchKind::Exact => "exact",
            MatchKind::Contains => "substring",
            MatchKind::TimestampStripped => "timestamp stripped",
            MatchKind::TimestampStrippedContains => "timestamp stripped substring",
            MatchKind::Fallback => "fallback to first attachment, low confidence",
        };
        f.write_str(label)
    }
}

/// What to do when no rule matches but records exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum FallbackPolicy {
    /// Take the first record
    #[default]
    #[serde(rename = "first")]
    FirstRecord,
    /// Leave the reference unresolved
    #[serde(rename = "keep")]
    KeepOriginal,
}

/// Reconciler settings
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Local directory holding attachments, relative to the Markdown file
    pub attachments_dir: String,
    pub fallback: FallbackPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            attachments_dir: DEFAULT_ATTACHMENTS_DIR.to_string(),
            fallback: FallbackPolicy::default(),
        }
    }
}

/// A matched record and the rule that matched it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    pub record: &'a AttachmentRecord,
    pub kind: MatchKind,
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// The reference with the other side filled in, or the input unchanged
    pub reference: AttachmentRef,
    /// `None` when the reference stayed unresolved
    pub kind: Option<MatchKind>,
}

impl Reconciled {
    pub fn is_resolved(&self) -> bool {
        self.kind.is_some()
    }

    fn unresolved(reference: &AttachmentRef) -> Self {
        Self {
            reference: reference.clone(),
            kind: None,
        }
    }
}

/// Remove a trailing upload timestamp (`a-20240131-153000.png` → `a.png`)
pub fn strip_timestamp(filename: &str) -> String {
    TIMESTAMP_SUFFIX.replace(filename, "$1").into_owned()
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Find the record a filename refers to
pub fn find_match<'a>(
    filename: &str,
    records: &'a [AttachmentRecord],
    fallback: FallbackPolicy,
) -> Option<Match<'a>> {
    let found = |record, kind| Some(Match { record, kind });

    if let Some(record) = records.iter().find(|r| r.filename == filename) {
        return found(record, MatchKind::Exact);
    }
    if let Some(record) = records.iter().find(|r| contains_either(&r.filename, filename)) {
        return found(record, MatchKind::Contains);
    }

    let stripped = strip_timestamp(filename);
    if let Some(record) = records
        .iter()
        .find(|r| strip_timestamp(&r.filename) == stripped)
    {
        return found(record, MatchKind::TimestampStripped);
    }
    if let Some(record) = records
        .iter()
        .find(|r| contains_either(&strip_timestamp(&r.filename), &stripped))
    {
        return found(record, MatchKind::TimestampStrippedContains);
    }

    match fallback {
        FallbackPolicy::FirstRecord => records
            .first()
            .and_then(|record| found(record, MatchKind::Fallback)),
        FallbackPolicy::KeepOriginal => None,
    }
}

/// Resolve a reference read from storage markup to a local path.
///
/// The local path is `<attachments dir>/<record filename>`, so the file on
/// disk carries the name the remote side stores it under.
pub fn resolve_for_local(
    reference: &AttachmentRef,
    records: &[AttachmentRecord],
    options: &ReconcileOptions,
) -> Reconciled {
    let Some(found) = find_match(&reference.filename, records, options.fallback) else {
        return Reconciled::unresolved(reference);
    };
    let dir = options.attachments_dir.trim_end_matches('/');
    let path = if dir.is_empty() {
        found.record.filename.clone()
    } else {
        format!("{dir}/{}", found.record.filename)
    };
    Reconciled {
        reference: AttachmentRef {
            filename: reference.filename.clone(),
            remote_id: Some(found.record.id.clone()),
            local_relative_path: Some(path),
        },
        kind: Some(found.kind),
    }
}

/// Resolve a reference read from Markdown to a remote filename.
///
/// An unmatched local file is a new upload under its own name, so the
/// first-record fallback is never applied in this direction.
pub fn resolve_for_remote(reference: &AttachmentRef, records: &[AttachmentRecord]) -> Reconciled {
    let Some(found) = find_match(&reference.filename, records, FallbackPolicy::KeepOriginal)
    else {
        return Reconciled::unresolved(reference);
    };
    Reconciled {
        reference: AttachmentRef {
            filename: found.record.filename.clone(),
            remote_id: Some(found.record.id.clone()),
            local_relative_path: reference.local_relative_path.clone(),
        },
        kind: Some(found.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn records(names: &[&str]) -> Vec<AttachmentRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| AttachmentRecord::new(format!("att{i}"), *name))
            .collect()
    }

    #[test]
    fn test_strip_timestamp() {
        assert_eq!(strip_timestamp("diagram-20240131-153000.png"), "diagram.png");
        assert_eq!(strip_timestamp("diagram.png"), "diagram.png");
        assert_eq!(strip_timestamp("a-2024-153000.png"), "a-2024-153000.png");
    }

    #[test]
    fn test_exact_wins_over_contains() {
        let known = records(&["big-diagram.png", "diagram.png"]);
        let found = find_match("diagram.png", &known, FallbackPolicy::FirstRecord).unwrap();
        assert_eq!(found.record.filename, "diagram.png");
        assert_eq!(found.kind, MatchKind::Exact);
    }

    #[test]
    fn test_contains_either_direction() {
        let known = records(&["other.txt", "screenshot.png"]);
        let found = find_match("shot.png", &known, FallbackPolicy::FirstRecord).unwrap();
        assert_eq!(found.record.filename, "screenshot.png");
        assert_eq!(found.kind, MatchKind::Contains);

        let known = records(&["shot.png"]);
        let found = find_match("my-shot.png", &known, FallbackPolicy::FirstRecord).unwrap();
        assert_eq!(found.kind, MatchKind::Contains);
    }

    #[test]
    fn test_timestamp_rule() {
        let known = records(&["diagram-20240131-153000.png"]);
        let reference = AttachmentRef::remote("diagram.png");
        let resolved = resolve_for_local(&reference, &known, &ReconcileOptions::default());
        assert_eq!(resolved.kind, Some(MatchKind::TimestampStripped));
        assert_eq!(
            resolved.reference.local_relative_path.as_deref(),
            Some("_attachments/diagram-20240131-153000.png")
        );
        assert_eq!(resolved.reference.remote_id.as_deref(), Some("att0"));
    }

    #[test]
    fn test_timestamp_on_both_sides() {
        let known = records(&["diagram-20240201-101010.png"]);
        let found = find_match(
            "diagram-20240131-153000.png",
            &known,
            FallbackPolicy::KeepOriginal,
        )
        .unwrap();
        assert_eq!(found.kind, MatchKind::TimestampStripped);
    }

    #[test]
    fn test_timestamp_stripped_contains() {
        let known = records(&["team-diagram-20240201-101010.png"]);
        let found = find_match(
            "diagram-20240131-153000.png",
            &known,
            FallbackPolicy::KeepOriginal,
        )
        .unwrap();
        assert_eq!(found.kind, MatchKind::TimestampStrippedContains);
    }

    #[test]
    fn test_fallback_to_first() {
        let known = records(&["a.pdf", "b.pdf"]);
        let found = find_match("zzz.png", &known, FallbackPolicy::FirstRecord).unwrap();
        assert_eq!(found.record.filename, "a.pdf");
        assert_eq!(found.kind, MatchKind::Fallback);
        assert!(find_match("zzz.png", &known, FallbackPolicy::KeepOriginal).is_none());
    }

    #[test]
    fn test_no_records_keeps_reference() {
        let reference = AttachmentRef::remote("x.png");
        let resolved = resolve_for_local(&reference, &[], &ReconcileOptions::default());
        assert!(!resolved.is_resolved());
        assert_eq!(resolved.reference, reference);
    }

    #[test]
    fn test_resolve_for_remote() {
        let known = records(&["diagram-20240131-153000.png"]);
        let reference = AttachmentRef::local("_attachments/diagram.png");
        let resolved = resolve_for_remote(&reference, &known);
        assert_eq!(resolved.reference.filename, "diagram-20240131-153000.png");
        assert_eq!(
            resolved.reference.local_relative_path.as_deref(),
            Some("_attachments/diagram.png")
        );
    }

    #[test]
    fn test_resolve_for_remote_never_falls_back() {
        let known = records(&["unrelated.pdf"]);
        let reference = AttachmentRef::local("_attachments/new.png");
        let resolved = resolve_for_remote(&reference, &known);
        assert!(!resolved.is_resolved());
        assert_eq!(resolved.reference.filename, "new.png");
    }

    proptest! {
        #[test]
        fn prop_timestamped_record_is_found(
            stem in "[a-z][a-z_]{0,11}",
            ext in "(png|jpg|pdf|svg)",
            date in 19700101u32..21001231,
            time in 0u32..235959,
        ) {
            let original = format!("{stem}.{ext}");
            let uploaded = format!("{stem}-{date:08}-{time:06}.{ext}");
            let known = records(&[&uploaded]);
            let resolved = resolve_for_local(
                &AttachmentRef::remote(original),
                &known,
                &ReconcileOptions::default(),
            );
            prop_assert_eq!(resolved.kind, Some(MatchKind::TimestampStripped));
            let expected = format!("_attachments/{uploaded}");
            prop_assert_eq!(resolved.reference.local_relative_path.as_deref(), Some(expected.as_str()));
        }

        #[test]
        fn prop_exact_name_always_resolves_exactly(
            names in proptest::collection::vec("[a-z]{1,8}\\.png", 1..6),
            pick in 0usize..6,
        ) {
            let known = records(&names.iter().map(String::as_str).collect::<Vec<_>>());
            let target = &names[pick % names.len()];
            let found = find_match(target, &known, FallbackPolicy::FirstRecord).unwrap();
            prop_assert_eq!(found.kind, MatchKind::Exact);
            prop_assert_eq!(&found.record.filename, target);
        }

        #[test]
        fn prop_empty_records_never_resolve(name in "[a-z0-9_.-]{0,16}") {
            let reference = AttachmentRef::remote(name);
            let resolved = resolve_for_local(&reference, &[], &ReconcileOptions::default());
            prop_assert!(!resolved.is_resolved());
            prop_assert_eq!(resolved.reference, reference);
        }
    }
}
