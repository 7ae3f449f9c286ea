//! Patch Applier
//!
//! Produces a new whole document from the current one by replacing exactly
//! one addressed node. The input markup is never modified; on any error no
//! new document is produced.

use crate::address::{NodeAddress, TargetKind};
use crate::dom::{replace_with_fragment, set_text, tag_name, DomError, HtmlDocument};
use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};

/// A single-node replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    /// Replace a section's outer markup with a body fragment
    ReplaceSection {
        /// Which section
        address: NodeAddress,
        /// Replacement fragment; may parse to several nodes
        markup: String,
    },

    /// Replace a text leaf's content, guarded by a tag check
    ReplaceText {
        /// Which text leaf
        address: NodeAddress,
        /// Tag the requester saw at `address`, compared case-insensitively
        expected_tag: String,
        /// New text content
        text: String,
    },
}

impl Patch {
    /// Traversal list the address refers to
    #[inline]
    #[must_use]
    pub const fn target_kind(&self) -> TargetKind {
        match self {
            Self::ReplaceSection { .. } => TargetKind::Section,
            Self::ReplaceText { .. } => TargetKind::TextLeaf,
        }
    }

    /// Address of the node being replaced
    #[inline]
    #[must_use]
    pub const fn address(&self) -> &NodeAddress {
        match self {
            Self::ReplaceSection { address, .. } | Self::ReplaceText { address, .. } => address,
        }
    }
}

/// Errors from applying a [`Patch`]
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// No node at the address
    #[error("target {address} not found among {available} candidates")]
    TargetNotFound {
        /// Requested address
        address: NodeAddress,
        /// Number of candidates in the traversal
        available: usize,
    },

    /// The node at the address has a different tag than expected
    #[error("element mismatch: expected <{expected}>, found <{found}>")]
    ElementMismatch {
        /// Tag the requester expected
        expected: String,
        /// Tag actually present
        found: String,
    },

    /// Replacement content was blank
    #[error("replacement content is empty")]
    EmptyReplacement,

    /// Serialization of the patched tree failed
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl PatchError {
    /// True for errors that indicate the requester's view is stale
    #[inline]
    #[must_use]
    pub const fn is_addressing(&self) -> bool {
        matches!(self, Self::TargetNotFound { .. } | Self::ElementMismatch { .. })
    }
}

/// Apply `patch` to `markup`, returning the re-serialized document.
///
/// # Errors
/// - [`PatchError::EmptyReplacement`] if the replacement is blank
/// - [`PatchError::TargetNotFound`] if the address resolves to nothing
/// - [`PatchError::ElementMismatch`] if a text patch's tag check fails
pub fn apply_patch(markup: &str, patch: &Patch) -> Result<String, PatchError> {
    let doc = HtmlDocument::parse(markup);

    match patch {
        Patch::ReplaceSection {
            address,
            markup: replacement,
        } => {
            if replacement.trim().is_empty() {
                return Err(PatchError::EmptyReplacement);
            }
            let target = resolve(&doc, address, TargetKind::Section)?;
            replace_with_fragment(&target, replacement);
        }
        Patch::ReplaceText {
            address,
            expected_tag,
            text,
        } => {
            if text.trim().is_empty() {
                return Err(PatchError::EmptyReplacement);
            }
            let target = resolve(&doc, address, TargetKind::TextLeaf)?;
            let found = tag_name(&target).unwrap_or_default();
            if !found.eq_ignore_ascii_case(expected_tag.trim()) {
                return Err(PatchError::ElementMismatch {
                    expected: expected_tag.trim().to_ascii_lowercase(),
                    found: found.to_owned(),
                });
            }
            set_text(&target, text);
        }
    }

    Ok(doc.to_markup()?)
}

fn resolve(doc: &HtmlDocument, address: &NodeAddress, kind: TargetKind) -> Result<Handle, PatchError> {
    address.resolve(doc, kind).ok_or_else(|| PatchError::TargetNotFound {
        address: address.clone(),
        available: kind.targets(doc).len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::annotate;
    use pretty_assertions::assert_eq;

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head></head><body>{body}</body></html>")
    }

    fn remix(index: i64, markup: &str) -> Patch {
        Patch::ReplaceSection {
            address: NodeAddress::Position(index),
            markup: markup.into(),
        }
    }

    fn polish(index: i64, tag: &str, text: &str) -> Patch {
        Patch::ReplaceText {
            address: NodeAddress::Position(index),
            expected_tag: tag.into(),
            text: text.into(),
        }
    }

    #[test]
    fn remix_replaces_first_section() {
        let out = apply_patch(&page("<h1>Hi</h1><p>World</p>"), &remix(0, "<h1>Hello</h1>")).unwrap();
        assert_eq!(out, page("<h1>Hello</h1><p>World</p>"));
    }

    #[test]
    fn remix_index_skips_scripts_and_styles() {
        let doc = page("<script>a()</script><h1>Hi</h1><style>p{}</style><p>World</p>");
        let out = apply_patch(&doc, &remix(1, "<footer>F</footer>")).unwrap();
        assert_eq!(
            out,
            page("<script>a()</script><h1>Hi</h1><style>p{}</style><footer>F</footer>")
        );
    }

    #[test]
    fn remix_out_of_range_is_not_found() {
        let doc = page("<h1>Hi</h1><p>World</p>");
        for index in [2, 17, -1] {
            let err = apply_patch(&doc, &remix(index, "<h1>x</h1>")).unwrap_err();
            assert!(
                matches!(err, PatchError::TargetNotFound { available: 2, .. }),
                "index {index}: {err}"
            );
            assert!(err.is_addressing());
        }
    }

    #[test]
    fn polish_replaces_text() {
        let out = apply_patch(&page("<h1>Hi</h1><p>World</p>"), &polish(1, "p", "Earth")).unwrap();
        assert_eq!(out, page("<h1>Hi</h1><p>Earth</p>"));
    }

    #[test]
    fn polish_tag_check_is_case_insensitive() {
        let out = apply_patch(&page("<h1>Hi</h1>"), &polish(0, "H1", "Hey")).unwrap();
        assert_eq!(out, page("<h1>Hey</h1>"));
    }

    #[test]
    fn polish_rejects_mismatched_tag() {
        let err = apply_patch(&page("<h1>Hi</h1><p>World</p>"), &polish(1, "span", "Earth")).unwrap_err();
        match err {
            PatchError::ElementMismatch { expected, found } => {
                assert_eq!(expected, "span");
                assert_eq!(found, "p");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn polish_escapes_replacement_text() {
        let out = apply_patch(&page("<p>x</p>"), &polish(0, "p", "<b>bold</b>")).unwrap();
        assert_eq!(out, page("<p>&lt;b&gt;bold&lt;/b&gt;</p>"));
    }

    #[test]
    fn blank_replacements_are_rejected() {
        let doc = page("<p>x</p>");
        assert!(matches!(
            apply_patch(&doc, &remix(0, "   ")),
            Err(PatchError::EmptyReplacement)
        ));
        assert!(matches!(
            apply_patch(&doc, &polish(0, "p", "")),
            Err(PatchError::EmptyReplacement)
        ));
    }

    #[test]
    fn stable_address_survives_earlier_insertions() {
        let doc = annotate(&page("<h1>Hi</h1><p>World</p>")).unwrap();
        // a remix that grows the first section shifts every later index
        let grown = apply_patch(&doc, &remix(0, "<h1>A</h1><h2>B</h2>")).unwrap();
        let patch = Patch::ReplaceText {
            address: NodeAddress::Stable("t-1".into()),
            expected_tag: "p".into(),
            text: "Earth".into(),
        };
        let out = apply_patch(&grown, &patch).unwrap();
        let body = HtmlDocument::parse(&out).body_markup().unwrap();
        assert!(body.ends_with(">Earth</p>"), "{body}");
        assert!(body.starts_with("<h1>A</h1><h2>B</h2>"), "{body}");
    }

    #[test]
    fn patches_serialize_with_op_tag() {
        let json = serde_json::to_value(remix(2, "<p>x</p>")).unwrap();
        assert_eq!(json["op"], "replace_section");
        assert_eq!(json["address"]["position"], 2);
    }
}
