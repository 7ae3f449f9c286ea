//! Node addressing
//!
//! A [`NodeAddress`] names one section or text leaf of a document. Positional
//! addresses are indices into the traversal lists of [`HtmlDocument`];
//! stable addresses are ids written into the markup by [`annotate`] so that
//! a target survives edits elsewhere in the page.

use crate::dom::{attribute, set_attribute, DomError, HtmlDocument};
use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

/// Attribute carrying a section's stable id
pub const SECTION_ID_ATTR: &str = "data-vibe-section";

/// Attribute carrying a text leaf's stable id
pub const TEXT_ID_ATTR: &str = "data-vibe-text";

/// Which traversal list an address refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Element children of `<body>`
    Section,
    /// Polishable text-bearing leaves
    TextLeaf,
}

impl TargetKind {
    /// Attribute used for stable ids of this kind
    #[inline]
    #[must_use]
    pub const fn id_attribute(self) -> &'static str {
        match self {
            Self::Section => SECTION_ID_ATTR,
            Self::TextLeaf => TEXT_ID_ATTR,
        }
    }

    const fn id_prefix(self) -> &'static str {
        match self {
            Self::Section => "s",
            Self::TextLeaf => "t",
        }
    }

    /// Nodes of this kind in document order
    #[must_use]
    pub fn targets(self, doc: &HtmlDocument) -> Vec<Handle> {
        match self {
            Self::Section => doc.sections(),
            Self::TextLeaf => doc.text_leaves(),
        }
    }
}

/// Address of a section or text leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAddress {
    /// Index into the traversal list. Signed so that a negative index from
    /// the wire is reported as not-found rather than rejected at decoding.
    Position(i64),
    /// Id assigned by [`annotate`]
    Stable(String),
}

impl NodeAddress {
    /// Find the addressed node among `kind`'s targets
    #[must_use]
    pub fn resolve(&self, doc: &HtmlDocument, kind: TargetKind) -> Option<Handle> {
        let targets = kind.targets(doc);
        match self {
            Self::Position(index) => usize::try_from(*index)
                .ok()
                .and_then(|i| targets.get(i).cloned()),
            Self::Stable(id) => targets
                .into_iter()
                .find(|node| attribute(node, kind.id_attribute()).as_deref() == Some(id.as_str())),
        }
    }
}

impl Display for NodeAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(index) => write!(f, "#{index}"),
            Self::Stable(id) => write!(f, "@{id}"),
        }
    }
}

impl From<i64> for NodeAddress {
    fn from(index: i64) -> Self {
        Self::Position(index)
    }
}

/// Give every section and text leaf a unique stable id.
///
/// Existing ids are kept unless they are duplicated, in which case later
/// occurrences are renumbered. Returns the annotated markup.
///
/// # Errors
/// Returns error if the annotated tree cannot be serialized
pub fn annotate(markup: &str) -> Result<String, DomError> {
    let doc = HtmlDocument::parse(markup);
    for kind in [TargetKind::Section, TargetKind::TextLeaf] {
        assign_ids(&kind.targets(&doc), kind);
    }
    doc.to_markup()
}

fn assign_ids(targets: &[Handle], kind: TargetKind) {
    let attr = kind.id_attribute();
    let existing: HashSet<String> = targets.iter().filter_map(|node| attribute(node, attr)).collect();

    let mut claimed = HashSet::with_capacity(targets.len());
    let mut next = 0usize;
    for node in targets {
        if let Some(id) = attribute(node, attr) {
            if claimed.insert(id) {
                continue;
            }
        }
        let fresh = loop {
            let candidate = format!("{}-{next}", kind.id_prefix());
            next += 1;
            if !existing.contains(&candidate) && !claimed.contains(&candidate) {
                break candidate;
            }
        };
        set_attribute(node, attr, &fresh);
        claimed.insert(fresh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head></head><body>{body}</body></html>")
    }

    #[test]
    fn annotate_numbers_sections_and_leaves() {
        let out = annotate(&page("<h1>Hi</h1><p>World</p>")).unwrap();
        assert_eq!(
            out,
            page(
                "<h1 data-vibe-section=\"s-0\" data-vibe-text=\"t-0\">Hi</h1>\
                 <p data-vibe-section=\"s-1\" data-vibe-text=\"t-1\">World</p>"
            )
        );
    }

    #[test]
    fn annotate_is_idempotent() {
        let once = annotate(&page("<section><h2>A</h2><p>B</p></section>")).unwrap();
        let twice = annotate(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicated_ids_are_renumbered() {
        let markup = page(
            "<div data-vibe-section=\"s-0\"><span>a</span></div>\
             <div data-vibe-section=\"s-0\"><span>b</span></div>",
        );
        let doc = HtmlDocument::parse(&annotate(&markup).unwrap());
        let ids: Vec<_> = doc
            .sections()
            .iter()
            .map(|n| attribute(n, SECTION_ID_ATTR).unwrap())
            .collect();
        assert_eq!(ids, vec!["s-0", "s-1"]);
    }

    #[test]
    fn resolves_positions_and_ids() {
        let doc = HtmlDocument::parse(&annotate(&page("<h1>Hi</h1><p>World</p>")).unwrap());
        let by_index = NodeAddress::Position(1).resolve(&doc, TargetKind::Section).unwrap();
        let by_id = NodeAddress::Stable("s-1".into())
            .resolve(&doc, TargetKind::Section)
            .unwrap();
        assert!(std::rc::Rc::ptr_eq(&by_index, &by_id));
    }

    #[test]
    fn negative_and_out_of_range_positions_do_not_resolve() {
        let doc = HtmlDocument::parse(&page("<h1>Hi</h1>"));
        assert!(NodeAddress::Position(-1).resolve(&doc, TargetKind::Section).is_none());
        assert!(NodeAddress::Position(1).resolve(&doc, TargetKind::Section).is_none());
        assert!(NodeAddress::Stable("s-9".into())
            .resolve(&doc, TargetKind::TextLeaf)
            .is_none());
    }

    #[test]
    fn display_distinguishes_forms() {
        assert_eq!(NodeAddress::Position(3).to_string(), "#3");
        assert_eq!(NodeAddress::Stable("t-2".into()).to_string(), "@t-2");
    }
}
