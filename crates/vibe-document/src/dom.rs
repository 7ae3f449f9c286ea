//! Parsed HTML documents
//!
//! [`HtmlDocument`] wraps an html5ever tree and exposes the two traversals
//! the editor addresses nodes by:
//!
//! - **sections**: element children of `<body>` that are not `<script>` or
//!   `<style>`, in document order
//! - **text leaves**: descendants of `<body>` whose tag is one of
//!   [`TEXT_LEAF_TAGS`], that have no element children and whose text
//!   content is non-empty after trimming, in document order
//!
//! The sandbox bridge script computes the same lists in the browser, so an
//! index sent from the preview resolves to the same node here. Documents are
//! always built in no-quirks mode because [`HtmlDocument::to_markup`] declares
//! `<!DOCTYPE html>`, which is how the browser parses the preview.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{QuirksMode, TreeBuilderOpts};
use html5ever::{parse_document, parse_fragment, Attribute, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Tags eligible as text leaves
pub const TEXT_LEAF_TAGS: &[&str] = &["h1", "h2", "h3", "p", "li", "button", "a", "span", "div"];

/// Body children skipped when enumerating sections
const NON_SECTION_TAGS: &[&str] = &["script", "style"];

/// Errors from turning a tree back into markup
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    /// The serializer failed to write
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] std::io::Error),
}

/// A parsed, mutable HTML document
///
/// Not `Send`: parse, patch and serialize within one synchronous call.
pub struct HtmlDocument {
    dom: RcDom,
}

impl HtmlDocument {
    /// Parse a full document. Parsing never fails; malformed markup is
    /// repaired the way a browser would.
    ///
    /// A missing or legacy doctype does not switch the tree builder into
    /// quirks mode. A doctype that forces quirks is dropped and the rest
    /// parsed again.
    #[must_use]
    pub fn parse(markup: &str) -> Self {
        let dom = parse_standards(markup);
        if dom.quirks_mode == QuirksMode::NoQuirks {
            return Self { dom };
        }
        Self {
            dom: parse_standards(without_doctype(markup)),
        }
    }

    /// The `<html>` element
    #[must_use]
    pub fn document_element(&self) -> Option<Handle> {
        self.dom
            .document
            .children
            .borrow()
            .iter()
            .find(|child| tag_name(child) == Some("html"))
            .cloned()
    }

    /// The `<head>` element
    #[must_use]
    pub fn head(&self) -> Option<Handle> {
        let html = self.document_element()?;
        let children = html.children.borrow();
        children.iter().find(|child| tag_name(child) == Some("head")).cloned()
    }

    /// The `<body>` element, absent for frameset documents
    #[must_use]
    pub fn body(&self) -> Option<Handle> {
        let html = self.document_element()?;
        let children = html.children.borrow();
        children.iter().find(|child| tag_name(child) == Some("body")).cloned()
    }

    /// Remixable sections in document order
    #[must_use]
    pub fn sections(&self) -> Vec<Handle> {
        let Some(body) = self.body() else {
            return Vec::new();
        };
        let children = body.children.borrow();
        children
            .iter()
            .filter(|child| matches!(tag_name(child), Some(tag) if !NON_SECTION_TAGS.contains(&tag)))
            .cloned()
            .collect()
    }

    /// Polishable text leaves in document order
    #[must_use]
    pub fn text_leaves(&self) -> Vec<Handle> {
        let mut leaves = Vec::new();
        if let Some(body) = self.body() {
            for child in body.children.borrow().iter() {
                collect_text_leaves(child, &mut leaves);
            }
        }
        leaves
    }

    /// Serialize as `<!DOCTYPE html>` followed by the outer HTML of the
    /// document element.
    ///
    /// # Errors
    /// Returns error if the serializer fails to write
    pub fn to_markup(&self) -> Result<String, DomError> {
        let mut out = b"<!DOCTYPE html>".to_vec();
        if let Some(html) = self.document_element() {
            write_node(&mut out, html, TraversalScope::IncludeNode)?;
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Inner HTML of `<body>`
    ///
    /// # Errors
    /// Returns error if the serializer fails to write
    pub fn body_markup(&self) -> Result<String, DomError> {
        let mut out = Vec::new();
        if let Some(body) = self.body() {
            write_node(&mut out, body, TraversalScope::ChildrenOnly(None))?;
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlDocument")
            .field("sections", &self.sections().len())
            .field("text_leaves", &self.text_leaves().len())
            .finish()
    }
}

fn parse_standards(markup: &str) -> RcDom {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            iframe_srcdoc: true,
            ..TreeBuilderOpts::default()
        },
        ..ParseOpts::default()
    };
    parse_document(RcDom::default(), opts).one(markup)
}

fn without_doctype(markup: &str) -> &str {
    let rest = markup.trim_start();
    let is_doctype = rest.get(..9).is_some_and(|head| head.eq_ignore_ascii_case("<!doctype"));
    if !is_doctype {
        return markup;
    }
    rest.find('>').map_or("", |end| &rest[end + 1..])
}

/// Trim the way `String.prototype.trim` does: U+FEFF counts as
/// whitespace there and U+0085 does not
fn trim_js(text: &str) -> &str {
    text.trim_matches(|c: char| c == '\u{feff}' || (c.is_whitespace() && c != '\u{85}'))
}

fn write_node(out: &mut Vec<u8>, node: Handle, scope: TraversalScope) -> Result<(), DomError> {
    let handle: SerializableHandle = node.into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..SerializeOpts::default()
    };
    serialize(out, &handle, opts)?;
    Ok(())
}

fn collect_text_leaves(node: &Handle, out: &mut Vec<Handle>) {
    let Some(tag) = tag_name(node) else {
        return;
    };
    if TEXT_LEAF_TAGS.contains(&tag) && !has_element_children(node) && !trim_js(&text_content(node)).is_empty() {
        out.push(node.clone());
    }
    for child in node.children.borrow().iter() {
        collect_text_leaves(child, out);
    }
}

/// Lowercase local name of an element node
#[must_use]
pub fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

fn has_element_children(node: &Handle) -> bool {
    node.children
        .borrow()
        .iter()
        .any(|child| matches!(child.data, NodeData::Element { .. }))
}

/// Concatenated text of all descendant text nodes
#[must_use]
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    append_text(node, &mut text);
    text
}

fn append_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        append_text(child, out);
    }
}

/// Outer HTML of a single node
///
/// # Errors
/// Returns error if the serializer fails to write
pub fn outer_html(node: &Handle) -> Result<String, DomError> {
    let mut out = Vec::new();
    write_node(&mut out, node.clone(), TraversalScope::IncludeNode)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Value of an attribute on an element
#[must_use]
pub fn attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| attr.name.ns.is_empty() && &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Set (or overwrite) an attribute on an element; no-op on other nodes
pub fn set_attribute(node: &Handle, name: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    if let Some(existing) = attrs
        .iter_mut()
        .find(|attr| attr.name.ns.is_empty() && &*attr.name.local == name)
    {
        existing.value = StrTendril::from_slice(value);
    } else {
        attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from_slice(value),
        });
    }
}

/// Replace all children of `node` with a single text node
pub fn set_text(node: &Handle, text: &str) {
    let text_node = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    });
    text_node.parent.set(Some(Rc::downgrade(node)));
    let previous = std::mem::replace(&mut *node.children.borrow_mut(), vec![text_node]);
    for child in previous {
        child.parent.set(None);
    }
}

/// Parse `markup` as body content and splice the resulting nodes into the
/// tree in place of `target`. Returns the number of nodes inserted.
///
/// `target` must have a parent; detached nodes are left untouched and `0`
/// is returned.
pub fn replace_with_fragment(target: &Handle, markup: &str) -> usize {
    let Some(parent) = parent_of(target) else {
        return 0;
    };
    let replacement = parse_body_fragment(markup);

    let mut siblings = parent.children.borrow_mut();
    let Some(position) = siblings.iter().position(|child| Rc::ptr_eq(child, target)) else {
        return 0;
    };
    for node in &replacement {
        node.parent.set(Some(Rc::downgrade(&parent)));
    }
    let inserted = replacement.len();
    drop(siblings.splice(position..=position, replacement));
    target.parent.set(None);
    inserted
}

/// Parse `markup` as body content and append the nodes to `parent`.
/// Returns the number of nodes appended.
pub fn append_fragment(parent: &Handle, markup: &str) -> usize {
    let nodes = parse_body_fragment(markup);
    let appended = nodes.len();
    let mut children = parent.children.borrow_mut();
    for node in nodes {
        node.parent.set(Some(Rc::downgrade(parent)));
        children.push(node);
    }
    appended
}

fn parse_body_fragment(markup: &str) -> Vec<Handle> {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    let fragment = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(markup);

    // html5ever roots fragments under a synthetic <html> element
    let root = fragment.document.children.borrow().first().cloned();
    match root {
        Some(root) => std::mem::take(&mut *root.children.borrow_mut()),
        None => Vec::new(),
    }
}

fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head></head><body>{body}</body></html>")
    }

    #[test]
    fn round_trips_simple_document() {
        let markup = page("<h1>Hi</h1><p>World</p>");
        let doc = HtmlDocument::parse(&markup);
        assert_eq!(doc.to_markup().unwrap(), markup);
    }

    #[test]
    fn sections_skip_scripts_and_styles() {
        let doc = HtmlDocument::parse(&page(
            "<style>p{}</style><header>a</header><script>x()</script><main>b</main>",
        ));
        let tags: Vec<_> = doc.sections().iter().map(|n| tag_name(n).unwrap().to_owned()).collect();
        assert_eq!(tags, vec!["header", "main"]);
    }

    #[test]
    fn text_leaves_follow_document_order() {
        let doc = HtmlDocument::parse(&page(
            "<section><h2>Title</h2><div><p>One</p><span>  </span></div><a href=\"#\">Go</a></section>",
        ));
        let texts: Vec<_> = doc.text_leaves().iter().map(text_content).collect();
        assert_eq!(texts, vec!["Title", "One", "Go"]);
    }

    #[test]
    fn elements_with_element_children_are_not_leaves() {
        let doc = HtmlDocument::parse(&page("<p>Hello <b>there</b></p><li>Item</li>"));
        let texts: Vec<_> = doc.text_leaves().iter().map(text_content).collect();
        assert_eq!(texts, vec!["Item"]);
    }

    #[test]
    fn unlisted_tags_are_not_leaves() {
        let doc = HtmlDocument::parse(&page("<h4>Small</h4><td>cell</td><strong>bold</strong>"));
        assert!(doc.text_leaves().is_empty());
    }

    #[test]
    fn set_text_replaces_children() {
        let doc = HtmlDocument::parse(&page("<p>Old</p>"));
        let leaf = doc.text_leaves().remove(0);
        set_text(&leaf, "New & improved");
        assert_eq!(doc.body_markup().unwrap(), "<p>New &amp; improved</p>");
    }

    #[test]
    fn replace_with_fragment_splices_all_nodes() {
        let doc = HtmlDocument::parse(&page("<h1>Hi</h1><p>World</p>"));
        let first = doc.sections().remove(0);
        let inserted = replace_with_fragment(&first, "<h1>A</h1><h2>B</h2>");
        assert_eq!(inserted, 2);
        assert_eq!(doc.body_markup().unwrap(), "<h1>A</h1><h2>B</h2><p>World</p>");
        assert_eq!(doc.sections().len(), 3);
    }

    #[test]
    fn append_fragment_adds_to_head() {
        let doc = HtmlDocument::parse(&page("<p>x</p>"));
        let head = doc.head().unwrap();
        assert_eq!(append_fragment(&head, "<style>p{color:red}</style><script src=\"a.js\"></script>"), 2);
        assert_eq!(
            doc.to_markup().unwrap(),
            "<!DOCTYPE html><html><head><style>p{color:red}</style><script src=\"a.js\"></script></head><body><p>x</p></body></html>"
        );
    }

    #[test]
    fn attributes_can_be_set_and_read() {
        let doc = HtmlDocument::parse(&page("<div class=\"x\">a</div>"));
        let div = doc.sections().remove(0);
        assert_eq!(attribute(&div, "class").as_deref(), Some("x"));
        set_attribute(&div, "data-k", "v");
        set_attribute(&div, "class", "y");
        assert_eq!(outer_html(&div).unwrap(), "<div class=\"y\" data-k=\"v\">a</div>");
    }

    #[test]
    fn leaf_text_is_trimmed_like_the_browser() {
        let doc = HtmlDocument::parse(&page("<span>\u{feff}</span><span>\u{feff}Go</span><p>\u{85}</p>"));
        let texts: Vec<_> = doc.text_leaves().iter().map(text_content).collect();
        assert_eq!(texts, vec!["\u{feff}Go", "\u{85}"]);
    }

    fn section_tags(doc: &HtmlDocument) -> Vec<String> {
        doc.sections().iter().map(|n| tag_name(n).unwrap().to_owned()).collect()
    }

    #[test]
    fn documents_without_doctype_parse_in_standards_mode() {
        // in quirks mode the table would stay inside the paragraph
        let body = "<p>Intro<table><tr><td>Cell</td></tr></table><div>Target</div>";
        let bare = format!("<html><head></head><body>{body}</body></html>");
        let legacy = format!("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">{bare}");
        let forced = format!("<!DOCTYPE>{bare}");

        for markup in [bare, legacy, forced] {
            let doc = HtmlDocument::parse(&markup);
            assert_eq!(section_tags(&doc), vec!["p", "table", "div"], "{markup}");
            let reparsed = HtmlDocument::parse(&doc.to_markup().unwrap());
            assert_eq!(section_tags(&reparsed), section_tags(&doc));
        }
    }

    #[test]
    fn missing_body_markup_is_synthesized() {
        let doc = HtmlDocument::parse("<p>bare</p>");
        assert_eq!(doc.to_markup().unwrap(), page("<p>bare</p>"));
    }
}
