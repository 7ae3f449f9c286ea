//! VibeStack document model
//!
//! Versioned A/B page documents edited by replacing one addressed node at a
//! time.
//!
//! # Core Concepts
//!
//! - [`HtmlDocument`]: parsed HTML tree with the section and text-leaf traversals
//! - [`NodeAddress`]: positional or stable address of an editable node
//! - [`Patch`] / [`apply_patch`]: single-node replacement producing a new document
//! - [`History`]: linear undo/redo over whole-document snapshots
//! - [`DocumentStore`]: the A/B [`Variant`] slots and which one is active
//! - [`Revision`]: Blake3 digest identifying a document's content
//!
//! # Example
//!
//! ```rust
//! use vibe_document::{apply_patch, NodeAddress, Patch};
//!
//! let page = "<!DOCTYPE html><html><head></head><body><h1>Hi</h1><p>World</p></body></html>";
//! let patch = Patch::ReplaceText {
//!     address: NodeAddress::Position(1),
//!     expected_tag: "p".into(),
//!     text: "Earth".into(),
//! };
//! let patched = apply_patch(page, &patch).unwrap();
//! assert!(patched.contains("<p>Earth</p>"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod address;
pub mod dom;
mod history;
mod patch;
mod revision;
mod store;

pub use address::{annotate, NodeAddress, TargetKind, SECTION_ID_ATTR, TEXT_ID_ATTR};
pub use dom::{DomError, HtmlDocument, TEXT_LEAF_TAGS};
pub use history::{History, HistoryError};
pub use patch::{apply_patch, Patch, PatchError};
pub use revision::{Revision, RevisionError};
pub use store::{DocumentStore, EditState, StoreError, Variant, VariantLabel};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
