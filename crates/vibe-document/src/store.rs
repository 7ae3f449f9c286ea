//! Document Store
//!
//! Holds the A/B variants of a project. Every change is a whole-document
//! replacement; no markup validation happens at this layer.

use crate::history::{History, HistoryError};
use crate::revision::Revision;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Variant slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantLabel {
    A,
    B,
}

impl VariantLabel {
    /// The opposite slot
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl Display for VariantLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "A",
            Self::B => "B",
        })
    }
}

impl FromStr for VariantLabel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(StoreError::UnknownLabel(other.to_owned())),
        }
    }
}

/// Per-variant edit state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    #[default]
    Idle,
    /// An external rewrite is outstanding
    AwaitingGeneration,
}

/// One independently versioned document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    label: VariantLabel,
    html: String,
    css: String,
    /// Design-style tag the variant was generated with
    style: String,
    history: History,
    state: EditState,
}

impl Variant {
    /// Empty variant awaiting its first generation
    #[must_use]
    pub fn empty(label: VariantLabel, style: impl Into<String>) -> Self {
        Self::generated(label, String::new(), String::new(), style)
    }

    /// Variant populated by a generation call
    #[must_use]
    pub fn generated(
        label: VariantLabel,
        html: impl Into<String>,
        css: impl Into<String>,
        style: impl Into<String>,
    ) -> Self {
        Self {
            label,
            html: html.into(),
            css: css.into(),
            style: style.into(),
            history: History::new(),
            state: EditState::Idle,
        }
    }

    #[inline]
    #[must_use]
    pub const fn label(&self) -> VariantLabel {
        self.label
    }

    #[inline]
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    #[inline]
    #[must_use]
    pub fn css(&self) -> &str {
        &self.css
    }

    #[inline]
    #[must_use]
    pub fn style(&self) -> &str {
        &self.style
    }

    #[inline]
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> EditState {
        self.state
    }

    /// True if nothing has been generated yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// Revision of the current content
    #[must_use]
    pub fn revision(&self) -> Revision {
        Revision::of(&self.html, &self.css)
    }

    /// Replace the markup unconditionally
    pub fn set_html(&mut self, html: impl Into<String>) {
        self.html = html.into();
    }

    /// Replace the stylesheet unconditionally
    pub fn set_css(&mut self, css: impl Into<String>) {
        self.css = css.into();
    }

    pub fn set_state(&mut self, state: EditState) {
        self.state = state;
    }

    /// Snapshot the current markup onto the undo stack
    pub fn record_for_undo(&mut self) {
        self.history.record_for_undo(&self.html);
    }

    /// Roll back the last snapshot of an edit that did not commit
    pub fn discard_last_record(&mut self) {
        self.history.discard_last_record();
    }

    /// Commit a new edit: replace the markup and clear redo history
    pub fn commit(&mut self, html: String) {
        self.html = html;
        self.history.clear_redo();
    }

    /// Step back one snapshot
    ///
    /// # Errors
    /// [`HistoryError::NothingToUndo`] on an empty undo stack
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        self.html = self.history.undo(&self.html)?;
        Ok(())
    }

    /// Step forward one snapshot
    ///
    /// # Errors
    /// [`HistoryError::NothingToRedo`] on an empty redo stack
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        self.html = self.history.redo(&self.html)?;
        Ok(())
    }
}

/// Errors from the document store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Slot B has not been generated
    #[error("variant {0} does not exist")]
    MissingVariant(VariantLabel),

    #[error("unknown variant label: {0:?}")]
    UnknownLabel(String),
}

/// Slot A, optional slot B, and which one is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStore {
    a: Variant,
    b: Option<Variant>,
    active: VariantLabel,
}

impl DocumentStore {
    /// Store with an empty slot A active
    #[must_use]
    pub fn new(style: impl Into<String>) -> Self {
        Self {
            a: Variant::empty(VariantLabel::A, style),
            b: None,
            active: VariantLabel::A,
        }
    }

    /// Store seeded with a generated variant, which becomes active
    #[must_use]
    pub fn with_variant(variant: Variant) -> Self {
        let active = variant.label();
        let mut store = Self::new(variant.style().to_owned());
        store.replace_variant(variant);
        store.active = active;
        store
    }

    #[inline]
    #[must_use]
    pub const fn active_label(&self) -> VariantLabel {
        self.active
    }

    #[must_use]
    pub fn active(&self) -> &Variant {
        match self.active {
            VariantLabel::B => self.b.as_ref().unwrap_or(&self.a),
            VariantLabel::A => &self.a,
        }
    }

    #[must_use]
    pub fn get(&self, label: VariantLabel) -> Option<&Variant> {
        match label {
            VariantLabel::A => Some(&self.a),
            VariantLabel::B => self.b.as_ref(),
        }
    }

    pub fn get_mut(&mut self, label: VariantLabel) -> Option<&mut Variant> {
        match label {
            VariantLabel::A => Some(&mut self.a),
            VariantLabel::B => self.b.as_mut(),
        }
    }

    /// Variant by label, or [`StoreError::MissingVariant`]
    ///
    /// # Errors
    /// Returns error if slot B is requested before it exists
    pub fn require_mut(&mut self, label: VariantLabel) -> Result<&mut Variant, StoreError> {
        self.get_mut(label).ok_or(StoreError::MissingVariant(label))
    }

    /// Replace a variant's markup unconditionally
    ///
    /// # Errors
    /// Returns error if the slot is empty
    pub fn set_html(&mut self, label: VariantLabel, html: impl Into<String>) -> Result<(), StoreError> {
        self.require_mut(label)?.set_html(html);
        Ok(())
    }

    /// Replace a variant's stylesheet unconditionally
    ///
    /// # Errors
    /// Returns error if the slot is empty
    pub fn set_css(&mut self, label: VariantLabel, css: impl Into<String>) -> Result<(), StoreError> {
        self.require_mut(label)?.set_css(css);
        Ok(())
    }

    /// Install a freshly generated variant in its slot, discarding the old
    /// variant and its history
    pub fn replace_variant(&mut self, variant: Variant) {
        match variant.label() {
            VariantLabel::A => self.a = variant,
            VariantLabel::B => self.b = Some(variant),
        }
    }

    /// Make `label` the variant edits apply to
    ///
    /// # Errors
    /// Returns error if slot B is activated before it exists
    pub fn activate(&mut self, label: VariantLabel) -> Result<(), StoreError> {
        if self.get(label).is_none() {
            return Err(StoreError::MissingVariant(label));
        }
        self.active = label;
        Ok(())
    }

    /// Both variants, A first
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        std::iter::once(&self.a).chain(self.b.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_has_only_slot_a() {
        let store = DocumentStore::new("Modern Clean");
        assert_eq!(store.active_label(), VariantLabel::A);
        assert!(store.active().is_empty());
        assert!(store.get(VariantLabel::B).is_none());
        assert_eq!(store.variants().count(), 1);
    }

    #[test]
    fn activating_missing_b_fails() {
        let mut store = DocumentStore::new("Playful");
        assert_eq!(
            store.activate(VariantLabel::B),
            Err(StoreError::MissingVariant(VariantLabel::B))
        );
        store.replace_variant(Variant::generated(VariantLabel::B, "<p>b</p>", "", "Cyberpunk"));
        store.activate(VariantLabel::B).unwrap();
        assert_eq!(store.active().html(), "<p>b</p>");
    }

    #[test]
    fn replacing_variant_drops_history() {
        let mut store = DocumentStore::with_variant(Variant::generated(VariantLabel::A, "v1", "", "x"));
        let a = store.require_mut(VariantLabel::A).unwrap();
        a.record_for_undo();
        a.commit("v2".into());
        assert!(a.history().can_undo());

        store.replace_variant(Variant::generated(VariantLabel::A, "fresh", "", "y"));
        assert!(!store.active().history().can_undo());
        assert_eq!(store.active().style(), "y");
    }

    #[test]
    fn set_css_changes_revision() {
        let mut store = DocumentStore::with_variant(Variant::generated(VariantLabel::A, "<p>x</p>", "", "s"));
        let before = store.active().revision();
        store.set_css(VariantLabel::A, "p{color:red}").unwrap();
        assert_ne!(store.active().revision(), before);
    }

    #[test]
    fn labels_parse_and_flip() {
        assert_eq!("b".parse::<VariantLabel>().unwrap(), VariantLabel::B);
        assert_eq!(VariantLabel::A.other(), VariantLabel::B);
        assert!("C".parse::<VariantLabel>().is_err());
    }
}
