//! History Tracker
//!
//! Linear undo/redo over whole-document snapshots. Both stacks are
//! most-recent-last and unbounded for the life of the session.

use serde::{Deserialize, Serialize};

/// Errors from stepping through history
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Undo stack is empty
    #[error("nothing to undo")]
    NothingToUndo,

    /// Redo stack is empty
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Undo and redo stacks for one variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    undo: Vec<String>,
    redo: Vec<String>,
}

impl History {
    /// Empty history
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    /// Push `current` onto the undo stack
    pub fn record_for_undo(&mut self, current: &str) {
        self.undo.push(current.to_owned());
    }

    /// Pop the undo stack, moving `current` onto the redo stack.
    /// Returns the document to make current.
    ///
    /// # Errors
    /// [`HistoryError::NothingToUndo`] if the undo stack is empty; state is
    /// left unchanged.
    pub fn undo(&mut self, current: &str) -> Result<String, HistoryError> {
        let previous = self.undo.pop().ok_or(HistoryError::NothingToUndo)?;
        self.redo.push(current.to_owned());
        Ok(previous)
    }

    /// Pop the redo stack, moving `current` onto the undo stack.
    /// Returns the document to make current.
    ///
    /// # Errors
    /// [`HistoryError::NothingToRedo`] if the redo stack is empty; state is
    /// left unchanged.
    pub fn redo(&mut self, current: &str) -> Result<String, HistoryError> {
        let next = self.redo.pop().ok_or(HistoryError::NothingToRedo)?;
        self.undo.push(current.to_owned());
        Ok(next)
    }

    /// Drop all redo entries
    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    /// Remove the most recent undo entry, used to roll back a snapshot
    /// whose edit did not commit
    pub fn discard_last_record(&mut self) -> Option<String> {
        self.undo.pop()
    }

    /// Drop both stacks
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[inline]
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}
