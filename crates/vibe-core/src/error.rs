//! Error types for vibe-core
//!
//! Every failure maps onto one [`ErrorKind`], which decides the user-facing
//! notice and the HTTP status at the boundary:
//! - input errors are rejected before any external call
//! - external errors are transient (retried, then surfaced) or terminal
//! - parse errors never expose the raw model text
//! - addressing errors mean the requester's view is stale

use serde::{Deserialize, Serialize};
use vibe_document::{HistoryError, PatchError, VariantLabel};
use vibe_genai::{GenAiError, ParseError};
use vibe_sandbox::RenderError;

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid request content
    Input,
    /// Generation service temporarily unavailable
    ExternalTransient,
    /// Generation service refused or failed for good
    ExternalTerminal,
    /// Model output had the wrong shape
    Parse,
    /// Stale index, unknown id or tag mismatch
    Addressing,
    /// An edit is already outstanding on the variant
    Busy,
    /// Undo/redo with nothing to move
    NoOp,
    /// Entity does not exist (or is not visible to the caller)
    NotFound,
    /// Plan limit reached
    LimitReached,
    /// Caller could not be identified
    Unauthenticated,
    /// Anything else
    Internal,
}

impl ErrorKind {
    fn from_generation(err: &GenAiError) -> Self {
        if err.is_retryable() {
            Self::ExternalTransient
        } else {
            Self::ExternalTerminal
        }
    }
}

/// Errors from the edit pipeline
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Request content is missing
    #[error("invalid edit request: {0}")]
    Input(String),

    /// Variant already has an edit in flight
    #[error("variant {0} already has an edit in progress")]
    Busy(VariantLabel),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Generation(#[from] GenAiError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Slot(#[from] vibe_document::StoreError),
}

impl EditError {
    /// Taxonomy of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) | Self::Slot(_) => ErrorKind::Input,
            Self::Busy(_) => ErrorKind::Busy,
            Self::Patch(err) if err.is_addressing() => ErrorKind::Addressing,
            Self::Patch(PatchError::EmptyReplacement) | Self::Parse(_) => ErrorKind::Parse,
            Self::Patch(_) => ErrorKind::Internal,
            Self::History(_) => ErrorKind::NoOp,
            Self::Generation(err) => ErrorKind::from_generation(err),
        }
    }

    /// Notice safe to show to the end user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Input(message) => message.clone(),
            Self::History(HistoryError::NothingToUndo) => "Nothing to undo".to_owned(),
            Self::History(HistoryError::NothingToRedo) => "Nothing to redo".to_owned(),
            _ => kind_message(self.kind()).to_owned(),
        }
    }
}

/// Errors from sessions, critiques and stores
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Generation(#[from] GenAiError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Slot(#[from] vibe_document::StoreError),

    /// Request content is missing or invalid
    #[error("{0}")]
    Input(String),

    /// Free plan quota used up
    #[error("monthly limit of {limit} projects reached")]
    LimitReached { limit: usize },
}

impl CoreError {
    /// Taxonomy of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Edit(err) => err.kind(),
            Self::Generation(err) => ErrorKind::from_generation(err),
            Self::Parse(_) => ErrorKind::Parse,
            Self::Render(_) => ErrorKind::Internal,
            Self::Store(err) => err.kind(),
            Self::Slot(_) | Self::Input(_) => ErrorKind::Input,
            Self::LimitReached { .. } => ErrorKind::LimitReached,
        }
    }

    /// Notice safe to show to the end user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Edit(err) => err.user_message(),
            Self::Input(message) => message.clone(),
            Self::Slot(err) => err.to_string(),
            Self::Store(StoreError::NotFound { entity, .. }) => format!("{entity} not found"),
            Self::LimitReached { limit } => format!(
                "You have reached your free limit of {limit} projects per month. \
                 Please upgrade to Pro for unlimited access."
            ),
            _ => kind_message(self.kind()).to_owned(),
        }
    }
}

/// Errors from project, gallery and user stores
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// Credential did not resolve to a user
    #[error("unauthenticated")]
    Unauthenticated,
}

impl StoreError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Invalid { .. } => ErrorKind::Input,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
        }
    }
}

const fn kind_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Input => "The request is missing required content",
        ErrorKind::ExternalTransient => "The AI service is busy right now. Please try again in a moment.",
        ErrorKind::ExternalTerminal => "The AI service could not complete this request",
        ErrorKind::Parse => "The AI returned an unexpected response. Please try again.",
        ErrorKind::Addressing => "The page changed before this edit could be applied. Please try again.",
        ErrorKind::Busy => "An edit is already in progress. Please wait for it to finish.",
        ErrorKind::NoOp => "Nothing to do",
        ErrorKind::NotFound => "Not found",
        ErrorKind::LimitReached => "Plan limit reached",
        ErrorKind::Unauthenticated => "Unauthorized",
        ErrorKind::Internal => "Something went wrong",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_document::NodeAddress;

    #[test]
    fn edit_error_kinds() {
        let stale = EditError::Patch(PatchError::TargetNotFound {
            address: NodeAddress::Position(4),
            available: 2,
        });
        assert_eq!(stale.kind(), ErrorKind::Addressing);
        assert_eq!(EditError::Busy(VariantLabel::A).kind(), ErrorKind::Busy);
        assert_eq!(EditError::History(HistoryError::NothingToRedo).kind(), ErrorKind::NoOp);
        assert_eq!(
            EditError::Generation(GenAiError::Overloaded { model: "m".into() }).kind(),
            ErrorKind::ExternalTransient
        );
        assert_eq!(EditError::Generation(GenAiError::Unauthorized).kind(), ErrorKind::ExternalTerminal);
    }

    #[test]
    fn user_messages_hide_details() {
        let err = EditError::Generation(GenAiError::Http {
            status: 400,
            body: "secret upstream detail".into(),
        });
        assert!(!err.user_message().contains("secret"));
        assert_eq!(EditError::History(HistoryError::NothingToUndo).user_message(), "Nothing to undo");
    }

    #[test]
    fn limit_message_names_the_limit() {
        let err = CoreError::LimitReached { limit: 3 };
        assert_eq!(err.kind(), ErrorKind::LimitReached);
        assert!(err.user_message().contains("free limit of 3 projects"));
    }
}
