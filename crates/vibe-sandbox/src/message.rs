//! Sandbox message contract
//!
//! The preview posts one of four message shapes to the host:
//!
//! - `{type: "REMIX_REQUEST", html: string, index: number}`
//! - `{type: "COPY_REQUEST", text: string, index: number, tagName: string}`
//! - `{type: "UNDO_REQUEST"}`
//! - `{type: "REDO_REQUEST"}`
//!
//! Any request may also carry `nodeId` (stable address of the target) and
//! `scrollY` (preview scroll offset to restore after reload). Everything
//! arriving from the sandbox is untrusted; [`SandboxRequest::from_value`]
//! is the only way in.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use vibe_document::NodeAddress;

/// Wire tag of a remix request
pub const REMIX_REQUEST: &str = "REMIX_REQUEST";
/// Wire tag of a copy-polish request
pub const COPY_REQUEST: &str = "COPY_REQUEST";
/// Wire tag of an undo request
pub const UNDO_REQUEST: &str = "UNDO_REQUEST";
/// Wire tag of a redo request
pub const REDO_REQUEST: &str = "REDO_REQUEST";

/// Edit request posted by the preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SandboxMessage {
    /// Redesign a section
    #[serde(rename = "REMIX_REQUEST")]
    Remix {
        html: String,
        #[serde(deserialize_with = "integral_index")]
        index: i64,
    },

    /// Rewrite a text leaf
    #[serde(rename = "COPY_REQUEST", rename_all = "camelCase")]
    Copy {
        text: String,
        #[serde(deserialize_with = "integral_index")]
        index: i64,
        tag_name: String,
    },

    #[serde(rename = "UNDO_REQUEST")]
    Undo,

    #[serde(rename = "REDO_REQUEST")]
    Redo,
}

impl SandboxMessage {
    /// Wire tag
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Remix { .. } => REMIX_REQUEST,
            Self::Copy { .. } => COPY_REQUEST,
            Self::Undo => UNDO_REQUEST,
            Self::Redo => REDO_REQUEST,
        }
    }

    /// Positional index carried by remix and copy requests
    #[must_use]
    pub const fn index(&self) -> Option<i64> {
        match self {
            Self::Remix { index, .. } | Self::Copy { index, .. } => Some(*index),
            Self::Undo | Self::Redo => None,
        }
    }
}

/// Validated message plus its optional extras
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxRequest {
    #[serde(flatten)]
    pub message: SandboxMessage,
    /// Stable id of the target node, when the preview knows one
    #[serde(default, deserialize_with = "lenient_node_id", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Scroll offset at the time of the request
    #[serde(default, deserialize_with = "lenient_scroll", skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<u32>,
}

impl SandboxRequest {
    /// Request without extras
    #[must_use]
    pub const fn new(message: SandboxMessage) -> Self {
        Self {
            message,
            node_id: None,
            scroll_y: None,
        }
    }

    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    #[must_use]
    pub const fn with_scroll_y(mut self, scroll_y: u32) -> Self {
        self.scroll_y = Some(scroll_y);
        self
    }

    /// Address of the target: the stable id when present, otherwise the
    /// positional index. `None` for undo/redo.
    #[must_use]
    pub fn address(&self) -> Option<NodeAddress> {
        let index = self.message.index()?;
        Some(match &self.node_id {
            Some(id) => NodeAddress::Stable(id.clone()),
            None => NodeAddress::Position(index),
        })
    }

    /// Validate an untrusted JSON value.
    ///
    /// Unknown `type`s, missing or ill-typed required fields and
    /// non-integer indices are rejected. Ill-typed optional extras are
    /// dropped rather than rejected. Negative indices are accepted here and
    /// fail later as addressing errors.
    ///
    /// # Errors
    /// Returns [`MessageError`] describing the first problem found
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let kind = value
            .as_object()
            .ok_or(MessageError::NotAnObject)?
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingType)?;
        if ![REMIX_REQUEST, COPY_REQUEST, UNDO_REQUEST, REDO_REQUEST].contains(&kind) {
            return Err(MessageError::UnknownType(truncate(kind)));
        }
        Self::deserialize(value).map_err(|err| MessageError::Invalid(err.to_string()))
    }

    /// Wire form, extras included
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Errors from validating an incoming message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string type")]
    MissingType,

    #[error("unknown message type: {0:?}")]
    UnknownType(String),

    #[error("malformed message: {0}")]
    Invalid(String),
}

// JSON has one number type; 2.0 is an integer, 2.5 is not
fn integral_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if let Some(index) = value.as_i64() {
        return Ok(index);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            #[allow(clippy::cast_possible_truncation)]
            Ok(f as i64)
        }
        _ => Err(D::Error::custom("index must be an integer")),
    }
}

// Ill-typed extras are dropped rather than rejected
fn lenient_node_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned))
}

fn lenient_scroll<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().and_then(scroll_offset))
}

fn scroll_offset(y: f64) -> Option<u32> {
    if !y.is_finite() || y < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(y.round().min(f64::from(u32::MAX)) as u32)
}

fn truncate(kind: &str) -> String {
    kind.chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_the_four_shapes() {
        let remix = SandboxRequest::from_value(&json!({"type": "REMIX_REQUEST", "html": "<h1>Hi</h1>", "index": 0})).unwrap();
        assert_eq!(
            remix.message,
            SandboxMessage::Remix {
                html: "<h1>Hi</h1>".into(),
                index: 0
            }
        );

        let copy =
            SandboxRequest::from_value(&json!({"type": "COPY_REQUEST", "text": "World", "index": 1, "tagName": "p"}))
                .unwrap();
        assert_eq!(
            copy.message,
            SandboxMessage::Copy {
                text: "World".into(),
                index: 1,
                tag_name: "p".into()
            }
        );

        assert_eq!(
            SandboxRequest::from_value(&json!({"type": "UNDO_REQUEST"})).unwrap().message,
            SandboxMessage::Undo
        );
        assert_eq!(
            SandboxRequest::from_value(&json!({"type": "REDO_REQUEST"})).unwrap().message,
            SandboxMessage::Redo
        );
    }

    #[test]
    fn rejects_other_shapes() {
        let cases = [
            json!("REMIX_REQUEST"),
            json!({}),
            json!({"type": 3}),
            json!({"type": "DELETE_EVERYTHING"}),
            json!({"type": "REMIX_REQUEST", "index": 0}),
            json!({"type": "REMIX_REQUEST", "html": 5, "index": 0}),
            json!({"type": "REMIX_REQUEST", "html": "<p></p>", "index": "0"}),
            json!({"type": "REMIX_REQUEST", "html": "<p></p>", "index": 1.5}),
            json!({"type": "COPY_REQUEST", "text": "x", "index": 0}),
        ];
        for case in cases {
            assert!(SandboxRequest::from_value(&case).is_err(), "accepted {case}");
        }
    }

    #[test]
    fn errors_name_the_problem() {
        assert_eq!(SandboxRequest::from_value(&json!([])), Err(MessageError::NotAnObject));
        assert_eq!(SandboxRequest::from_value(&json!({"type": 3})), Err(MessageError::MissingType));

        let long = "X".repeat(200);
        let Err(MessageError::UnknownType(kind)) = SandboxRequest::from_value(&json!({"type": long})) else {
            panic!("unknown type accepted");
        };
        assert_eq!(kind.len(), 64);

        let err = SandboxRequest::from_value(&json!({"type": "COPY_REQUEST", "text": "x", "index": 0})).unwrap_err();
        assert!(err.to_string().contains("tagName"), "{err}");
        let err = SandboxRequest::from_value(&json!({"type": "REMIX_REQUEST", "html": "x", "index": 0.5})).unwrap_err();
        assert!(err.to_string().contains("integer"), "{err}");
    }

    #[test]
    fn negative_index_is_accepted_for_later_rejection() {
        let request = SandboxRequest::from_value(&json!({"type": "REMIX_REQUEST", "html": "x", "index": -1})).unwrap();
        assert_eq!(request.address(), Some(NodeAddress::Position(-1)));
    }

    #[test]
    fn integral_floats_are_indices() {
        let request = SandboxRequest::from_value(&json!({"type": "REMIX_REQUEST", "html": "x", "index": 2.0})).unwrap();
        assert_eq!(request.message.index(), Some(2));
    }

    #[test]
    fn extras_are_optional_and_lenient() {
        let request = SandboxRequest::from_value(&json!({
            "type": "COPY_REQUEST", "text": "x", "index": 0, "tagName": "p",
            "nodeId": "t-4", "scrollY": 812.6
        }))
        .unwrap();
        assert_eq!(request.node_id.as_deref(), Some("t-4"));
        assert_eq!(request.scroll_y, Some(813));
        assert_eq!(request.address(), Some(NodeAddress::Stable("t-4".into())));

        let request = SandboxRequest::from_value(&json!({"type": "UNDO_REQUEST", "nodeId": 7, "scrollY": "top"})).unwrap();
        assert_eq!(request, SandboxRequest::new(SandboxMessage::Undo));
        assert_eq!(request.address(), None);
    }

    #[test]
    fn serializes_bit_exact() {
        let copy = SandboxMessage::Copy {
            text: "World".into(),
            index: 1,
            tag_name: "p".into(),
        };
        assert_eq!(
            serde_json::to_value(&copy).unwrap(),
            json!({"type": "COPY_REQUEST", "text": "World", "index": 1, "tagName": "p"})
        );
        assert_eq!(serde_json::to_value(SandboxMessage::Undo).unwrap(), json!({"type": "UNDO_REQUEST"}));

        let request = SandboxRequest::new(SandboxMessage::Redo).with_scroll_y(40);
        assert_eq!(request.to_value(), json!({"type": "REDO_REQUEST", "scrollY": 40}));
        assert_eq!(SandboxRequest::from_value(&request.to_value()).unwrap(), request);
    }
}
