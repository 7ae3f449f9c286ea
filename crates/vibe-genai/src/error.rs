//! Error types for the generation boundary
//!
//! - [`GenAiError`]: the call to the generation service failed
//! - [`ParseError`]: the call succeeded but the text has the wrong shape

/// Maximum characters of a raw response kept for diagnostics
const PREVIEW_CHARS: usize = 200;

/// Errors from calling a generation service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenAiError {
    /// Service is at capacity (HTTP 429/503 or an "overloaded" body)
    #[error("model {model} is overloaded")]
    Overloaded { model: String },

    /// Capacity retries ran out
    #[error("model {model} still overloaded after {attempts} attempts")]
    Exhausted { model: String, attempts: u32 },

    /// Credentials rejected
    #[error("generation service rejected the api key")]
    Unauthorized,

    /// Non-success status not covered above
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure
    #[error("network error: {0}")]
    Transport(String),

    /// Success status but no candidate text
    #[error("generation service returned no text")]
    EmptyResponse,

    /// Response envelope could not be decoded
    #[error("malformed service response: {0}")]
    MalformedEnvelope(String),

    /// Client missing configuration (api key, model list)
    #[error("generation service not configured: {0}")]
    NotConfigured(String),
}

impl GenAiError {
    /// Capacity errors, the only kind retried on the same model
    #[inline]
    #[must_use]
    pub const fn is_capacity(&self) -> bool {
        matches!(self, Self::Overloaded { .. })
    }

    /// Errors worth trying again, possibly on another model
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Overloaded { .. } | Self::Exhausted { .. } | Self::Timeout | Self::Transport(_) => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Errors from interpreting model output
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Response was blank after removing fences
    #[error("{kind}: empty response")]
    Empty { kind: &'static str },

    /// No JSON object or array could be located
    #[error("{kind}: no JSON found in response")]
    NoJson { kind: &'static str, preview: String },

    /// JSON was found but did not match the expected shape
    #[error("{kind}: {source}")]
    Json {
        kind: &'static str,
        preview: String,
        #[source]
        source: serde_json::Error,
    },

    /// Shape matched but a field failed validation
    #[error("{kind}: {message}")]
    Invalid { kind: &'static str, message: String },
}

impl ParseError {
    pub(crate) fn no_json(kind: &'static str, raw: &str) -> Self {
        Self::NoJson {
            kind,
            preview: preview(raw),
        }
    }

    pub(crate) fn json(kind: &'static str, raw: &str, source: serde_json::Error) -> Self {
        Self::Json {
            kind,
            preview: preview(raw),
            source,
        }
    }

    pub(crate) fn invalid(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            message: message.into(),
        }
    }

    /// Truncated raw response, for logs only
    #[must_use]
    pub fn preview(&self) -> Option<&str> {
        match self {
            Self::NoJson { preview, .. } | Self::Json { preview, .. } => Some(preview),
            _ => None,
        }
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}
