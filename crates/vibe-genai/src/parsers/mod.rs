//! Model-output parsers
//!
//! Model text is semi-structured: JSON or HTML, often wrapped in markdown
//! code fences and sometimes surrounded by chatter. Parsing goes:
//!
//! 1. [`strip_code_fences`]: keep the first fenced block if there is one
//! 2. [`extract_json_block`]: for JSON outputs, cut the outermost object or array
//! 3. typed decode and validation via [`ModelOutput`]

mod outputs;

pub use outputs::{
    BrandColor, BrandFonts, BrandKit, FocalPoint, GeneratedPage, Heatmap, PolishedCopy, RemixMarkup, Roast,
    VibeScore,
};

use crate::error::ParseError;
use pulldown_cmark::{CodeBlockKind, Event, Parser as MdParser, Tag, TagEnd};
use serde::de::DeserializeOwned;

/// A typed value decoded from raw model text
pub trait ModelOutput: Sized {
    /// Short name used in errors and logs
    const KIND: &'static str;

    /// Decode and validate
    ///
    /// # Errors
    /// Returns error if the text does not have the expected shape
    fn from_response(raw: &str) -> Result<Self, ParseError>;
}

/// Contents of the first non-empty fenced code block, or the trimmed text
/// if there is no fence. Indented blocks are ignored so indented HTML is
/// left intact. An unterminated fence runs to the end of the text.
#[must_use]
pub fn strip_code_fences(raw: &str) -> String {
    let mut saw_fence = false;
    let mut in_fence = false;
    let mut code = String::new();

    for event in MdParser::new(raw) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                saw_fence = true;
                in_fence = true;
            }
            Event::End(TagEnd::CodeBlock) if in_fence => {
                if !code.trim().is_empty() {
                    return code.trim().to_owned();
                }
                in_fence = false;
            }
            Event::Text(text) if in_fence => code.push_str(&text),
            _ => {}
        }
    }

    if saw_fence {
        code.trim().to_owned()
    } else {
        raw.trim().to_owned()
    }
}

/// Outermost JSON object or array in `text`, by bracket position
#[must_use]
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text.as_bytes()[start] == b'{' { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Strip fences, locate the JSON and decode it as `T`
///
/// # Errors
/// Returns error if no JSON is present or it does not match `T`
pub fn parse_json<T: DeserializeOwned>(kind: &'static str, raw: &str) -> Result<T, ParseError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(ParseError::Empty { kind });
    }
    let json = extract_json_block(&body).ok_or_else(|| ParseError::no_json(kind, raw))?;
    serde_json::from_str(json).map_err(|e| ParseError::json(kind, raw, e))
}

/// Decode `raw` as `T`, logging the raw text on failure
///
/// # Errors
/// Returns the parse error unchanged
pub fn parse<T: ModelOutput>(raw: &str) -> Result<T, ParseError> {
    T::from_response(raw).map_err(|err| {
        tracing::error!(kind = T::KIND, error = %err, preview = err.preview().unwrap_or_default(), "Failed to parse model output");
        err
    })
}
