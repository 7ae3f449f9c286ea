//! Generation service boundary
//!
//! The hosted model is an opaque text-completion capability: a prompt made
//! of text and inline images goes in, text comes out.

use crate::error::GenAiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Base64-encoded image sent alongside a prompt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data_base64: String,
}

impl InlineImage {
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data_base64: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data_base64: data_base64.into(),
        }
    }
}

/// One element of a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPart {
    Text(String),
    Image(InlineImage),
}

/// Ordered prompt parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    parts: Vec<PromptPart>,
}

impl Prompt {
    /// Text-only prompt
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart::Text(text.into())],
        }
    }

    /// Append a text part
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(PromptPart::Text(text.into()));
        self
    }

    /// Append an image part
    #[must_use]
    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.parts.push(PromptPart::Image(image));
        self
    }

    #[inline]
    #[must_use]
    pub fn parts(&self) -> &[PromptPart] {
        &self.parts
    }

    /// All text parts joined by newlines
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True if any part is an image
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.parts.iter().any(|part| matches!(part, PromptPart::Image(_)))
    }
}

/// Text-completion capability
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Complete `prompt`, returning the raw response text
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenAiError>;

    /// Name for logs (usually the model id)
    fn name(&self) -> &str {
        "generator"
    }
}

#[async_trait]
impl<T: GenerationService + ?Sized> GenerationService for Arc<T> {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenAiError> {
        (**self).generate(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_parts_keep_order() {
        let prompt = Prompt::text("describe")
            .with_image(InlineImage::new("image/png", "AAAA"))
            .with_text("use it");
        assert_eq!(prompt.parts().len(), 3);
        assert!(prompt.has_image());
        assert_eq!(prompt.joined_text(), "describe\nuse it");
    }
}
