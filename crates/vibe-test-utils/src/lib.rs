//! Testing utilities for the VibeStack workspace
//!
//! Shared fixtures and a scripted generation service.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use vibe_document::{DocumentStore, Variant, VariantLabel};
use vibe_genai::{GenAiError, GenerationService, Prompt};

/// Two-section page used across the workspace tests
pub const HELLO_PAGE: &str = "<!DOCTYPE html><html><head></head><body><h1>Hi</h1><p>World</p></body></html>";

/// Landing page with nested sections and mixed leaves
pub const LANDING_PAGE: &str = "<!DOCTYPE html><html><head><title>Acme</title></head><body>\
<header><nav><a href=\"/\">Acme</a><a href=\"/pricing\">Pricing</a></nav></header>\
<section class=\"hero\"><h1>Ship faster</h1><p>Build landing pages in seconds.</p><button>Start free</button></section>\
<section class=\"features\"><h2>Features</h2><ul><li>Fast</li><li>Simple</li></ul></section>\
<script>console.log('analytics')</script>\
<footer><p>&copy; 2025 Acme</p></footer>\
</body></html>";

/// Page response as the model would send it
#[must_use]
pub fn page_response(html: &str, css: &str) -> String {
    let json = serde_json::json!({ "html": html, "css": css });
    format!("```json\n{json}\n```")
}

/// Copy response as the model would send it
#[must_use]
pub fn copy_response(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

/// Store holding [`HELLO_PAGE`] as variant A
#[must_use]
pub fn hello_store() -> DocumentStore {
    DocumentStore::with_variant(Variant::generated(VariantLabel::A, HELLO_PAGE, "", "Modern Clean"))
}

/// Replays canned responses in order and records every prompt.
///
/// Once the script runs out every call fails with
/// [`GenAiError::NotConfigured`].
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenAiError>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    /// Generator answering with `replies`, in order
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue another successful reply
    pub fn push(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    /// Queue a failure
    pub fn push_error(&self, error: GenAiError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Number of calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Prompts received so far
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenAiError> {
        self.prompts.lock().push(prompt.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GenAiError::NotConfigured("script exhausted".to_owned())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let generator = ScriptedGenerator::new(["one", "two"]);
        assert_eq!(generator.generate(&Prompt::text("a")).await.unwrap(), "one");
        assert_eq!(generator.generate(&Prompt::text("b")).await.unwrap(), "two");
        assert!(generator.generate(&Prompt::text("c")).await.is_err());
        assert_eq!(generator.calls(), 3);
        assert_eq!(generator.prompts()[1].joined_text(), "b");
    }

    #[test]
    fn fixtures_parse() {
        let doc = vibe_document::HtmlDocument::parse(LANDING_PAGE);
        assert_eq!(doc.sections().len(), 4);
        assert!(page_response("<html></html>", "").starts_with("```json"));
    }
}
