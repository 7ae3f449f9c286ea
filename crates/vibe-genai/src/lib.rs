//! VibeStack generation boundary
//!
//! Everything between the editor and the hosted model.
//!
//! # Core Concepts
//!
//! - [`GenerationService`]: opaque text-completion capability
//! - [`GeminiClient`]: `generateContent` REST client
//! - [`RetryingGenerator`] / [`FallbackGenerator`]: bounded capacity retry and
//!   model fallback
//! - [`prompts`]: prompt builders for each feature
//! - [`parsers`]: fence stripping, JSON extraction and typed outputs
//! - [`AnalysisCache`]: moka cache for image critiques

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod error;
mod gemini;
pub mod parsers;
pub mod prompts;
mod retry;
mod service;

pub use cache::AnalysisCache;
pub use error::{GenAiError, ParseError};
pub use gemini::{GeminiClient, GeminiConfig, API_KEY_VARS, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use parsers::{parse, ModelOutput};
pub use retry::{millis, FallbackGenerator, RetryPolicy, RetryingGenerator};
pub use service::{GenerationService, InlineImage, Prompt, PromptPart};

use std::sync::Arc;

/// Fallback models tried after the primary, in order
pub const FALLBACK_MODELS: &[&str] = &["gemini-1.5-flash-002", "gemini-1.5-pro-latest"];

/// Build the production chain: one retrying client per model, tried in
/// order.
#[must_use]
pub fn model_chain(client: &GeminiClient, models: &[String], policy: RetryPolicy) -> FallbackGenerator {
    let chain = models
        .iter()
        .map(|model| {
            let service: Arc<dyn GenerationService> = Arc::new(RetryingGenerator::new(client.for_model(model), policy));
            service
        })
        .collect();
    FallbackGenerator::new(chain)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
