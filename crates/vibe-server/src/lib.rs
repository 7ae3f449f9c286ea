//! VibeStack server
//!
//! HTTP API over the generation, critique, project and editing-session
//! operations.
//!
//! # Core Concepts
//!
//! - [`ServerConfig`]: layered configuration (defaults, TOML, environment,
//!   flags)
//! - [`AppState`]: injected stores, identity, usage limiter and live
//!   editing sessions
//! - [`routes`]: every endpoint as one warp filter
//! - [`ApiError`]: failures mapped onto JSON bodies and statuses

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
mod error;
pub mod routes;
mod state;

pub use config::{ConfigError, Overrides, ServerConfig};
pub use error::{recover, status_of, ApiError, ErrorBody};
pub use routes::routes;
pub use state::{AppState, ANONYMOUS_USER, USER_HEADER, WEBHOOK_SECRET_HEADER};

use std::sync::Arc;
use vibe_genai::{model_chain, GeminiClient, GeminiConfig, GenAiError, GenerationService};

/// Production generation chain: the configured models in order, each
/// retried on capacity errors
///
/// # Errors
/// [`GenAiError::NotConfigured`] without an API key; client construction
/// failures
pub fn generation_service(config: &ServerConfig) -> Result<Arc<dyn GenerationService>, GenAiError> {
    let key = config
        .api_key
        .clone()
        .ok_or_else(|| GenAiError::NotConfigured("no API key; set GEMINI_API_KEY".to_owned()))?;
    let primary = config.core.models.first().map_or(vibe_genai::DEFAULT_MODEL, String::as_str);
    let client = GeminiClient::new(
        GeminiConfig::new(key)
            .with_base_url(config.api_base_url.clone())
            .with_model(primary)
            .with_timeout(config.core.request_timeout),
    )?;
    Ok(Arc::new(model_chain(&client, &config.core.models, config.core.retry)))
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
