//! Core configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vibe_genai::prompts::{DEFAULT_POLISH_INSTRUCTION, DEFAULT_REMIX_INSTRUCTION};
use vibe_genai::{millis, RetryPolicy, DEFAULT_MODEL, FALLBACK_MODELS};

/// Free-plan projects per calendar month
pub const MAX_FREE_PROJECTS: usize = 3;

/// Editing and generation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Primary model first, then fallbacks in order
    pub models: Vec<String>,
    /// Capacity retry budget per model
    pub retry: RetryPolicy,
    /// Per-request timeout for the generation service
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Projects a free user may create per month
    pub free_project_limit: usize,
    /// Maximum cached image analyses
    pub cache_capacity: u64,
    #[serde(with = "millis")]
    pub cache_ttl: Duration,
    /// Instruction sent with sandbox remix requests
    pub remix_instruction: String,
    /// Instruction sent with sandbox polish requests
    pub polish_instruction: String,
    /// Annotate editable nodes with stable ids and address edits by id
    pub stable_node_ids: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let mut models = vec![DEFAULT_MODEL.to_owned()];
        models.extend(FALLBACK_MODELS.iter().map(|m| (*m).to_owned()));
        Self {
            models,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
            free_project_limit: MAX_FREE_PROJECTS,
            cache_capacity: 256,
            cache_ttl: Duration::from_secs(3600),
            remix_instruction: DEFAULT_REMIX_INSTRUCTION.to_owned(),
            polish_instruction: DEFAULT_POLISH_INSTRUCTION.to_owned(),
            stable_node_ids: true,
        }
    }
}

impl CoreConfig {
    #[must_use]
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_free_project_limit(mut self, limit: usize) -> Self {
        self.free_project_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_cache(mut self, capacity: u64, ttl: Duration) -> Self {
        self.cache_capacity = capacity;
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_remix_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.remix_instruction = instruction.into();
        self
    }

    #[must_use]
    pub fn with_polish_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.polish_instruction = instruction.into();
        self
    }

    #[must_use]
    pub const fn with_stable_node_ids(mut self, enabled: bool) -> Self {
        self.stable_node_ids = enabled;
        self
    }
}
