//! Hosted model client
//!
//! Speaks the `generateContent` REST endpoint. One client is bound to one
//! model; [`GeminiClient::for_model`] clones the connection pool for
//! another.

use crate::error::GenAiError;
use crate::service::{GenerationService, Prompt, PromptPart};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Public endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Primary model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

/// Environment variables checked for the api key, in order
pub const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_GENERATIVE_AI_API_KEY"];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().filter_map(|part| part.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

fn request_body(prompt: &Prompt) -> GenerateRequest<'_> {
    let parts = prompt
        .parts()
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => RequestPart::Text { text: text.as_str() },
            PromptPart::Image(image) => RequestPart::Inline {
                inline_data: InlineData {
                    mime_type: &image.mime_type,
                    data: &image.data_base64,
                },
            },
        })
        .collect();
    GenerateRequest {
        contents: [Content { role: "user", parts }],
    }
}

/// Connection settings for [`GeminiClient`]
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Defaults with the given key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `generateContent` client bound to one model
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Build a client
    ///
    /// # Errors
    /// Returns error if the key is blank or the HTTP client cannot be built
    pub fn new(config: GeminiConfig) -> Result<Self, GenAiError> {
        if config.api_key.trim().is_empty() {
            return Err(GenAiError::NotConfigured("api key is empty".into()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vibestack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenAiError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Build a client from the first set variable in [`API_KEY_VARS`]
    ///
    /// # Errors
    /// Returns error if none is set
    pub fn from_env() -> Result<Self, GenAiError> {
        let key = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| GenAiError::NotConfigured(format!("set one of {}", API_KEY_VARS.join(", "))))?;
        Self::new(GeminiConfig::new(key))
    }

    /// Same connection pool and key, different model
    #[must_use]
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone().with_model(model),
        }
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn classify(&self, status: StatusCode, body: String) -> GenAiError {
        let overloaded = body.to_ascii_lowercase().contains("overloaded");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenAiError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => GenAiError::Overloaded {
                model: self.config.model.clone(),
            },
            _ if overloaded => GenAiError::Overloaded {
                model: self.config.model.clone(),
            },
            s => GenAiError::Http {
                status: s.as_u16(),
                body,
            },
        }
    }
}

fn map_reqwest_error(e: &reqwest::Error) -> GenAiError {
    if e.is_timeout() {
        GenAiError::Timeout
    } else {
        GenAiError::Transport(e.to_string())
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenAiError> {
        tracing::debug!(model = %self.config.model, image = prompt.has_image(), "Calling generateContent");

        let res = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::debug!(model = %self.config.model, status = status.as_u16(), body = %body, "generateContent failed");
            return Err(self.classify(status, body));
        }

        let response: GenerateResponse = res
            .json()
            .await
            .map_err(|e| GenAiError::MalformedEnvelope(e.to_string()))?;
        response.into_text().ok_or(GenAiError::EmptyResponse)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
