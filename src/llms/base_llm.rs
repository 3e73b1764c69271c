//! Base LLM trait and shared provider state.
//!
//! Providers implement [`BaseLLM`]; everything above this layer only sees
//! "messages in, text out". Structured decoding lives in
//! [`crate::extraction`].

use std::fmt;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default request timeout for provider HTTP calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    /// "system", "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not set for provider '{provider}'")]
    MissingApiKey { provider: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{provider} call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        last_error: String,
    },
}

// ---------------------------------------------------------------------------
// BaseLLM trait
// ---------------------------------------------------------------------------

/// Interface every chat model provider implements.
///
/// Implementations should handle transport-level retries themselves and
/// surface anything unrecoverable as an [`LlmError`].
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Model identifier, e.g. `gpt-4o-mini`.
    fn model(&self) -> &str;

    fn temperature(&self) -> Option<f64>;

    fn provider(&self) -> &str {
        "openai"
    }

    /// Whether the provider honours a JSON-schema `response_format`.
    fn supports_response_format(&self) -> bool {
        false
    }

    /// Send `messages` and return the assistant's text.
    ///
    /// `response_format` is forwarded verbatim when the provider supports it
    /// and ignored otherwise.
    async fn acall(
        &self,
        messages: Vec<LLMMessage>,
        response_format: Option<Value>,
    ) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// BaseLLMState
// ---------------------------------------------------------------------------

/// Fields shared by concrete providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseLLMState {
    pub model: String,
    pub temperature: Option<f64>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub provider: String,
}

impl BaseLLMState {
    /// Create state for `model`; a `provider/` prefix selects the provider.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let provider = Self::extract_provider(&model);
        Self {
            model,
            temperature: None,
            api_key: None,
            base_url: None,
            provider,
        }
    }

    /// Provider named by a `provider/model` identifier, defaulting to openai.
    pub fn extract_provider(model: &str) -> String {
        match model.find('/') {
            Some(idx) => model[..idx].to_string(),
            None => "openai".to_string(),
        }
    }

    /// Model identifier without any `provider/` prefix.
    pub fn bare_model(&self) -> &str {
        match self.model.find('/') {
            Some(idx) => &self.model[idx + 1..],
            None => &self.model,
        }
    }

    /// Pull a JSON value out of a model response.
    ///
    /// Accepts a bare JSON document, a fenced ```json block, or the widest
    /// `{...}` span embedded in prose.
    pub fn validate_structured_output(response: &str) -> Result<Value, LlmError> {
        static FENCED: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex"));
        static OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

        let trimmed = response.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(val) = serde_json::from_str::<Value>(trimmed) {
                return Ok(val);
            }
        }

        if let Some(inner) = FENCED.captures(response).and_then(|c| c.get(1)) {
            if let Ok(val) = serde_json::from_str::<Value>(inner.as_str().trim()) {
                return Ok(val);
            }
        }

        if let Some(m) = OBJECT.find(response) {
            if let Ok(val) = serde_json::from_str::<Value>(m.as_str()) {
                return Ok(val);
            }
        }

        Err(LlmError::InvalidResponse("No JSON found in response".into()))
    }
}
