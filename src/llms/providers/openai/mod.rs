//! OpenAI-compatible Chat Completions provider.
//!
//! Works against api.openai.com and any server exposing the same
//! `/chat/completions` endpoint (set `base_url`).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::llms::base_llm::{BaseLLM, BaseLLMState, LLMMessage, LlmError, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat Completions client.
#[derive(Debug, Clone)]
pub struct OpenAICompletion {
    pub state: BaseLLMState,
    /// Organization header, from `OPENAI_ORGANIZATION` when unset.
    pub organization: Option<String>,
    /// Request timeout in seconds.
    pub timeout: Option<f64>,
    /// Retries after the first attempt for 429, 5xx and transport errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub initial_retry_delay: Duration,
    pub max_tokens: Option<u32>,
    pub seed: Option<i64>,
}

impl OpenAICompletion {
    /// Create a provider for `model`.
    ///
    /// `api_key` falls back to `OPENAI_API_KEY`.
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        let mut state = BaseLLMState::new(model);
        state.api_key = api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok());
        state.base_url = base_url;
        state.provider = "openai".to_string();

        Self {
            state,
            organization: std::env::var("OPENAI_ORGANIZATION").ok(),
            timeout: None,
            max_retries: 2,
            initial_retry_delay: Duration::from_secs(1),
            max_tokens: None,
            seed: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.state.temperature = Some(temperature);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_retry_delay = initial_delay;
        self
    }

    pub fn api_base_url(&self) -> String {
        self.state
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body(&self, messages: &[LLMMessage], response_format: Option<&Value>) -> Value {
        let mut body = serde_json::json!({
            "model": self.state.bare_model(),
            "messages": messages,
        });

        if let Some(temp) = self.state.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(seed) = self.seed {
            body["seed"] = serde_json::json!(seed);
        }
        if let Some(format) = response_format {
            body["response_format"] = format.clone();
        }

        body
    }

    /// Pull the assistant text out of a Chat Completions response.
    fn parse_completions_response(response: &Value) -> Result<String, LlmError> {
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| LlmError::InvalidResponse("No message in OpenAI response".into()))?;

        if let Some(usage) = response.get("usage") {
            log::debug!(
                "OpenAI token usage: prompt={}, completion={}, total={}",
                usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0),
                usage.get("completion_tokens").and_then(Value::as_i64).unwrap_or(0),
                usage.get("total_tokens").and_then(Value::as_i64).unwrap_or(0),
            );
        }

        if let Some(refusal) = message.get("refusal").and_then(Value::as_str) {
            return Err(LlmError::InvalidResponse(format!("model refused: {}", refusal)));
        }

        Ok(message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string())
    }
}

#[async_trait]
impl BaseLLM for OpenAICompletion {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn temperature(&self) -> Option<f64> {
        self.state.temperature
    }

    fn provider(&self) -> &str {
        &self.state.provider
    }

    fn supports_response_format(&self) -> bool {
        true
    }

    async fn acall(&self, messages: Vec<LLMMessage>, response_format: Option<Value>) -> Result<String, LlmError> {
        log::debug!(
            "OpenAICompletion.acall: model={}, messages={}",
            self.state.model,
            messages.len(),
        );

        let api_key = self.state.api_key.as_ref().ok_or_else(|| LlmError::MissingApiKey {
            provider: self.state.provider.clone(),
        })?;

        let body = self.build_request_body(&messages, response_format.as_ref());
        let endpoint = format!("{}/chat/completions", self.api_base_url());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)))
            .build()?;

        let mut last_error = String::from("no attempt made");
        let mut retry_delay = self.initial_retry_delay;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::warn!("OpenAI API retry attempt {} after {:?}", attempt, retry_delay);
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let mut request = client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", api_key));
            if let Some(ref org) = self.organization {
                request = request.header("OpenAI-Organization", org);
            }

            let response = match request.json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = "Rate limited by OpenAI API (429)".into();
                continue;
            }
            if status.is_server_error() {
                last_error = format!("OpenAI API server error: {}", status);
                continue;
            }

            let response_text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            if status.is_client_error() {
                return Err(LlmError::Api {
                    provider: self.state.provider.clone(),
                    status: status.as_u16(),
                    body: response_text,
                });
            }

            let response_json: Value = serde_json::from_str(&response_text).map_err(|e| {
                LlmError::InvalidResponse(format!(
                    "Failed to parse OpenAI response: {} - Body: {}",
                    e,
                    response_text.chars().take(500).collect::<String>()
                ))
            })?;

            return Self::parse_completions_response(&response_json);
        }

        Err(LlmError::RetriesExhausted {
            provider: self.state.provider.clone(),
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}
