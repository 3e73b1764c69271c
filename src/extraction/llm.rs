//! [`StructuredExtractor`] backed by a chat model.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::schema::response_format;
use super::{ExtractionError, ExtractionRequest, StructuredExtractor};
use crate::agents::prompts;
use crate::llms::base_llm::{BaseLLM, BaseLLMState};

/// Renders the agent prompt, calls the model and parses its JSON answer.
#[derive(Debug, Clone)]
pub struct LlmExtractor {
    llm: Arc<dyn BaseLLM>,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn BaseLLM>) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }
}

#[async_trait]
impl StructuredExtractor for LlmExtractor {
    async fn extract_value(&self, request: ExtractionRequest) -> Result<Value, ExtractionError> {
        let prompt = prompts::render(&request.agent, &request.schema_name, &request.schema, &request.input);
        let format = self
            .llm
            .supports_response_format()
            .then(|| response_format(&request.schema_name, &request.schema));

        let text = self
            .llm
            .acall(prompt.into_messages(), format)
            .await
            .map_err(|e| ExtractionError::Provider {
                agent: request.agent.name.clone(),
                reason: e.to_string(),
            })?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        BaseLLMState::validate_structured_output(&text).map_err(|e| ExtractionError::InvalidOutput {
            agent: request.agent.name.clone(),
            reason: e.to_string(),
        })
    }
}
