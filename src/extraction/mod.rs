//! Structured extraction: ask an agent for a typed answer.
//!
//! The [`StructuredExtractor`] seam returns raw JSON; [`extract`] layers
//! typed decoding and semantic validation on top so every backend gets the
//! same acceptance rules.

pub mod llm;
pub mod schema;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::agents::AgentDefinition;
pub use llm::LlmExtractor;
pub use schema::ResponseSchema;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{agent} returned no result")]
    Empty { agent: String },

    #[error("{agent} provider error: {reason}")]
    Provider { agent: String, reason: String },

    #[error("{agent} returned invalid output: {reason}")]
    InvalidOutput { agent: String, reason: String },
}

/// One extraction call: who answers, with what input, against which schema.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub agent: AgentDefinition,
    pub input: Value,
    pub schema_name: String,
    pub schema: Value,
}

/// Produces a JSON answer for an [`ExtractionRequest`].
///
/// Returning `Ok(Value::Null)` means "no answer" and is reported as
/// [`ExtractionError::Empty`] by [`extract`].
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract_value(&self, request: ExtractionRequest) -> Result<Value, ExtractionError>;
}

/// Run `agent` on `input` and decode the answer as `T`.
pub async fn extract<T>(
    extractor: &dyn StructuredExtractor,
    agent: &AgentDefinition,
    input: Value,
) -> Result<T, ExtractionError>
where
    T: ResponseSchema + DeserializeOwned,
{
    let request = ExtractionRequest {
        agent: agent.clone(),
        input,
        schema_name: T::schema_name().to_string(),
        schema: T::json_schema(),
    };
    log::debug!("extracting {} with {}", request.schema_name, agent.name);

    let raw = extractor.extract_value(request).await?;
    if raw.is_null() {
        return Err(ExtractionError::Empty {
            agent: agent.name.clone(),
        });
    }

    let decoded: T = serde_json::from_value(raw).map_err(|e| ExtractionError::InvalidOutput {
        agent: agent.name.clone(),
        reason: e.to_string(),
    })?;

    decoded.validate().map_err(|reason| ExtractionError::InvalidOutput {
        agent: agent.name.clone(),
        reason,
    })?;

    if decoded.is_empty_answer() {
        return Err(ExtractionError::Empty {
            agent: agent.name.clone(),
        });
    }

    Ok(decoded)
}
