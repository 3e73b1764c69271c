//! Prompt rendering for extraction agents.

use serde_json::Value;

use super::AgentDefinition;
use crate::extraction::schema::describe_schema;
use crate::llms::base_llm::LLMMessage;

/// System + user prompt pair for one extraction request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

impl RenderedPrompt {
    pub fn into_messages(self) -> Vec<LLMMessage> {
        vec![LLMMessage::system(self.system), LLMMessage::user(self.user)]
    }
}

/// Render the prompt for `agent` answering with `schema`, given `input`.
pub fn render(agent: &AgentDefinition, schema_name: &str, schema: &Value, input: &Value) -> RenderedPrompt {
    let mut system = format!("You are the {}.\n\n", agent.name);
    for line in &agent.instructions {
        system.push_str(line);
        system.push('\n');
    }
    system.push_str(&format!(
        "\nRespond with a single JSON object of type {} and nothing else.\nFields:\n{}",
        schema_name,
        describe_schema(schema)
    ));

    let user = match input {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };

    RenderedPrompt { system, user }
}
