//! LLM providers.
//!
//! - [`base_llm`] - the provider trait, messages and shared state
//! - [`providers`] - concrete provider implementations

pub mod base_llm;
pub mod providers;

pub use base_llm::{BaseLLM, BaseLLMState, LLMMessage, LlmError};
