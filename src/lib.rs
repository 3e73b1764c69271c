//! # pmflow
//!
//! Turns meeting notes into tracked work.
//!
//! A run summarizes a meeting transcript, derives tasks from the summary and
//! the session's history, asks for a workload opinion against team capacity,
//! files tracker issues (and code issues for `code`-tagged tasks), links
//! dependencies and notifies the team. Context is carried between runs of the
//! same session through a pluggable [`session::SessionStore`].
//!
//! The entry point is [`workflow::ProductManagerWorkflow`]; production wiring
//! from environment variables lives in [`workflow::WorkflowConfig`].

pub mod agents;
pub mod capacity;
pub mod extraction;
pub mod integrations;
pub mod llms;
pub mod server;
pub mod session;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use capacity::CapacityLedger;
pub use extraction::{LlmExtractor, StructuredExtractor};
pub use llms::base_llm::BaseLLM;
pub use session::{SessionContext, SessionStore};
pub use types::{MeetingSummary, Task, TaskList, TeamWorkload, TrackerIssue};
pub use workflow::{ProductManagerWorkflow, WorkflowConfig, WorkflowInput, WorkflowResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
