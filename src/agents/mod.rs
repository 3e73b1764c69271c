//! Agent definitions for the extraction steps.
//!
//! An agent here is pure configuration: a name, the instruction list that
//! frames the request, and the prompt it renders. Which model answers is
//! decided by the [`StructuredExtractor`](crate::extraction::StructuredExtractor)
//! the workflow is built with.

pub mod prompts;

use serde::{Deserialize, Serialize};

/// Static description of one extraction agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Display name, also used as the key when scripting fake extractors.
    pub name: String,
    /// Ordered instructions rendered into the system prompt.
    pub instructions: Vec<String>,
}

impl AgentDefinition {
    pub fn new<I, S>(name: impl Into<String>, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            instructions: instructions.into_iter().map(Into::into).collect(),
        }
    }
}

pub const MEETING_SUMMARY_AGENT: &str = "Meeting Summary Agent";
pub const TASK_AGENT: &str = "Task Agent";
pub const WORKLOAD_AGENT: &str = "Workload Agent";

/// Turns raw notes plus prior context into a [`MeetingSummary`](crate::types::MeetingSummary).
pub fn meeting_summary_agent() -> AgentDefinition {
    AgentDefinition::new(
        MEETING_SUMMARY_AGENT,
        [
            "Given meeting notes and the context of previous meetings:",
            "1. Extract key discussion points and categorize them by topic",
            "2. Identify and classify decisions based on impact and urgency",
            "3. List all attendees and their roles if mentioned",
            "4. Generate structured summary with action items",
            "5. Identify project phase and recurring topics",
            "6. Note any blockers or challenges mentioned",
            "7. Tag items requiring follow-up",
            "8. Determine meeting type and extract duration if mentioned",
        ],
    )
}

/// Turns a summary, task history and capacity into a [`TaskList`](crate::types::TaskList).
pub fn task_agent() -> AgentDefinition {
    AgentDefinition::new(
        TASK_AGENT,
        [
            "Given a meeting summary, historical tasks and team capacity:",
            "1. Generate detailed tasks with clear titles and descriptions",
            "2. Set priorities based on impact on project goals, urgency and deadlines, dependencies on other tasks, and resource availability",
            "3. Create time estimates considering task complexity, required skills, similar past tasks, and potential risks",
            "4. Identify and classify technical, resource and timeline dependencies, referencing other tasks by their exact title",
            "5. Add relevant tags by technical domain, project phase, required expertise and business impact; tag tasks that need code changes with \"code\"",
            "6. Never let maximum_hours fall below minimum_hours",
        ],
    )
}

/// Produces an advisory [`TeamWorkload`](crate::types::TeamWorkload).
pub fn workload_agent() -> AgentDefinition {
    AgentDefinition::new(
        WORKLOAD_AGENT,
        [
            "Given team capacity and new tasks:",
            "1. Analyze current team workload",
            "2. Suggest task assignments based on capacity",
            "3. Flag potential overallocation",
            "4. Recommend task redistribution if needed",
            "5. Never report remaining_capacity above capacity",
        ],
    )
}
