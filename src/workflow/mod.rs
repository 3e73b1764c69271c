//! Product manager workflow: orchestration, run results and configuration.

pub mod best_effort;
pub mod config;
pub mod orchestrator;
pub mod result;

pub use config::{ConfigError, StoreBackend, TeamRoster, TrackerSettings, WorkflowConfig, WorkflowOptions};
pub use orchestrator::{ProductManagerWorkflow, WorkflowBuilder, WorkflowInput};
pub use result::{RunContent, RunEvent, StepReport, StepStatus, SoftFailure, WorkflowOutput, WorkflowResult, WorkflowStep};
