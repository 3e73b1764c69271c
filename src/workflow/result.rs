//! Terminal result of a workflow run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CodeIssue, MeetingSummary, TaskList, TeamWorkload, TrackerIssueList};

/// The steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    LoadSession,
    Summarize,
    GenerateTasks,
    BalanceWorkload,
    CreateTrackerIssues,
    LinkDependencies,
    CreateCodeIssues,
    Notify,
    PersistSession,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadSession => "load_session",
            Self::Summarize => "summarize",
            Self::GenerateTasks => "generate_tasks",
            Self::BalanceWorkload => "balance_workload",
            Self::CreateTrackerIssues => "create_tracker_issues",
            Self::LinkDependencies => "link_dependencies",
            Self::CreateCodeIssues => "create_code_issues",
            Self::Notify => "notify",
            Self::PersistSession => "persist_session",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

/// Audit entry for one executed (or skipped) step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: WorkflowStep,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A step that failed without stopping the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftFailure {
    pub step: WorkflowStep,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEvent {
    WorkflowCompleted,
    WorkflowFailed,
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutput {
    pub summary: MeetingSummary,
    pub tasks: TaskList,
    pub tracker_issues: TrackerIssueList,
    #[serde(default)]
    pub code_issues: Vec<CodeIssue>,
    /// The balancer's advisory opinion, when it produced one.
    #[serde(default)]
    pub workload_plan: Option<TeamWorkload>,
    #[serde(default)]
    pub workload_alerts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunContent {
    Failed { reason: String },
    Completed(Box<WorkflowOutput>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub session_id: String,
    pub event: RunEvent,
    pub content: RunContent,
    pub steps: Vec<StepReport>,
    #[serde(default)]
    pub soft_failures: Vec<SoftFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WorkflowResult {
    pub fn is_completed(&self) -> bool {
        self.event == RunEvent::WorkflowCompleted
    }

    /// Completed, but at least one soft-fail step failed.
    pub fn is_degraded(&self) -> bool {
        self.is_completed() && !self.soft_failures.is_empty()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.content {
            RunContent::Failed { reason } => Some(reason),
            RunContent::Completed(_) => None,
        }
    }

    pub fn output(&self) -> Option<&WorkflowOutput> {
        match &self.content {
            RunContent::Completed(output) => Some(output),
            RunContent::Failed { .. } => None,
        }
    }

    /// Report for the last occurrence of `step`, if it ran.
    pub fn step(&self, step: WorkflowStep) -> Option<&StepReport> {
        self.steps.iter().rev().find(|r| r.step == step)
    }
}
