//! Chat notification seam and the consolidated run report.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CodeIssue, MeetingSummary, TaskList, TrackerIssueList};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook error: {status} - {message}")]
    Webhook { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything a run reports to the team channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub summary: MeetingSummary,
    pub tasks: TaskList,
    /// Absent when tracker issues were never created.
    pub issues: Option<TrackerIssueList>,
    #[serde(default)]
    pub code_issues: Vec<CodeIssue>,
    /// `"{member}: {hours}hrs remaining"` lines.
    #[serde(default)]
    pub workload_alerts: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}
