//! Secondary tracker for tasks that need code changes.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CodeIssue, Task, TrackerIssue};

#[derive(Debug, Error)]
pub enum CodeIssueError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRepository {
    pub owner: String,
    pub name: String,
}

impl FromStr for CodeRepository {
    type Err = CodeIssueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(".git");
        match trimmed.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(CodeIssueError::InvalidInput(format!(
                "repository must look like owner/name, got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for CodeRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Files one code issue per code-tagged task.
#[async_trait]
pub trait CodeIssueTracker: Send + Sync + std::fmt::Debug {
    /// `tracker_issue` is the primary issue for the same task, when known.
    async fn create_issue(
        &self,
        repository: &CodeRepository,
        task: &Task,
        tracker_issue: Option<&TrackerIssue>,
    ) -> Result<CodeIssue, CodeIssueError>;
}

/// Markdown body for a code issue, linking back to the tracker issue.
pub fn code_issue_body(task: &Task, tracker_issue: Option<&TrackerIssue>) -> String {
    let mut body = String::new();
    if let Some(desc) = task.task_description.as_deref() {
        body.push_str(desc.trim());
        body.push_str("\n\n");
    }
    if let Some(link) = tracker_issue.and_then(|i| i.issue_link.as_deref()) {
        body.push_str(&format!("Tracker issue: {}\n", link));
    }
    if let Some(assignee) = task.task_assignee.as_deref() {
        body.push_str(&format!("Assignee: {}\n", assignee));
    }
    if !task.required_skills.is_empty() {
        body.push_str(&format!("Required skills: {}\n", task.required_skills.join(", ")));
    }
    body
}
