//! External-system mirrors of generated tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dates;
use super::task::{Task, TaskPriority};

/// Issue created in the primary tracker for exactly one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerIssue {
    pub issue_title: String,
    #[serde(default)]
    pub issue_description: Option<String>,
    #[serde(default)]
    pub issue_assignee: Option<String>,
    /// Set only once the tracker has accepted the issue.
    #[serde(default)]
    pub issue_link: Option<String>,
    /// Tracker-side identifier, used for linking.
    #[serde(default)]
    pub external_id: Option<String>,
    pub priority: TaskPriority,
    #[serde(default, with = "dates::option")]
    pub deadline: Option<DateTime<Utc>>,
}

impl TrackerIssue {
    /// Mirror a task before it has been accepted by the tracker.
    pub fn from_task(task: &Task) -> Self {
        Self {
            issue_title: task.task_title.clone(),
            issue_description: task.task_description.clone(),
            issue_assignee: task.task_assignee.clone(),
            issue_link: None,
            external_id: None,
            priority: task.priority.clone(),
            deadline: task.deadline,
        }
    }

    pub fn created(mut self, link: impl Into<String>, external_id: impl Into<String>) -> Self {
        self.issue_link = Some(link.into());
        self.external_id = Some(external_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerIssueList {
    pub issues: Vec<TrackerIssue>,
}

impl TrackerIssueList {
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// The issue mirroring the task with this title, if any.
    pub fn for_title(&self, title: &str) -> Option<&TrackerIssue> {
        let wanted = title.trim().to_lowercase();
        self.issues
            .iter()
            .find(|i| i.issue_title.trim().to_lowercase() == wanted)
    }
}

/// Issue filed in the code repository for a `code`-tagged task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeIssue {
    pub task_title: String,
    pub number: u64,
    pub url: String,
}
