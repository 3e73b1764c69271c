//! Primary issue tracker seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DependencyType, Task};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GraphQL error: {0}")]
    GraphQL(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tracker rejected request: {0}")]
    Rejected(String),
}

/// What the tracker hands back for a newly created issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    /// Human-facing URL.
    pub link: String,
    /// Tracker-side id used for later links.
    pub external_id: String,
}

/// Relation between two tracker issues, read as `from <relation> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueRelation {
    Blocks,
    Related,
}

impl IssueRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Related => "related",
        }
    }
}

/// A link to create, expressed over task titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    pub from_title: String,
    pub to_title: String,
    pub relation: IssueRelation,
}

impl PlannedLink {
    /// Translate a dependency declared on `owner` into a directed link.
    ///
    /// A dependency lists what `owner` relies on: `Blocks` means the target
    /// blocks `owner`, `Required by` means `owner` blocks the target.
    pub fn from_dependency(owner: &str, target: &str, kind: DependencyType) -> Self {
        let (from_title, to_title, relation) = match kind {
            DependencyType::Blocks => (target, owner, IssueRelation::Blocks),
            DependencyType::RequiredBy => (owner, target, IssueRelation::Blocks),
            DependencyType::RelatedTo => (owner, target, IssueRelation::Related),
        };
        Self {
            from_title: from_title.to_string(),
            to_title: to_title.to_string(),
            relation,
        }
    }
}

/// Client for the tracker that owns every generated task.
#[async_trait]
pub trait IssueTracker: Send + Sync + std::fmt::Debug {
    /// Create one issue for `task`; `assignee_id` is the tracker's user id.
    async fn create_issue(
        &self,
        project_id: &str,
        team_id: &str,
        task: &Task,
        assignee_id: Option<&str>,
    ) -> Result<CreatedIssue, TrackerError>;

    /// Record `from <relation> to` between two existing issues.
    async fn link_issues(
        &self,
        from_external_id: &str,
        to_external_id: &str,
        relation: IssueRelation,
    ) -> Result<(), TrackerError>;
}

/// Render the issue body for `task` as markdown.
pub fn issue_body(task: &Task) -> String {
    let mut body = String::new();
    if let Some(desc) = task.task_description.as_deref().filter(|d| !d.trim().is_empty()) {
        body.push_str(desc.trim());
        body.push_str("\n\n");
    }

    let est = &task.time_estimate;
    body.push_str(&format!(
        "**Estimate:** {}-{}h ({} confidence)\n",
        est.minimum_hours,
        est.maximum_hours,
        est.confidence_level.as_str()
    ));
    body.push_str(&format!("**Complexity:** {}\n", task.complexity.as_str()));
    if let Some(reason) = task.priority.reason.as_deref() {
        body.push_str(&format!("**Priority:** {} ({})\n", task.priority.level, reason));
    } else {
        body.push_str(&format!("**Priority:** {}\n", task.priority.level));
    }
    if !task.required_skills.is_empty() {
        body.push_str(&format!("**Skills:** {}\n", task.required_skills.join(", ")));
    }
    if !task.tags.is_empty() {
        body.push_str(&format!("**Tags:** {}\n", task.tags.join(", ")));
    }
    if !est.factors.is_empty() {
        body.push_str("\n**Estimate factors:**\n");
        for factor in &est.factors {
            body.push_str(&format!("- {}\n", factor));
        }
    }
    if !task.dependencies.is_empty() {
        body.push_str("\n**Dependencies:**\n");
        for dep in &task.dependencies {
            body.push_str(&format!(
                "- {} {} ({} impact)\n",
                dep.dependency_type.as_str(),
                dep.task_id,
                dep.impact_level.as_str()
            ));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complexity, ConfidenceLevel, ImpactLevel, PriorityLevel, TaskDependency, TaskTimeEstimate};

    #[test]
    fn test_dependency_direction() {
        let l = PlannedLink::from_dependency("Deploy", "Build", DependencyType::Blocks);
        assert_eq!((l.from_title.as_str(), l.to_title.as_str()), ("Build", "Deploy"));

        let l = PlannedLink::from_dependency("Schema", "API", DependencyType::RequiredBy);
        assert_eq!((l.from_title.as_str(), l.to_title.as_str()), ("Schema", "API"));
        assert_eq!(l.relation, IssueRelation::Blocks);

        let l = PlannedLink::from_dependency("A", "B", DependencyType::RelatedTo);
        assert_eq!(l.relation, IssueRelation::Related);
    }

    #[test]
    fn test_issue_body_mentions_estimate_and_dependencies() {
        let task = Task::new(
            "Deploy",
            PriorityLevel::High,
            TaskTimeEstimate::new(2.0, 5.0, ConfidenceLevel::Low).unwrap(),
            Complexity::Complex,
        )
        .with_tags(["code", "infra"])
        .with_dependency(TaskDependency {
            task_id: "Build".into(),
            dependency_type: DependencyType::Blocks,
            impact_level: ImpactLevel::High,
        });
        let body = issue_body(&task);
        assert!(body.contains("**Estimate:** 2-5h (Low confidence)"));
        assert!(body.contains("**Tags:** code, infra"));
        assert!(body.contains("- Blocks Build (High impact)"));
    }
}
