//! Linear issue tracker over its GraphQL API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::tracker::{issue_body, CreatedIssue, IssueRelation, IssueTracker, TrackerError};
use crate::types::{PriorityLevel, Task};

pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

const ISSUE_CREATE: &str = r#"
    mutation IssueCreate($input: IssueCreateInput!) {
        issueCreate(input: $input) {
            success
            issue { id identifier url }
        }
    }
"#;

const ISSUE_RELATION_CREATE: &str = r#"
    mutation IssueRelationCreate($input: IssueRelationCreateInput!) {
        issueRelationCreate(input: $input) {
            success
        }
    }
"#;

/// Linear API client.
#[derive(Debug, Clone)]
pub struct LinearTracker {
    token: String,
    api_url: String,
    client: reqwest::Client,
}

impl LinearTracker {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: LINEAR_API_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment variable LINEAR_API_KEY.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("LINEAR_API_KEY").ok()?;
        Some(Self::new(token))
    }

    /// Point the client at another GraphQL endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Linear priority scale: 1 urgent .. 4 low.
    pub fn priority_value(level: PriorityLevel) -> i32 {
        match level {
            PriorityLevel::Critical => 1,
            PriorityLevel::High => 2,
            PriorityLevel::Medium => 3,
            PriorityLevel::Low => 4,
        }
    }

    /// Build the `IssueCreateInput` for `task`.
    pub fn issue_input(project_id: &str, team_id: &str, task: &Task, assignee_id: Option<&str>) -> Value {
        let mut input = json!({
            "title": task.task_title,
            "description": issue_body(task),
            "teamId": team_id,
            "projectId": project_id,
            "priority": Self::priority_value(task.priority.level),
        });
        if let Some(id) = assignee_id {
            input["assigneeId"] = json!(id);
        }
        if let Some(deadline) = task.deadline {
            input["dueDate"] = json!(deadline.format("%Y-%m-%d").to_string());
        }
        input
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, TrackerError> {
        let body = json!({ "query": query, "variables": variables });

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TrackerError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TrackerError::RateLimited);
        }

        let result: Value = response.json().await?;

        if let Some(first_error) = result
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|e| e.first())
        {
            let message = first_error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(TrackerError::GraphQL(message.to_string()));
        }

        let data = result
            .get("data")
            .ok_or_else(|| TrackerError::GraphQL("No data in response".to_string()))?;

        serde_json::from_value(data.clone())
            .map_err(|e| TrackerError::GraphQL(format!("Failed to parse response: {}", e)))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCreateData {
    issue_create: IssueCreatePayload,
}

#[derive(Deserialize)]
struct IssueCreatePayload {
    success: bool,
    issue: Option<CreatedLinearIssue>,
}

#[derive(Deserialize)]
struct CreatedLinearIssue {
    id: String,
    identifier: String,
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationCreateData {
    issue_relation_create: RelationCreatePayload,
}

#[derive(Deserialize)]
struct RelationCreatePayload {
    success: bool,
}

#[async_trait]
impl IssueTracker for LinearTracker {
    async fn create_issue(
        &self,
        project_id: &str,
        team_id: &str,
        task: &Task,
        assignee_id: Option<&str>,
    ) -> Result<CreatedIssue, TrackerError> {
        if task.task_title.trim().is_empty() {
            return Err(TrackerError::InvalidInput("Title is required".to_string()));
        }

        let input = Self::issue_input(project_id, team_id, task, assignee_id);
        let data: IssueCreateData = self.query(ISSUE_CREATE, json!({ "input": input })).await?;

        match (data.issue_create.success, data.issue_create.issue) {
            (true, Some(issue)) => {
                log::debug!("Linear issue {} created for '{}'", issue.identifier, task.task_title);
                Ok(CreatedIssue {
                    link: issue.url,
                    external_id: issue.id,
                })
            }
            _ => Err(TrackerError::Rejected(format!(
                "issueCreate failed for '{}'",
                task.task_title
            ))),
        }
    }

    async fn link_issues(
        &self,
        from_external_id: &str,
        to_external_id: &str,
        relation: IssueRelation,
    ) -> Result<(), TrackerError> {
        let input = json!({
            "issueId": from_external_id,
            "relatedIssueId": to_external_id,
            "type": relation.as_str(),
        });
        let data: RelationCreateData = self
            .query(ISSUE_RELATION_CREATE, json!({ "input": input }))
            .await?;
        if data.issue_relation_create.success {
            Ok(())
        } else {
            Err(TrackerError::Rejected(format!(
                "issueRelationCreate {} -> {} failed",
                from_external_id, to_external_id
            )))
        }
    }
}
