//! GitHub Issues as the code issue tracker.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::code_issues::{code_issue_body, CodeIssueError, CodeIssueTracker, CodeRepository};
use crate::types::{CodeIssue, Task, TrackerIssue};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// GitHub REST client for issue creation.
#[derive(Debug, Clone)]
pub struct GitHubIssueTracker {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CreatedGitHubIssue {
    number: u64,
    html_url: String,
}

impl GitHubIssueTracker {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: GITHUB_API_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Looks for GITHUB_TOKEN or GH_TOKEN.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok()?;
        Some(Self::new(token))
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, repository: &CodeRepository, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, repository.owner, repository.name, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "pmflow")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn parse_error(response: reqwest::Response) -> CodeIssueError {
        let status = response.status().as_u16();

        match status {
            401 => CodeIssueError::Unauthorized,
            403 => {
                let exhausted = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s == "0")
                    .unwrap_or(false);
                if exhausted {
                    return CodeIssueError::RateLimited;
                }
                CodeIssueError::Api {
                    status,
                    message: "Forbidden".to_string(),
                }
            }
            404 => CodeIssueError::NotFound("Repository not found".to_string()),
            _ => {
                let message = response
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                    .unwrap_or_else(|| format!("HTTP {}", status));
                CodeIssueError::Api { status, message }
            }
        }
    }
}

#[async_trait]
impl CodeIssueTracker for GitHubIssueTracker {
    async fn create_issue(
        &self,
        repository: &CodeRepository,
        task: &Task,
        tracker_issue: Option<&TrackerIssue>,
    ) -> Result<CodeIssue, CodeIssueError> {
        if task.task_title.trim().is_empty() {
            return Err(CodeIssueError::InvalidInput("Title is required".to_string()));
        }

        let body = json!({
            "title": task.task_title,
            "body": code_issue_body(task, tracker_issue),
            "labels": task.tags,
        });

        let url = self.api_url(repository, "issues");
        let response = self.request(reqwest::Method::POST, &url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        let created: CreatedGitHubIssue = response.json().await?;
        log::debug!("GitHub issue #{} created in {}", created.number, repository);
        Ok(CodeIssue {
            task_title: task.task_title.clone(),
            number: created.number,
            url: created.html_url,
        })
    }
}
