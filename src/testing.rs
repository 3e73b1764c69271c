//! Scripted fakes and fixtures shared by unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::Router;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::extraction::{ExtractionError, ExtractionRequest, StructuredExtractor};
use crate::integrations::{
    CodeIssueError, CodeIssueTracker, CodeRepository, CreatedIssue, IssueRelation, IssueTracker,
    NotificationPayload, Notifier, NotifyError, TrackerError,
};
use crate::session::{SessionStore, SessionStoreError};
use crate::types::{
    CodeIssue, Complexity, ConfidenceLevel, MeetingContext, MeetingSummary, PriorityLevel, Task,
    TaskTimeEstimate, TrackerIssue,
};

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn sample_task(title: &str, assignee: &str, tags: &[&str]) -> Task {
    Task::new(
        title,
        PriorityLevel::High,
        TaskTimeEstimate::new(2.0, 4.0, ConfidenceLevel::Medium).unwrap(),
        Complexity::Moderate,
    )
    .with_assignee(assignee)
    .with_tags(tags.iter().copied())
}

pub fn sample_summary() -> MeetingSummary {
    MeetingSummary {
        date: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
        attendees: vec!["Ana".into(), "Ben".into()],
        key_points: vec!["Login is late".into()],
        action_items: Vec::new(),
        decisions: vec!["Ship behind a flag".into()],
        context: MeetingContext {
            project_phase: Some("Beta".into()),
            recurring_topics: vec!["auth".into()],
            blockers: Vec::new(),
            follow_ups: Vec::new(),
        },
        duration_minutes: Some(30),
        meeting_type: Some("Planning".into()),
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Answers per agent name; the last scripted answer repeats.
#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    scripts: Mutex<HashMap<String, (Vec<Result<Value, String>>, usize)>>,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, agent: &str, answer: Value) -> Self {
        self.push(agent, Ok(answer));
        self
    }

    pub fn fail(self, agent: &str, reason: &str) -> Self {
        self.push(agent, Err(reason.to_string()));
        self
    }

    fn push(&self, agent: &str, answer: Result<Value, String>) {
        self.scripts
            .lock()
            .entry(agent.to_string())
            .or_default()
            .0
            .push(answer);
    }

    pub fn calls_for(&self, agent: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.agent.name == agent).count()
    }

    /// Inputs sent to `agent`, oldest first.
    pub fn inputs_for(&self, agent: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.agent.name == agent)
            .map(|r| r.input.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl StructuredExtractor for ScriptedExtractor {
    async fn extract_value(&self, request: ExtractionRequest) -> Result<Value, ExtractionError> {
        let agent = request.agent.name.clone();
        self.requests.lock().push(request);

        let mut scripts = self.scripts.lock();
        let answer = match scripts.get_mut(&agent) {
            Some((answers, next)) if !answers.is_empty() => {
                let idx = (*next).min(answers.len() - 1);
                *next += 1;
                answers[idx].clone()
            }
            _ => Err(format!("no scripted answer for {}", agent)),
        };
        answer.map_err(|reason| ExtractionError::Provider { agent, reason })
    }
}

// ---------------------------------------------------------------------------
// Integrations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCall {
    pub project_id: String,
    pub team_id: String,
    pub title: String,
    pub assignee_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct RecordingTracker {
    pub created: Mutex<Vec<CreateCall>>,
    pub links: Mutex<Vec<(String, String, IssueRelation)>>,
    /// Fail when asked to create an issue with this title.
    pub fail_on_title: Option<String>,
    pub fail_links: bool,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(title: &str) -> Self {
        Self {
            fail_on_title: Some(title.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn create_issue(
        &self,
        project_id: &str,
        team_id: &str,
        task: &Task,
        assignee_id: Option<&str>,
    ) -> Result<CreatedIssue, TrackerError> {
        if self.fail_on_title.as_deref() == Some(task.task_title.as_str()) {
            return Err(TrackerError::Rejected(format!("refused '{}'", task.task_title)));
        }
        let mut created = self.created.lock();
        created.push(CreateCall {
            project_id: project_id.to_string(),
            team_id: team_id.to_string(),
            title: task.task_title.clone(),
            assignee_id: assignee_id.map(String::from),
        });
        let n = created.len();
        Ok(CreatedIssue {
            link: format!("https://tracker.test/issue/{}", n),
            external_id: format!("ISS-{}", n),
        })
    }

    async fn link_issues(
        &self,
        from_external_id: &str,
        to_external_id: &str,
        relation: IssueRelation,
    ) -> Result<(), TrackerError> {
        if self.fail_links {
            return Err(TrackerError::RateLimited);
        }
        self.links
            .lock()
            .push((from_external_id.to_string(), to_external_id.to_string(), relation));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingCodeTracker {
    /// (repository, task title, tracker link)
    pub calls: Mutex<Vec<(String, String, Option<String>)>>,
    pub fail: bool,
}

impl RecordingCodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CodeIssueTracker for RecordingCodeTracker {
    async fn create_issue(
        &self,
        repository: &CodeRepository,
        task: &Task,
        tracker_issue: Option<&TrackerIssue>,
    ) -> Result<CodeIssue, CodeIssueError> {
        let mut calls = self.calls.lock();
        calls.push((
            repository.to_string(),
            task.task_title.clone(),
            tracker_issue.and_then(|i| i.issue_link.clone()),
        ));
        if self.fail {
            return Err(CodeIssueError::Unauthorized);
        }
        let number = calls.len() as u64;
        Ok(CodeIssue {
            task_title: task.task_title.clone(),
            number,
            url: format!("https://github.test/{}/issues/{}", repository, number),
        })
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<NotificationPayload>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Webhook {
                status: 500,
                message: "down".into(),
            });
        }
        self.sent.lock().push(payload.clone());
        Ok(())
    }
}

/// Store whose every call fails.
#[derive(Debug, Default)]
pub struct BrokenSessionStore;

#[async_trait]
impl SessionStore for BrokenSessionStore {
    async fn get(&self, _session_id: &str, _key: &str) -> Result<Option<Value>, SessionStoreError> {
        Err(SessionStoreError::Unavailable("store offline".into()))
    }

    async fn set(&self, _session_id: &str, _key: &str, _value: Value) -> Result<(), SessionStoreError> {
        Err(SessionStoreError::Unavailable("store offline".into()))
    }
}
