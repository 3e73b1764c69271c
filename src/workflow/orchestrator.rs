//! The product manager workflow.
//!
//! A run walks a fixed sequence of steps:
//!
//! 1. summarize the meeting (hard)
//! 2. generate tasks (hard)
//! 3. ask for a workload opinion (soft)
//! 4. create tracker issues (hard), then link dependencies (soft)
//! 5. create code issues for `code`-tagged tasks (soft)
//! 6. notify the team (soft)
//!
//! A hard failure ends the run with [`RunEvent::WorkflowFailed`]; soft
//! failures are logged and the run carries on. The orchestrator itself
//! never returns an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::best_effort::RunLog;
use super::config::{TrackerSettings, WorkflowOptions};
use super::result::{RunContent, RunEvent, WorkflowOutput, WorkflowResult, WorkflowStep};
use crate::agents::{self, AgentDefinition};
use crate::capacity::CapacityLedger;
use crate::extraction::{extract, ExtractionError, StructuredExtractor};
use crate::integrations::{
    CodeIssueTracker, CodeRepository, IssueTracker, NotificationPayload, Notifier, PlannedLink, TrackerError,
};
use crate::session::{SessionContext, SessionStore};
use crate::types::{CodeIssue, MeetingSummary, TaskList, TeamWorkload, TrackerIssue, TrackerIssueList};

/// Caller-supplied input for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub meeting_notes: String,
    /// Member name -> tracker user id.
    #[serde(default)]
    pub external_users: HashMap<String, String>,
    /// Member name -> capacity hours.
    #[serde(default)]
    pub team_capacity: BTreeMap<String, f64>,
}

/// Find the tracker user id for `name`: exact match first, then
/// case-insensitive. A case-insensitive match naming more than one distinct
/// user resolves to nobody.
pub fn resolve_assignee<'a>(users: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    if let Some(id) = users.get(name) {
        return Some(id);
    }
    let wanted = name.trim().to_lowercase();
    let mut matches = users
        .iter()
        .filter(|(member, _)| member.trim().to_lowercase() == wanted)
        .map(|(_, id)| id.as_str());
    let first = matches.next()?;
    if matches.any(|id| id != first) {
        tracing::warn!(assignee = %name, "ambiguous assignee, leaving issue unassigned");
        return None;
    }
    Some(first)
}

/// Sequences extraction, tracker, code tracker and notifier calls.
pub struct ProductManagerWorkflow {
    extractor: Arc<dyn StructuredExtractor>,
    tracker: Arc<dyn IssueTracker>,
    code_tracker: Option<Arc<dyn CodeIssueTracker>>,
    notifier: Option<Arc<dyn Notifier>>,
    store: Arc<dyn SessionStore>,
    tracker_settings: TrackerSettings,
    code_repository: Option<String>,
    options: WorkflowOptions,
    summary_agent: AgentDefinition,
    task_agent: AgentDefinition,
    workload_agent: AgentDefinition,
}

impl std::fmt::Debug for ProductManagerWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductManagerWorkflow")
            .field("tracker", &self.tracker)
            .field("code_tracker", &self.code_tracker)
            .field("notifier", &self.notifier)
            .field("store", &self.store)
            .field("tracker_settings", &self.tracker_settings)
            .field("code_repository", &self.code_repository)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

pub struct WorkflowBuilder {
    inner: ProductManagerWorkflow,
}

impl WorkflowBuilder {
    pub fn tracker_settings(mut self, settings: TrackerSettings) -> Self {
        self.inner.tracker_settings = settings;
        self
    }

    pub fn code_tracker(mut self, code_tracker: Arc<dyn CodeIssueTracker>) -> Self {
        self.inner.code_tracker = Some(code_tracker);
        self
    }

    /// `owner/name` of the repository code issues are filed in.
    pub fn code_repository(mut self, repository: impl Into<String>) -> Self {
        self.inner.code_repository = Some(repository.into());
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.inner.notifier = Some(notifier);
        self
    }

    pub fn options(mut self, options: WorkflowOptions) -> Self {
        self.inner.options = options;
        self
    }

    /// Replace one of the built-in agents, matched by name.
    pub fn agent(mut self, agent: AgentDefinition) -> Self {
        let name = agent.name.clone();
        match name.as_str() {
            agents::MEETING_SUMMARY_AGENT => self.inner.summary_agent = agent,
            agents::TASK_AGENT => self.inner.task_agent = agent,
            agents::WORKLOAD_AGENT => self.inner.workload_agent = agent,
            other => log::warn!("ignoring unknown agent '{}'", other),
        }
        self
    }

    pub fn build(self) -> ProductManagerWorkflow {
        self.inner
    }
}

impl ProductManagerWorkflow {
    pub fn builder(
        extractor: Arc<dyn StructuredExtractor>,
        tracker: Arc<dyn IssueTracker>,
        store: Arc<dyn SessionStore>,
    ) -> WorkflowBuilder {
        WorkflowBuilder {
            inner: Self {
                extractor,
                tracker,
                code_tracker: None,
                notifier: None,
                store,
                tracker_settings: TrackerSettings::default(),
                code_repository: None,
                options: WorkflowOptions::default(),
                summary_agent: agents::meeting_summary_agent(),
                task_agent: agents::task_agent(),
                workload_agent: agents::workload_agent(),
            },
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn has_code_tracker(&self) -> bool {
        self.code_tracker.is_some()
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    /// Run against the stored context of `session_id`.
    ///
    /// An unreadable store is a soft failure: the run starts from an empty
    /// context.
    pub async fn run(&self, session_id: &str, input: WorkflowInput) -> WorkflowResult {
        let mut log = RunLog::new();
        let mut ctx = log
            .best_effort(
                WorkflowStep::LoadSession,
                SessionContext::load(self.store.as_ref(), session_id),
                |ctx| Some(format!("{} historical tasks", ctx.task_history.len())),
            )
            .await
            .unwrap_or_else(|| SessionContext::new(session_id));

        self.execute_with_log(&mut ctx, input, log).await
    }

    /// Run against an explicit context, persisting it as steps complete.
    pub async fn execute(&self, ctx: &mut SessionContext, input: WorkflowInput) -> WorkflowResult {
        self.execute_with_log(ctx, input, RunLog::new()).await
    }

    async fn execute_with_log(&self, ctx: &mut SessionContext, input: WorkflowInput, mut log: RunLog) -> WorkflowResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, session_id = %ctx.session_id, "Starting product manager workflow");

        let mut ledger = CapacityLedger::from_capacities(input.team_capacity.iter().map(|(k, v)| (k.clone(), *v)));

        let finish = |log: RunLog, event: RunEvent, content: RunContent, session_id: &str| {
            let (steps, soft_failures) = log.into_parts();
            WorkflowResult {
                run_id,
                session_id: session_id.to_string(),
                event,
                content,
                steps,
                soft_failures,
                started_at,
                finished_at: Utc::now(),
            }
        };

        // 1. Meeting summary
        let summary = match self.summarize(ctx, &input.meeting_notes).await {
            Ok(summary) => {
                log.completed(WorkflowStep::Summarize, Some(summary.headline()));
                summary
            }
            Err(e) => {
                let reason = log.hard_failure(
                    WorkflowStep::Summarize,
                    format!("Failed to generate meeting summary: {}", e),
                );
                return finish(log, RunEvent::WorkflowFailed, RunContent::Failed { reason }, &ctx.session_id);
            }
        };
        ctx.set_meeting_context(summary.context.clone());
        log.best_effort(
            WorkflowStep::PersistSession,
            ctx.persist_meeting_context(self.store.as_ref()),
            |_| Some("meeting_context".to_string()),
        )
        .await;

        // 2. Tasks
        let tasks = match self.generate_tasks(ctx, &summary, &ledger).await {
            Ok(tasks) => {
                log.completed(WorkflowStep::GenerateTasks, Some(format!("{} tasks", tasks.len())));
                tasks
            }
            Err(e) => {
                let reason = log.hard_failure(WorkflowStep::GenerateTasks, format!("Failed to generate tasks: {}", e));
                return finish(log, RunEvent::WorkflowFailed, RunContent::Failed { reason }, &ctx.session_id);
            }
        };
        for (owner, target) in tasks.dangling_dependencies() {
            tracing::warn!(task = %owner, dependency = %target, "dependency does not match any generated task");
        }
        ctx.append_tasks(&tasks, self.options.task_history_limit);
        log.best_effort(
            WorkflowStep::PersistSession,
            ctx.persist_task_history(self.store.as_ref()),
            |_| Some("task_history".to_string()),
        )
        .await;
        if self.options.deplete_capacity_on_assignment {
            ledger.deplete_for(&tasks);
        }

        // 3. Workload opinion
        let workload_plan = log
            .best_effort(
                WorkflowStep::BalanceWorkload,
                self.balance_workload(&tasks, &ledger),
                |plan| Some(format!("{} members assessed", plan.team.len())),
            )
            .await;

        // 4. Tracker issues
        let tracker_issues = match self.create_tracker_issues(&tasks, &input.external_users).await {
            Ok(issues) => {
                log.completed(WorkflowStep::CreateTrackerIssues, Some(format!("{} issues", issues.len())));
                issues
            }
            Err(reason) => {
                let reason = log.hard_failure(WorkflowStep::CreateTrackerIssues, reason);
                return finish(log, RunEvent::WorkflowFailed, RunContent::Failed { reason }, &ctx.session_id);
            }
        };
        self.link_dependencies(&tasks, &tracker_issues, &mut log).await;

        // 5. Code issues
        let code_issues = self.create_code_issues(&tasks, &tracker_issues, &mut log).await;

        // 6. Notification
        let workload_alerts = ledger.low_capacity_alerts();
        match &self.notifier {
            Some(notifier) => {
                let payload = NotificationPayload {
                    summary: summary.clone(),
                    tasks: tasks.clone(),
                    issues: Some(tracker_issues.clone()),
                    code_issues: code_issues.clone(),
                    workload_alerts: workload_alerts.clone(),
                };
                log.best_effort(WorkflowStep::Notify, notifier.send(&payload), |_| None)
                    .await;
            }
            None => log.skipped(WorkflowStep::Notify, "no notifier configured"),
        }

        let output = WorkflowOutput {
            summary,
            tasks,
            tracker_issues,
            code_issues,
            workload_plan,
            workload_alerts,
        };
        let result = finish(
            log,
            RunEvent::WorkflowCompleted,
            RunContent::Completed(Box::new(output)),
            &ctx.session_id,
        );
        tracing::info!(
            %run_id,
            soft_failures = result.soft_failures.len(),
            "Product manager workflow completed"
        );
        result
    }

    async fn summarize(&self, ctx: &SessionContext, notes: &str) -> Result<MeetingSummary, ExtractionError> {
        let input = json!({
            "current_notes": notes,
            "previous_context": ctx.previous_context(),
        });
        extract(self.extractor.as_ref(), &self.summary_agent, input).await
    }

    async fn generate_tasks(
        &self,
        ctx: &SessionContext,
        summary: &MeetingSummary,
        ledger: &CapacityLedger,
    ) -> Result<TaskList, ExtractionError> {
        let input = json!({
            "meeting_summary": summary,
            "historical_data": ctx.task_history,
            "team_capacity": ledger.snapshot(),
        });
        extract(self.extractor.as_ref(), &self.task_agent, input).await
    }

    async fn balance_workload(&self, tasks: &TaskList, ledger: &CapacityLedger) -> Result<TeamWorkload, ExtractionError> {
        let input = json!({
            "team": ledger.team_members(tasks),
            "tasks": tasks,
        });
        extract(self.extractor.as_ref(), &self.workload_agent, input).await
    }

    /// One issue per task; the first error aborts with a failure reason.
    async fn create_tracker_issues(
        &self,
        tasks: &TaskList,
        users: &HashMap<String, String>,
    ) -> Result<TrackerIssueList, String> {
        let Some((project_id, team_id)) = self.tracker_settings.ids() else {
            return Err(
                "Failed to create tracker issues: missing tracker configuration (project_id and team_id are required)"
                    .to_string(),
            );
        };

        let mut issues = Vec::with_capacity(tasks.len());
        for task in tasks {
            let assignee_id = task
                .task_assignee
                .as_deref()
                .and_then(|name| resolve_assignee(users, name));
            if task.task_assignee.is_some() && assignee_id.is_none() {
                log::debug!("no tracker user for assignee of '{}'", task.task_title);
            }

            let created = self
                .tracker
                .create_issue(project_id, team_id, task, assignee_id)
                .await
                .map_err(|e: TrackerError| {
                    format!("Failed to create tracker issues: '{}': {}", task.task_title, e)
                })?;
            issues.push(TrackerIssue::from_task(task).created(created.link, created.external_id));
        }
        Ok(TrackerIssueList { issues })
    }

    async fn link_dependencies(&self, tasks: &TaskList, issues: &TrackerIssueList, log: &mut RunLog) {
        let mut links = Vec::new();
        for task in tasks {
            for dep in &task.dependencies {
                let planned = PlannedLink::from_dependency(&task.task_title, &dep.task_id, dep.dependency_type);
                let from = issues.for_title(&planned.from_title).and_then(|i| i.external_id.clone());
                let to = issues.for_title(&planned.to_title).and_then(|i| i.external_id.clone());
                match (from, to) {
                    (Some(from), Some(to)) if from == to => {
                        tracing::debug!(task = %task.task_title, "skipping self dependency");
                    }
                    (Some(from), Some(to)) => links.push((from, to, planned.relation)),
                    _ => {}
                }
            }
        }

        if links.is_empty() {
            log.skipped(WorkflowStep::LinkDependencies, "no dependencies between created issues");
            return;
        }

        let mut failures = Vec::new();
        for (from, to, relation) in &links {
            if let Err(e) = self.tracker.link_issues(from, to, *relation).await {
                failures.push(format!("{} {} {}: {}", from, relation.as_str(), to, e));
            }
        }

        if failures.is_empty() {
            log.completed(WorkflowStep::LinkDependencies, Some(format!("{} links", links.len())));
        } else {
            log.soft_failure(WorkflowStep::LinkDependencies, failures.join("; "));
        }
    }

    /// Code issues for `code`-tagged tasks; every failure is soft and the
    /// issues that were created are kept.
    async fn create_code_issues(
        &self,
        tasks: &TaskList,
        tracker_issues: &TrackerIssueList,
        log: &mut RunLog,
    ) -> Vec<CodeIssue> {
        let code_tasks = tasks.code_tasks();
        if code_tasks.is_empty() {
            log.completed(WorkflowStep::CreateCodeIssues, Some("no code-tagged tasks".to_string()));
            return Vec::new();
        }

        let Some(repo_ref) = self.code_repository.as_deref() else {
            log.soft_failure(WorkflowStep::CreateCodeIssues, "no code repository configured");
            return Vec::new();
        };
        let Some(code_tracker) = &self.code_tracker else {
            log.soft_failure(WorkflowStep::CreateCodeIssues, "no code issue tracker configured");
            return Vec::new();
        };
        let repository: CodeRepository = match repo_ref.parse() {
            Ok(repo) => repo,
            Err(e) => {
                log.soft_failure(WorkflowStep::CreateCodeIssues, format!("{}", e));
                return Vec::new();
            }
        };

        let mut created = Vec::with_capacity(code_tasks.len());
        let mut failures = Vec::new();
        for task in code_tasks {
            let tracker_issue = tracker_issues.for_title(&task.task_title);
            match code_tracker.create_issue(&repository, task, tracker_issue).await {
                Ok(issue) => created.push(issue),
                Err(e) => failures.push(format!("'{}': {}", task.task_title, e)),
            }
        }

        if failures.is_empty() {
            log.completed(
                WorkflowStep::CreateCodeIssues,
                Some(format!("{} code issues in {}", created.len(), repository)),
            );
        } else {
            log.soft_failure(WorkflowStep::CreateCodeIssues, failures.join("; "));
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{MEETING_SUMMARY_AGENT, TASK_AGENT, WORKLOAD_AGENT};
    use crate::session::{InMemorySessionStore, TASK_HISTORY_KEY};
    use crate::testing::{
        BrokenSessionStore, RecordingCodeTracker, RecordingNotifier, RecordingTracker, ScriptedExtractor,
    };
    use crate::workflow::result::StepStatus;
    use serde_json::Value;

    fn summary_json() -> Value {
        json!({
            "date": "2024-03-04",
            "attendees": ["Ana", "Ben"],
            "key_points": ["Login is late"],
            "action_items": [],
            "decisions": ["Ship behind a flag"],
            "context": {"project_phase": "Beta", "recurring_topics": ["auth"], "blockers": [], "follow_ups": []},
            "duration_minutes": 30,
            "meeting_type": "Planning"
        })
    }

    fn task_json(title: &str, assignee: &str, tags: &[&str]) -> Value {
        json!({
            "task_title": title,
            "task_description": format!("Do {}", title),
            "task_assignee": assignee,
            "priority": {"level": "High", "reason": "launch"},
            "time_estimate": {"minimum_hours": 2, "maximum_hours": 6, "confidence_level": "Medium", "factors": []},
            "tags": tags,
            "dependencies": [],
            "complexity": "Moderate",
            "required_skills": ["rust"]
        })
    }

    fn tasks_json(tasks: Vec<Value>) -> Value {
        json!({ "tasks": tasks })
    }

    fn workload_json() -> Value {
        json!({"team": [{"name": "Ana", "role": "Team Member", "current_tasks": 1, "capacity": 40, "remaining_capacity": 34}]})
    }

    fn happy_extractor(tasks: Vec<Value>) -> ScriptedExtractor {
        ScriptedExtractor::new()
            .respond(MEETING_SUMMARY_AGENT, summary_json())
            .respond(TASK_AGENT, tasks_json(tasks))
            .respond(WORKLOAD_AGENT, workload_json())
    }

    fn input(capacity: &[(&str, f64)]) -> WorkflowInput {
        WorkflowInput {
            meeting_notes: "Ana will fix login. Ben reviews.".into(),
            external_users: HashMap::from([("Ana".to_string(), "u-ana".to_string())]),
            team_capacity: capacity.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    struct Harness {
        extractor: Arc<ScriptedExtractor>,
        tracker: Arc<RecordingTracker>,
        code_tracker: Arc<RecordingCodeTracker>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<InMemorySessionStore>,
    }

    impl Harness {
        fn new(extractor: ScriptedExtractor) -> Self {
            Self::with(extractor, RecordingTracker::new(), RecordingCodeTracker::new(), RecordingNotifier::new())
        }

        fn with(
            extractor: ScriptedExtractor,
            tracker: RecordingTracker,
            code_tracker: RecordingCodeTracker,
            notifier: RecordingNotifier,
        ) -> Self {
            Self {
                extractor: Arc::new(extractor),
                tracker: Arc::new(tracker),
                code_tracker: Arc::new(code_tracker),
                notifier: Arc::new(notifier),
                store: Arc::new(InMemorySessionStore::new()),
            }
        }

        fn workflow(&self) -> ProductManagerWorkflow {
            ProductManagerWorkflow::builder(self.extractor.clone(), self.tracker.clone(), self.store.clone())
                .tracker_settings(TrackerSettings::new("proj", "team"))
                .code_repository("acme/widgets")
                .code_tracker(self.code_tracker.clone())
                .notifier(self.notifier.clone())
                .build()
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes_every_step() {
        let h = Harness::new(happy_extractor(vec![
            task_json("Fix login", "Ana", &["code", "auth"]),
            task_json("Write docs", "ben", &["docs"]),
        ]));
        let result = h.workflow().run("s1", input(&[("Ana", 40.0), ("Ben", 30.0)])).await;

        assert!(result.is_completed(), "{:?}", result.failure_reason());
        assert!(!result.is_degraded(), "{:?}", result.soft_failures);
        let output = result.output().unwrap();
        assert_eq!(output.tasks.len(), 2);
        assert_eq!(output.tracker_issues.len(), 2);
        assert!(output.tracker_issues.issues.iter().all(|i| i.issue_link.is_some()));
        assert_eq!(output.code_issues.len(), 1);
        assert!(output.workload_plan.is_some());
        assert!(output.workload_alerts.is_empty());

        let created = h.tracker.created.lock();
        assert_eq!(created[0].assignee_id.as_deref(), Some("u-ana"));
        assert_eq!(created[0].project_id, "proj");
        assert_eq!(created[1].assignee_id, None);

        let code_calls = h.code_tracker.calls.lock();
        assert_eq!(code_calls[0].1, "Fix login");
        assert_eq!(code_calls[0].2.as_deref(), Some("https://tracker.test/issue/1"));

        let sent = h.notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].issues.is_some());
        assert_eq!(sent[0].code_issues.len(), 1);

        assert_eq!(result.step(WorkflowStep::Notify).unwrap().status, StepStatus::Completed);
        assert_eq!(result.step(WorkflowStep::LinkDependencies).unwrap().status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_summary_failure_stops_everything() {
        let extractor = ScriptedExtractor::new()
            .fail(MEETING_SUMMARY_AGENT, "model unavailable")
            .respond(TASK_AGENT, tasks_json(vec![task_json("x", "Ana", &[])]));
        let h = Harness::new(extractor);
        let result = h.workflow().run("s1", input(&[("Ana", 40.0)])).await;

        assert_eq!(result.event, RunEvent::WorkflowFailed);
        assert!(result.failure_reason().unwrap().contains("meeting summary"));
        assert_eq!(h.extractor.calls_for(TASK_AGENT), 0);
        assert_eq!(h.extractor.calls_for(WORKLOAD_AGENT), 0);
        assert!(h.tracker.created.lock().is_empty());
        assert!(h.notifier.sent.lock().is_empty());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_summary_answer_is_a_hard_failure() {
        let extractor = ScriptedExtractor::new().respond(MEETING_SUMMARY_AGENT, Value::Null);
        let h = Harness::new(extractor);
        let result = h.workflow().run("s1", input(&[])).await;
        assert!(!result.is_completed());
        assert_eq!(h.extractor.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_task_failure_keeps_meeting_context() {
        let extractor = ScriptedExtractor::new()
            .respond(MEETING_SUMMARY_AGENT, summary_json())
            .fail(TASK_AGENT, "timeout");
        let h = Harness::new(extractor);
        let result = h.workflow().run("s1", input(&[])).await;

        assert!(result.failure_reason().unwrap().contains("Failed to generate tasks"));
        let ctx = SessionContext::load(h.store.as_ref(), "s1").await.unwrap();
        assert_eq!(ctx.meeting_context.unwrap().project_phase.as_deref(), Some("Beta"));
        assert!(ctx.task_history.is_empty());
        assert!(h.tracker.created.lock().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_estimate_fails_task_step() {
        let mut bad = task_json("Fix login", "Ana", &[]);
        bad["time_estimate"]["minimum_hours"] = json!(9);
        bad["time_estimate"]["maximum_hours"] = json!(3);
        let h = Harness::new(happy_extractor(vec![bad]));
        let result = h.workflow().run("s1", input(&[])).await;
        assert_eq!(result.event, RunEvent::WorkflowFailed);
        assert!(result.failure_reason().unwrap().contains("invalid output"));
    }

    #[tokio::test]
    async fn test_balancer_failure_is_soft() {
        let extractor = ScriptedExtractor::new()
            .respond(MEETING_SUMMARY_AGENT, summary_json())
            .respond(TASK_AGENT, tasks_json(vec![task_json("Fix login", "Ana", &[])]))
            .respond(WORKLOAD_AGENT, json!({"team": []}));
        let h = Harness::new(extractor);
        let result = h.workflow().run("s1", input(&[("Ana", 40.0)])).await;

        assert!(result.is_completed());
        assert!(result.is_degraded());
        assert_eq!(result.soft_failures[0].step, WorkflowStep::BalanceWorkload);
        assert!(result.output().unwrap().workload_plan.is_none());
        assert_eq!(h.tracker.created.lock().len(), 1);
        assert_eq!(h.notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_balancer_sees_full_capacity_and_counts() {
        let h = Harness::new(happy_extractor(vec![
            task_json("a", "Ana", &[]),
            task_json("b", "Ana", &[]),
        ]));
        h.workflow().run("s1", input(&[("Ana", 40.0)])).await;

        let inputs = h.extractor.inputs_for(WORKLOAD_AGENT);
        let member = &inputs[0]["team"][0];
        assert_eq!(member["role"], "Team Member");
        assert_eq!(member["current_tasks"], 2);
        assert_eq!(member["remaining_capacity"], member["capacity"]);
    }

    #[tokio::test]
    async fn test_no_code_tasks_means_no_code_calls() {
        let h = Harness::new(happy_extractor(vec![task_json("Write docs", "Ana", &["docs", "Code"])]));
        let result = h.workflow().run("s1", input(&[("Ana", 40.0)])).await;

        assert!(result.is_completed());
        assert!(h.code_tracker.calls.lock().is_empty());
        let report = result.step(WorkflowStep::CreateCodeIssues).unwrap();
        assert_eq!(report.status, StepStatus::Completed);
        assert!(result.soft_failures.is_empty());
    }

    #[tokio::test]
    async fn test_code_issue_failure_is_soft() {
        let h = Harness::with(
            happy_extractor(vec![task_json("Fix login", "Ana", &["code"])]),
            RecordingTracker::new(),
            RecordingCodeTracker::failing(),
            RecordingNotifier::new(),
        );
        let result = h.workflow().run("s1", input(&[("Ana", 40.0)])).await;
        assert!(result.is_completed());
        assert_eq!(result.soft_failures[0].step, WorkflowStep::CreateCodeIssues);
        assert_eq!(h.notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_repository_is_soft() {
        let h = Harness::new(happy_extractor(vec![task_json("Fix login", "Ana", &["code"])]));
        let workflow = ProductManagerWorkflow::builder(h.extractor.clone(), h.tracker.clone(), h.store.clone())
            .tracker_settings(TrackerSettings::new("proj", "team"))
            .code_tracker(h.code_tracker.clone())
            .build();
        let result = workflow.run("s1", input(&[])).await;
        assert!(result.is_completed());
        assert!(result.soft_failures[0].reason.contains("no code repository"));
        assert!(h.code_tracker.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tracker_failure_is_hard() {
        let h = Harness::with(
            happy_extractor(vec![task_json("a", "Ana", &["code"]), task_json("b", "Ana", &[])]),
            RecordingTracker::failing_on("b"),
            RecordingCodeTracker::new(),
            RecordingNotifier::new(),
        );
        let result = h.workflow().run("s1", input(&[])).await;

        assert_eq!(result.event, RunEvent::WorkflowFailed);
        assert!(result.failure_reason().unwrap().contains("'b'"));
        assert!(h.code_tracker.calls.lock().is_empty());
        assert!(h.notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tracker_config_is_hard() {
        let h = Harness::new(happy_extractor(vec![task_json("a", "Ana", &[])]));
        let workflow =
            ProductManagerWorkflow::builder(h.extractor.clone(), h.tracker.clone(), h.store.clone()).build();
        let result = workflow.run("s1", input(&[])).await;
        assert!(result.failure_reason().unwrap().contains("missing tracker configuration"));
        assert!(h.tracker.created.lock().is_empty());
    }

    #[tokio::test]
    async fn test_issue_count_never_exceeds_tasks() {
        for n in [0usize, 1, 3] {
            let tasks = (0..n).map(|i| task_json(&format!("t{}", i), "Ana", &[])).collect();
            let h = Harness::new(happy_extractor(tasks));
            let result = h.workflow().run("s1", input(&[])).await;
            let output = result.output().unwrap();
            assert_eq!(output.tasks.len(), n);
            assert!(output.tracker_issues.len() <= n);
            assert_eq!(h.tracker.created.lock().len(), n);
        }
    }

    #[tokio::test]
    async fn test_history_accumulates_across_runs() {
        let extractor = ScriptedExtractor::new()
            .respond(MEETING_SUMMARY_AGENT, summary_json())
            .respond(TASK_AGENT, tasks_json(vec![task_json("first", "Ana", &[])]))
            .respond(TASK_AGENT, tasks_json(vec![task_json("second", "Ana", &[]), task_json("third", "Ben", &[])]))
            .respond(WORKLOAD_AGENT, workload_json());
        let h = Harness::new(extractor);
        let workflow = h.workflow();

        assert!(workflow.run("s1", input(&[])).await.is_completed());
        assert!(workflow.run("s1", input(&[])).await.is_completed());

        let ctx = SessionContext::load(h.store.as_ref(), "s1").await.unwrap();
        let titles: Vec<_> = ctx.task_history.iter().map(|t| t.task_title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);

        let task_inputs = h.extractor.inputs_for(TASK_AGENT);
        assert_eq!(task_inputs[0]["historical_data"], json!([]));
        assert_eq!(task_inputs[1]["historical_data"][0]["task_title"], "first");

        let summary_inputs = h.extractor.inputs_for(MEETING_SUMMARY_AGENT);
        assert_eq!(summary_inputs[0]["previous_context"], json!({}));
        assert_eq!(summary_inputs[1]["previous_context"]["project_phase"], "Beta");
    }

    #[tokio::test]
    async fn test_undecodable_history_entry_is_not_lost() {
        let h = Harness::new(happy_extractor(vec![task_json("new", "Ana", &[])]));
        let legacy = json!({"task_title": "old legacy"});
        h.store
            .set("s1", TASK_HISTORY_KEY, json!([task_json("old good", "Ana", &[]), legacy.clone()]))
            .await
            .unwrap();

        assert!(h.workflow().run("s1", input(&[])).await.is_completed());

        let stored = h.store.get("s1", TASK_HISTORY_KEY).await.unwrap().unwrap();
        let titles: Vec<_> = stored
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["task_title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["old legacy", "old good", "new"]);
    }

    #[tokio::test]
    async fn test_history_limit_applies() {
        let h = Harness::new(happy_extractor(vec![task_json("a", "Ana", &[]), task_json("b", "Ana", &[])]));
        let workflow = ProductManagerWorkflow::builder(h.extractor.clone(), h.tracker.clone(), h.store.clone())
            .tracker_settings(TrackerSettings::new("proj", "team"))
            .options(WorkflowOptions {
                task_history_limit: Some(3),
                ..Default::default()
            })
            .build();
        workflow.run("s1", input(&[])).await;
        workflow.run("s1", input(&[])).await;
        let ctx = SessionContext::load(h.store.as_ref(), "s1").await.unwrap();
        assert_eq!(ctx.task_history.len(), 3);
    }

    #[tokio::test]
    async fn test_low_capacity_alerts_in_notification() {
        let h = Harness::new(happy_extractor(vec![task_json("a", "Ana", &[])]));
        let result = h.workflow().run("s1", input(&[("Ana", 9.0), ("Ben", 10.0)])).await;

        let sent = h.notifier.sent.lock();
        assert_eq!(sent[0].workload_alerts, vec!["Ana: 9hrs remaining".to_string()]);
        assert_eq!(result.output().unwrap().workload_alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_capacity_depletion_option() {
        let h = Harness::new(happy_extractor(vec![task_json("a", "Ana", &[])]));
        let workflow = ProductManagerWorkflow::builder(h.extractor.clone(), h.tracker.clone(), h.store.clone())
            .tracker_settings(TrackerSettings::new("proj", "team"))
            .options(WorkflowOptions {
                deplete_capacity_on_assignment: true,
                ..Default::default()
            })
            .build();
        let result = workflow.run("s1", input(&[("Ana", 12.0)])).await;
        // 12h minus the 6h maximum estimate
        assert_eq!(result.output().unwrap().workload_alerts, vec!["Ana: 6hrs remaining".to_string()]);
        let balancer_input = &h.extractor.inputs_for(WORKLOAD_AGENT)[0];
        assert_eq!(balancer_input["team"][0]["remaining_capacity"], 6.0);
    }

    #[tokio::test]
    async fn test_notifier_failure_is_soft_and_absent_notifier_skips() {
        let h = Harness::with(
            happy_extractor(vec![task_json("a", "Ana", &[])]),
            RecordingTracker::new(),
            RecordingCodeTracker::new(),
            RecordingNotifier::failing(),
        );
        let result = h.workflow().run("s1", input(&[])).await;
        assert!(result.is_degraded());
        assert_eq!(result.soft_failures[0].step, WorkflowStep::Notify);

        let workflow = ProductManagerWorkflow::builder(h.extractor.clone(), h.tracker.clone(), h.store.clone())
            .tracker_settings(TrackerSettings::new("proj", "team"))
            .build();
        let result = workflow.run("s2", input(&[])).await;
        assert_eq!(result.step(WorkflowStep::Notify).unwrap().status, StepStatus::Skipped);
        assert!(!result.is_degraded());
    }

    #[tokio::test]
    async fn test_dependencies_are_linked() {
        let mut deploy = task_json("Deploy", "Ana", &[]);
        deploy["dependencies"] = json!([
            {"task_id": "Build", "dependency_type": "Blocks", "impact_level": "High"},
            {"task_id": "Ghost task", "dependency_type": "Related to", "impact_level": "Low"}
        ]);
        let h = Harness::new(happy_extractor(vec![task_json("Build", "Ana", &[]), deploy]));
        let result = h.workflow().run("s1", input(&[])).await;

        assert!(result.is_completed());
        let links = h.tracker.links.lock();
        assert_eq!(links.len(), 1);
        // Build (ISS-1) blocks Deploy (ISS-2)
        assert_eq!(links[0].0, "ISS-1");
        assert_eq!(links[0].1, "ISS-2");
        assert_eq!(result.step(WorkflowStep::LinkDependencies).unwrap().status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_self_dependency_is_not_linked() {
        let mut build = task_json("Build", "Ana", &[]);
        build["dependencies"] = json!([
            {"task_id": "build", "dependency_type": "Blocks", "impact_level": "High"}
        ]);
        let h = Harness::new(happy_extractor(vec![build]));
        let result = h.workflow().run("s1", input(&[])).await;

        assert!(result.is_completed());
        assert!(h.tracker.links.lock().is_empty());
        assert_eq!(result.step(WorkflowStep::LinkDependencies).unwrap().status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_broken_store_is_soft() {
        let extractor = Arc::new(happy_extractor(vec![task_json("a", "Ana", &[])]));
        let tracker = Arc::new(RecordingTracker::new());
        let workflow = ProductManagerWorkflow::builder(extractor, tracker, Arc::new(BrokenSessionStore))
            .tracker_settings(TrackerSettings::new("proj", "team"))
            .build();
        let result = workflow.run("s1", input(&[])).await;

        assert!(result.is_completed());
        let steps: Vec<_> = result.soft_failures.iter().map(|f| f.step).collect();
        assert_eq!(
            steps,
            vec![WorkflowStep::LoadSession, WorkflowStep::PersistSession, WorkflowStep::PersistSession]
        );
    }

    #[tokio::test]
    async fn test_execute_updates_explicit_context() {
        let h = Harness::new(happy_extractor(vec![task_json("a", "Ana", &[])]));
        let mut ctx = SessionContext::new("explicit");
        let result = h.workflow().execute(&mut ctx, input(&[])).await;
        assert!(result.is_completed());
        assert_eq!(result.session_id, "explicit");
        assert_eq!(ctx.task_history.len(), 1);
        assert!(ctx.meeting_context.is_some());
    }

    #[test]
    fn test_resolve_assignee() {
        let users = HashMap::from([("Ana Lima".to_string(), "u1".to_string())]);
        assert_eq!(resolve_assignee(&users, "Ana Lima"), Some("u1"));
        assert_eq!(resolve_assignee(&users, "ana lima "), Some("u1"));
        assert_eq!(resolve_assignee(&users, "Ben"), None);
    }

    #[test]
    fn test_resolve_assignee_rejects_case_collisions() {
        let users = HashMap::from([
            ("Ana".to_string(), "u1".to_string()),
            ("ANA".to_string(), "u2".to_string()),
        ]);
        assert_eq!(resolve_assignee(&users, "Ana"), Some("u1"));
        assert_eq!(resolve_assignee(&users, "ana"), None);

        let same = HashMap::from([
            ("Ana".to_string(), "u1".to_string()),
            ("ANA".to_string(), "u1".to_string()),
        ]);
        assert_eq!(resolve_assignee(&same, "ana"), Some("u1"));
    }
}
