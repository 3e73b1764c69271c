//! Task records produced by the task-generation step.
//!
//! Enumerations serialize with the exact strings the extraction schema
//! advertises ("Not Started", "Required by", ...), so model output can be
//! decoded without any post-processing.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::dates;
use crate::extraction::schema::{enum_schema, ResponseSchema};

/// Tag that routes a task to the code issue tracker.
pub const CODE_TAG: &str = "code";

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Priority level of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub const VALUES: [&'static str; 4] = ["Low", "Medium", "High", "Critical"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence the estimator has in a time estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub const VALUES: [&'static str; 3] = ["Low", "Medium", "High"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// How hard a task is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub const VALUES: [&'static str; 3] = ["Simple", "Moderate", "Complex"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::Moderate => "Moderate",
            Self::Complex => "Complex",
        }
    }
}

/// Lifecycle status of a task.
///
/// The pipeline only ever creates tasks in [`TaskStatus::NotStarted`];
/// transitions happen in the external tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Blocked,
    #[serde(rename = "Ready for Review")]
    ReadyForReview,
    Done,
}

impl TaskStatus {
    pub const VALUES: [&'static str; 5] =
        ["Not Started", "In Progress", "Blocked", "Ready for Review", "Done"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Blocked => "Blocked",
            Self::ReadyForReview => "Ready for Review",
            Self::Done => "Done",
        }
    }
}

/// Kind of relation between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    Blocks,
    #[serde(rename = "Required by")]
    RequiredBy,
    #[serde(rename = "Related to")]
    RelatedTo,
}

impl DependencyType {
    pub const VALUES: [&'static str; 3] = ["Blocks", "Required by", "Related to"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "Blocks",
            Self::RequiredBy => "Required by",
            Self::RelatedTo => "Related to",
        }
    }
}

/// Impact a dependency has on delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub const VALUES: [&'static str; 3] = ["Low", "Medium", "High"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Priority of a task with an optional justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPriority {
    pub level: PriorityLevel,
    #[serde(default)]
    pub reason: Option<String>,
}

impl TaskPriority {
    pub fn new(level: PriorityLevel) -> Self {
        Self { level, reason: None }
    }
}

/// Ranged time estimate for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTimeEstimate {
    pub minimum_hours: f64,
    pub maximum_hours: f64,
    pub confidence_level: ConfidenceLevel,
    #[serde(default)]
    pub factors: Vec<String>,
}

impl TaskTimeEstimate {
    /// Build an estimate, rejecting negative or inverted ranges.
    pub fn new(
        minimum_hours: f64,
        maximum_hours: f64,
        confidence_level: ConfidenceLevel,
    ) -> Result<Self, String> {
        let estimate = Self {
            minimum_hours,
            maximum_hours,
            confidence_level,
            factors: Vec::new(),
        };
        estimate.check()?;
        Ok(estimate)
    }

    /// Check the range invariant: `0 <= minimum_hours <= maximum_hours`.
    pub fn check(&self) -> Result<(), String> {
        if !self.minimum_hours.is_finite() || !self.maximum_hours.is_finite() {
            return Err("estimate hours must be finite".to_string());
        }
        if self.minimum_hours < 0.0 {
            return Err(format!(
                "minimum_hours must not be negative (got {})",
                self.minimum_hours
            ));
        }
        if self.maximum_hours < self.minimum_hours {
            return Err(format!(
                "maximum_hours ({}) is below minimum_hours ({})",
                self.maximum_hours, self.minimum_hours
            ));
        }
        Ok(())
    }
}

/// Directed relation from one task to another.
///
/// `task_id` is whatever reference the model produced, usually the title of
/// another task in the same run. It is never enforced against a real graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub dependency_type: DependencyType,
    pub impact_level: ImpactLevel,
}

/// A unit of work derived from a meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_title: String,
    #[serde(default)]
    pub task_description: Option<String>,
    #[serde(default)]
    pub task_assignee: Option<String>,
    pub priority: TaskPriority,
    #[serde(default, with = "dates::option")]
    pub deadline: Option<DateTime<Utc>>,
    pub time_estimate: TaskTimeEstimate,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    pub complexity: Complexity,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    /// Create a task with the required fields; everything else defaults.
    pub fn new(
        title: impl Into<String>,
        priority: PriorityLevel,
        time_estimate: TaskTimeEstimate,
        complexity: Complexity,
    ) -> Self {
        Self {
            task_title: title.into(),
            task_description: None,
            task_assignee: None,
            priority: TaskPriority::new(priority),
            deadline: None,
            time_estimate,
            tags: Vec::new(),
            dependencies: Vec::new(),
            complexity,
            required_skills: Vec::new(),
            status: TaskStatus::NotStarted,
        }
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.task_assignee = Some(assignee.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependency(mut self, dependency: TaskDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Whether the task should also be filed in the code issue tracker.
    pub fn is_code_task(&self) -> bool {
        self.tags.iter().any(|t| t == CODE_TAG)
    }

    /// Check the task's own invariants.
    pub fn check(&self) -> Result<(), String> {
        if self.task_title.trim().is_empty() {
            return Err("task_title is required".to_string());
        }
        self.time_estimate
            .check()
            .map_err(|e| format!("task '{}': {}", self.task_title, e))
    }
}

/// Wrapper the task-generation agent answers with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    /// Tasks tagged for the code issue tracker.
    pub fn code_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.is_code_task()).collect()
    }

    /// Dependency targets that do not name any task in this list.
    ///
    /// Returned as `(task title, missing target)` pairs in task order.
    pub fn dangling_dependencies(&self) -> Vec<(String, String)> {
        let titles: HashSet<String> = self
            .tasks
            .iter()
            .map(|t| t.task_title.trim().to_lowercase())
            .collect();

        self.tasks
            .iter()
            .flat_map(|task| {
                task.dependencies
                    .iter()
                    .filter(|dep| !titles.contains(&dep.task_id.trim().to_lowercase()))
                    .map(move |dep| (task.task_title.clone(), dep.task_id.clone()))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

impl Task {
    /// JSON schema for a single task object.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_title": {"type": "string", "description": "The title of the task"},
                "task_description": {"type": ["string", "null"], "description": "The description of the task"},
                "task_assignee": {"type": ["string", "null"], "description": "The assignee of the task"},
                "priority": {
                    "type": "object",
                    "description": "Priority of the task",
                    "properties": {
                        "level": enum_schema(&PriorityLevel::VALUES, "Priority level of the task"),
                        "reason": {"type": ["string", "null"], "description": "Reason for the priority level"}
                    },
                    "required": ["level"]
                },
                "deadline": {"type": ["string", "null"], "format": "date-time", "description": "Deadline for the task"},
                "time_estimate": {
                    "type": "object",
                    "description": "Detailed time estimation",
                    "properties": {
                        "minimum_hours": {"type": "number", "description": "Minimum estimated hours"},
                        "maximum_hours": {"type": "number", "description": "Maximum estimated hours"},
                        "confidence_level": enum_schema(&ConfidenceLevel::VALUES, "Confidence in the estimate"),
                        "factors": {"type": "array", "items": {"type": "string"}, "description": "Factors affecting the estimate"}
                    },
                    "required": ["minimum_hours", "maximum_hours", "confidence_level"]
                },
                "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags for categorizing tasks"},
                "dependencies": {
                    "type": "array",
                    "description": "Task dependencies",
                    "items": {
                        "type": "object",
                        "properties": {
                            "task_id": {"type": "string", "description": "ID of the dependent task"},
                            "dependency_type": enum_schema(&DependencyType::VALUES, "Type of dependency"),
                            "impact_level": enum_schema(&ImpactLevel::VALUES, "Impact level of the dependency")
                        },
                        "required": ["task_id", "dependency_type", "impact_level"]
                    }
                },
                "complexity": enum_schema(&Complexity::VALUES, "Task complexity"),
                "required_skills": {"type": "array", "items": {"type": "string"}, "description": "Required skills for the task"},
                "status": enum_schema(&TaskStatus::VALUES, "Current status of the task")
            },
            "required": ["task_title", "priority", "time_estimate", "complexity"]
        })
    }
}

impl ResponseSchema for TaskList {
    fn schema_name() -> &'static str {
        "TaskList"
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "description": "A list of tasks",
                    "items": Task::json_schema()
                }
            },
            "required": ["tasks"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        self.tasks.iter().try_for_each(Task::check)
    }
}
