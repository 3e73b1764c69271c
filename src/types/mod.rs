//! Typed records flowing between workflow steps.

pub mod dates;
pub mod issue;
pub mod meeting;
pub mod task;
pub mod team;

pub use issue::{CodeIssue, TrackerIssue, TrackerIssueList};
pub use meeting::{MeetingContext, MeetingSummary};
pub use task::{
    Complexity, ConfidenceLevel, DependencyType, ImpactLevel, PriorityLevel, Task,
    TaskDependency, TaskList, TaskPriority, TaskStatus, TaskTimeEstimate, CODE_TAG,
};
pub use team::{TeamMember, TeamWorkload, DEFAULT_ROLE};
