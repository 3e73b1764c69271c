//! Clients for the systems a run writes to.
//!
//! Each concern is a trait seam ([`IssueTracker`], [`CodeIssueTracker`],
//! [`Notifier`]) with one HTTP implementation next to it.

pub mod code_issues;
pub mod github;
pub mod linear;
pub mod notifier;
pub mod slack;
pub mod tracker;

pub use code_issues::{CodeIssueError, CodeIssueTracker, CodeRepository};
pub use github::GitHubIssueTracker;
pub use linear::LinearTracker;
pub use notifier::{NotificationPayload, Notifier, NotifyError};
pub use slack::SlackNotifier;
pub use tracker::{CreatedIssue, IssueRelation, IssueTracker, PlannedLink, TrackerError};
