//! Step bookkeeping for a single run.
//!
//! Every step outcome passes through [`RunLog`], so the audit trail and the
//! soft-failure list cannot drift apart.

use std::fmt::Display;
use std::future::Future;

use super::result::{SoftFailure, StepReport, StepStatus, WorkflowStep};

#[derive(Debug, Default)]
pub struct RunLog {
    steps: Vec<StepReport>,
    soft_failures: Vec<SoftFailure>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&mut self, step: WorkflowStep, detail: Option<String>) {
        self.push(step, StepStatus::Completed, detail);
    }

    pub fn skipped(&mut self, step: WorkflowStep, detail: impl Into<String>) {
        self.push(step, StepStatus::Skipped, Some(detail.into()));
    }

    /// Record a hard failure and return the run's failure reason.
    pub fn hard_failure(&mut self, step: WorkflowStep, reason: impl Into<String>) -> String {
        let reason = reason.into();
        tracing::error!(step = %step, %reason, "workflow step failed, aborting run");
        self.push(step, StepStatus::Failed, Some(reason.clone()));
        reason
    }

    /// Record a failure the run survives.
    pub fn soft_failure(&mut self, step: WorkflowStep, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(step = %step, %reason, "workflow step failed, continuing");
        self.push(step, StepStatus::Failed, Some(reason.clone()));
        self.soft_failures.push(SoftFailure { step, reason });
    }

    /// Await `action`; an error becomes a soft failure and yields `None`.
    ///
    /// `describe` supplies the report detail on success.
    pub async fn best_effort<T, E, F, D>(&mut self, step: WorkflowStep, action: F, describe: D) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
        D: FnOnce(&T) -> Option<String>,
    {
        match action.await {
            Ok(value) => {
                let detail = describe(&value);
                self.completed(step, detail);
                Some(value)
            }
            Err(e) => {
                self.soft_failure(step, e.to_string());
                None
            }
        }
    }

    pub fn into_parts(self) -> (Vec<StepReport>, Vec<SoftFailure>) {
        (self.steps, self.soft_failures)
    }

    fn push(&mut self, step: WorkflowStep, status: StepStatus, detail: Option<String>) {
        self.steps.push(StepReport { step, status, detail });
    }
}
