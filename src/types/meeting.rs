//! Structured meeting summary produced by the summary step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::dates;
use super::task::Task;
use crate::extraction::schema::ResponseSchema;

/// Continuity signals carried from one meeting to the next.
///
/// This is the "prior context" blob stored in the session after every
/// successful summary and fed back into the next summary request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingContext {
    /// Current phase of the project.
    #[serde(default)]
    pub project_phase: Option<String>,
    /// Topics that appear frequently.
    #[serde(default)]
    pub recurring_topics: Vec<String>,
    /// Identified blockers or challenges.
    #[serde(default)]
    pub blockers: Vec<String>,
    /// Items requiring follow-up.
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

impl MeetingContext {
    pub fn is_empty(&self) -> bool {
        self.project_phase.is_none()
            && self.recurring_topics.is_empty()
            && self.blockers.is_empty()
            && self.follow_ups.is_empty()
    }

    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "description": "Additional meeting context",
            "properties": {
                "project_phase": {"type": ["string", "null"], "description": "Current phase of the project"},
                "recurring_topics": {"type": "array", "items": {"type": "string"}, "description": "Topics that appear frequently"},
                "blockers": {"type": "array", "items": {"type": "string"}, "description": "Identified blockers or challenges"},
                "follow_ups": {"type": "array", "items": {"type": "string"}, "description": "Items requiring follow-up"}
            }
        })
    }
}

/// Structured distillation of a meeting transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingSummary {
    #[serde(with = "dates")]
    pub date: DateTime<Utc>,
    pub attendees: Vec<String>,
    pub key_points: Vec<String>,
    pub action_items: Vec<Task>,
    pub decisions: Vec<String>,
    #[serde(default)]
    pub context: MeetingContext,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Standup, planning, review, ...
    #[serde(default)]
    pub meeting_type: Option<String>,
}

impl MeetingSummary {
    /// One-line headline used in notifications and logs.
    pub fn headline(&self) -> String {
        let kind = self.meeting_type.as_deref().unwrap_or("Meeting");
        format!("{} ({})", kind, self.date.format("%Y-%m-%d"))
    }
}

impl ResponseSchema for MeetingSummary {
    fn schema_name() -> &'static str {
        "MeetingSummary"
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "format": "date-time", "description": "Date of the meeting"},
                "attendees": {"type": "array", "items": {"type": "string"}, "description": "List of attendees"},
                "key_points": {"type": "array", "items": {"type": "string"}, "description": "Key points discussed"},
                "action_items": {"type": "array", "items": Task::json_schema(), "description": "Action items from the meeting"},
                "decisions": {"type": "array", "items": {"type": "string"}, "description": "Key decisions made"},
                "context": MeetingContext::json_schema(),
                "duration_minutes": {"type": ["integer", "null"], "description": "Duration of the meeting"},
                "meeting_type": {"type": ["string", "null"], "description": "Type of meeting (standup, planning, review, etc.)"}
            },
            "required": ["date", "attendees", "key_points", "action_items", "decisions"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.attendees.is_empty() {
            log::warn!("Meeting summary for {} lists no attendees", self.headline());
        }
        self.action_items.iter().try_for_each(Task::check)
    }
}
