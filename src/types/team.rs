//! Team members and the workload opinion returned by the balancer agent.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::extraction::schema::ResponseSchema;

/// Role assigned to members built from a bare capacity map.
pub const DEFAULT_ROLE: &str = "Team Member";

/// A capacity-bearing resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub role: String,
    /// Number of tasks currently assigned.
    #[serde(default)]
    pub current_tasks: u32,
    /// Weekly capacity in hours.
    pub capacity: f64,
    /// Remaining capacity in hours.
    pub remaining_capacity: f64,
}

impl TeamMember {
    /// A member with nothing booked yet.
    pub fn new(name: impl Into<String>, role: impl Into<String>, capacity: f64) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            current_tasks: 0,
            capacity,
            remaining_capacity: capacity,
        }
    }

    pub fn check(&self) -> Result<(), String> {
        if self.remaining_capacity > self.capacity {
            return Err(format!(
                "{}: remaining capacity {}h exceeds capacity {}h",
                self.name, self.remaining_capacity, self.capacity
            ));
        }
        Ok(())
    }

    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Name of the team member"},
                "role": {"type": "string", "description": "Role of the team member"},
                "current_tasks": {"type": "integer", "description": "Number of current tasks"},
                "capacity": {"type": "number", "description": "Weekly capacity in hours"},
                "remaining_capacity": {"type": "number", "description": "Remaining capacity in hours"}
            },
            "required": ["name", "role", "capacity", "remaining_capacity"]
        })
    }
}

/// Suggested allocation produced by the workload agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamWorkload {
    pub team: Vec<TeamMember>,
}

impl ResponseSchema for TeamWorkload {
    fn schema_name() -> &'static str {
        "TeamWorkload"
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "team": {
                    "type": "array",
                    "description": "Team members with suggested workload",
                    "items": TeamMember::json_schema()
                }
            },
            "required": ["team"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        self.team.iter().try_for_each(TeamMember::check)
    }

    fn is_empty_answer(&self) -> bool {
        self.team.is_empty()
    }
}
