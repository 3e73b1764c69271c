//! Environment-driven configuration and the team roster.
//!
//! # Environment Variables
//!
//! - `LINEAR_PROJECT_ID`, `LINEAR_TEAM_ID`: tracker identifiers
//! - `LINEAR_API_KEY`: tracker credential
//! - `GITHUB_REPO`: `owner/name` for code issues
//! - `GITHUB_TOKEN` / `GH_TOKEN`: code tracker credential
//! - `SLACK_WEBHOOK_URL`: notifier endpoint (optional)
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `PMFLOW_MODEL`: extraction model
//! - `PMFLOW_STORE`: "memory", "sqlite" or "postgres". When unset, a
//!   database URL selects postgres and sqlite is used otherwise.
//! - `PMFLOW_SQLITE_PATH`: SQLite file (default: `pmflow_sessions.db`)
//! - `DATABASE_URL` / `DB_URL`: PostgreSQL connection string
//! - `PMFLOW_DEPLETE_CAPACITY`: debit assigned estimates from the ledger
//! - `PMFLOW_TASK_HISTORY_LIMIT`: keep only the newest N history entries

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::orchestrator::ProductManagerWorkflow;
use crate::extraction::LlmExtractor;
use crate::integrations::{GitHubIssueTracker, LinearTracker, SlackNotifier};
use crate::llms::providers::openai::{OpenAICompletion, DEFAULT_MODEL};
use crate::session::sqlite::DEFAULT_SQLITE_PATH;
use crate::session::{InMemorySessionStore, SessionStore, SqliteSessionStore};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not set")]
    Missing { var: &'static str },

    #[error("{var}='{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read roster {path}: {source}")]
    RosterIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid roster: {0}")]
    Roster(#[from] serde_yaml::Error),

    #[error("Session store: {0}")]
    Store(#[from] crate::session::SessionStoreError),
}

/// Where session context lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite { path: String },
    Postgres { url: String },
}

impl StoreBackend {
    pub async fn open(&self) -> Result<Arc<dyn SessionStore>, ConfigError> {
        match self {
            Self::Memory => Ok(Arc::new(InMemorySessionStore::new())),
            Self::Sqlite { path } => Ok(Arc::new(SqliteSessionStore::open(path.clone())?)),
            #[cfg(feature = "postgres")]
            Self::Postgres { url } => Ok(Arc::new(crate::session::PgSessionStore::connect(url).await?)),
            #[cfg(not(feature = "postgres"))]
            Self::Postgres { .. } => Err(ConfigError::Invalid {
                var: "PMFLOW_STORE",
                value: "postgres".into(),
                reason: "built without the postgres feature".into(),
            }),
        }
    }
}

/// Identifiers the tracker step needs; both must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    pub project_id: Option<String>,
    pub team_id: Option<String>,
}

impl TrackerSettings {
    pub fn new(project_id: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            team_id: Some(team_id.into()),
        }
    }

    /// `(project_id, team_id)` when both are set and non-blank.
    pub fn ids(&self) -> Option<(&str, &str)> {
        let project = self.project_id.as_deref().filter(|s| !s.trim().is_empty())?;
        let team = self.team_id.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((project, team))
    }
}

/// Behavioural switches for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Debit each assigned task's maximum estimate from its assignee.
    #[serde(default)]
    pub deplete_capacity_on_assignment: bool,
    /// Keep only this many of the newest task history entries.
    #[serde(default)]
    pub task_history_limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowConfig {
    pub tracker: TrackerSettings,
    pub linear_api_key: Option<String>,
    pub code_repository: Option<String>,
    pub github_token: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: String,
    pub store: StoreBackend,
    pub options: WorkflowOptions,
}

impl WorkflowConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").or_else(|| get("DB_URL"));
        let sqlite = || StoreBackend::Sqlite {
            path: get("PMFLOW_SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
        };

        let store = match get("PMFLOW_STORE").as_deref().map(str::to_lowercase).as_deref() {
            None => match database_url {
                Some(url) => StoreBackend::Postgres { url },
                None => sqlite(),
            },
            Some("memory") => StoreBackend::Memory,
            Some("sqlite") => sqlite(),
            Some("postgres") => StoreBackend::Postgres {
                url: database_url.ok_or(ConfigError::Missing { var: "DATABASE_URL" })?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "PMFLOW_STORE",
                    value: other.to_string(),
                    reason: "expected memory, sqlite or postgres".into(),
                })
            }
        };

        let deplete = match get("PMFLOW_DEPLETE_CAPACITY") {
            None => false,
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Invalid {
                var: "PMFLOW_DEPLETE_CAPACITY",
                value: v.clone(),
                reason: "expected true or false".into(),
            })?,
        };

        let history_limit = match get("PMFLOW_TASK_HISTORY_LIMIT") {
            None => None,
            Some(v) => Some(v.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                var: "PMFLOW_TASK_HISTORY_LIMIT",
                value: v.clone(),
                reason: e.to_string(),
            })?),
        };

        Ok(Self {
            tracker: TrackerSettings {
                project_id: get("LINEAR_PROJECT_ID"),
                team_id: get("LINEAR_TEAM_ID"),
            },
            linear_api_key: get("LINEAR_API_KEY"),
            code_repository: get("GITHUB_REPO"),
            github_token: get("GITHUB_TOKEN").or_else(|| get("GH_TOKEN")),
            slack_webhook_url: get("SLACK_WEBHOOK_URL"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            model: get("PMFLOW_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            store,
            options: WorkflowOptions {
                deplete_capacity_on_assignment: deplete,
                task_history_limit: history_limit,
            },
        })
    }

    /// Assemble the production workflow from this configuration.
    ///
    /// The model and tracker credentials are required. The code tracker
    /// and notifier are attached only when configured.
    pub async fn build(&self) -> Result<ProductManagerWorkflow, ConfigError> {
        let api_key = self
            .openai_api_key
            .clone()
            .ok_or(ConfigError::Missing { var: "OPENAI_API_KEY" })?;
        let llm = OpenAICompletion::new(self.model.clone(), Some(api_key), self.openai_base_url.clone());
        let extractor = Arc::new(LlmExtractor::new(Arc::new(llm)));

        let linear_key = self
            .linear_api_key
            .clone()
            .ok_or(ConfigError::Missing { var: "LINEAR_API_KEY" })?;
        let tracker = Arc::new(LinearTracker::new(linear_key));

        let store = self.store.open().await?;

        let mut builder = ProductManagerWorkflow::builder(extractor, tracker, store)
            .tracker_settings(self.tracker.clone())
            .options(self.options.clone());

        if let Some(repo) = &self.code_repository {
            builder = builder.code_repository(repo.clone());
        }
        if let Some(token) = &self.github_token {
            builder = builder.code_tracker(Arc::new(GitHubIssueTracker::new(token.clone())));
        }
        if let Some(url) = &self.slack_webhook_url {
            let notifier = SlackNotifier::new(url.clone()).map_err(|e| ConfigError::Invalid {
                var: "SLACK_WEBHOOK_URL",
                value: url.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.notifier(Arc::new(notifier));
        }

        Ok(builder.build())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Team roster
// ---------------------------------------------------------------------------

/// One person the workflow can assign work to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterMember {
    pub name: String,
    /// Weekly capacity in hours.
    pub capacity: f64,
    /// User id in the issue tracker, used for assignment.
    #[serde(default)]
    pub tracker_user_id: Option<String>,
}

/// Team roster, usually loaded from YAML:
///
/// ```yaml
/// members:
///   - name: Ana
///     capacity: 32
///     tracker_user_id: 7f1c...
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRoster {
    #[serde(default)]
    pub members: Vec<RosterMember>,
}

impl TeamRoster {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::RosterIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn capacities(&self) -> BTreeMap<String, f64> {
        self.members.iter().map(|m| (m.name.clone(), m.capacity)).collect()
    }

    /// Member name -> tracker user id, for members that have one.
    pub fn external_users(&self) -> HashMap<String, String> {
        self.members
            .iter()
            .filter_map(|m| m.tracker_user_id.clone().map(|id| (m.name.clone(), id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(
            config.store,
            StoreBackend::Sqlite {
                path: DEFAULT_SQLITE_PATH.into()
            }
        );
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.tracker.ids().is_none());
        assert_eq!(config.options, WorkflowOptions::default());
    }

    #[test]
    fn test_full_environment() {
        let config = WorkflowConfig::from_lookup(lookup(&[
            ("LINEAR_PROJECT_ID", "proj"),
            ("LINEAR_TEAM_ID", "team"),
            ("GH_TOKEN", "gh"),
            ("PMFLOW_STORE", "sqlite"),
            ("PMFLOW_DEPLETE_CAPACITY", "yes"),
            ("PMFLOW_TASK_HISTORY_LIMIT", "50"),
        ]))
        .unwrap();
        assert_eq!(config.tracker.ids(), Some(("proj", "team")));
        assert_eq!(config.github_token.as_deref(), Some("gh"));
        assert_eq!(
            config.store,
            StoreBackend::Sqlite {
                path: DEFAULT_SQLITE_PATH.into()
            }
        );
        assert!(config.options.deplete_capacity_on_assignment);
        assert_eq!(config.options.task_history_limit, Some(50));
    }

    #[test]
    fn test_database_url_selects_postgres() {
        let config = WorkflowConfig::from_lookup(lookup(&[("DATABASE_URL", "postgresql://pm@db/pmflow")])).unwrap();
        assert_eq!(
            config.store,
            StoreBackend::Postgres {
                url: "postgresql://pm@db/pmflow".into()
            }
        );

        let config = WorkflowConfig::from_lookup(lookup(&[("DB_URL", "postgresql://pm@db/alt")])).unwrap();
        assert!(matches!(config.store, StoreBackend::Postgres { .. }));

        let config = WorkflowConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://pm@db/pmflow"),
            ("PMFLOW_STORE", "memory"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
    }

    #[test]
    fn test_blank_tracker_ids_count_as_missing() {
        let config =
            WorkflowConfig::from_lookup(lookup(&[("LINEAR_PROJECT_ID", "proj"), ("LINEAR_TEAM_ID", "  ")])).unwrap();
        assert!(config.tracker.ids().is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            WorkflowConfig::from_lookup(lookup(&[("PMFLOW_STORE", "redis")])),
            Err(ConfigError::Invalid { var: "PMFLOW_STORE", .. })
        ));
        assert!(matches!(
            WorkflowConfig::from_lookup(lookup(&[("PMFLOW_TASK_HISTORY_LIMIT", "many")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            WorkflowConfig::from_lookup(lookup(&[("PMFLOW_STORE", "postgres")])),
            Err(ConfigError::Missing { var: "DATABASE_URL" })
        ));
    }

    #[tokio::test]
    async fn test_build_requires_model_key() {
        let config = WorkflowConfig::from_lookup(lookup(&[("LINEAR_API_KEY", "lin")])).unwrap();
        assert!(matches!(
            config.build().await,
            Err(ConfigError::Missing { var: "OPENAI_API_KEY" })
        ));
    }

    #[tokio::test]
    async fn test_build_with_minimal_credentials() {
        let config = WorkflowConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk"),
            ("LINEAR_API_KEY", "lin"),
            ("SLACK_WEBHOOK_URL", "https://hooks.slack.test/x"),
            ("PMFLOW_STORE", "memory"),
        ]))
        .unwrap();
        let workflow = config.build().await.unwrap();
        assert!(workflow.has_notifier());
        assert!(!workflow.has_code_tracker());
    }

    #[test]
    fn test_roster_from_yaml_file() {
        use std::io::Write;
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "members:\n  - name: Ana\n    capacity: 32\n    tracker_user_id: u-ana\n  - name: Ben\n    capacity: 8.5\n"
        )
        .unwrap();

        let roster = TeamRoster::load(file.path()).unwrap();
        assert_eq!(roster.capacities().get("Ben"), Some(&8.5));
        let users = roster.external_users();
        assert_eq!(users.get("Ana").map(String::as_str), Some("u-ana"));
        assert!(!users.contains_key("Ben"));
    }

    #[test]
    fn test_roster_missing_file() {
        assert!(matches!(
            TeamRoster::load("/definitely/not/here.yaml"),
            Err(ConfigError::RosterIo { .. })
        ));
    }
}
