//! Slack incoming-webhook notifier.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::notifier::{NotificationPayload, Notifier, NotifyError};

/// Posts the run report to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let webhook_url = webhook_url.into();
        if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
            return Err(NotifyError::Config(format!("not a webhook URL: '{}'", webhook_url)));
        }
        Ok(Self {
            webhook_url,
            client: reqwest::Client::new(),
        })
    }

    /// Create from SLACK_WEBHOOK_URL.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SLACK_WEBHOOK_URL").ok()?;
        Self::new(url).ok()
    }

    /// Build the Slack message: one attachment with a field per section.
    pub fn build_payload(payload: &NotificationPayload) -> Value {
        let summary = &payload.summary;

        let mut text = String::new();
        for point in &summary.key_points {
            text.push_str(&format!("• {}\n", point));
        }
        if !summary.decisions.is_empty() {
            text.push_str("\n*Decisions*\n");
            for decision in &summary.decisions {
                text.push_str(&format!("• {}\n", decision));
            }
        }

        let mut fields = Vec::new();

        let task_lines: Vec<String> = payload
            .tasks
            .iter()
            .map(|t| {
                let owner = t.task_assignee.as_deref().unwrap_or("unassigned");
                format!("{} [{}] ({})", t.task_title, t.priority.level, owner)
            })
            .collect();
        fields.push(field(&format!("Tasks ({})", task_lines.len()), &task_lines.join("\n"), false));

        if let Some(issues) = &payload.issues {
            let lines: Vec<String> = issues
                .issues
                .iter()
                .map(|i| match &i.issue_link {
                    Some(link) => format!("<{}|{}>", link, i.issue_title),
                    None => i.issue_title.clone(),
                })
                .collect();
            fields.push(field("Tracker issues", &lines.join("\n"), false));
        }

        if !payload.code_issues.is_empty() {
            let lines: Vec<String> = payload
                .code_issues
                .iter()
                .map(|c| format!("<{}|#{}> {}", c.url, c.number, c.task_title))
                .collect();
            fields.push(field("Code issues", &lines.join("\n"), false));
        }

        if !payload.workload_alerts.is_empty() {
            fields.push(field("Workload alerts", &payload.workload_alerts.join("\n"), false));
        }

        let color = if payload.workload_alerts.is_empty() { "good" } else { "warning" };

        json!({
            "text": format!("Meeting summary: {}", summary.headline()),
            "attachments": [{
                "title": summary.headline(),
                "text": text,
                "color": color,
                "mrkdwn_in": ["text", "fields"],
                "fields": fields,
            }]
        })
    }
}

fn field(title: &str, value: &str, short: bool) -> Value {
    json!({ "title": title, "value": value, "short": short })
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let message = Self::build_payload(payload);
        let response = self.client.post(&self.webhook_url).json(&message).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(NotifyError::Webhook { status, message })
        }
    }
}
