//! pmflow command line.
//!
//! ```bash
//! pmflow run --notes standup.txt --roster team.yaml --session weekly
//! pmflow session --session weekly
//! ```
//!
//! Configuration comes from the environment, see [`pmflow::workflow::config`].

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pmflow::session::SessionContext;
use pmflow::workflow::{TeamRoster, WorkflowConfig, WorkflowInput};

#[derive(Parser)]
#[command(name = "pmflow", version, about = "Turn meeting notes into tracked, balanced work")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the workflow on a meeting transcript and print the result as JSON
    Run {
        /// File holding the meeting notes
        #[arg(long)]
        notes: PathBuf,
        /// YAML team roster (capacities and tracker user ids)
        #[arg(long)]
        roster: PathBuf,
        /// Session to continue (a new id is generated if omitted)
        #[arg(long)]
        session: Option<String>,
    },
    /// Print the stored context of a session
    Session {
        #[arg(long)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,pmflow=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = WorkflowConfig::from_env().context("invalid configuration")?;

    match cli.cmd {
        Command::Run { notes, roster, session } => {
            let meeting_notes = std::fs::read_to_string(&notes)
                .with_context(|| format!("failed to read {}", notes.display()))?;
            let roster = TeamRoster::load(&roster)?;
            let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let workflow = config.build().await?;
            let input = WorkflowInput {
                meeting_notes,
                external_users: roster.external_users(),
                team_capacity: roster.capacities(),
            };
            let result = workflow.run(&session_id, input).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if let Some(reason) = result.failure_reason() {
                anyhow::bail!("workflow failed: {}", reason);
            }
        }
        Command::Session { session } => {
            let store = config.store.open().await?;
            let ctx = SessionContext::load(store.as_ref(), &session).await?;
            println!("{}", serde_json::to_string_pretty(&ctx)?);
        }
    }
    Ok(())
}
