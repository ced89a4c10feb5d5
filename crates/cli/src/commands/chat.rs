//! Chat command handler.
//!
//! A line-oriented multi-turn loop over stdin. All turns share one
//! conversation id, so follow-up queries resolve against prior turns
//! ("hotels in bangkok" → "only 5 star hotels").

use crate::commands::{ask::print_outcome, build_orchestrator};
use clap::Args;
use grounder_core::{AppConfig, AppResult};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Multi-turn conversation on stdin
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Resume an existing conversation id
    #[arg(long)]
    pub conversation: Option<String>,

    /// Output each answer as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let orchestrator = build_orchestrator(config)?;
        let conversation = self
            .conversation
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        eprintln!("Conversation {} (empty line or Ctrl-D to exit)", conversation);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            let query = line.trim();
            if query.is_empty() {
                break;
            }

            match orchestrator.handle_query(&conversation, query).await {
                Ok(outcome) => print_outcome(&outcome, self.json)?,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!("Turn failed: {}", err);
                    eprintln!("Sorry, that one failed: {}", err);
                }
            }
        }

        Ok(())
    }
}
