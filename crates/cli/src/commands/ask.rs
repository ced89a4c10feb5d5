//! Ask command handler.
//!
//! Runs one query through the pipeline and prints the answer, the
//! clarification questions, or a service error.

use crate::commands::build_orchestrator;
use clap::Args;
use grounder_agent::PipelineOutcome;
use grounder_core::{AppConfig, AppError, AppResult};

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Conversation id for follow-up context (default: fresh conversation)
    #[arg(long)]
    pub conversation: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let orchestrator = build_orchestrator(config)?;
        let conversation = self
            .conversation
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let outcome = orchestrator.handle_query(&conversation, &self.query).await?;

        print_outcome(&outcome, self.json)
    }
}

/// Render a pipeline outcome to stdout.
pub(crate) fn print_outcome(outcome: &PipelineOutcome, json: bool) -> AppResult<()> {
    if json {
        let rendered = serde_json::to_string_pretty(outcome)
            .map_err(|e| AppError::Serialization(e.to_string()))?;
        println!("{}", rendered);
        return Ok(());
    }

    match outcome {
        PipelineOutcome::Answer(answer) => {
            println!("{}", answer.text);

            if !answer.citations.is_empty() {
                println!();
                println!("Sources:");
                for citation in &answer.citations {
                    println!("  - {} ({})", citation.title, citation.source_id);
                }
            }

            if answer.degraded {
                tracing::warn!("Answer is degraded (partial or missing evidence)");
            }
        }
        PipelineOutcome::Clarification(request) => {
            println!("I need a little more to go on:");
            for question in &request.questions {
                println!("  - {}", question);
            }
        }
    }

    Ok(())
}
