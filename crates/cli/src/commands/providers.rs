//! Providers command handler.
//!
//! Lists the registered retrieval providers, their capability sets, and
//! their configured trust priorities.

use crate::commands::build_registry;
use clap::Args;
use grounder_core::{AppConfig, AppError, AppResult};
use grounder_retrieval::{Intent, Provider};

const ALL_INTENTS: &[Intent] = &[
    Intent::Shopping,
    Intent::Hotel,
    Intent::Flight,
    Intent::Movie,
    Intent::Place,
    Intent::Generic,
];

/// List retrieval providers and their capabilities
#[derive(Args, Debug)]
pub struct ProvidersCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ProvidersCommand {
    /// Execute the providers command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let registry = build_registry(config);

        let rows: Vec<(String, Vec<&'static str>, u32)> = registry
            .ids()
            .into_iter()
            .filter_map(|id| registry.get(&id).map(|provider| (id, provider)))
            .map(|(id, provider)| {
                let intents: Vec<&'static str> = ALL_INTENTS
                    .iter()
                    .filter(|intent| provider.supports(**intent))
                    .map(|intent| intent.as_str())
                    .collect();
                let priority = config.policy.priority_for(&id);
                (id, intents, priority)
            })
            .collect();

        if self.json {
            let rendered = serde_json::to_string_pretty(
                &rows
                    .iter()
                    .map(|(id, intents, priority)| {
                        serde_json::json!({
                            "id": id,
                            "intents": intents,
                            "priority": priority,
                        })
                    })
                    .collect::<Vec<_>>(),
            )
            .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", rendered);
            return Ok(());
        }

        for (id, intents, priority) in rows {
            println!("{:<10} priority {:<2} intents: {}", id, priority, intents.join(", "));
        }

        Ok(())
    }
}
