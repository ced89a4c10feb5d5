//! Configuration management for the Grounder pipeline.
//!
//! This module handles loading and merging configuration from multiple
//! sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (grounder.yaml)
//!
//! Every numeric policy knob of the pipeline (confidence cutoffs, deadlines,
//! merge weights, truncation limits) lives in [`PipelinePolicy`]; stages
//! read policy from here, never from literals.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// This struct holds all global configuration options that affect
/// pipeline behavior across commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider (e.g., "ollama", "openai", "claude")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// Custom endpoint for the LLM provider
    pub endpoint: Option<String>,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Search-provider connection settings
    pub search: SearchConfig,

    /// Pipeline policy constants
    pub policy: PipelinePolicy,
}

/// Connection settings for the upstream search API that backs the
/// web/shopping/hotels provider adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// Search API endpoint
    pub endpoint: String,

    /// Environment variable holding the search API key
    pub api_key_env: String,

    /// Interface language passed to the search API
    pub locale: String,

    /// Country code passed to the search API
    pub country: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://serpapi.com/search.json".to_string(),
            api_key_env: "SERPAPI_KEY".to_string(),
            locale: "en".to_string(),
            country: "us".to_string(),
        }
    }
}

impl SearchConfig {
    /// Resolve the search API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }
}

/// Policy constants governing pipeline behavior.
///
/// These are cost/quality trade-off knobs, not correctness parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelinePolicy {
    /// Intent confidence below this triggers the clarification gate
    pub clarification_confidence: f32,

    /// Deadline for a single provider retrieval call, in milliseconds
    pub provider_deadline_ms: u64,

    /// Deadline for a single language-model call, in milliseconds
    pub llm_deadline_ms: u64,

    /// End-to-end request deadline, in milliseconds
    pub request_deadline_ms: u64,

    /// Weight of the provider-local relevance score in the merged score
    pub local_score_weight: f32,

    /// Weight of the provider priority in the merged score
    pub priority_weight: f32,

    /// Maximum chunks kept after merge/rerank
    pub top_k: usize,

    /// Character budget for the synthesis grounding context
    pub context_budget_chars: usize,

    /// Time-to-live for cached retrieval results, in seconds
    pub cache_ttl_secs: u64,

    /// Enable the critique/refinement loop
    pub deep_mode: bool,

    /// Provider trust order: higher values outrank lower on score ties
    pub provider_priorities: HashMap<String, u32>,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        let mut provider_priorities = HashMap::new();
        provider_priorities.insert("shopping".to_string(), 3);
        provider_priorities.insert("hotels".to_string(), 2);
        provider_priorities.insert("web".to_string(), 1);

        Self {
            clarification_confidence: 0.6,
            provider_deadline_ms: 4_000,
            llm_deadline_ms: 8_000,
            request_deadline_ms: 20_000,
            local_score_weight: 0.7,
            priority_weight: 0.3,
            top_k: 20,
            context_budget_chars: 6_000,
            cache_ttl_secs: 300,
            deep_mode: false,
            provider_priorities,
        }
    }
}

impl PipelinePolicy {
    /// Deadline for a single provider call.
    pub fn provider_deadline(&self) -> Duration {
        Duration::from_millis(self.provider_deadline_ms)
    }

    /// Deadline for a single language-model call.
    pub fn llm_deadline(&self) -> Duration {
        Duration::from_millis(self.llm_deadline_ms)
    }

    /// End-to-end request deadline.
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    /// Cache entry time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Trust priority for a provider id. Unlisted providers rank lowest.
    pub fn priority_for(&self, provider_id: &str) -> u32 {
        self.provider_priorities
            .get(provider_id)
            .copied()
            .unwrap_or(0)
    }

    /// Highest configured priority, used to normalize priority into [0, 1].
    pub fn max_priority(&self) -> u32 {
        self.provider_priorities
            .values()
            .copied()
            .max()
            .unwrap_or(1)
            .max(1)
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileConfig>,
    search: Option<SearchConfig>,
    policy: Option<PipelinePolicy>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmFileConfig {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            search: SearchConfig::default(),
            policy: PipelinePolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `GROUNDER_CONFIG`: Path to config file
    /// - `GROUNDER_PROVIDER`: LLM provider
    /// - `GROUNDER_MODEL`: Model identifier
    /// - `GROUNDER_ENDPOINT`: LLM endpoint URL
    /// - `GROUNDER_API_KEY`: API key for the LLM provider
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(config_file) = std::env::var("GROUNDER_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        // Load from YAML config file if it exists
        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            PathBuf::from("grounder.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("GROUNDER_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("GROUNDER_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("GROUNDER_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        config.api_key = std::env::var("GROUNDER_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if let Some(endpoint) = llm.endpoint {
                result.endpoint = Some(endpoint);
            }
            if let Some(api_key_env) = llm.api_key_env {
                if let Ok(key) = std::env::var(&api_key_env) {
                    result.api_key = Some(key);
                }
            }
        }

        if let Some(search) = config_file.search {
            result.search = search;
        }

        if let Some(policy) = config_file.policy {
            result.policy = policy;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        deep: bool,
    ) -> Self {
        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if deep {
            self.policy.deep_mode = true;
        }

        self
    }

    /// Validate configuration for the active provider and policy.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;
        let known_providers = ["ollama", "openai", "claude"];

        if !known_providers.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                known_providers.join(", ")
            )));
        }

        if matches!(provider.as_str(), "openai" | "claude") && self.api_key.is_none() {
            return Err(AppError::Config(format!(
                "Provider '{}' requires an API key (set GROUNDER_API_KEY)",
                provider
            )));
        }

        let weight_sum = self.policy.local_score_weight + self.policy.priority_weight;
        if !(0.99..=1.01).contains(&weight_sum) {
            return Err(AppError::Config(format!(
                "Merge weights must sum to 1.0, got {:.2}",
                weight_sum
            )));
        }

        if self.policy.top_k == 0 {
            return Err(AppError::Config(
                "topK must be at least 1".to_string(),
            ));
        }

        if self.policy.request_deadline_ms < self.policy.provider_deadline_ms {
            return Err(AppError::Config(
                "Request deadline must not be shorter than the provider deadline".to_string(),
            ));
        }

        Ok(())
    }
}
