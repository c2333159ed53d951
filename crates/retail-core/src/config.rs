//! Configuration management
//!
//! Settings are read in the following priority order:
//! 1. Environment variables
//! 2. `retail-gateway.toml`
//! 3. Default values
//!
//! `${VAR_NAME}` inside the TOML file is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::llm::ModelProvider;
use crate::Error;

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "retail-gateway.toml";

/// Text-generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (empty means no remote provider is configured)
    #[serde(default)]
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Provider the generator talks to
    #[serde(default)]
    pub provider: ModelProvider,

    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            provider: ModelProvider::default(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Whether a remote provider can be used
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Orchestrator tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Messages kept per conversation (oldest evicted first)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Recent user/assistant turns replayed to the generator
    #[serde(default = "default_prompt_history")]
    pub prompt_history: usize,

    /// Completed tasks kept per agent (oldest evicted first)
    #[serde(default = "default_completed_task_retention")]
    pub completed_task_retention: usize,

    /// Idle time after which a conversation is evicted (0 = never)
    #[serde(default = "default_context_ttl_secs")]
    pub context_ttl_secs: u64,

    /// How often the idle-conversation sweeper runs
    #[serde(default = "default_context_sweep_interval_secs")]
    pub context_sweep_interval_secs: u64,

    /// Upper bound on live conversations (0 = unbounded)
    #[serde(default = "default_max_contexts")]
    pub max_contexts: usize,

    /// Snippets requested from the knowledge base per lookup
    #[serde(default = "default_knowledge_results")]
    pub knowledge_results: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            prompt_history: default_prompt_history(),
            completed_task_retention: default_completed_task_retention(),
            context_ttl_secs: default_context_ttl_secs(),
            context_sweep_interval_secs: default_context_sweep_interval_secs(),
            max_contexts: default_max_contexts(),
            knowledge_results: default_knowledge_results(),
        }
    }
}

/// Knowledge-retrieval configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Path to the SQLite knowledge database; `None` disables retrieval
    pub db_path: Option<String>,
}

/// Main configuration for retail-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Additional providers (`[[providers]]`), reachable through an agent's
    /// provider hint
    #[serde(default)]
    pub providers: Vec<LlmConfig>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_history_limit() -> usize {
    50
}

fn default_prompt_history() -> usize {
    10
}

fn default_completed_task_retention() -> usize {
    100
}

fn default_context_ttl_secs() -> u64 {
    86_400
}

fn default_context_sweep_interval_secs() -> u64 {
    300
}

fn default_max_contexts() -> usize {
    10_000
}

fn default_knowledge_results() -> usize {
    5
}

impl Config {
    /// Expand `${VAR_NAME}` occurrences with environment values.
    ///
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse a TOML document (after `${VAR}` expansion)
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load from `./retail-gateway.toml` if present, otherwise from the environment
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables over defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Override settings with environment variables that are set and non-empty
    fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_var("LLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = non_empty_var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(provider) = non_empty_var("LLM_PROVIDER") {
            match provider.parse() {
                Ok(p) => self.llm.provider = p,
                Err(e) => tracing::warn!("Ignoring LLM_PROVIDER: {}", e),
            }
        }
        if let Some(base_url) = non_empty_var("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(secs) = parsed_var("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = secs;
        }

        for provider in ModelProvider::ALL {
            if let Some(key) = non_empty_var(provider.api_key_var()) {
                self.set_provider_key(provider, key);
            }
        }

        if let Some(limit) = parsed_var("HISTORY_LIMIT") {
            self.orchestrator.history_limit = limit;
        }
        if let Some(ttl) = parsed_var("CONTEXT_TTL_SECS") {
            self.orchestrator.context_ttl_secs = ttl;
        }
        if let Some(max) = parsed_var("MAX_CONTEXTS") {
            self.orchestrator.max_contexts = max;
        }

        if let Some(path) = non_empty_var("KNOWLEDGE_DB_PATH") {
            self.knowledge.db_path = Some(path);
        }
    }
}

impl Config {
    /// Give `provider` an API key, adding a provider entry if none exists
    fn set_provider_key(&mut self, provider: ModelProvider, key: String) {
        if self.llm.provider == provider {
            if !self.llm.has_credentials() {
                self.llm.api_key = key;
            }
            return;
        }

        match self.providers.iter_mut().find(|p| p.provider == provider) {
            Some(existing) => existing.api_key = key,
            None => self.providers.push(LlmConfig {
                api_key: key,
                model: provider.default_model().to_string(),
                provider,
                ..LlmConfig::default()
            }),
        }
    }

    /// Every provider with credentials, primary first, one entry per provider
    pub fn provider_configs(&self) -> Vec<LlmConfig> {
        let mut configs: Vec<LlmConfig> = Vec::new();
        for config in std::iter::once(&self.llm).chain(&self.providers) {
            if config.has_credentials() && !configs.iter().any(|c| c.provider == config.provider) {
                configs.push(config.clone());
            }
        }
        configs
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    non_empty_var(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_llm_config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.provider, ModelProvider::OpenAi);
        assert!(!config.has_credentials());
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_orchestrator_config_default() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.prompt_history, 10);
        assert_eq!(config.completed_task_retention, 100);
        assert_eq!(config.context_ttl_secs, 86_400);
        assert_eq!(config.knowledge_results, 5);
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("RETAIL_GATEWAY_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${RETAIL_GATEWAY_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        let result = Config::expand_env_vars("prefix_${RETAIL_GATEWAY_UNSET_VAR}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("RETAIL_GATEWAY_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        assert_eq!(Config::expand_env_vars("no_vars_here"), "no_vars_here");
        assert_eq!(Config::expand_env_vars("${}_content"), "_content");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[llm]
provider = "deepseek"
model = "deepseek-chat"
api_key = "test_key"
base_url = "https://api.deepseek.com"

[orchestrator]
history_limit = 20
context_ttl_secs = 0

[knowledge]
db_path = "/tmp/kb.db"
"#;

        let config = Config::from_toml_str(toml_content).unwrap();
        assert_eq!(config.llm.provider, ModelProvider::DeepSeek);
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.llm.api_key, "test_key");
        assert_eq!(config.orchestrator.history_limit, 20);
        assert_eq!(config.orchestrator.context_ttl_secs, 0);
        // untouched fields keep their defaults
        assert_eq!(config.orchestrator.prompt_history, 10);
        assert_eq!(config.knowledge.db_path.as_deref(), Some("/tmp/kb.db"));
    }

    #[test]
    fn test_additional_providers() {
        let toml_content = r#"
[llm]
provider = "openai"
api_key = "sk-primary"

[[providers]]
provider = "anthropic"
model = "claude-3-5-haiku-latest"
api_key = "sk-ant"

[[providers]]
provider = "chatglm"

[[providers]]
provider = "openai"
api_key = "sk-shadowed"
"#;

        let config = Config::from_toml_str(toml_content).unwrap();
        let configs = config.provider_configs();
        let providers: Vec<_> = configs.iter().map(|c| c.provider).collect();
        // chatglm has no key, the second openai entry is shadowed by [llm]
        assert_eq!(providers, vec![ModelProvider::OpenAi, ModelProvider::Anthropic]);
        assert_eq!(configs[0].api_key, "sk-primary");
        assert_eq!(configs[1].model, "claude-3-5-haiku-latest");
    }

    #[test]
    fn test_set_provider_key() {
        let mut config = Config::default();
        config.set_provider_key(ModelProvider::OpenAi, "sk-openai".to_string());
        config.set_provider_key(ModelProvider::DeepSeek, "sk-deepseek".to_string());
        config.set_provider_key(ModelProvider::DeepSeek, "sk-rotated".to_string());

        assert_eq!(config.llm.api_key, "sk-openai");
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].api_key, "sk-rotated");
        assert_eq!(config.providers[0].model, "deepseek-chat");

        // an explicit LLM_API_KEY is not replaced by the per-provider one
        config.set_provider_key(ModelProvider::OpenAi, "sk-other".to_string());
        assert_eq!(config.llm.api_key, "sk-openai");
        assert!(Config::default().provider_configs().is_empty());
    }

    #[test]
    fn test_toml_config_rejects_unknown_provider() {
        let result = Config::from_toml_str("[llm]\nprovider = \"carrier-pigeon\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\nmax_contexts = 7").unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.orchestrator.max_contexts, 7);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::from_toml_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
