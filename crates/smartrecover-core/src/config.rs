//! Layered configuration for SmartRecover.
//!
//! Precedence, highest first: environment variables, the YAML config file,
//! built-in defaults. Unknown top-level keys are rejected; unknown keys
//! inside a recognized section are collected and logged as warnings.
//!
//! Connector sections are tagged records: the `type`/`source` field selects
//! the variant and the variant-specific sub-section must deserialize
//! strictly (unknown keys there are configuration errors).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub incident_connector: IncidentConnectorConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub cache: CacheConfig,
    pub agents: AgentsConfig,
    pub prompts_path: PathBuf,
    pub prompt_logs: PromptLogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
            incident_connector: IncidentConnectorConfig::default(),
            knowledge_base: KnowledgeBaseConfig::default(),
            cache: CacheConfig::default(),
            agents: AgentsConfig::default(),
            prompts_path: PathBuf::from("data/custom_prompts.json"),
            prompt_logs: PromptLogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_origins: Vec<String>,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 120,
            cors_origins: vec!["*".to_string()],
            unknown: BTreeMap::new(),
        }
    }
}

// =============================================================================
// LLM
// =============================================================================

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "gemini" => Ok(LlmProvider::Gemini),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(Error::config(format!("unsupported LLM provider: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub model: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-pro".to_string(),
            temperature: 0.7,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "llama2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
    pub ollama: OllamaConfig,
    /// Total timeout for blocking synthesis calls.
    pub complete_timeout_secs: u64,
    /// Maximum gap between streamed chunks before the stream is abandoned.
    pub stream_idle_timeout_secs: u64,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            openai: OpenAiConfig::default(),
            gemini: GeminiConfig::default(),
            ollama: OllamaConfig::default(),
            complete_timeout_secs: 60,
            stream_idle_timeout_secs: 30,
            unknown: BTreeMap::new(),
        }
    }
}

impl LlmConfig {
    /// Model name for the active provider.
    pub fn active_model(&self) -> &str {
        match self.provider {
            LlmProvider::OpenAi => &self.openai.model,
            LlmProvider::Gemini => &self.gemini.model,
            LlmProvider::Ollama => &self.ollama.model,
        }
    }

    /// This section with secrets masked, suitable for admin responses and
    /// logs.
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        redact_value_keys(&mut value);
        value
    }
}

// =============================================================================
// LOGGING
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of debug, info, warning, error, critical.
    pub level: String,
    /// Emit function entry/exit traces for instrumented spans.
    pub enable_tracing: bool,
    /// Emit JSON-structured log lines instead of the human format.
    pub json: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Size threshold that triggers file rotation.
    pub max_bytes: u64,
    /// Rotated files kept beside the active log.
    pub backup_count: usize,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracing: false,
            json: false,
            log_file: None,
            max_bytes: 10 * 1024 * 1024,
            backup_count: 5,
            unknown: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Map the configured level (including `warning`/`critical` aliases)
    /// onto a tracing level directive.
    pub fn tracing_level(&self) -> Result<tracing::Level> {
        match self.level.to_ascii_lowercase().as_str() {
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warning" | "warn" => Ok(tracing::Level::WARN),
            "error" | "critical" => Ok(tracing::Level::ERROR),
            other => Err(Error::config(format!("unknown log level: {other}"))),
        }
    }
}

// =============================================================================
// CONNECTORS
// =============================================================================

/// Incident connector variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentConnectorType {
    Mock,
    ServiceNow,
    Jira,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MockIncidentConfig {
    /// Directory holding the CSV fixture files.
    pub data_dir: PathBuf,
}

impl Default for MockIncidentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServiceNowConfig {
    pub instance_url: String,
    pub username: String,
    pub password: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct JiraConfig {
    pub url: String,
    pub username: String,
    pub api_token: String,
    pub project_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentConnectorConfig {
    #[serde(rename = "type")]
    pub connector_type: IncidentConnectorType,
    pub mock: MockIncidentConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servicenow: Option<ServiceNowConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jira: Option<JiraConfig>,
    /// Per-call timeout for connector operations.
    pub timeout_secs: u64,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for IncidentConnectorConfig {
    fn default() -> Self {
        Self {
            connector_type: IncidentConnectorType::Mock,
            mock: MockIncidentConfig::default(),
            servicenow: None,
            jira: None,
            timeout_secs: 10,
            unknown: BTreeMap::new(),
        }
    }
}

/// Knowledge-base connector variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeBaseSource {
    Mock,
    Confluence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MockKnowledgeBaseConfig {
    pub csv_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_folder: Option<PathBuf>,
}

impl Default for MockKnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/confluence_docs.csv"),
            docs_folder: Some(PathBuf::from("data/runbooks")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfluenceConfig {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    #[serde(default)]
    pub space_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub source: KnowledgeBaseSource,
    pub mock: MockKnowledgeBaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confluence: Option<ConfluenceConfig>,
    pub timeout_secs: u64,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            source: KnowledgeBaseSource::Mock,
            mock: MockKnowledgeBaseConfig::default(),
            confluence: None,
            timeout_secs: 10,
            unknown: BTreeMap::new(),
        }
    }
}

// =============================================================================
// CACHE, AGENTS, PROMPT LOGS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for cached agent results.
    pub ttl_secs: u64,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            unknown: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Minimum weighted-Jaccard score for a historical incident to match.
    pub similarity_threshold: f64,
    /// Maximum similar incidents / knowledge documents returned per agent.
    pub max_results: usize,
    /// Maximum similar incidents and knowledge articles rendered into the
    /// LLM context.
    pub max_context_items: usize,
    /// Change window before incident creation, in days.
    pub change_window_before_days: i64,
    /// Change window after incident creation, in hours.
    pub change_window_after_hours: i64,
    /// Minimum field length for full quality credit.
    pub quality_min_chars: usize,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.2,
            max_results: 5,
            max_context_items: 5,
            change_window_before_days: 7,
            change_window_after_hours: 1,
            quality_min_chars: 20,
            unknown: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptLogConfig {
    /// Maximum retained prompt-log entries; oldest are discarded.
    pub max_entries: usize,
    #[serde(flatten, skip_serializing)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for PromptLogConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            unknown: BTreeMap::new(),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate. A missing file falls back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            let raw = std::fs::read_to_string(path)?;
            Self::from_yaml(&raw)?
        } else {
            warn!(path = %path.display(), "Configuration file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        config.warn_unknown_keys();
        Ok(config)
    }

    /// Parse a YAML document. Unknown top-level keys are rejected here;
    /// unknown nested keys survive into the section `unknown` maps.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::config(format!("invalid configuration: {e}")))
    }

    /// Apply the documented environment-variable overrides.
    pub fn apply_env_overrides(&mut self) {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(provider) = env("LLM_PROVIDER") {
            match LlmProvider::parse(&provider) {
                Ok(p) => {
                    info!(provider = %provider, "Overriding LLM provider from environment");
                    self.llm.provider = p;
                }
                Err(e) => warn!(provider = %provider, error = %e, "Ignoring invalid LLM_PROVIDER"),
            }
        }
        if let Some(key) = env("OPENAI_API_KEY") {
            self.llm.openai.api_key = Some(key);
        }
        if let Some(model) = env("OPENAI_MODEL") {
            self.llm.openai.model = model;
        }
        if let Some(key) = env("GOOGLE_API_KEY") {
            self.llm.gemini.api_key = Some(key);
        }
        if let Some(model) = env("GEMINI_MODEL") {
            self.llm.gemini.model = model;
        }
        if let Some(url) = env("OLLAMA_BASE_URL") {
            self.llm.ollama.base_url = url;
        }
        if let Some(model) = env("OLLAMA_MODEL") {
            self.llm.ollama.model = model;
        }

        if let Some(kind) = env("INCIDENT_CONNECTOR_TYPE") {
            match kind.to_ascii_lowercase().as_str() {
                "mock" => self.incident_connector.connector_type = IncidentConnectorType::Mock,
                "servicenow" => {
                    self.incident_connector.connector_type = IncidentConnectorType::ServiceNow
                }
                "jira" => self.incident_connector.connector_type = IncidentConnectorType::Jira,
                other => warn!(value = other, "Ignoring invalid INCIDENT_CONNECTOR_TYPE"),
            }
        }
        if let Some(url) = env("SERVICENOW_INSTANCE_URL") {
            self.incident_connector
                .servicenow
                .get_or_insert_with(Default::default)
                .instance_url = url;
        }
        if let Some(user) = env("SERVICENOW_USERNAME") {
            self.incident_connector
                .servicenow
                .get_or_insert_with(Default::default)
                .username = user;
        }
        if let Some(password) = env("SERVICENOW_PASSWORD") {
            self.incident_connector
                .servicenow
                .get_or_insert_with(Default::default)
                .password = password;
        }
        if let Some(url) = env("JIRA_URL") {
            self.incident_connector
                .jira
                .get_or_insert_with(Default::default)
                .url = url;
        }
        if let Some(user) = env("JIRA_USERNAME") {
            self.incident_connector
                .jira
                .get_or_insert_with(Default::default)
                .username = user;
        }
        if let Some(token) = env("JIRA_API_TOKEN") {
            self.incident_connector
                .jira
                .get_or_insert_with(Default::default)
                .api_token = token;
        }
        if let Some(key) = env("JIRA_PROJECT_KEY") {
            self.incident_connector
                .jira
                .get_or_insert_with(Default::default)
                .project_key = key;
        }

        if let Some(source) = env("KNOWLEDGE_BASE_SOURCE") {
            match source.to_ascii_lowercase().as_str() {
                "mock" => self.knowledge_base.source = KnowledgeBaseSource::Mock,
                "confluence" => self.knowledge_base.source = KnowledgeBaseSource::Confluence,
                other => warn!(value = other, "Ignoring invalid KNOWLEDGE_BASE_SOURCE"),
            }
        }
        if let Some(path) = env("KB_CSV_PATH") {
            self.knowledge_base.mock.csv_path = PathBuf::from(path);
        }
        if let Some(folder) = env("KB_DOCS_FOLDER") {
            self.knowledge_base.mock.docs_folder = Some(PathBuf::from(folder));
        }
        if let Some(url) = env("CONFLUENCE_BASE_URL") {
            self.knowledge_base
                .confluence
                .get_or_insert_with(Default::default)
                .base_url = url;
        }
        if let Some(user) = env("CONFLUENCE_USERNAME") {
            self.knowledge_base
                .confluence
                .get_or_insert_with(Default::default)
                .username = user;
        }
        if let Some(token) = env("CONFLUENCE_API_TOKEN") {
            self.knowledge_base
                .confluence
                .get_or_insert_with(Default::default)
                .api_token = token;
        }
        if let Some(keys) = env("CONFLUENCE_SPACE_KEYS") {
            self.knowledge_base
                .confluence
                .get_or_insert_with(Default::default)
                .space_keys = keys.split(',').map(|k| k.trim().to_string()).collect();
        }

        if let Some(level) = env("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(tracing_on) = env("ENABLE_TRACING") {
            self.logging.enable_tracing = matches!(
                tracing_on.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        if let Some(file) = env("LOG_FILE") {
            self.logging.log_file = Some(PathBuf::from(file));
        }
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.logging.tracing_level()?;

        if !(0.0..=1.0).contains(&self.agents.similarity_threshold) {
            return Err(Error::config(
                "agents.similarity_threshold must be between 0.0 and 1.0",
            ));
        }
        if self.agents.max_results == 0 {
            return Err(Error::config("agents.max_results must be at least 1"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::config("cache.ttl_secs must be greater than 0"));
        }

        match self.incident_connector.connector_type {
            IncidentConnectorType::ServiceNow => {
                let sn = self.incident_connector.servicenow.as_ref().ok_or_else(|| {
                    Error::config("servicenow configuration is required when type is 'servicenow'")
                })?;
                if sn.instance_url.is_empty() {
                    return Err(Error::config("servicenow.instance_url must be set"));
                }
            }
            IncidentConnectorType::Jira => {
                let jira = self.incident_connector.jira.as_ref().ok_or_else(|| {
                    Error::config("jira configuration is required when type is 'jira'")
                })?;
                if jira.url.is_empty() {
                    return Err(Error::config("jira.url must be set"));
                }
            }
            IncidentConnectorType::Mock => {}
        }

        if self.knowledge_base.source == KnowledgeBaseSource::Confluence {
            let conf = self.knowledge_base.confluence.as_ref().ok_or_else(|| {
                Error::config("confluence configuration is required when source is 'confluence'")
            })?;
            if conf.base_url.is_empty() {
                return Err(Error::config("confluence.base_url must be set"));
            }
        }

        Ok(())
    }

    fn warn_unknown_keys(&self) {
        let sections: [(&str, &BTreeMap<String, serde_yaml::Value>); 8] = [
            ("server", &self.server.unknown),
            ("llm", &self.llm.unknown),
            ("logging", &self.logging.unknown),
            ("incident_connector", &self.incident_connector.unknown),
            ("knowledge_base", &self.knowledge_base.unknown),
            ("cache", &self.cache.unknown),
            ("agents", &self.agents.unknown),
            ("prompt_logs", &self.prompt_logs.unknown),
        ];
        for (section, unknown) in sections {
            for key in unknown.keys() {
                warn!(section, key = %key, "Ignoring unknown configuration key");
            }
        }
    }

    /// Bind address for the HTTP server.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// The LLM section with secrets masked.
    pub fn redacted_llm(&self) -> serde_json::Value {
        self.llm.redacted()
    }
}

fn redact_value_keys(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        for (key, entry) in map.iter_mut() {
            if let serde_json::Value::String(s) = entry {
                if let Some(masked) = redact_if_sensitive(key, s) {
                    *entry = serde_json::Value::String(masked);
                    continue;
                }
            }
            redact_value_keys(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.agents.similarity_threshold, 0.2);
        assert_eq!(config.llm.complete_timeout_secs, 60);
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let yaml = "llm:\n  provider: openai\nnot_a_section:\n  x: 1\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn unknown_nested_key_is_collected_not_rejected() {
        let yaml = "cache:\n  ttl_secs: 60\n  eviction_policy: lru\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.unknown.contains_key("eviction_policy"));
    }

    #[test]
    fn unknown_variant_key_is_rejected() {
        let yaml = "incident_connector:\n  type: mock\n  mock:\n    data_dir: data\n    surprise: true\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn servicenow_requires_variant_section() {
        let yaml = "incident_connector:\n  type: servicenow\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = "llm:\n  provider: ollama\n  ollama:\n    model: mistral\nagents:\n  max_results: 3\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.ollama.model, "mistral");
        assert_eq!(config.agents.max_results, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn redacted_llm_masks_api_keys() {
        let mut config = AppConfig::default();
        config.llm.openai.api_key = Some("sk-verysecret".to_string());
        let value = config.redacted_llm();
        let key = value["openai"]["api_key"].as_str().unwrap();
        assert!(!key.contains("verysecret"));
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
