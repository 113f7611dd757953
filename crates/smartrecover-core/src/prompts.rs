//! Editable per-agent system prompts.
//!
//! Every agent ships a default prompt. Operators may override a prompt
//! through the admin surface; overrides persist as a single JSON document
//! written atomically (temp file + rename) so a crash never leaves a
//! half-written store. Reads are served from the in-memory overlay.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Agent names with editable prompts.
pub const PROMPT_AGENTS: &[&str] = &[
    "orchestrator",
    "servicenow",
    "knowledge_base",
    "change_correlation",
    "logs",
    "events",
];

/// A prompt with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    pub default: String,
    pub current: String,
    pub is_custom: bool,
}

/// Store of per-agent prompts with JSON persistence for overrides.
pub struct PromptStore {
    path: PathBuf,
    custom: Mutex<BTreeMap<String, String>>,
}

impl PromptStore {
    /// Load the store, reading any persisted overrides from `path`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let custom = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => {
                    let (known, unknown): (BTreeMap<_, _>, BTreeMap<_, _>) = map
                        .into_iter()
                        .partition(|(agent, _)| PROMPT_AGENTS.contains(&agent.as_str()));
                    for agent in unknown.keys() {
                        warn!(agent = %agent, "Dropping persisted prompt for unknown agent");
                    }
                    known
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not parse custom prompts, starting clean");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        if !custom.is_empty() {
            info!(count = custom.len(), "Loaded custom agent prompts");
        }

        Self {
            path,
            custom: Mutex::new(custom),
        }
    }

    fn require_known(agent: &str) -> Result<()> {
        if PROMPT_AGENTS.contains(&agent) {
            Ok(())
        } else {
            Err(Error::not_found(format!("unknown agent: {agent}")))
        }
    }

    /// The effective prompt for an agent.
    pub fn prompt(&self, agent: &str) -> String {
        let custom = self.custom.lock().expect("prompt store lock poisoned");
        custom
            .get(agent)
            .cloned()
            .unwrap_or_else(|| default_prompt(agent).to_string())
    }

    /// One agent's prompt record.
    pub fn get(&self, agent: &str) -> Result<PromptRecord> {
        Self::require_known(agent)?;
        let custom = self.custom.lock().expect("prompt store lock poisoned");
        let default = default_prompt(agent).to_string();
        let current = custom.get(agent).cloned().unwrap_or_else(|| default.clone());
        let is_custom = current != default;
        Ok(PromptRecord {
            default,
            current,
            is_custom,
        })
    }

    /// All prompt records, keyed by agent name.
    pub fn list(&self) -> BTreeMap<String, PromptRecord> {
        PROMPT_AGENTS
            .iter()
            .map(|agent| {
                (
                    agent.to_string(),
                    self.get(agent).expect("known agent must resolve"),
                )
            })
            .collect()
    }

    /// Set an agent's prompt. Setting the default text clears the custom
    /// flag instead of storing a redundant override.
    pub fn set(&self, agent: &str, prompt: &str) -> Result<PromptRecord> {
        Self::require_known(agent)?;
        if prompt.trim().is_empty() {
            return Err(Error::invalid_input("prompt must not be empty"));
        }

        {
            let mut custom = self.custom.lock().expect("prompt store lock poisoned");
            if prompt == default_prompt(agent) {
                custom.remove(agent);
            } else {
                custom.insert(agent.to_string(), prompt.to_string());
            }
            self.persist(&custom)?;
        }
        info!(agent, "Agent prompt updated");
        self.get(agent)
    }

    /// Restore an agent's default prompt. Idempotent.
    pub fn reset(&self, agent: &str) -> Result<PromptRecord> {
        Self::require_known(agent)?;
        {
            let mut custom = self.custom.lock().expect("prompt store lock poisoned");
            custom.remove(agent);
            self.persist(&custom)?;
        }
        info!(agent, "Agent prompt reset to default");
        self.get(agent)
    }

    /// Restore every default.
    pub fn reset_all(&self) -> Result<()> {
        let mut custom = self.custom.lock().expect("prompt store lock poisoned");
        custom.clear();
        self.persist(&custom)?;
        info!("All agent prompts reset to defaults");
        Ok(())
    }

    /// Write the override map via temp file + atomic rename.
    fn persist(&self, custom: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = tmp_path(&self.path);
        let payload = serde_json::to_vec_pretty(custom)?;
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}

/// Built-in default prompt for an agent.
pub fn default_prompt(agent: &str) -> &'static str {
    match agent {
        "orchestrator" => {
            "You are an expert incident resolution assistant.\n\
             Your task is to synthesize information from multiple data sources and provide a clear,\n\
             actionable summary for resolving incidents. Be concise and focus on the most relevant information.\n\
             \n\
             Consider:\n\
             - Similar historical incidents and their resolutions\n\
             - Relevant knowledge base articles and runbooks\n\
             - Recent changes that may have caused the incident\n\
             - Root cause analysis based on correlation scores\n\
             \n\
             Provide clear, step-by-step resolution guidance."
        }
        "servicenow" => {
            "You are a ServiceNow incident analysis expert.\n\
             Your task is to find similar historical incidents and extract relevant resolutions.\n\
             \n\
             Focus on:\n\
             - Matching incident characteristics (severity, affected services, symptoms)\n\
             - High-quality resolutions from similar incidents\n\
             - Patterns in incident recurrence\n\
             - Proven resolution steps\n\
             \n\
             Return the most relevant historical incidents with their resolutions."
        }
        "knowledge_base" => {
            "You are a knowledge base retrieval expert.\n\
             Your task is to find relevant documentation, runbooks, and troubleshooting guides.\n\
             \n\
             Focus on:\n\
             - Operational runbooks for affected services\n\
             - Troubleshooting guides for similar issues\n\
             - Architecture documentation\n\
             - Best practices and SLAs\n\
             \n\
             Return the most relevant documentation with high relevance scores."
        }
        "change_correlation" => {
            "You are a change correlation analysis expert.\n\
             Your task is to identify recent changes that may have caused or contributed to incidents.\n\
             \n\
             Focus on:\n\
             - Temporal correlation between changes and incidents\n\
             - Changes to affected services\n\
             - High-risk changes (schema updates, config changes, deployments)\n\
             - Deployment timing and incident onset\n\
             \n\
             Return correlated changes with confidence scores."
        }
        "logs" => {
            "You are a log analysis expert.\n\
             Your task is to surface log entries that explain an ongoing incident.\n\
             \n\
             Focus on:\n\
             - Errors and warnings on the affected services\n\
             - Entries close in time to the incident onset\n\
             - Repeated failure patterns and their first occurrence\n\
             \n\
             Return the most relevant log entries with confidence scores."
        }
        "events" => {
            "You are an application performance monitoring expert.\n\
             Your task is to surface monitoring events that explain an ongoing incident.\n\
             \n\
             Focus on:\n\
             - Critical events on the affected applications\n\
             - Health-check failures, error-rate spikes, and resource saturation\n\
             - Events close in time to the incident onset\n\
             \n\
             Return the most relevant events with confidence scores."
        }
        _ => "",
    }
}
