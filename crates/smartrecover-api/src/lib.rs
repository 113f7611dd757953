//! HTTP surface for SmartRecover.
//!
//! Routes live under the `/api/v1` prefix; chat streaming uses Server-Sent
//! Events with a terminal `[DONE]` frame. Every request gets a trace ID
//! (inbound `X-Trace-ID` or freshly generated) attached to its span and
//! echoed in the response.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use smartrecover_core::cache::AgentCache;
use smartrecover_core::config::LoggingConfig;
use smartrecover_core::exclusion::ExclusionStore;
use smartrecover_core::logging::LoggingHandle;
use smartrecover_core::prompt_log::PromptLog;
use smartrecover_core::prompts::PromptStore;
use smartrecover_agents::Orchestrator;
use smartrecover_connectors::IncidentConnector;
use smartrecover_llm::LlmManager;

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use error::ApiError;
pub use routes::build_router;

/// Shared state handed to every handler.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub incident_connector: Arc<dyn IncidentConnector>,
    pub cache: Arc<AgentCache>,
    pub exclusions: Arc<ExclusionStore>,
    pub prompts: Arc<PromptStore>,
    pub prompt_log: Arc<PromptLog>,
    pub llm: Arc<LlmManager>,
    /// Runtime logging mutations; absent when no global subscriber was
    /// installed (tests).
    pub logging: Option<LoggingHandle>,
    pub logging_config: RwLock<LoggingConfig>,
    /// Serializes status updates per incident.
    status_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        incident_connector: Arc<dyn IncidentConnector>,
        cache: Arc<AgentCache>,
        exclusions: Arc<ExclusionStore>,
        prompts: Arc<PromptStore>,
        prompt_log: Arc<PromptLog>,
        llm: Arc<LlmManager>,
        logging: Option<LoggingHandle>,
        logging_config: LoggingConfig,
    ) -> Self {
        Self {
            orchestrator,
            incident_connector,
            cache,
            exclusions,
            prompts,
            prompt_log,
            llm,
            logging,
            logging_config: RwLock::new(logging_config),
            status_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The per-incident lock guarding status updates.
    pub async fn status_lock(&self, incident_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.status_locks.lock().await;
        locks
            .entry(incident_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
