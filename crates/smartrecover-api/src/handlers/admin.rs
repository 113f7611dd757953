//! Admin endpoints: LLM and logging configuration, agent prompts, LLM
//! connectivity testing, accuracy metrics, and prompt logs.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use smartrecover_core::config::{LlmConfig, LoggingConfig};
use smartrecover_core::exclusion::AccuracyReport;
use smartrecover_core::prompt_log::PromptLogEntry;
use smartrecover_core::prompts::PromptRecord;

use crate::error::{admin_config_error, ApiError};
use crate::AppState;

// =============================================================================
// LLM CONFIGURATION
// =============================================================================

/// GET /api/v1/admin/llm-config
///
/// API keys are redacted; the raw values never leave the process.
#[instrument(skip(state))]
pub async fn get_llm_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.llm.config().redacted()))
}

/// PUT /api/v1/admin/llm-config
///
/// Hot-swaps the LLM provider. Invalid configuration is a 400 here, not a
/// 500: the server keeps running on the previous provider.
#[instrument(skip(state, config))]
pub async fn put_llm_config(
    State(state): State<Arc<AppState>>,
    Json(config): Json<LlmConfig>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.llm.swap(config).map_err(admin_config_error)?;
    Ok(Json(state.llm.config().redacted()))
}

// =============================================================================
// LOGGING CONFIGURATION
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoggingUpdateRequest {
    pub level: Option<String>,
    pub enable_tracing: Option<bool>,
}

/// GET /api/v1/admin/logging-config
#[instrument(skip(state))]
pub async fn get_logging_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoggingConfig>, ApiError> {
    let config = state
        .logging_config
        .read()
        .expect("logging config lock poisoned")
        .clone();
    Ok(Json(config))
}

/// PUT /api/v1/admin/logging-config
#[instrument(skip(state, request))]
pub async fn put_logging_config(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoggingUpdateRequest>,
) -> Result<Json<LoggingConfig>, ApiError> {
    if let Some(level) = &request.level {
        if let Some(handle) = &state.logging {
            handle.set_level(level).map_err(admin_config_error)?;
        } else {
            // Still validate so a bad level is rejected consistently.
            let mut probe = LoggingConfig::default();
            probe.level = level.clone();
            probe.tracing_level().map_err(admin_config_error)?;
            warn!("No logging handle installed; level change recorded but not applied");
        }
        state
            .logging_config
            .write()
            .expect("logging config lock poisoned")
            .level = level.clone();
    }

    if let Some(enable_tracing) = request.enable_tracing {
        state
            .logging_config
            .write()
            .expect("logging config lock poisoned")
            .enable_tracing = enable_tracing;
        info!(enable_tracing, "Function tracing toggled");
    }

    get_logging_config(State(state)).await
}

// =============================================================================
// AGENT PROMPTS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PromptUpdateRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct PromptResetQuery {
    pub agent_name: Option<String>,
}

/// GET /api/v1/admin/agent-prompts
#[instrument(skip(state))]
pub async fn list_agent_prompts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, PromptRecord>>, ApiError> {
    Ok(Json(state.prompts.list()))
}

/// GET /api/v1/admin/agent-prompts/{agent}
#[instrument(skip(state))]
pub async fn get_agent_prompt(
    State(state): State<Arc<AppState>>,
    Path(agent): Path<String>,
) -> Result<Json<PromptRecord>, ApiError> {
    Ok(Json(state.prompts.get(&agent)?))
}

/// PUT /api/v1/admin/agent-prompts/{agent}
#[instrument(skip(state, request))]
pub async fn put_agent_prompt(
    State(state): State<Arc<AppState>>,
    Path(agent): Path<String>,
    Json(request): Json<PromptUpdateRequest>,
) -> Result<Json<PromptRecord>, ApiError> {
    Ok(Json(state.prompts.set(&agent, &request.prompt)?))
}

/// POST /api/v1/admin/agent-prompts/reset?agent_name=…
///
/// Resets one agent when `agent_name` is given, all agents otherwise.
/// Idempotent either way.
#[instrument(skip(state))]
pub async fn reset_agent_prompts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PromptResetQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match &query.agent_name {
        Some(agent) => {
            let record = state.prompts.reset(agent)?;
            Ok(Json(json!({ "status": "reset", "agent": agent, "prompt": record })))
        }
        None => {
            state.prompts.reset_all()?;
            Ok(Json(json!({ "status": "reset", "agent": "all" })))
        }
    }
}

// =============================================================================
// LLM TEST
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LlmTestRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LlmTestResponse {
    pub status: String,
    pub provider: String,
    pub model: String,
    pub test_message: String,
    pub llm_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/v1/admin/test-llm
///
/// A failing backend is reported in the body, not as an HTTP error, so the
/// admin UI can show the provider's message.
#[instrument(skip(state, request))]
pub async fn test_llm(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LlmTestRequest>,
) -> Result<Json<LlmTestResponse>, ApiError> {
    let message = request
        .message
        .unwrap_or_else(|| "Hello, are you working correctly?".to_string());
    info!("Testing LLM connectivity");

    let config = state.llm.config();
    match state.llm.test(&message).await {
        Ok((provider, model, response)) => Ok(Json(LlmTestResponse {
            status: "success".to_string(),
            provider,
            model,
            test_message: message,
            llm_response: response,
            error: None,
        })),
        Err(e) => {
            warn!(error = %e, "LLM test failed");
            Ok(Json(LlmTestResponse {
                status: "error".to_string(),
                provider: config.provider.as_str().to_string(),
                model: config.active_model().to_string(),
                test_message: message,
                llm_response: String::new(),
                error: Some(e.to_string()),
            }))
        }
    }
}

// =============================================================================
// ACCURACY AND PROMPT LOGS
// =============================================================================

/// GET /api/v1/admin/accuracy-metrics
#[instrument(skip(state))]
pub async fn accuracy_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AccuracyReport>, ApiError> {
    Ok(Json(state.exclusions.accuracy_report()))
}

#[derive(Debug, Serialize)]
pub struct PromptLogsResponse {
    pub count: usize,
    pub logs: Vec<PromptLogEntry>,
}

/// GET /api/v1/admin/prompt-logs
#[instrument(skip(state))]
pub async fn get_prompt_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PromptLogsResponse>, ApiError> {
    let logs = state.prompt_log.entries();
    Ok(Json(PromptLogsResponse {
        count: logs.len(),
        logs,
    }))
}

/// DELETE /api/v1/admin/prompt-logs
#[instrument(skip(state))]
pub async fn clear_prompt_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.prompt_log.clear();
    info!(deleted, "Prompt logs cleared");
    Ok(Json(json!({ "deleted": deleted })))
}

// =============================================================================
// HEALTH
// =============================================================================

/// GET /api/v1/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "SmartRecover Incident Resolution API",
        "health": "/api/v1/health",
    }))
}
