//! Incident endpoints: listing, detail, status updates, context retrieval,
//! and excluded-item management.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use smartrecover_core::models::{AgentData, ExcludedItem, Incident, IncidentStatus};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct IncidentDetails {
    pub incident: Incident,
    pub agent_results: Option<AgentData>,
}

/// GET /api/v1/incidents
#[instrument(skip(state))]
pub async fn list_incidents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Incident>>, ApiError> {
    info!("Listing incidents");
    let incidents = state.incident_connector.list_incidents().await?;
    Ok(Json(incidents))
}

/// GET /api/v1/incidents/{id}
#[instrument(skip(state))]
pub async fn get_incident(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Incident>, ApiError> {
    let incident = state.incident_connector.get_incident(&id).await?;
    Ok(Json(incident))
}

/// PUT /api/v1/incidents/{id}/status
///
/// Serialized per incident; readers observe either the old or the new
/// incident, never a partial update.
#[instrument(skip(state, request))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Incident>, ApiError> {
    let status = IncidentStatus::parse(&request.status)?;

    let lock = state.status_lock(&id).await;
    let _guard = lock.lock().await;

    let updated = state.incident_connector.update_status(&id, status).await?;
    info!(incident_id = %id, status = status.as_str(), "Incident status updated");

    // A status change invalidates cached evidence for the incident.
    state.cache.invalidate(&id);
    Ok(Json(updated))
}

/// GET /api/v1/incidents/{id}/details
///
/// Returns the incident plus cached agent results (exclusion-filtered) or
/// `null` when nothing is cached.
#[instrument(skip(state))]
pub async fn get_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<IncidentDetails>, ApiError> {
    let incident = state.incident_connector.get_incident(&id).await?;
    let agent_results = state
        .cache
        .get(&id)
        .map(|data| state.orchestrator.view_for(&id, data));
    Ok(Json(IncidentDetails {
        incident,
        agent_results,
    }))
}

/// POST /api/v1/incidents/{id}/retrieve-context
///
/// Runs the retrieval graph (no synthesis), stores the results in the
/// cache, and returns the exclusion-filtered view.
#[instrument(skip(state))]
pub async fn retrieve_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AgentData>, ApiError> {
    info!(incident_id = %id, "Context retrieval requested");
    let data = state.orchestrator.retrieve(&id, "").await?;
    Ok(Json(state.orchestrator.view_for(&id, data)))
}

/// POST /api/v1/incidents/{id}/exclude-item
#[instrument(skip(state, item))]
pub async fn exclude_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(item): Json<ExcludedItem>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // The incident must exist before we track exclusions for it.
    state.incident_connector.get_incident(&id).await?;
    state.exclusions.exclude(&id, item)?;
    Ok(Json(json!({ "status": "excluded" })))
}

/// GET /api/v1/incidents/{id}/excluded-items
#[instrument(skip(state))]
pub async fn list_excluded_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ExcludedItem>>, ApiError> {
    Ok(Json(state.exclusions.excluded_for(&id)))
}

/// DELETE /api/v1/incidents/{id}/excluded-items/{item_id}
#[instrument(skip(state))]
pub async fn remove_excluded_item(
    State(state): State<Arc<AppState>>,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.exclusions.include(&id, &item_id)?;
    Ok(Json(json!({ "status": "removed" })))
}
