//! Resolution and chat-streaming endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument};

use smartrecover_core::models::{ChatMessage, ExcludedItem, ResolveResponse};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub incident_id: String,
    pub user_query: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub incident_id: String,
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
    #[serde(default)]
    pub excluded_items: Vec<ExcludedItem>,
}

/// POST /api/v1/resolve
#[instrument(skip(state, request), fields(incident_id = %request.incident_id))]
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    info!(incident_id = %request.incident_id, "Resolve requested");
    let response = state
        .orchestrator
        .resolve(&request.incident_id, &request.user_query)
        .await?;
    info!(
        incident_id = %request.incident_id,
        confidence = response.confidence,
        "Resolve complete"
    );
    Ok(Json(response))
}

/// POST /api/v1/chat/stream
///
/// SSE stream of LLM chunks. Every frame is `data: <chunk>`; the stream
/// always terminates with `data: [DONE]`. Errors that occur before the
/// stream starts map to HTTP errors; mid-stream failures arrive as a final
/// error-text chunk ahead of `[DONE]`. When the client disconnects the
/// drained receiver is dropped, which cancels the underlying LLM stream.
#[instrument(skip(state, request), fields(incident_id = %request.incident_id))]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<
    (
        [(&'static str, &'static str); 2],
        Sse<impl Stream<Item = Result<Event, Infallible>>>,
    ),
    ApiError,
> {
    info!(incident_id = %request.incident_id, "Chat stream requested");

    let rx = state
        .orchestrator
        .chat_stream(
            &request.incident_id,
            &request.message,
            request.conversation_history,
            &request.excluded_items,
        )
        .await?;

    let stream = ReceiverStream::new(rx)
        .map(|chunk| Ok(Event::default().data(chunk)))
        .chain(stream::once(async {
            Ok(Event::default().data("[DONE]"))
        }));

    // Intermediate proxies must not buffer the event stream.
    let headers = [
        ("Cache-Control", "no-cache"),
        ("X-Accel-Buffering", "no"),
    ];

    Ok((headers, Sse::new(stream)))
}
