//! Route assembly.
//!
//! All operations live under `/api/v1`; the root path serves a small
//! service banner. Sub-routers are merged into the versioned router and
//! wrapped with trace-ID, CORS, and timeout layers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::warn;

use crate::handlers::{admin, incidents, resolve};
use crate::middleware::trace_id_middleware;
use crate::AppState;

/// Build the application router.
pub fn build_router(
    state: Arc<AppState>,
    cors_origins: &[String],
    request_timeout: Duration,
) -> Router {
    let incident_routes = Router::new()
        .route("/incidents", get(incidents::list_incidents))
        .route("/incidents/:id", get(incidents::get_incident))
        .route("/incidents/:id/status", put(incidents::update_status))
        .route("/incidents/:id/details", get(incidents::get_details))
        .route(
            "/incidents/:id/retrieve-context",
            post(incidents::retrieve_context),
        )
        .route("/incidents/:id/exclude-item", post(incidents::exclude_item))
        .route(
            "/incidents/:id/excluded-items",
            get(incidents::list_excluded_items),
        )
        .route(
            "/incidents/:id/excluded-items/:item_id",
            delete(incidents::remove_excluded_item),
        );

    let resolution_routes = Router::new()
        .route("/resolve", post(resolve::resolve))
        .route("/chat/stream", post(resolve::chat_stream));

    let admin_routes = Router::new()
        .route(
            "/admin/llm-config",
            get(admin::get_llm_config).put(admin::put_llm_config),
        )
        .route(
            "/admin/logging-config",
            get(admin::get_logging_config).put(admin::put_logging_config),
        )
        .route("/admin/agent-prompts", get(admin::list_agent_prompts))
        .route(
            "/admin/agent-prompts/reset",
            post(admin::reset_agent_prompts),
        )
        .route(
            "/admin/agent-prompts/:agent",
            get(admin::get_agent_prompt).put(admin::put_agent_prompt),
        )
        .route("/admin/test-llm", post(admin::test_llm))
        .route("/admin/accuracy-metrics", get(admin::accuracy_metrics))
        .route(
            "/admin/prompt-logs",
            get(admin::get_prompt_logs).delete(admin::clear_prompt_logs),
        );

    let api_v1 = Router::new()
        .merge(incident_routes)
        .merge(resolution_routes)
        .merge(admin_routes)
        .route("/health", get(admin::health))
        .with_state(state);

    Router::new()
        .route("/", get(admin::root))
        .nest("/api/v1", api_v1)
        .layer(middleware::from_fn(trace_id_middleware))
        .layer(cors_layer(cors_origins))
        .layer(TimeoutLayer::new(request_timeout))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
