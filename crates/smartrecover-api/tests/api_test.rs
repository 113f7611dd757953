//! End-to-end API tests over the full router with mock connectors and a
//! scripted LLM.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use smartrecover_agents::Orchestrator;
use smartrecover_api::{build_router, AppState};
use smartrecover_connectors::incident::MockIncidentConnector;
use smartrecover_connectors::kb::MockKnowledgeBaseConnector;
use smartrecover_connectors::{ChangeWindow, IncidentConnector, KnowledgeBaseConnector};
use smartrecover_core::cache::AgentCache;
use smartrecover_core::config::{AgentsConfig, LlmConfig, LlmProvider, LoggingConfig};
use smartrecover_core::exclusion::ExclusionStore;
use smartrecover_core::models::*;
use smartrecover_core::prompt_log::PromptLog;
use smartrecover_core::prompts::PromptStore;
use smartrecover_core::Result;
use smartrecover_llm::{LlmClient, LlmManager};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

struct ScriptedLlm;

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
        Ok("The pool limit change CHG005 is the likely cause; roll it back.".to_string())
    }

    async fn stream(
        &self,
        _system: &str,
        _messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for chunk in ["Rolling ", "back ", "CHG005 ", "should resolve it."] {
                if tx.send(chunk.to_string()).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Counts retrieval calls so cache reuse is observable.
struct SpyConnector {
    inner: MockIncidentConnector,
    retrieval_calls: AtomicUsize,
}

#[async_trait]
impl IncidentConnector for SpyConnector {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_incidents(&self) -> Result<Vec<Incident>> {
        self.inner.list_incidents().await
    }

    async fn get_incident(&self, id: &str) -> Result<Incident> {
        self.inner.get_incident(id).await
    }

    async fn update_status(&self, id: &str, status: IncidentStatus) -> Result<Incident> {
        self.inner.update_status(id, status).await
    }

    async fn find_similar(
        &self,
        incident: &Incident,
        threshold: f64,
        k: usize,
    ) -> Result<Vec<SimilarIncident>> {
        self.retrieval_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_similar(incident, threshold, k).await
    }

    async fn find_changes(
        &self,
        incident: &Incident,
        window: ChangeWindow,
    ) -> Result<Vec<ChangeRecord>> {
        self.retrieval_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_changes(incident, window).await
    }

    async fn find_logs(&self, incident: &Incident) -> Result<Vec<LogRecord>> {
        self.retrieval_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_logs(incident).await
    }

    async fn find_events(&self, incident: &Incident) -> Result<Vec<EventRecord>> {
        self.retrieval_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_events(incident).await
    }
}

struct BrokenKb;

#[async_trait]
impl KnowledgeBaseConnector for BrokenKb {
    fn name(&self) -> &str {
        "broken"
    }

    async fn search(&self, _terms: &[String], _k: usize) -> Result<Vec<KnowledgeDocument>> {
        Err(smartrecover_core::Error::upstream("kb outage"))
    }

    async fn get(&self, _doc_id: &str) -> Result<KnowledgeDocument> {
        Err(smartrecover_core::Error::upstream("kb outage"))
    }
}

// ---------------------------------------------------------------------------
// Fixtures and harness
// ---------------------------------------------------------------------------

fn incident(id: &str, title: &str, created_minute: u32, status: IncidentStatus) -> Incident {
    Incident {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("{title} affecting the primary database tier"),
        severity: Severity::Critical,
        status,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, created_minute, 0).unwrap(),
        updated_at: None,
        affected_services: vec!["database".to_string(), "api-gateway".to_string()],
        assignee: None,
    }
}

fn fixture_connector() -> MockIncidentConnector {
    let incidents = vec![
        incident("INC001", "Database connection timeout", 30, IncidentStatus::Open),
        incident("INC007", "Database connection timeout", 10, IncidentStatus::Resolved),
        incident("INC011", "Database latency reported by clients", 0, IncidentStatus::Resolved),
    ];

    let mut tickets = HashMap::new();
    tickets.insert(
        "INC007".to_string(),
        vec![Ticket {
            ticket_id: "SNOW-10072".to_string(),
            incident_id: "INC007".to_string(),
            kind: TicketKind::SimilarIncident,
            resolution: Some("Raised the pool ceiling and recycled stale connections".to_string()),
            description: Some("Pool exhausted during the morning peak traffic window".to_string()),
            source: "servicenow".to_string(),
        }],
    );
    tickets.insert(
        "INC011".to_string(),
        vec![Ticket {
            ticket_id: "SNOW-10113".to_string(),
            incident_id: "INC011".to_string(),
            kind: TicketKind::SimilarIncident,
            resolution: Some("Moved analytical workloads onto the read replica".to_string()),
            description: Some("Slow analytical queries saturated the primary database".to_string()),
            source: "servicenow".to_string(),
        }],
    );

    let mut changes = HashMap::new();
    changes.insert(
        "INC001".to_string(),
        vec![
            ChangeRecord {
                change_id: "CHG005".to_string(),
                description: "Lowered database pool limits".to_string(),
                deployed_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
                service: Some("database".to_string()),
                correlation_score: Some(0.88),
            },
            ChangeRecord {
                change_id: "CHG006".to_string(),
                description: "Updated database failover settings".to_string(),
                deployed_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                service: Some("database".to_string()),
                correlation_score: Some(0.72),
            },
        ],
    );

    MockIncidentConnector::from_fixtures(incidents, tickets, changes)
}

fn fixture_kb() -> MockKnowledgeBaseConnector {
    MockKnowledgeBaseConnector::from_documents(vec![
        KnowledgeDocument {
            doc_id: "DOC-101".to_string(),
            title: "Database Connection Pool Tuning".to_string(),
            content: "Sizing and tuning the connection pool for the primary database tier".to_string(),
            tags: vec![],
            incident_id: Some("INC001".to_string()),
        },
        KnowledgeDocument {
            doc_id: "DOC-102".to_string(),
            title: "Primary Database Failover Runbook".to_string(),
            content: "Failover procedure for the primary database".to_string(),
            tags: vec![],
            incident_id: None,
        },
    ])
}

struct Harness {
    router: Router,
    exclusions: Arc<ExclusionStore>,
    _dir: tempfile::TempDir,
}

fn harness_with(
    connector: Arc<dyn IncidentConnector>,
    kb: Arc<dyn KnowledgeBaseConnector>,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let prompts = Arc::new(PromptStore::load(dir.path().join("prompts.json")));
    let prompt_log = Arc::new(PromptLog::new(100));
    let cache = Arc::new(AgentCache::new(Duration::from_secs(300)));
    let exclusions = Arc::new(ExclusionStore::new());
    let llm = Arc::new(
        LlmManager::new(
            LlmConfig {
                provider: LlmProvider::Ollama,
                ..Default::default()
            },
            prompt_log.clone(),
        )
        .unwrap(),
    );
    llm.install_client(Arc::new(ScriptedLlm));

    let orchestrator = Arc::new(Orchestrator::new(
        connector.clone(),
        kb,
        llm.clone(),
        cache.clone(),
        exclusions.clone(),
        prompts.clone(),
        &AgentsConfig::default(),
    ));

    let state = Arc::new(AppState::new(
        orchestrator,
        connector,
        cache,
        exclusions.clone(),
        prompts,
        prompt_log,
        llm,
        None,
        LoggingConfig::default(),
    ));

    Harness {
        router: build_router(state, &["*".to_string()], Duration::from_secs(30)),
        exclusions,
        _dir: dir,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(fixture_connector()), Arc::new(fixture_kb()))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn json_request(method: &str, path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn sse_frames(router: &Router, body: serde_json::Value) -> Vec<String> {
    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/chat/stream", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    text.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn incidents_list_newest_first() {
    let h = harness();
    let (status, body) = send(&h.router, get("/api/v1/incidents")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["INC001", "INC007", "INC011"]);
}

#[tokio::test]
async fn unknown_incident_is_404_with_detail() {
    let h = harness();
    let (status, body) = send(&h.router, get("/api/v1/incidents/INC404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("INC404"));
}

#[tokio::test]
async fn status_update_rejects_unknown_enum() {
    let h = harness();
    let (status, body) = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/incidents/INC001/status",
            serde_json::json!({"status": "closed"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("closed"));
}

#[tokio::test]
async fn status_update_applies_and_echoes() {
    let h = harness();
    let (status, body) = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/incidents/INC001/status",
            serde_json::json!({"status": "investigating"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "investigating");
    assert!(body["updated_at"].is_string());
}

#[tokio::test]
async fn concurrent_status_updates_settle_on_one_value() {
    let h = harness();
    let a = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/incidents/INC001/status",
            serde_json::json!({"status": "investigating"}),
        ),
    );
    let b = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/incidents/INC001/status",
            serde_json::json!({"status": "resolved"}),
        ),
    );
    let ((status_a, body_a), (status_b, body_b)) = tokio::join!(a, b);

    assert_eq!(status_a, StatusCode::OK);
    assert_eq!(status_b, StatusCode::OK);
    assert_eq!(body_a["status"], "investigating");
    assert_eq!(body_b["status"], "resolved");

    let (_, current) = send(&h.router, get("/api/v1/incidents/INC001")).await;
    let final_status = current["status"].as_str().unwrap();
    assert!(final_status == "investigating" || final_status == "resolved");
}

#[tokio::test]
async fn details_are_null_before_retrieval_then_populated() {
    let h = harness();

    let (status, body) = send(&h.router, get("/api/v1/incidents/INC001/details")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["agent_results"].is_null());
    assert_eq!(body["incident"]["id"], "INC001");

    let (status, body) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/incidents/INC001/retrieve-context",
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["change_results"]["top_suspect"]["change_id"], "CHG005");

    let (_, body) = send(&h.router, get("/api/v1/incidents/INC001/details")).await;
    assert!(body["agent_results"].is_object());
    assert_eq!(
        body["agent_results"]["servicenow_results"]["incident_id"],
        "INC001"
    );
}

// ---------------------------------------------------------------------------
// Resolve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cold_resolve_returns_structured_resolution() {
    let h = harness();
    let (status, body) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/resolve",
            serde_json::json!({"incident_id": "INC001", "user_query": "What happened?"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["incident_id"], "INC001");
    assert!(body["summary"].as_str().unwrap().contains("CHG005"));
    assert!(!body["resolution_steps"].as_array().unwrap().is_empty());
    assert!(body["correlated_changes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c.as_str().unwrap().contains("CHG005")));

    let confidence = body["confidence"].as_f64().unwrap();
    assert!(confidence >= 0.65, "confidence {confidence}");
    assert!(confidence <= 1.0);

    // INC007 is the closer match and must rank first.
    let (_, details) = send(&h.router, get("/api/v1/incidents/INC001/details")).await;
    let similar = details["agent_results"]["servicenow_results"]["similar_incidents"]
        .as_array()
        .unwrap();
    assert_eq!(similar.len(), 2);
    assert_eq!(similar[0]["source_incident_id"], "INC007");
    assert_eq!(similar[1]["source_incident_id"], "INC011");
}

#[tokio::test]
async fn resolve_for_unknown_incident_is_404() {
    let h = harness();
    let (status, _) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/resolve",
            serde_json::json!({"incident_id": "INC404", "user_query": "?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn kb_outage_degrades_resolve_gracefully() {
    let h = harness_with(Arc::new(fixture_connector()), Arc::new(BrokenKb));
    let (status, body) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/resolve",
            serde_json::json!({"incident_id": "INC001", "user_query": "What happened?"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["related_knowledge"].as_array().unwrap().is_empty());
    // Other evidence survives the outage.
    assert!(!body["correlated_changes"].as_array().unwrap().is_empty());

    let (_, details) = send(&h.router, get("/api/v1/incidents/INC001/details")).await;
    assert!(details["agent_results"]["confluence_results"].is_null());
    assert!(details["agent_results"]["servicenow_results"].is_object());
}

// ---------------------------------------------------------------------------
// Chat streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_stream_frames_end_with_done() {
    let h = harness();
    let frames = sse_frames(
        &h.router,
        serde_json::json!({"incident_id": "INC001", "message": "What happened?"}),
    )
    .await;

    assert!(frames.len() >= 2, "frames: {frames:?}");
    for frame in &frames {
        assert!(frame.starts_with("data: "), "bad frame: {frame}");
    }
    assert_eq!(frames.last().unwrap(), "data: [DONE]");
}

#[tokio::test]
async fn chat_after_resolve_reuses_cached_retrieval() {
    let spy = Arc::new(SpyConnector {
        inner: fixture_connector(),
        retrieval_calls: AtomicUsize::new(0),
    });
    let h = harness_with(spy.clone(), Arc::new(fixture_kb()));

    let (status, _) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/resolve",
            serde_json::json!({"incident_id": "INC001", "user_query": "What happened?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let after_resolve = spy.retrieval_calls.load(Ordering::SeqCst);
    assert!(after_resolve > 0);

    let frames = sse_frames(
        &h.router,
        serde_json::json!({"incident_id": "INC001", "message": "Next steps?"}),
    )
    .await;
    assert!(frames.len() >= 2);
    assert_eq!(frames.last().unwrap(), "data: [DONE]");

    // No connector retrieval ran for the chat.
    assert_eq!(spy.retrieval_calls.load(Ordering::SeqCst), after_resolve);
}

#[tokio::test]
async fn chat_for_unknown_incident_is_404() {
    let h = harness();
    let (status, _) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/chat/stream",
            serde_json::json!({"incident_id": "INC404", "message": "hello"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Exclusions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exclude_then_query_drops_item_and_promotes_next_change() {
    let h = harness();

    // Populate the cache first.
    let (status, _) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/resolve",
            serde_json::json!({"incident_id": "INC001", "user_query": "What happened?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/incidents/INC001/exclude-item",
            serde_json::json!({"item_id": "CHG005", "kind": "change", "source": "mock"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&h.router, get("/api/v1/incidents/INC001/excluded-items")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["item_id"], "CHG005");

    // Details no longer contain the excluded change; the next-highest
    // change becomes the top suspect.
    let (_, details) = send(&h.router, get("/api/v1/incidents/INC001/details")).await;
    let changes = &details["agent_results"]["change_results"];
    assert_eq!(changes["top_suspect"]["change_id"], "CHG006");
    assert!(changes["all_correlations"]
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["change_id"] != "CHG005"));

    // Removing the exclusion restores the original ranking.
    let (status, _) = send(
        &h.router,
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/incidents/INC001/excluded-items/CHG005")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, details) = send(&h.router, get("/api/v1/incidents/INC001/details")).await;
    assert_eq!(
        details["agent_results"]["change_results"]["top_suspect"]["change_id"],
        "CHG005"
    );
}

#[tokio::test]
async fn accuracy_metrics_track_exclusions() {
    let h = harness();
    send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/resolve",
            serde_json::json!({"incident_id": "INC001", "user_query": "?"}),
        ),
    )
    .await;
    h.exclusions
        .exclude(
            "INC001",
            ExcludedItem {
                item_id: "CHG005".to_string(),
                kind: "change".to_string(),
                source: "mock".to_string(),
            },
        )
        .unwrap();

    let (status, body) = send(&h.router, get("/api/v1/admin/accuracy-metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let changes = &body["categories"]["changes"];
    assert!(changes["returned"].as_u64().unwrap() >= 2);
    assert_eq!(changes["excluded"].as_u64().unwrap(), 1);
    let overall = body["overall_accuracy"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&overall));
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_and_root_respond() {
    let h = harness();
    let (status, body) = send(&h.router, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&h.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("SmartRecover"));
}

#[tokio::test]
async fn trace_id_is_echoed() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header("x-trace-id", "trace-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("x-trace-id").unwrap(),
        "trace-123"
    );

    // Without an inbound header one is generated.
    let response = h
        .router
        .clone()
        .oneshot(get("/api/v1/health"))
        .await
        .unwrap();
    assert!(!response
        .headers()
        .get("x-trace-id")
        .unwrap()
        .to_str()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn prompt_update_and_reset_round_trip() {
    let h = harness();

    let (status, body) = send(&h.router, get("/api/v1/admin/agent-prompts")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["servicenow"]["is_custom"].as_bool() == Some(false));

    let (status, body) = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/admin/agent-prompts/servicenow",
            serde_json::json!({"prompt": "Rank strictly by severity."}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_custom"], true);

    // Reset twice; the second reset is a no-op with the same outcome.
    for _ in 0..2 {
        let (status, _) = send(
            &h.router,
            json_request(
                "POST",
                "/api/v1/admin/agent-prompts/reset?agent_name=servicenow",
                serde_json::json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&h.router, get("/api/v1/admin/agent-prompts/servicenow")).await;
    assert_eq!(body["is_custom"], false);
}

#[tokio::test]
async fn unknown_prompt_agent_is_404() {
    let h = harness();
    let (status, _) = send(&h.router, get("/api/v1/admin/agent-prompts/remediation")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn llm_config_is_redacted_and_swappable() {
    let h = harness();
    let (status, body) = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/admin/llm-config",
            serde_json::json!({
                "provider": "openai",
                "openai": {"model": "gpt-4o-mini", "temperature": 0.2, "api_key": "sk-supersecret"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["openai"]["model"], "gpt-4o-mini");
    assert_eq!(body["openai"]["api_key"], "***");

    let (_, body) = send(&h.router, get("/api/v1/admin/llm-config")).await;
    assert_eq!(body["provider"], "openai");
    assert_eq!(body["openai"]["api_key"], "***");
}

#[tokio::test]
async fn prompt_logs_accumulate_and_clear() {
    let h = harness();
    send(
        &h.router,
        json_request(
            "POST",
            "/api/v1/resolve",
            serde_json::json!({"incident_id": "INC001", "user_query": "What happened?"}),
        ),
    )
    .await;

    let (status, body) = send(&h.router, get("/api/v1/admin/prompt-logs")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["count"].as_u64().unwrap() >= 1);
    assert_eq!(body["logs"][0]["prompt_type"], "synthesis");
    assert_eq!(body["logs"][0]["incident_id"], "INC001");

    let (status, body) = send(
        &h.router,
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/admin/prompt-logs")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["deleted"].as_u64().unwrap() >= 1);

    let (_, body) = send(&h.router, get("/api/v1/admin/prompt-logs")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn logging_config_round_trip() {
    let h = harness();
    let (status, body) = send(&h.router, get("/api/v1/admin/logging-config")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "info");

    let (status, body) = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/admin/logging-config",
            serde_json::json!({"level": "debug", "enable_tracing": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "debug");
    assert_eq!(body["enable_tracing"], true);

    let (status, _) = send(
        &h.router,
        json_request(
            "PUT",
            "/api/v1/admin/logging-config",
            serde_json::json!({"level": "shouting"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_llm_reports_scripted_provider() {
    let h = harness();
    let (status, body) = send(
        &h.router,
        json_request("POST", "/api/v1/admin/test-llm", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["provider"], "scripted");
    assert!(body["llm_response"].as_str().unwrap().contains("CHG005"));
}
