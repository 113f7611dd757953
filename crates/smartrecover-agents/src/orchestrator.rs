//! Orchestrator: the agent graph runtime.
//!
//! Runs a directed acyclic graph of agent nodes over a single shared
//! [`IncidentState`]:
//!
//! ```text
//! incident-loader -> servicenow -> knowledge-base -> change-correlation
//!                 -> logs -> events -> synthesis
//! ```
//!
//! Edges are sequential. Each non-synthesis node queries its agent and
//! writes the result into the matching state slot; a node failure is logged
//! and leaves its slot empty so synthesis always runs with whatever partial
//! evidence exists. Only a failed incident load aborts the request.
//!
//! Before synthesis the per-incident exclusion set is applied, and the
//! filtered evidence is rendered into the deterministic context both
//! `/resolve` and `/chat/stream` share.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use smartrecover_core::cache::AgentCache;
use smartrecover_core::config::AgentsConfig;
use smartrecover_core::exclusion::ExclusionStore;
use smartrecover_core::models::{
    AgentData, ChatMessage, EventSeverity, ExcludedItem, Incident, LogLevel, ResolveResponse,
};
use smartrecover_core::prompt_log::PromptType;
use smartrecover_core::prompts::PromptStore;
use smartrecover_core::Result;
use smartrecover_connectors::{IncidentConnector, KnowledgeBaseConnector};
use smartrecover_llm::LlmManager;

use crate::change_correlation::{ChangeCorrelationAgent, TOP_SUSPECT_THRESHOLD};
use crate::context::build_context;
use crate::events::EventsAgent;
use crate::incident_management::IncidentManagementAgent;
use crate::knowledge_base::KnowledgeBaseAgent;
use crate::logs::LogsAgent;

/// Lifecycle of a single request through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Loading,
    Retrieving,
    Ranking,
    Synthesizing,
    Complete,
    Failed,
    Cancelled,
}

impl RequestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPhase::Loading => "loading",
            RequestPhase::Retrieving => "retrieving",
            RequestPhase::Ranking => "ranking",
            RequestPhase::Synthesizing => "synthesizing",
            RequestPhase::Complete => "complete",
            RequestPhase::Failed => "failed",
            RequestPhase::Cancelled => "cancelled",
        }
    }
}

/// Shared state accumulated while a request walks the graph.
#[derive(Debug, Clone)]
pub struct IncidentState {
    pub incident_id: String,
    pub user_query: String,
    pub incident: Option<Incident>,
    pub agent_data: AgentData,
    pub synthesis: Option<ResolveResponse>,
}

impl IncidentState {
    fn new(incident_id: &str, user_query: &str) -> Self {
        Self {
            incident_id: incident_id.to_string(),
            user_query: user_query.to_string(),
            incident: None,
            agent_data: AgentData::default(),
            synthesis: None,
        }
    }
}

/// Non-synthesis nodes of the retrieval graph, in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentNode {
    ServiceNow,
    KnowledgeBase,
    ChangeCorrelation,
    Logs,
    Events,
}

const RETRIEVAL_GRAPH: &[AgentNode] = &[
    AgentNode::ServiceNow,
    AgentNode::KnowledgeBase,
    AgentNode::ChangeCorrelation,
    AgentNode::Logs,
    AgentNode::Events,
];

/// Coordinates the agents, the cache, exclusions, and the LLM.
pub struct Orchestrator {
    incident_connector: Arc<dyn IncidentConnector>,
    servicenow: IncidentManagementAgent,
    knowledge_base: KnowledgeBaseAgent,
    change_correlation: ChangeCorrelationAgent,
    logs: LogsAgent,
    events: EventsAgent,
    llm: Arc<LlmManager>,
    cache: Arc<AgentCache>,
    exclusions: Arc<ExclusionStore>,
    prompts: Arc<PromptStore>,
    max_context_items: usize,
}

impl Orchestrator {
    pub fn new(
        incident_connector: Arc<dyn IncidentConnector>,
        kb_connector: Arc<dyn KnowledgeBaseConnector>,
        llm: Arc<LlmManager>,
        cache: Arc<AgentCache>,
        exclusions: Arc<ExclusionStore>,
        prompts: Arc<PromptStore>,
        config: &AgentsConfig,
    ) -> Self {
        info!("Initializing orchestrator");
        Self {
            servicenow: IncidentManagementAgent::new(
                incident_connector.clone(),
                prompts.clone(),
                config,
            ),
            knowledge_base: KnowledgeBaseAgent::new(kb_connector, prompts.clone(), config),
            change_correlation: ChangeCorrelationAgent::new(
                incident_connector.clone(),
                prompts.clone(),
                config,
            ),
            logs: LogsAgent::new(incident_connector.clone(), prompts.clone()),
            events: EventsAgent::new(incident_connector.clone(), prompts.clone()),
            incident_connector,
            llm,
            cache,
            exclusions,
            prompts,
            max_context_items: config.max_context_items,
        }
    }

    /// Run one node, degrading gracefully: a failure logs, leaves the slot
    /// empty, and lets the traversal continue.
    async fn run_node(&self, node: AgentNode, mut state: IncidentState) -> IncidentState {
        let incident = state
            .incident
            .clone()
            .expect("incident loader must run before agent nodes");
        let query = state.user_query.clone();

        macro_rules! run_agent {
            ($agent:expr, $slot:ident) => {
                match $agent.query(&incident, &query).await {
                    Ok(results) => state.agent_data.$slot = Some(results),
                    Err(e) => {
                        warn!(
                            incident_id = %state.incident_id,
                            agent = $agent.name(),
                            error = %e,
                            "Agent failed; continuing with empty results"
                        );
                        metrics::counter!(
                            "smartrecover_agent_failures_total",
                            "agent" => $agent.name()
                        )
                        .increment(1);
                    }
                }
            };
        }

        match node {
            AgentNode::ServiceNow => run_agent!(self.servicenow, servicenow_results),
            AgentNode::KnowledgeBase => run_agent!(self.knowledge_base, confluence_results),
            AgentNode::ChangeCorrelation => {
                run_agent!(self.change_correlation, change_results)
            }
            AgentNode::Logs => run_agent!(self.logs, logs_results),
            AgentNode::Events => run_agent!(self.events, events_results),
        }
        state
    }

    /// Run the retrieval graph for an incident, store the results in the
    /// cache, and return them. Fails only when the incident cannot be
    /// loaded.
    #[instrument(skip(self, user_query))]
    pub async fn retrieve(&self, incident_id: &str, user_query: &str) -> Result<AgentData> {
        debug!(incident_id, phase = RequestPhase::Loading.as_str(), "Graph start");
        let incident = self.incident_connector.get_incident(incident_id).await?;

        let mut state = IncidentState::new(incident_id, user_query);
        state.incident = Some(incident);

        debug!(incident_id, phase = RequestPhase::Retrieving.as_str(), "Running agent nodes");
        for node in RETRIEVAL_GRAPH {
            state = self.run_node(*node, state).await;
            metrics::counter!("smartrecover_agent_invocations_total").increment(1);
        }

        self.record_returned(&state.agent_data);
        self.cache.put(incident_id, state.agent_data.clone());
        Ok(state.agent_data)
    }

    /// Cached agent data if fresh, otherwise a full graph run.
    pub async fn get_or_retrieve(&self, incident_id: &str, user_query: &str) -> Result<AgentData> {
        if let Some(cached) = self.cache.get(incident_id) {
            info!(incident_id, "Using cached agent data");
            return Ok(cached);
        }
        info!(incident_id, "Cache miss, running agent graph");
        self.retrieve(incident_id, user_query).await
    }

    fn record_returned(&self, data: &AgentData) {
        let counts = [
            (
                "similar_incidents",
                data.servicenow_results
                    .as_ref()
                    .map(|s| s.similar_incidents.len())
                    .unwrap_or(0),
            ),
            (
                "knowledge_documents",
                data.confluence_results
                    .as_ref()
                    .map(|c| c.documents.len())
                    .unwrap_or(0),
            ),
            (
                "changes",
                data.change_results
                    .as_ref()
                    .map(|c| c.all_correlations.len())
                    .unwrap_or(0),
            ),
            (
                "logs",
                data.logs_results.as_ref().map(|l| l.logs.len()).unwrap_or(0),
            ),
            (
                "events",
                data.events_results
                    .as_ref()
                    .map(|e| e.events.len())
                    .unwrap_or(0),
            ),
        ];
        for (category, count) in counts {
            if count > 0 {
                self.exclusions.record_returned(category, count);
            }
        }
    }

    /// Exclusion-filtered agent data for an incident, merging the stored
    /// set with any request-scoped exclusions.
    fn filtered_data(&self, incident_id: &str, data: AgentData, extra: &[ExcludedItem]) -> AgentData {
        let mut excluded = self.exclusions.excluded_ids_for(incident_id);
        excluded.extend(extra.iter().map(|item| item.item_id.clone()));
        filter_excluded(data, &excluded)
    }

    /// The filtered agent data as served to `/details`.
    pub fn view_for(&self, incident_id: &str, data: AgentData) -> AgentData {
        self.filtered_data(incident_id, data, &[])
    }

    /// Full resolve flow: retrieval (or cache), exclusion filtering,
    /// context construction, LLM synthesis, structured response.
    #[instrument(skip(self, user_query))]
    pub async fn resolve(&self, incident_id: &str, user_query: &str) -> Result<ResolveResponse> {
        info!(incident_id, "Starting incident resolution workflow");

        let data = self.get_or_retrieve(incident_id, user_query).await?;

        debug!(incident_id, phase = RequestPhase::Ranking.as_str(), "Applying exclusions");
        let data = self.filtered_data(incident_id, data, &[]);
        let context = build_context(&data, self.max_context_items);
        let confidence = confidence_score(&data);

        debug!(incident_id, phase = RequestPhase::Synthesizing.as_str(), "Invoking LLM");
        let system_prompt = self.prompts.prompt("orchestrator");
        let messages = [ChatMessage {
            role: "user".to_string(),
            content: synthesis_request(user_query, &context),
        }];
        let summary = match self
            .llm
            .complete(incident_id, PromptType::Synthesis, &system_prompt, &messages, &context)
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => fallback_summary(&data),
            Err(e) => {
                warn!(incident_id, error = %e, "LLM synthesis failed, using fallback summary");
                fallback_summary(&data)
            }
        };

        let resolution_steps = data
            .servicenow_results
            .as_ref()
            .map(|s| s.resolutions.clone())
            .unwrap_or_default();
        let related_knowledge = data
            .confluence_results
            .as_ref()
            .map(|c| c.knowledge_base_articles.clone())
            .unwrap_or_default();
        let correlated_changes = data
            .change_results
            .as_ref()
            .map(|c| {
                c.high_correlation_changes
                    .iter()
                    .map(|change| {
                        format!(
                            "{}: {} (score: {:.0}%)",
                            change.change_id,
                            change.description,
                            change.correlation_score * 100.0
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        info!(
            incident_id,
            confidence,
            phase = RequestPhase::Complete.as_str(),
            "Incident resolution workflow complete"
        );

        Ok(ResolveResponse {
            incident_id: incident_id.to_string(),
            summary,
            resolution_steps,
            related_knowledge,
            correlated_changes,
            confidence,
        })
    }

    /// Streaming chat over the gathered evidence. The returned channel
    /// yields LLM chunks in order; dropping it cancels the upstream stream
    /// within one send.
    #[instrument(skip(self, message, history, extra_excluded))]
    pub async fn chat_stream(
        &self,
        incident_id: &str,
        message: &str,
        history: Vec<ChatMessage>,
        extra_excluded: &[ExcludedItem],
    ) -> Result<mpsc::Receiver<String>> {
        info!(incident_id, "Starting chat stream");

        // Verify the incident exists before any heavier work.
        self.incident_connector.get_incident(incident_id).await?;

        let data = self.get_or_retrieve(incident_id, message).await?;
        let data = self.filtered_data(incident_id, data, extra_excluded);
        let context = build_context(&data, self.max_context_items);

        let system_prompt = chat_system_prompt(
            &self.prompts.prompt("orchestrator"),
            incident_id,
            &context,
        );

        let mut messages = history.clone();
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: message.to_string(),
        });

        let provider_rx = self
            .llm
            .stream(incident_id, &system_prompt, &messages, &context, history)
            .await?;

        metrics::counter!("smartrecover_chat_streams_total").increment(1);

        // Relay chunks so a dropped receiver (client disconnect) is
        // observed here: the failed send tears down the provider stream and
        // the cancellation is logged.
        let (tx, rx) = mpsc::channel(100);
        let incident_id = incident_id.to_string();
        tokio::spawn(async move {
            let mut provider_rx = provider_rx;
            while let Some(chunk) = provider_rx.recv().await {
                if tx.send(chunk).await.is_err() {
                    info!(
                        incident_id = %incident_id,
                        phase = RequestPhase::Cancelled.as_str(),
                        "Chat stream cancelled by client"
                    );
                    metrics::counter!("smartrecover_chat_streams_cancelled_total").increment(1);
                    return;
                }
            }
        });

        Ok(rx)
    }
}

/// Evidence-weighted confidence for a resolve response. Purely additive:
/// base 0.2, +0.3 for a strong top suspect, +0.2 for a similar resolved
/// incident, +0.15 for a knowledge document, +0.1 for an error log, +0.05
/// for a critical event, clamped to [0, 1].
pub fn confidence_score(data: &AgentData) -> f64 {
    let mut score: f64 = 0.2;

    if data
        .change_results
        .as_ref()
        .and_then(|c| c.top_suspect.as_ref())
        .is_some_and(|top| top.correlation_score >= 0.8)
    {
        score += 0.3;
    }
    if data.servicenow_results.as_ref().is_some_and(|s| {
        s.similar_incidents
            .iter()
            .any(|i| i.status == smartrecover_core::models::IncidentStatus::Resolved)
    }) {
        score += 0.2;
    }
    if data
        .confluence_results
        .as_ref()
        .is_some_and(|c| !c.documents.is_empty())
    {
        score += 0.15;
    }
    if data
        .logs_results
        .as_ref()
        .is_some_and(|l| l.error_count > 0)
    {
        score += 0.1;
    }
    if data
        .events_results
        .as_ref()
        .is_some_and(|e| e.critical_count > 0)
    {
        score += 0.05;
    }

    score.clamp(0.0, 1.0)
}

/// Strip excluded items out of every agent-result list. Aggregate counts
/// are recomputed and the top suspect is re-derived from what survives.
pub fn filter_excluded(mut data: AgentData, excluded: &HashSet<String>) -> AgentData {
    if excluded.is_empty() {
        return data;
    }

    if let Some(servicenow) = data.servicenow_results.as_mut() {
        servicenow.similar_incidents.retain(|ticket| {
            !excluded.contains(&ticket.ticket_id) && !excluded.contains(&ticket.source_incident_id)
        });
        servicenow.resolutions = servicenow
            .similar_incidents
            .iter()
            .filter_map(|t| t.resolution.clone())
            .filter(|r| !r.trim().is_empty())
            .collect();
    }

    if let Some(confluence) = data.confluence_results.as_mut() {
        confluence
            .documents
            .retain(|doc| !excluded.contains(&doc.doc_id));
        confluence.knowledge_base_articles =
            confluence.documents.iter().map(|d| d.title.clone()).collect();
    }

    if let Some(changes) = data.change_results.as_mut() {
        changes
            .all_correlations
            .retain(|c| !excluded.contains(&c.change_id));
        changes
            .high_correlation_changes
            .retain(|c| !excluded.contains(&c.change_id));
        changes
            .medium_correlation_changes
            .retain(|c| !excluded.contains(&c.change_id));
        // Lists are sorted best-first, so the new top suspect is the head
        // of what remains, if it still clears the bar.
        changes.top_suspect = changes
            .all_correlations
            .first()
            .filter(|c| c.correlation_score >= TOP_SUSPECT_THRESHOLD)
            .cloned();
    }

    if let Some(logs) = data.logs_results.as_mut() {
        // Log lines carry no backend id; the message text is their identity.
        logs.logs.retain(|l| !excluded.contains(&l.message));
        logs.total_count = logs.logs.len();
        logs.error_count = logs.logs.iter().filter(|l| l.level == LogLevel::Error).count();
        logs.warning_count = logs.logs.iter().filter(|l| l.level == LogLevel::Warn).count();
    }

    if let Some(events) = data.events_results.as_mut() {
        events.events.retain(|e| !excluded.contains(&e.id));
        events.total_count = events.events.len();
        events.critical_count = events
            .events
            .iter()
            .filter(|e| e.severity == EventSeverity::Critical)
            .count();
        events.warning_count = events
            .events
            .iter()
            .filter(|e| e.severity == EventSeverity::Warning)
            .count();
    }

    data
}

/// Deterministic summary used when the LLM is unavailable.
fn fallback_summary(data: &AgentData) -> String {
    let mut parts = Vec::new();

    if let Some(top) = data.change_results.as_ref().and_then(|c| c.top_suspect.as_ref()) {
        parts.push(format!(
            "Likely cause: {} (deployed at {}, correlation: {:.0}%)",
            top.description,
            top.deployed_at.to_rfc3339(),
            top.correlation_score * 100.0
        ));
    }
    if let Some(servicenow) = &data.servicenow_results {
        if !servicenow.similar_incidents.is_empty() {
            parts.push(format!(
                "Found {} similar historical incidents",
                servicenow.similar_incidents.len()
            ));
        }
    }
    if let Some(confluence) = &data.confluence_results {
        if !confluence.documents.is_empty() {
            parts.push(format!(
                "Found {} relevant knowledge articles",
                confluence.documents.len()
            ));
        }
    }

    if parts.is_empty() {
        "No significant findings from available data sources.".to_string()
    } else {
        parts.join(". ")
    }
}

fn synthesis_request(user_query: &str, context: &str) -> String {
    format!(
        "Based on the following incident data, provide a concise summary of the incident, \
         likely cause, and recommended resolution steps:\n\n\
         User Query: {user_query}\n\n{context}\n\n\
         Provide a summary that:\n\
         1. Identifies the most likely cause of the incident\n\
         2. Suggests resolution steps based on historical data\n\
         3. Notes any relevant knowledge base articles or changes\n\
         4. Is clear and actionable for the incident responder"
    )
}

fn chat_system_prompt(base_prompt: &str, incident_id: &str, context: &str) -> String {
    format!(
        "{base_prompt}\n\n\
         You are helping with incident {incident_id}. You have access to the following \
         information about this incident:\n\n{context}\n\n\
         Answer the user's questions based on this information. Be conversational, helpful, \
         and concise. If the user asks about specific details, provide them from the context \
         above. If you don't have the information, say so clearly."
    )
}
