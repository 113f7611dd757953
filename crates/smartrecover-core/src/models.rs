//! Domain model for SmartRecover.
//!
//! Field names on the serializable types are part of the wire contract and
//! must not change without versioning the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// INCIDENTS
// =============================================================================

/// Incident severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(Error::invalid_input(format!("unknown severity: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Incident lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
}

impl IncidentStatus {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(IncidentStatus::Open),
            "investigating" => Ok(IncidentStatus::Investigating),
            "resolved" => Ok(IncidentStatus::Resolved),
            other => Err(Error::invalid_input(format!("unknown status: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

/// A tracked incident.
///
/// Incidents are loaded into the store at startup and mutated only through
/// the status-update operation; the core never deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub affected_services: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

// =============================================================================
// TICKETS
// =============================================================================

/// The kind of a ticket attached to an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    SimilarIncident,
    RelatedChange,
}

/// A ticket produced by an incident-management backend.
///
/// Tickets with `kind = similar_incident` should carry a resolution; tickets
/// with `kind = related_change` should carry a description. Tickets that
/// carry neither are filtered out before ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub incident_id: String,
    #[serde(rename = "type")]
    pub kind: TicketKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
}

impl Ticket {
    /// Whether the ticket carries enough content to be worth returning.
    pub fn has_content(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.trim().is_empty())
            || self.resolution.as_deref().is_some_and(|r| !r.trim().is_empty())
    }
}

// =============================================================================
// KNOWLEDGE BASE
// =============================================================================

/// A document held by a knowledge-base backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub doc_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Incident association for mock-mode fixtures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
}

// =============================================================================
// CHANGES
// =============================================================================

/// A change/deploy record as returned by a connector.
///
/// `correlation_score` is only populated by backends that precompute one
/// (the CSV-backed mock); it is a retrieval-time value, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change_id: String,
    pub description: String,
    pub deployed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_score: Option<f64>,
}

/// A change scored against an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedChange {
    pub change_id: String,
    pub description: String,
    pub deployed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub correlation_score: f64,
}

// =============================================================================
// TELEMETRY (LOGS AND EVENTS)
// =============================================================================

/// Log level of a retrieved log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Severity weight used by the logs agent's confidence score.
    pub fn severity_weight(&self) -> f64 {
        match self {
            LogLevel::Error => 1.0,
            LogLevel::Warn => 0.6,
            LogLevel::Info | LogLevel::Debug => 0.2,
        }
    }
}

/// A raw log line from a log store, before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub service: String,
    pub message: String,
    pub source: String,
}

/// A log line scored against the incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub service: String,
    pub message: String,
    pub source: String,
    pub confidence_score: f64,
}

/// Severity of a monitoring event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

impl EventSeverity {
    pub fn severity_weight(&self) -> f64 {
        match self {
            EventSeverity::Critical => 1.0,
            EventSeverity::Warning => 0.6,
            EventSeverity::Info => 0.2,
        }
    }
}

/// A raw event from an event stream, before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: EventSeverity,
    pub application: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// An event scored against the incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: EventSeverity,
    pub application: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub confidence_score: f64,
}

// =============================================================================
// AGENT RESULTS
// =============================================================================

/// A similar historical incident with its ticket payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarIncident {
    pub ticket_id: String,
    /// Incident the ticket came from.
    pub source_incident_id: String,
    pub title: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub similarity_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub source: String,
}

/// Result of the incident-management agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNowResults {
    pub source: String,
    pub incident_id: String,
    pub similar_incidents: Vec<SimilarIncident>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_assessment: Option<crate::quality::QualityAssessment>,
    pub resolutions: Vec<String>,
}

/// A knowledge document with its relevance to the incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub doc_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub relevance_score: f64,
}

/// Result of the knowledge-base agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceResults {
    pub source: String,
    pub incident_id: String,
    pub documents: Vec<ScoredDocument>,
    pub knowledge_base_articles: Vec<String>,
}

/// Result of the change-correlation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeResults {
    pub source: String,
    pub incident_id: String,
    pub top_suspect: Option<CorrelatedChange>,
    pub high_correlation_changes: Vec<CorrelatedChange>,
    pub medium_correlation_changes: Vec<CorrelatedChange>,
    pub all_correlations: Vec<CorrelatedChange>,
}

/// Result of the logs agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResults {
    pub source: String,
    pub incident_id: String,
    pub logs: Vec<LogEntry>,
    pub total_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Result of the events agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResults {
    pub source: String,
    pub incident_id: String,
    pub events: Vec<EventEntry>,
    pub total_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
}

/// The combined agent results for one incident.
///
/// Slots are `None` until the corresponding agent has run; a failed agent
/// leaves its slot `None` (graceful degradation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servicenow_results: Option<ServiceNowResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confluence_results: Option<ConfluenceResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_results: Option<ChangeResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_results: Option<LogsResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_results: Option<EventsResults>,
}

// =============================================================================
// RESOLUTION AND CHAT
// =============================================================================

/// Structured resolution produced by `/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub incident_id: String,
    pub summary: String,
    pub resolution_steps: Vec<String>,
    pub related_knowledge: Vec<String>,
    pub correlated_changes: Vec<String>,
    pub confidence: f64,
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

/// An item the user has marked irrelevant for an incident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExcludedItem {
    pub item_id: String,
    pub kind: String,
    pub source: String,
}
