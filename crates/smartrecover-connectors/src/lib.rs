//! Connector layer for SmartRecover.
//!
//! Two connector families, each a capability trait with a closed set of
//! variants selected by a tagged configuration record:
//!
//! - [`incident::IncidentConnector`]: mock (CSV), ServiceNow, Jira
//! - [`kb::KnowledgeBaseConnector`]: mock (CSV + runbook files), Confluence
//!
//! Remote variants speak REST through `reqwest` with per-call timeouts and
//! one retry with backoff on transient failures.

pub mod incident;
pub mod kb;

mod retry;

pub use incident::{build_incident_connector, ChangeWindow, IncidentConnector};
pub use kb::{build_knowledge_base_connector, KnowledgeBaseConnector};
