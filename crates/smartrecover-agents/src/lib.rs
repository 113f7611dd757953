//! SmartRecover agents
//!
//! Five evidence-gathering agents, each querying one source for one
//! incident and returning a typed result:
//!
//! - **IncidentManagementAgent**: similar resolved incidents with their
//!   historical resolutions, plus a quality assessment
//! - **KnowledgeBaseAgent**: runbooks and articles ranked by keyword overlap
//! - **ChangeCorrelationAgent**: deploys near the incident, scored by
//!   service overlap, temporal proximity, and description overlap
//! - **LogsAgent** / **EventsAgent**: telemetry scored by service match,
//!   recency, and severity
//!
//! The [`orchestrator::Orchestrator`] drives them as a sequential DAG with
//! per-node graceful degradation and feeds the filtered evidence to the LLM
//! for synthesis and chat.

pub mod change_correlation;
pub mod context;
pub mod events;
pub mod incident_management;
pub mod knowledge_base;
pub mod logs;
pub mod orchestrator;

pub use change_correlation::ChangeCorrelationAgent;
pub use events::EventsAgent;
pub use incident_management::IncidentManagementAgent;
pub use knowledge_base::KnowledgeBaseAgent;
pub use logs::LogsAgent;
pub use orchestrator::{IncidentState, Orchestrator, RequestPhase};
