//! Incident-management connectors.
//!
//! A connector owns the incident store for its backend and answers the
//! retrieval questions the agents ask. The mock variant is fully
//! deterministic and CSV-backed; ServiceNow and Jira speak REST and report
//! `not-supported` for log/event retrieval, which the agents degrade to
//! empty results.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use smartrecover_core::config::{IncidentConnectorConfig, IncidentConnectorType};
use smartrecover_core::models::{
    ChangeRecord, EventRecord, Incident, IncidentStatus, LogRecord, SimilarIncident,
};
use smartrecover_core::{Error, Result};

pub mod jira;
pub mod mock;
pub mod servicenow;

pub use jira::JiraConnector;
pub use mock::MockIncidentConnector;
pub use servicenow::ServiceNowConnector;

/// Deploy window for change correlation, relative to incident creation.
#[derive(Debug, Clone, Copy)]
pub struct ChangeWindow {
    /// How far before the incident to look.
    pub before: Duration,
    /// How far after the incident to look.
    pub after: Duration,
}

impl Default for ChangeWindow {
    fn default() -> Self {
        Self {
            before: Duration::days(7),
            after: Duration::hours(1),
        }
    }
}

/// Capability set of an incident-management backend.
#[async_trait]
pub trait IncidentConnector: Send + Sync {
    /// Backend name, used as the `source` tag on results.
    fn name(&self) -> &str;

    async fn list_incidents(&self) -> Result<Vec<Incident>>;

    async fn get_incident(&self, id: &str) -> Result<Incident>;

    /// Update an incident's status. Atomic with respect to concurrent
    /// readers: they observe either the old or the new incident.
    async fn update_status(&self, id: &str, status: IncidentStatus) -> Result<Incident>;

    /// Similar resolved incidents with their historical resolutions,
    /// best-first, at or above `threshold`, at most `k`.
    async fn find_similar(
        &self,
        incident: &Incident,
        threshold: f64,
        k: usize,
    ) -> Result<Vec<SimilarIncident>>;

    /// Changes deployed within `window` of the incident's creation.
    async fn find_changes(
        &self,
        incident: &Incident,
        window: ChangeWindow,
    ) -> Result<Vec<ChangeRecord>>;

    /// Log lines for the incident's services. Backends without a log store
    /// return [`Error::NotSupported`].
    async fn find_logs(&self, incident: &Incident) -> Result<Vec<LogRecord>>;

    /// Monitoring events for the incident's services. Backends without an
    /// event stream return [`Error::NotSupported`].
    async fn find_events(&self, incident: &Incident) -> Result<Vec<EventRecord>>;
}

/// Build the connector selected by the configuration record.
pub fn build_incident_connector(
    config: &IncidentConnectorConfig,
) -> Result<Arc<dyn IncidentConnector>> {
    match config.connector_type {
        IncidentConnectorType::Mock => Ok(Arc::new(MockIncidentConnector::load(
            &config.mock.data_dir,
        )?)),
        IncidentConnectorType::ServiceNow => {
            let sn = config.servicenow.as_ref().ok_or_else(|| {
                Error::config("servicenow configuration is required when type is 'servicenow'")
            })?;
            Ok(Arc::new(ServiceNowConnector::new(sn, config.timeout_secs)?))
        }
        IncidentConnectorType::Jira => {
            let jira = config.jira.as_ref().ok_or_else(|| {
                Error::config("jira configuration is required when type is 'jira'")
            })?;
            Ok(Arc::new(JiraConnector::new(jira, config.timeout_secs)?))
        }
    }
}
