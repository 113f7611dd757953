//! Events agent.
//!
//! Retrieves application-performance events for the incident and scores
//! each with the same blend the logs agent uses: service/application match
//! (0.5), recency (0.3), severity weight (0.2). Backends without an event
//! stream degrade to empty results.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use smartrecover_core::models::{
    EventEntry, EventRecord, EventSeverity, EventsResults, Incident,
};
use smartrecover_core::prompts::{default_prompt, PromptStore};
use smartrecover_core::{Error, Result};
use smartrecover_connectors::IncidentConnector;

const SERVICE_WEIGHT: f64 = 0.5;
const RECENCY_WEIGHT: f64 = 0.3;
const SEVERITY_WEIGHT: f64 = 0.2;

const RECENCY_SCALE_SECS: f64 = 3600.0;

pub struct EventsAgent {
    connector: Arc<dyn IncidentConnector>,
    prompts: Arc<PromptStore>,
}

impl EventsAgent {
    pub fn new(connector: Arc<dyn IncidentConnector>, prompts: Arc<PromptStore>) -> Self {
        Self { connector, prompts }
    }

    pub fn name(&self) -> &'static str {
        "events"
    }

    pub fn default_prompt(&self) -> &'static str {
        default_prompt(self.name())
    }

    pub fn prompt(&self) -> String {
        self.prompts.prompt(self.name())
    }

    #[instrument(skip(self, incident, _context), fields(incident_id = %incident.id))]
    pub async fn query(&self, incident: &Incident, _context: &str) -> Result<EventsResults> {
        info!(incident_id = %incident.id, "Events query");

        let records = match self.connector.find_events(incident).await {
            Ok(records) => records,
            Err(Error::NotSupported(reason)) => {
                debug!(reason, "Event retrieval not supported by backend");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let mut events: Vec<EventEntry> = records
            .into_iter()
            .map(|record| {
                let confidence_score = score_event(incident, &record);
                EventEntry {
                    id: record.id,
                    timestamp: record.timestamp,
                    event_type: record.event_type,
                    severity: record.severity,
                    application: record.application,
                    message: record.message,
                    details: record.details,
                    confidence_score,
                }
            })
            .collect();

        events.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });

        let total_count = events.len();
        let critical_count = events
            .iter()
            .filter(|e| e.severity == EventSeverity::Critical)
            .count();
        let warning_count = events
            .iter()
            .filter(|e| e.severity == EventSeverity::Warning)
            .count();

        debug!(total_count, critical_count, warning_count, "Events query complete");

        Ok(EventsResults {
            source: "appdynamics".to_string(),
            incident_id: incident.id.clone(),
            events,
            total_count,
            critical_count,
            warning_count,
        })
    }
}

fn score_event(incident: &Incident, record: &EventRecord) -> f64 {
    let service_score = if incident
        .affected_services
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&record.application))
    {
        1.0
    } else {
        0.0
    };

    let gap_secs = (incident.created_at - record.timestamp).num_seconds().abs() as f64;
    let recency_score = (1.0 - gap_secs / RECENCY_SCALE_SECS).clamp(0.0, 1.0);

    service_score * SERVICE_WEIGHT
        + recency_score * RECENCY_WEIGHT
        + record.severity.severity_weight() * SEVERITY_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use smartrecover_core::models::{IncidentStatus, Severity};

    fn incident() -> Incident {
        Incident {
            id: "INC001".to_string(),
            title: "Checkout latency".to_string(),
            description: "Slow transactions in checkout".to_string(),
            severity: Severity::High,
            status: IncidentStatus::Open,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            updated_at: None,
            affected_services: vec!["payment-gateway".to_string()],
            assignee: None,
        }
    }

    fn record(minutes_before: i64, severity: EventSeverity, application: &str) -> EventRecord {
        let incident = incident();
        EventRecord {
            id: format!("EVT-{minutes_before}"),
            timestamp: incident.created_at - Duration::minutes(minutes_before),
            event_type: "Slow Transaction".to_string(),
            severity,
            application: application.to_string(),
            message: "Response time exceeded 5000ms".to_string(),
            details: None,
        }
    }

    #[test]
    fn critical_on_affected_application_dominates() {
        let incident = incident();
        let critical = score_event(&incident, &record(5, EventSeverity::Critical, "payment-gateway"));
        let info = score_event(&incident, &record(5, EventSeverity::Info, "analytics"));
        assert!(critical > info);
        assert!(critical > 0.9);
    }

    #[test]
    fn application_match_is_case_insensitive() {
        let incident = incident();
        let score = score_event(&incident, &record(5, EventSeverity::Info, "Payment-Gateway"));
        assert!(score >= 0.5);
    }

    #[tokio::test]
    async fn counts_match_event_severities() {
        use smartrecover_connectors::incident::MockIncidentConnector;
        use std::collections::HashMap;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let connector = Arc::new(MockIncidentConnector::from_fixtures(
            vec![incident()],
            HashMap::new(),
            HashMap::new(),
        ));
        let prompts = Arc::new(PromptStore::load(dir.path().join("prompts.json")));
        let agent = EventsAgent::new(connector, prompts);

        let results = agent.query(&incident(), "").await.unwrap();
        assert_eq!(results.total_count, results.events.len());
        assert_eq!(
            results.critical_count,
            results
                .events
                .iter()
                .filter(|e| e.severity == EventSeverity::Critical)
                .count()
        );
        assert!(results
            .events
            .iter()
            .all(|e| (0.0..=1.0).contains(&e.confidence_score)));
    }
}
