//! Incident-management agent.
//!
//! Queries the incident connector for similar resolved incidents, keeps
//! only tickets that carry usable content, and attaches a quality
//! assessment of what came back.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use smartrecover_core::config::AgentsConfig;
use smartrecover_core::models::{Incident, ServiceNowResults};
use smartrecover_core::prompts::{default_prompt, PromptStore};
use smartrecover_core::quality::assess_tickets;
use smartrecover_core::Result;
use smartrecover_connectors::IncidentConnector;

pub struct IncidentManagementAgent {
    connector: Arc<dyn IncidentConnector>,
    prompts: Arc<PromptStore>,
    similarity_threshold: f64,
    max_results: usize,
    quality_min_chars: usize,
}

impl IncidentManagementAgent {
    pub fn new(
        connector: Arc<dyn IncidentConnector>,
        prompts: Arc<PromptStore>,
        config: &AgentsConfig,
    ) -> Self {
        Self {
            connector,
            prompts,
            similarity_threshold: config.similarity_threshold,
            max_results: config.max_results,
            quality_min_chars: config.quality_min_chars,
        }
    }

    pub fn name(&self) -> &'static str {
        "servicenow"
    }

    pub fn default_prompt(&self) -> &'static str {
        default_prompt(self.name())
    }

    /// The effective system prompt for this agent.
    pub fn prompt(&self) -> String {
        self.prompts.prompt(self.name())
    }

    #[instrument(skip(self, incident, _context), fields(incident_id = %incident.id))]
    pub async fn query(&self, incident: &Incident, _context: &str) -> Result<ServiceNowResults> {
        info!(incident_id = %incident.id, "Incident-management query");

        let mut similar = self
            .connector
            .find_similar(incident, self.similarity_threshold, self.max_results)
            .await?;

        // Tickets without a description or resolution carry nothing worth
        // ranking or showing.
        similar.retain(|ticket| {
            let keep = ticket
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
                || ticket
                    .resolution
                    .as_deref()
                    .is_some_and(|r| !r.trim().is_empty());
            if !keep {
                debug!(ticket_id = %ticket.ticket_id, "Dropping content-free ticket");
            }
            keep
        });

        let resolutions: Vec<String> = similar
            .iter()
            .filter_map(|ticket| ticket.resolution.clone())
            .filter(|r| !r.trim().is_empty())
            .collect();

        let quality_assessment = Some(assess_tickets(&similar, self.quality_min_chars));

        debug!(
            similar = similar.len(),
            resolutions = resolutions.len(),
            "Incident-management query complete"
        );

        Ok(ServiceNowResults {
            source: self.connector.name().to_string(),
            incident_id: incident.id.clone(),
            similar_incidents: similar,
            quality_assessment,
            resolutions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use smartrecover_connectors::incident::MockIncidentConnector;
    use smartrecover_core::models::{IncidentStatus, Severity, Ticket, TicketKind};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn incident(id: &str, title: &str, status: IncidentStatus) -> Incident {
        Incident {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{title} observed across the fleet"),
            severity: Severity::High,
            status,
            created_at: Utc::now(),
            updated_at: None,
            affected_services: vec!["database".to_string()],
            assignee: None,
        }
    }

    fn agent_with(
        incidents: Vec<Incident>,
        tickets: HashMap<String, Vec<Ticket>>,
    ) -> (IncidentManagementAgent, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let connector = Arc::new(MockIncidentConnector::from_fixtures(
            incidents,
            tickets,
            HashMap::new(),
        ));
        let prompts = Arc::new(PromptStore::load(dir.path().join("prompts.json")));
        let agent = IncidentManagementAgent::new(connector, prompts, &AgentsConfig::default());
        (agent, dir)
    }

    #[tokio::test]
    async fn returns_similar_incidents_with_resolutions() {
        let target = incident("INC001", "Database connection timeout", IncidentStatus::Open);
        let mut tickets = HashMap::new();
        tickets.insert(
            "INC007".to_string(),
            vec![Ticket {
                ticket_id: "SNOW-1".to_string(),
                incident_id: "INC007".to_string(),
                kind: TicketKind::SimilarIncident,
                resolution: Some("Recycled the connection pool and raised limits".to_string()),
                description: Some("Pool exhaustion during peak traffic window".to_string()),
                source: "servicenow".to_string(),
            }],
        );
        let (agent, _dir) = agent_with(
            vec![
                target.clone(),
                incident("INC007", "Database connection timeout", IncidentStatus::Resolved),
            ],
            tickets,
        );

        let results = agent.query(&target, "").await.unwrap();
        assert_eq!(results.similar_incidents.len(), 1);
        assert_eq!(results.resolutions.len(), 1);
        assert!(results.quality_assessment.is_some());
        assert_eq!(results.source, "mock");
    }

    #[tokio::test]
    async fn empty_when_no_resolved_matches() {
        let target = incident("INC001", "Database connection timeout", IncidentStatus::Open);
        let (agent, _dir) = agent_with(
            vec![
                target.clone(),
                incident("INC002", "Database connection timeout", IncidentStatus::Open),
            ],
            HashMap::new(),
        );

        let results = agent.query(&target, "").await.unwrap();
        assert!(results.similar_incidents.is_empty());
        assert!(results.resolutions.is_empty());
    }

    #[tokio::test]
    async fn quality_reflects_ticket_completeness() {
        let target = incident("INC001", "Database connection timeout", IncidentStatus::Open);
        let mut tickets = HashMap::new();
        tickets.insert(
            "INC007".to_string(),
            vec![Ticket {
                ticket_id: "SNOW-1".to_string(),
                incident_id: "INC007".to_string(),
                kind: TicketKind::SimilarIncident,
                resolution: None,
                description: Some("Pool exhaustion during the peak traffic window".to_string()),
                source: "servicenow".to_string(),
            }],
        );
        let (agent, _dir) = agent_with(
            vec![
                target.clone(),
                incident("INC007", "Database connection timeout", IncidentStatus::Resolved),
            ],
            tickets,
        );

        let results = agent.query(&target, "").await.unwrap();
        let quality = results.quality_assessment.unwrap();
        assert_eq!(quality.summary.warning_count, 1);
        assert!(quality
            .ticket_qualities[0]
            .issues
            .iter()
            .any(|i| i.contains("missing resolution")));
    }
}
