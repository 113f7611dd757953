//! Change-correlation agent.
//!
//! Pulls changes deployed within the configured window around the incident
//! and scores each against the incident: service overlap (0.5), temporal
//! proximity (0.3), and description keyword overlap (0.2). Backends that
//! precompute a correlation score (the CSV mock) win over the formula so
//! fixtures stay deterministic.
//!
//! Partitions: the highest-scoring change becomes `top_suspect` when it
//! clears 0.7; `high` is everything at or above 0.5, `medium` is [0.3, 0.5);
//! anything below 0.3 is dropped.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, instrument};

use smartrecover_core::config::AgentsConfig;
use smartrecover_core::models::{ChangeRecord, ChangeResults, CorrelatedChange, Incident};
use smartrecover_core::prompts::{default_prompt, PromptStore};
use smartrecover_core::similarity::text_similarity;
use smartrecover_core::Result;
use smartrecover_connectors::{ChangeWindow, IncidentConnector};

const SERVICE_WEIGHT: f64 = 0.5;
const TEMPORAL_WEIGHT: f64 = 0.3;
const KEYWORD_WEIGHT: f64 = 0.2;

/// Score at or above which the best change becomes the top suspect.
pub const TOP_SUSPECT_THRESHOLD: f64 = 0.7;
/// Score at or above which a change counts as highly correlated.
pub const HIGH_THRESHOLD: f64 = 0.5;
/// Score below which a change is dropped entirely.
pub const MEDIUM_THRESHOLD: f64 = 0.3;

pub struct ChangeCorrelationAgent {
    connector: Arc<dyn IncidentConnector>,
    prompts: Arc<PromptStore>,
    window: ChangeWindow,
}

impl ChangeCorrelationAgent {
    pub fn new(
        connector: Arc<dyn IncidentConnector>,
        prompts: Arc<PromptStore>,
        config: &AgentsConfig,
    ) -> Self {
        Self {
            connector,
            prompts,
            window: ChangeWindow {
                before: Duration::days(config.change_window_before_days),
                after: Duration::hours(config.change_window_after_hours),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        "change_correlation"
    }

    pub fn default_prompt(&self) -> &'static str {
        default_prompt(self.name())
    }

    pub fn prompt(&self) -> String {
        self.prompts.prompt(self.name())
    }

    /// Weighted correlation of one change against the incident.
    fn score_change(&self, incident: &Incident, change: &ChangeRecord) -> f64 {
        let service_score = match &change.service {
            Some(service) => {
                let incident_services: HashSet<&str> = incident
                    .affected_services
                    .iter()
                    .map(String::as_str)
                    .collect();
                let change_services: HashSet<&str> = [service.as_str()].into();
                let union = incident_services.union(&change_services).count();
                if union == 0 {
                    0.0
                } else {
                    incident_services.intersection(&change_services).count() as f64 / union as f64
                }
            }
            None => 0.0,
        };

        let gap = (incident.created_at - change.deployed_at).abs();
        let temporal_score = (1.0
            - gap.num_seconds() as f64 / self.window.before.num_seconds().max(1) as f64)
            .clamp(0.0, 1.0);

        let incident_text = format!("{} {}", incident.title, incident.description);
        let keyword_score = text_similarity(&incident_text, &change.description);

        service_score * SERVICE_WEIGHT
            + temporal_score * TEMPORAL_WEIGHT
            + keyword_score * KEYWORD_WEIGHT
    }

    #[instrument(skip(self, incident, _context), fields(incident_id = %incident.id))]
    pub async fn query(&self, incident: &Incident, _context: &str) -> Result<ChangeResults> {
        info!(incident_id = %incident.id, "Change-correlation query");

        let changes = self.connector.find_changes(incident, self.window).await?;

        let mut all_correlations: Vec<CorrelatedChange> = changes
            .into_iter()
            .map(|change| {
                let correlation_score = change
                    .correlation_score
                    .unwrap_or_else(|| self.score_change(incident, &change));
                CorrelatedChange {
                    change_id: change.change_id,
                    description: change.description,
                    deployed_at: change.deployed_at,
                    service: change.service,
                    correlation_score,
                }
            })
            .filter(|change| change.correlation_score >= MEDIUM_THRESHOLD)
            .collect();

        all_correlations.sort_by(|a, b| {
            b.correlation_score
                .partial_cmp(&a.correlation_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.change_id.cmp(&b.change_id))
        });

        let high_correlation_changes: Vec<CorrelatedChange> = all_correlations
            .iter()
            .filter(|c| c.correlation_score >= HIGH_THRESHOLD)
            .cloned()
            .collect();
        let medium_correlation_changes: Vec<CorrelatedChange> = all_correlations
            .iter()
            .filter(|c| c.correlation_score < HIGH_THRESHOLD)
            .cloned()
            .collect();
        let top_suspect = all_correlations
            .first()
            .filter(|c| c.correlation_score >= TOP_SUSPECT_THRESHOLD)
            .cloned();

        debug!(
            total = all_correlations.len(),
            high = high_correlation_changes.len(),
            top_suspect = top_suspect.as_ref().map(|c| c.change_id.as_str()),
            "Change-correlation query complete"
        );

        Ok(ChangeResults {
            source: "change_correlation".to_string(),
            incident_id: incident.id.clone(),
            top_suspect,
            high_correlation_changes,
            medium_correlation_changes,
            all_correlations,
        })
    }
}
