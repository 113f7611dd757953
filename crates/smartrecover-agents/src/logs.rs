//! Logs agent.
//!
//! Retrieves log lines for the incident's services and scores each one:
//! service match (0.5), recency relative to incident creation (0.3), and
//! severity weight (0.2). Backends without a log store degrade to empty
//! results.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use smartrecover_core::models::{Incident, LogEntry, LogLevel, LogRecord, LogsResults};
use smartrecover_core::prompts::{default_prompt, PromptStore};
use smartrecover_core::{Error, Result};
use smartrecover_connectors::IncidentConnector;

const SERVICE_WEIGHT: f64 = 0.5;
const RECENCY_WEIGHT: f64 = 0.3;
const SEVERITY_WEIGHT: f64 = 0.2;

/// Time scale over which recency decays to zero.
const RECENCY_SCALE_SECS: f64 = 3600.0;

pub struct LogsAgent {
    connector: Arc<dyn IncidentConnector>,
    prompts: Arc<PromptStore>,
}

impl LogsAgent {
    pub fn new(connector: Arc<dyn IncidentConnector>, prompts: Arc<PromptStore>) -> Self {
        Self { connector, prompts }
    }

    pub fn name(&self) -> &'static str {
        "logs"
    }

    pub fn default_prompt(&self) -> &'static str {
        default_prompt(self.name())
    }

    pub fn prompt(&self) -> String {
        self.prompts.prompt(self.name())
    }

    #[instrument(skip(self, incident, _context), fields(incident_id = %incident.id))]
    pub async fn query(&self, incident: &Incident, _context: &str) -> Result<LogsResults> {
        info!(incident_id = %incident.id, "Logs query");

        let records = match self.connector.find_logs(incident).await {
            Ok(records) => records,
            Err(Error::NotSupported(reason)) => {
                debug!(reason, "Log retrieval not supported by backend");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let mut logs: Vec<LogEntry> = records
            .into_iter()
            .map(|record| {
                let confidence_score = score_log(incident, &record);
                LogEntry {
                    timestamp: record.timestamp,
                    level: record.level,
                    service: record.service,
                    message: record.message,
                    source: record.source,
                    confidence_score,
                }
            })
            .collect();

        logs.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });

        let total_count = logs.len();
        let error_count = logs.iter().filter(|l| l.level == LogLevel::Error).count();
        let warning_count = logs.iter().filter(|l| l.level == LogLevel::Warn).count();

        debug!(total_count, error_count, warning_count, "Logs query complete");

        Ok(LogsResults {
            source: "splunk".to_string(),
            incident_id: incident.id.clone(),
            logs,
            total_count,
            error_count,
            warning_count,
        })
    }
}

fn score_log(incident: &Incident, record: &LogRecord) -> f64 {
    let service_score = if incident
        .affected_services
        .iter()
        .any(|s| s == &record.service)
    {
        1.0
    } else {
        0.0
    };

    let gap_secs = (incident.created_at - record.timestamp).num_seconds().abs() as f64;
    let recency_score = (1.0 - gap_secs / RECENCY_SCALE_SECS).clamp(0.0, 1.0);

    service_score * SERVICE_WEIGHT
        + recency_score * RECENCY_WEIGHT
        + record.level.severity_weight() * SEVERITY_WEIGHT
}
