//! ServiceNow incident connector.
//!
//! Talks to the ServiceNow Table API (`/api/now/table/...`) with basic
//! authentication. Candidate incidents are fetched remotely and ranked
//! locally with the same weighted-Jaccard similarity the mock uses; log and
//! event retrieval are not supported by this backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument};

use smartrecover_core::config::ServiceNowConfig;
use smartrecover_core::models::{
    ChangeRecord, EventRecord, Incident, IncidentStatus, LogRecord, Severity, SimilarIncident,
};
use smartrecover_core::similarity::incident_similarity;
use smartrecover_core::{Error, Result};

use crate::retry::{status_error, upstream_error, with_retry};

use super::{ChangeWindow, IncidentConnector};

pub struct ServiceNowConnector {
    client: reqwest::Client,
    instance_url: String,
    username: String,
    password: String,
}

impl ServiceNowConnector {
    pub fn new(config: &ServiceNowConfig, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("cannot build ServiceNow client: {e}")))?;

        Ok(Self {
            client,
            instance_url: config.instance_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn table_query(&self, table: &str, query: &str, limit: usize) -> Result<Vec<Value>> {
        let url = format!("{}/api/now/table/{table}", self.instance_url);
        let operation = format!("servicenow {table} query");

        let limit = limit.to_string();
        with_retry(&operation, || async {
            let response = self
                .client
                .get(&url)
                .basic_auth(&self.username, Some(&self.password))
                .query(&[
                    ("sysparm_query", query),
                    ("sysparm_limit", limit.as_str()),
                ])
                .send()
                .await
                .map_err(|e| upstream_error(&operation, e))?;

            if !response.status().is_success() {
                return Err(status_error(&operation, response.status()));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| upstream_error(&operation, e))?;
            Ok(body["result"].as_array().cloned().unwrap_or_default())
        })
        .await
    }

    fn parse_incident(&self, record: &Value) -> Option<Incident> {
        let id = non_empty(record, "number")?;
        Some(Incident {
            id,
            title: non_empty(record, "short_description").unwrap_or_default(),
            description: non_empty(record, "description").unwrap_or_default(),
            severity: parse_severity(record["severity"].as_str().unwrap_or("")),
            status: parse_state(record["state"].as_str().unwrap_or("")),
            created_at: parse_sn_time(record["sys_created_on"].as_str().unwrap_or(""))?,
            updated_at: parse_sn_time(record["sys_updated_on"].as_str().unwrap_or("")),
            affected_services: non_empty(record, "cmdb_ci")
                .map(|ci| vec![ci])
                .unwrap_or_default(),
            assignee: non_empty(record, "assigned_to"),
        })
    }
}

fn non_empty(record: &Value, field: &str) -> Option<String> {
    // Reference fields come back as {display_value, link} objects.
    let value = match &record[field] {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("display_value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    (!value.is_empty()).then_some(value)
}

fn parse_severity(raw: &str) -> Severity {
    match raw {
        "1" => Severity::Critical,
        "2" => Severity::High,
        "3" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn parse_state(raw: &str) -> IncidentStatus {
    match raw {
        "6" | "7" => IncidentStatus::Resolved,
        "2" | "3" => IncidentStatus::Investigating,
        _ => IncidentStatus::Open,
    }
}

fn parse_sn_time(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = raw.parse::<DateTime<Utc>>() {
        return Some(parsed);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn state_value(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Open => "1",
        IncidentStatus::Investigating => "2",
        IncidentStatus::Resolved => "6",
    }
}

#[async_trait]
impl IncidentConnector for ServiceNowConnector {
    fn name(&self) -> &str {
        "servicenow"
    }

    #[instrument(skip(self))]
    async fn list_incidents(&self) -> Result<Vec<Incident>> {
        let records = self
            .table_query("incident", "ORDERBYDESCsys_created_on", 100)
            .await?;
        let mut incidents: Vec<Incident> = records
            .iter()
            .filter_map(|r| self.parse_incident(r))
            .collect();
        incidents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(incidents)
    }

    #[instrument(skip(self))]
    async fn get_incident(&self, id: &str) -> Result<Incident> {
        let records = self
            .table_query("incident", &format!("number={id}"), 1)
            .await?;
        records
            .first()
            .and_then(|r| self.parse_incident(r))
            .ok_or_else(|| Error::not_found(format!("incident {id} not found")))
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: &str, status: IncidentStatus) -> Result<Incident> {
        let records = self
            .table_query("incident", &format!("number={id}"), 1)
            .await?;
        let sys_id = records
            .first()
            .and_then(|r| r["sys_id"].as_str())
            .ok_or_else(|| Error::not_found(format!("incident {id} not found")))?
            .to_string();

        let url = format!("{}/api/now/table/incident/{sys_id}", self.instance_url);
        let operation = "servicenow status update";
        with_retry(operation, || async {
            let response = self
                .client
                .patch(&url)
                .basic_auth(&self.username, Some(&self.password))
                .json(&serde_json::json!({ "state": state_value(status) }))
                .send()
                .await
                .map_err(|e| upstream_error(operation, e))?;
            if !response.status().is_success() {
                return Err(status_error(operation, response.status()));
            }
            Ok(())
        })
        .await?;

        self.get_incident(id).await
    }

    #[instrument(skip(self, incident), fields(incident_id = %incident.id))]
    async fn find_similar(
        &self,
        incident: &Incident,
        threshold: f64,
        k: usize,
    ) -> Result<Vec<SimilarIncident>> {
        // Pull resolved incidents and rank locally; the Table API has no
        // similarity search.
        let records = self
            .table_query("incident", "state=6^ORstate=7", 200)
            .await?;

        let mut similar: Vec<SimilarIncident> = records
            .iter()
            .filter_map(|r| self.parse_incident(r).map(|parsed| (r, parsed)))
            .filter(|(_, candidate)| candidate.id != incident.id)
            .filter_map(|(record, candidate)| {
                let score = incident_similarity(incident, &candidate);
                (score >= threshold).then(|| SimilarIncident {
                    ticket_id: candidate.id.clone(),
                    source_incident_id: candidate.id.clone(),
                    title: candidate.title.clone(),
                    severity: candidate.severity,
                    status: candidate.status,
                    similarity_score: score,
                    description: Some(candidate.description.clone()),
                    resolution: non_empty(record, "close_notes"),
                    source: self.name().to_string(),
                })
            })
            .collect();

        similar.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_incident_id.cmp(&b.source_incident_id))
        });
        similar.truncate(k);
        debug!(count = similar.len(), "ServiceNow similar incidents ranked");
        Ok(similar)
    }

    #[instrument(skip(self, incident), fields(incident_id = %incident.id))]
    async fn find_changes(
        &self,
        incident: &Incident,
        window: ChangeWindow,
    ) -> Result<Vec<ChangeRecord>> {
        let start = (incident.created_at - window.before).format("%Y-%m-%d %H:%M:%S");
        let end = (incident.created_at + window.after).format("%Y-%m-%d %H:%M:%S");
        let query = format!("sys_created_on>={start}^sys_created_on<={end}");
        let records = self.table_query("change_request", &query, 100).await?;

        Ok(records
            .iter()
            .filter_map(|r| {
                Some(ChangeRecord {
                    change_id: non_empty(r, "number")?,
                    description: non_empty(r, "short_description").unwrap_or_default(),
                    deployed_at: parse_sn_time(r["sys_created_on"].as_str().unwrap_or(""))?,
                    service: non_empty(r, "cmdb_ci"),
                    correlation_score: None,
                })
            })
            .collect())
    }

    async fn find_logs(&self, _incident: &Incident) -> Result<Vec<LogRecord>> {
        Err(Error::not_supported(
            "servicenow connector has no log store",
        ))
    }

    async fn find_events(&self, _incident: &Incident) -> Result<Vec<EventRecord>> {
        Err(Error::not_supported(
            "servicenow connector has no event stream",
        ))
    }
}
