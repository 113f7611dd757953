//! Jira Service Management incident connector.
//!
//! Uses the Jira Cloud REST API: JQL search for retrieval and the
//! transitions sub-resource for status updates. Log and event retrieval are
//! not supported by this backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument};

use smartrecover_core::config::JiraConfig;
use smartrecover_core::models::{
    ChangeRecord, EventRecord, Incident, IncidentStatus, LogRecord, Severity, SimilarIncident,
};
use smartrecover_core::similarity::incident_similarity;
use smartrecover_core::{Error, Result};

use crate::retry::{status_error, upstream_error, with_retry};

use super::{ChangeWindow, IncidentConnector};

pub struct JiraConnector {
    client: reqwest::Client,
    url: String,
    username: String,
    api_token: String,
    project_key: String,
}

impl JiraConnector {
    pub fn new(config: &JiraConfig, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("cannot build Jira client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
            project_key: config.project_key.clone(),
        })
    }

    async fn search(&self, jql: &str, max_results: usize) -> Result<Vec<Value>> {
        let url = format!("{}/rest/api/3/search", self.url);
        let operation = "jira search";

        with_retry(operation, || async {
            let response = self
                .client
                .post(&url)
                .basic_auth(&self.username, Some(&self.api_token))
                .json(&serde_json::json!({
                    "jql": jql,
                    "maxResults": max_results,
                    "fields": ["summary", "description", "status", "priority",
                               "created", "updated", "assignee", "resolution", "components"],
                }))
                .send()
                .await
                .map_err(|e| upstream_error(operation, e))?;

            if !response.status().is_success() {
                return Err(status_error(operation, response.status()));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| upstream_error(operation, e))?;
            Ok(body["issues"].as_array().cloned().unwrap_or_default())
        })
        .await
    }

    fn parse_issue(&self, issue: &Value) -> Option<Incident> {
        let key = issue["key"].as_str()?.to_string();
        let fields = &issue["fields"];

        let affected_services = fields["components"]
            .as_array()
            .map(|components| {
                components
                    .iter()
                    .filter_map(|c| c["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Some(Incident {
            id: key,
            title: fields["summary"].as_str().unwrap_or_default().to_string(),
            description: flatten_adf(&fields["description"]),
            severity: parse_priority(fields["priority"]["name"].as_str().unwrap_or("")),
            status: parse_status(fields["status"]["name"].as_str().unwrap_or("")),
            created_at: parse_jira_time(fields["created"].as_str().unwrap_or(""))?,
            updated_at: parse_jira_time(fields["updated"].as_str().unwrap_or("")),
            affected_services,
            assignee: fields["assignee"]["displayName"].as_str().map(str::to_string),
        })
    }
}

/// Collapse an Atlassian Document Format tree into plain text.
fn flatten_adf(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => {
            let mut out = String::new();
            collect_adf_text(value, &mut out);
            out.trim().to_string()
        }
        _ => String::new(),
    }
}

fn collect_adf_text(value: &Value, out: &mut String) {
    match value {
        Value::Object(obj) => {
            if let Some(text) = obj.get("text").and_then(Value::as_str) {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(text);
            }
            if let Some(content) = obj.get("content") {
                collect_adf_text(content, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_adf_text(item, out);
            }
        }
        _ => {}
    }
}

fn parse_priority(raw: &str) -> Severity {
    match raw.to_ascii_lowercase().as_str() {
        "highest" | "blocker" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn parse_status(raw: &str) -> IncidentStatus {
    match raw.to_ascii_lowercase().as_str() {
        "done" | "resolved" | "closed" => IncidentStatus::Resolved,
        "in progress" | "investigating" => IncidentStatus::Investigating,
        _ => IncidentStatus::Open,
    }
}

fn parse_jira_time(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| raw.parse::<DateTime<Utc>>().ok())
}

fn transition_target(status: IncidentStatus) -> &'static [&'static str] {
    match status {
        IncidentStatus::Open => &["to do", "open", "backlog"],
        IncidentStatus::Investigating => &["in progress", "investigating"],
        IncidentStatus::Resolved => &["done", "resolved", "closed"],
    }
}

#[async_trait]
impl IncidentConnector for JiraConnector {
    fn name(&self) -> &str {
        "jira"
    }

    #[instrument(skip(self))]
    async fn list_incidents(&self) -> Result<Vec<Incident>> {
        let jql = format!("project = {} ORDER BY created DESC", self.project_key);
        let issues = self.search(&jql, 100).await?;
        let mut incidents: Vec<Incident> =
            issues.iter().filter_map(|i| self.parse_issue(i)).collect();
        incidents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(incidents)
    }

    #[instrument(skip(self))]
    async fn get_incident(&self, id: &str) -> Result<Incident> {
        let issues = self.search(&format!("key = {id}"), 1).await?;
        issues
            .first()
            .and_then(|i| self.parse_issue(i))
            .ok_or_else(|| Error::not_found(format!("incident {id} not found")))
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: &str, status: IncidentStatus) -> Result<Incident> {
        let url = format!("{}/rest/api/3/issue/{id}/transitions", self.url);
        let operation = "jira transition lookup";

        let transitions: Value = with_retry(operation, || async {
            let response = self
                .client
                .get(&url)
                .basic_auth(&self.username, Some(&self.api_token))
                .send()
                .await
                .map_err(|e| upstream_error(operation, e))?;
            if !response.status().is_success() {
                return Err(status_error(operation, response.status()));
            }
            response
                .json()
                .await
                .map_err(|e| upstream_error(operation, e))
        })
        .await?;

        let targets = transition_target(status);
        let transition_id = transitions["transitions"]
            .as_array()
            .and_then(|ts| {
                ts.iter().find(|t| {
                    t["to"]["name"]
                        .as_str()
                        .map(|name| targets.contains(&name.to_ascii_lowercase().as_str()))
                        .unwrap_or(false)
                })
            })
            .and_then(|t| t["id"].as_str())
            .ok_or_else(|| {
                Error::conflict(format!(
                    "no workflow transition to {} for issue {id}",
                    status.as_str()
                ))
            })?
            .to_string();

        let operation = "jira transition";
        with_retry(operation, || async {
            let response = self
                .client
                .post(&url)
                .basic_auth(&self.username, Some(&self.api_token))
                .json(&serde_json::json!({ "transition": { "id": transition_id } }))
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
        let jql = format!(
            "project = {} AND statusCategory = Done ORDER BY created DESC",
            self.project_key
        );
        let issues = self.search(&jql, 200).await?;

        let mut similar: Vec<SimilarIncident> = issues
            .iter()
            .filter_map(|issue| self.parse_issue(issue).map(|parsed| (issue, parsed)))
            .filter(|(_, candidate)| candidate.id != incident.id)
            .filter_map(|(issue, candidate)| {
                let score = incident_similarity(incident, &candidate);
                (score >= threshold).then(|| SimilarIncident {
                    ticket_id: candidate.id.clone(),
                    source_incident_id: candidate.id.clone(),
                    title: candidate.title.clone(),
                    severity: candidate.severity,
                    status: candidate.status,
                    similarity_score: score,
                    description: Some(candidate.description.clone()),
                    resolution: issue["fields"]["resolution"]["description"]
                        .as_str()
                        .or_else(|| issue["fields"]["resolution"]["name"].as_str())
                        .map(str::to_string),
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
        debug!(count = similar.len(), "Jira similar incidents ranked");
        Ok(similar)
    }

    #[instrument(skip(self, incident), fields(incident_id = %incident.id))]
    async fn find_changes(
        &self,
        incident: &Incident,
        window: ChangeWindow,
    ) -> Result<Vec<ChangeRecord>> {
        let start = (incident.created_at - window.before).format("%Y-%m-%d %H:%M");
        let end = (incident.created_at + window.after).format("%Y-%m-%d %H:%M");
        let jql = format!(
            "project = {} AND issuetype = \"[System] Change\" AND created >= \"{start}\" AND created <= \"{end}\"",
            self.project_key
        );
        let issues = self.search(&jql, 100).await?;

        Ok(issues
            .iter()
            .filter_map(|issue| {
                let fields = &issue["fields"];
                Some(ChangeRecord {
                    change_id: issue["key"].as_str()?.to_string(),
                    description: fields["summary"].as_str().unwrap_or_default().to_string(),
                    deployed_at: parse_jira_time(fields["created"].as_str().unwrap_or(""))?,
                    service: fields["components"]
                        .as_array()
                        .and_then(|c| c.first())
                        .and_then(|c| c["name"].as_str())
                        .map(str::to_string),
                    correlation_score: None,
                })
            })
            .collect())
    }

    async fn find_logs(&self, _incident: &Incident) -> Result<Vec<LogRecord>> {
        Err(Error::not_supported("jira connector has no log store"))
    }

    async fn find_events(&self, _incident: &Incident) -> Result<Vec<EventRecord>> {
        Err(Error::not_supported("jira connector has no event stream"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adf_descriptions_flatten_to_text() {
        let adf = serde_json::json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Database pool"},
                    {"type": "text", "text": "exhausted"}
                ]}
            ]
        });
        assert_eq!(flatten_adf(&adf), "Database pool exhausted");
        assert_eq!(flatten_adf(&Value::String("plain".into())), "plain");
        assert_eq!(flatten_adf(&Value::Null), "");
    }

    #[test]
    fn priority_and_status_mappings() {
        assert_eq!(parse_priority("Highest"), Severity::Critical);
        assert_eq!(parse_priority("High"), Severity::High);
        assert_eq!(parse_priority("Trivial"), Severity::Low);
        assert_eq!(parse_status("Done"), IncidentStatus::Resolved);
        assert_eq!(parse_status("In Progress"), IncidentStatus::Investigating);
        assert_eq!(parse_status("To Do"), IncidentStatus::Open);
    }

    #[test]
    fn jira_timestamps_parse() {
        assert!(parse_jira_time("2024-03-01T10:00:00.000+0000").is_some());
        assert!(parse_jira_time("2024-03-01T10:00:00Z").is_some());
        assert!(parse_jira_time("").is_none());
    }
}
