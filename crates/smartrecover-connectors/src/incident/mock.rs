//! CSV-backed mock incident connector.
//!
//! Loads incidents, tickets, and change records from a fixture directory at
//! startup and serves every connector operation deterministically. Log and
//! event retrieval synthesizes entries from fixed message tables using a
//! generator seeded by the incident id, so the same incident always yields
//! the same telemetry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use smartrecover_core::models::{
    ChangeRecord, EventRecord, EventSeverity, Incident, IncidentStatus, LogLevel, LogRecord,
    Severity, SimilarIncident, Ticket, TicketKind,
};
use smartrecover_core::similarity::find_similar_incidents;
use smartrecover_core::{Error, Result};

use super::{ChangeWindow, IncidentConnector};

const INCIDENTS_FILE: &str = "incidents.csv";
const TICKETS_FILE: &str = "servicenow_tickets.csv";
const CHANGES_FILE: &str = "change_correlations.csv";

/// Mock incident-management backend.
pub struct MockIncidentConnector {
    incidents: RwLock<Vec<Incident>>,
    tickets: HashMap<String, Vec<Ticket>>,
    changes: HashMap<String, Vec<ChangeRecord>>,
}

impl MockIncidentConnector {
    /// Load fixtures from `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let incidents = load_incidents(&data_dir.join(INCIDENTS_FILE))?;
        let tickets = load_tickets(&data_dir.join(TICKETS_FILE))?;
        let changes = load_changes(&data_dir.join(CHANGES_FILE))?;

        info!(
            incidents = incidents.len(),
            ticket_groups = tickets.len(),
            change_groups = changes.len(),
            "Mock incident connector loaded"
        );

        Ok(Self {
            incidents: RwLock::new(incidents),
            tickets,
            changes,
        })
    }

    /// Build directly from in-memory fixtures. Test seam.
    pub fn from_fixtures(
        incidents: Vec<Incident>,
        tickets: HashMap<String, Vec<Ticket>>,
        changes: HashMap<String, Vec<ChangeRecord>>,
    ) -> Self {
        Self {
            incidents: RwLock::new(incidents),
            tickets,
            changes,
        }
    }
}

#[async_trait]
impl IncidentConnector for MockIncidentConnector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_incidents(&self) -> Result<Vec<Incident>> {
        let mut incidents = self
            .incidents
            .read()
            .expect("incident store lock poisoned")
            .clone();
        incidents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(incidents)
    }

    async fn get_incident(&self, id: &str) -> Result<Incident> {
        self.incidents
            .read()
            .expect("incident store lock poisoned")
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("incident {id} not found")))
    }

    async fn update_status(&self, id: &str, status: IncidentStatus) -> Result<Incident> {
        let mut incidents = self.incidents.write().expect("incident store lock poisoned");
        let incident = incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::not_found(format!("incident {id} not found")))?;
        incident.status = status;
        incident.updated_at = Some(Utc::now());
        debug!(incident_id = id, status = status.as_str(), "Incident status updated");
        Ok(incident.clone())
    }

    async fn find_similar(
        &self,
        incident: &Incident,
        threshold: f64,
        k: usize,
    ) -> Result<Vec<SimilarIncident>> {
        let incidents = self
            .incidents
            .read()
            .expect("incident store lock poisoned")
            .clone();
        let matches = find_similar_incidents(incident, &incidents, threshold, k);

        let similar = matches
            .into_iter()
            .map(|(candidate, score)| {
                // Prefer the candidate's similar_incident ticket for the
                // historical resolution; fall back to the incident body.
                let ticket = self
                    .tickets
                    .get(&candidate.id)
                    .and_then(|ts| ts.iter().find(|t| t.kind == TicketKind::SimilarIncident));

                match ticket {
                    Some(ticket) => SimilarIncident {
                        ticket_id: ticket.ticket_id.clone(),
                        source_incident_id: candidate.id.clone(),
                        title: candidate.title.clone(),
                        severity: candidate.severity,
                        status: candidate.status,
                        similarity_score: score,
                        description: ticket.description.clone(),
                        resolution: ticket.resolution.clone(),
                        source: self.name().to_string(),
                    },
                    None => SimilarIncident {
                        ticket_id: candidate.id.clone(),
                        source_incident_id: candidate.id.clone(),
                        title: candidate.title.clone(),
                        severity: candidate.severity,
                        status: candidate.status,
                        similarity_score: score,
                        description: Some(candidate.description.clone()),
                        resolution: None,
                        source: self.name().to_string(),
                    },
                }
            })
            .collect();

        Ok(similar)
    }

    async fn find_changes(
        &self,
        incident: &Incident,
        window: ChangeWindow,
    ) -> Result<Vec<ChangeRecord>> {
        let start = incident.created_at - window.before;
        let end = incident.created_at + window.after;

        Ok(self
            .changes
            .get(&incident.id)
            .map(|changes| {
                changes
                    .iter()
                    .filter(|c| c.deployed_at >= start && c.deployed_at <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_logs(&self, incident: &Incident) -> Result<Vec<LogRecord>> {
        Ok(generate_logs(incident))
    }

    async fn find_events(&self, incident: &Incident) -> Result<Vec<EventRecord>> {
        Ok(generate_events(incident))
    }
}

// =============================================================================
// CSV LOADING
// =============================================================================

/// Read a CSV file into header/rows, tolerating rows with extra trailing
/// empty fields (a known fixture quirk; logged, never parsed as a column).
fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<csv::StringRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::config(format!("bad CSV header in {}: {e}", path.display())))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::config(format!("bad CSV row in {}: {e}", path.display())))?;
        if record.len() > headers.len() {
            let extras_empty = record.iter().skip(headers.len()).all(|f| f.is_empty());
            if extras_empty {
                warn!(
                    file = %path.display(),
                    row = line + 2,
                    "Row carries trailing empty fields; ignoring them"
                );
            } else {
                warn!(
                    file = %path.display(),
                    row = line + 2,
                    "Row carries unexpected extra fields; ignoring them"
                );
            }
        }
        rows.push(record);
    }
    Ok((headers, rows))
}

fn column<'a>(
    headers: &[String],
    record: &'a csv::StringRecord,
    name: &str,
) -> Option<&'a str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|idx| record.get(idx))
        .filter(|v| !v.is_empty())
}

fn parse_instant(value: &str, context: &str) -> Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .map_err(|e| Error::config(format!("bad timestamp '{value}' in {context}: {e}")))
}

fn load_incidents(path: &Path) -> Result<Vec<Incident>> {
    let (headers, rows) = read_rows(path)?;
    let mut incidents = Vec::with_capacity(rows.len());

    for record in rows {
        let id = column(&headers, &record, "id")
            .ok_or_else(|| Error::config("incident row missing id"))?
            .to_string();
        let severity =
            Severity::parse(column(&headers, &record, "severity").unwrap_or("medium"))
                .map_err(|e| Error::config(format!("incident {id}: {e}")))?;
        let status = IncidentStatus::parse(column(&headers, &record, "status").unwrap_or("open"))
            .map_err(|e| Error::config(format!("incident {id}: {e}")))?;
        let created_at = parse_instant(
            column(&headers, &record, "created_at")
                .ok_or_else(|| Error::config(format!("incident {id} missing created_at")))?,
            &format!("incident {id}"),
        )?;
        let affected_services = column(&headers, &record, "affected_services")
            .map(|s| {
                s.split('|')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        incidents.push(Incident {
            id,
            title: column(&headers, &record, "title").unwrap_or_default().to_string(),
            description: column(&headers, &record, "description")
                .unwrap_or_default()
                .to_string(),
            severity,
            status,
            created_at,
            updated_at: None,
            affected_services,
            assignee: column(&headers, &record, "assignee").map(str::to_string),
        });
    }
    Ok(incidents)
}

fn load_tickets(path: &Path) -> Result<HashMap<String, Vec<Ticket>>> {
    let (headers, rows) = read_rows(path)?;
    let mut tickets: HashMap<String, Vec<Ticket>> = HashMap::new();

    for record in rows {
        let incident_id = column(&headers, &record, "incident_id")
            .ok_or_else(|| Error::config("ticket row missing incident_id"))?
            .to_string();
        let ticket_id = column(&headers, &record, "ticket_id")
            .ok_or_else(|| Error::config("ticket row missing ticket_id"))?
            .to_string();
        let kind = match column(&headers, &record, "type").unwrap_or("similar_incident") {
            "related_change" => TicketKind::RelatedChange,
            _ => TicketKind::SimilarIncident,
        };

        tickets.entry(incident_id.clone()).or_default().push(Ticket {
            ticket_id,
            incident_id,
            kind,
            resolution: column(&headers, &record, "resolution").map(str::to_string),
            description: column(&headers, &record, "description").map(str::to_string),
            source: column(&headers, &record, "source")
                .unwrap_or("mock")
                .to_string(),
        });
    }
    Ok(tickets)
}

fn load_changes(path: &Path) -> Result<HashMap<String, Vec<ChangeRecord>>> {
    let (headers, rows) = read_rows(path)?;
    let mut changes: HashMap<String, Vec<ChangeRecord>> = HashMap::new();

    for record in rows {
        let incident_id = column(&headers, &record, "incident_id")
            .ok_or_else(|| Error::config("change row missing incident_id"))?
            .to_string();
        let change_id = column(&headers, &record, "change_id")
            .ok_or_else(|| Error::config("change row missing change_id"))?
            .to_string();
        let deployed_at = parse_instant(
            column(&headers, &record, "deployed_at")
                .ok_or_else(|| Error::config(format!("change {change_id} missing deployed_at")))?,
            &format!("change {change_id}"),
        )?;
        let correlation_score = column(&headers, &record, "correlation_score")
            .map(|s| {
                s.parse::<f64>().map_err(|e| {
                    Error::config(format!("change {change_id}: bad correlation_score: {e}"))
                })
            })
            .transpose()?;

        changes.entry(incident_id).or_default().push(ChangeRecord {
            change_id,
            description: column(&headers, &record, "description")
                .unwrap_or_default()
                .to_string(),
            deployed_at,
            service: column(&headers, &record, "service").map(str::to_string),
            correlation_score,
        });
    }
    Ok(changes)
}

// =============================================================================
// DETERMINISTIC TELEMETRY SYNTHESIS
// =============================================================================

/// xorshift64* generator, seeded from the incident id so retrieval is
/// stable across calls and processes.
struct SeededRng(u64);

impl SeededRng {
    fn for_incident(incident_id: &str) -> Self {
        // FNV-1a over the id; avoid a zero state.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in incident_id.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        Self(hash.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound.max(1)
    }
}

const LOG_TEMPLATES: &[(LogLevel, &str)] = &[
    (LogLevel::Error, "Database connection timeout after 30s"),
    (LogLevel::Error, "Failed to process payment transaction"),
    (LogLevel::Error, "Authentication service unreachable"),
    (LogLevel::Warn, "High memory usage detected: 85%"),
    (LogLevel::Warn, "Response time exceeding threshold: 2500ms"),
    (LogLevel::Warn, "Connection pool near capacity: 90%"),
    (LogLevel::Error, "Null pointer exception in request handler"),
    (LogLevel::Info, "Service restart initiated"),
    (LogLevel::Error, "Circuit breaker opened for external API"),
    (LogLevel::Warn, "Disk space low: 15% remaining"),
    (LogLevel::Info, "Fallback cache activated"),
    (LogLevel::Error, "Message queue connection lost"),
];

const FALLBACK_SERVICES: &[&str] = &[
    "api-gateway",
    "auth-service",
    "database",
    "payment-service",
    "user-service",
];

fn pick_service(incident: &Incident, rng: &mut SeededRng) -> String {
    // Bias towards the incident's own services so confidence scoring has
    // signal; one draw in four comes from the shared pool.
    if !incident.affected_services.is_empty() && rng.below(4) != 0 {
        let idx = rng.below(incident.affected_services.len() as u64) as usize;
        incident.affected_services[idx].clone()
    } else {
        FALLBACK_SERVICES[rng.below(FALLBACK_SERVICES.len() as u64) as usize].to_string()
    }
}

fn generate_logs(incident: &Incident) -> Vec<LogRecord> {
    let mut rng = SeededRng::for_incident(&incident.id);
    let count = 8 + rng.below(8) as usize;

    let mut logs: Vec<LogRecord> = (0..count)
        .map(|_| {
            let (level, message) = LOG_TEMPLATES[rng.below(LOG_TEMPLATES.len() as u64) as usize];
            let service = pick_service(incident, &mut rng);
            let timestamp = incident.created_at - Duration::minutes(5 + rng.below(55) as i64);
            LogRecord {
                timestamp,
                level,
                service: service.clone(),
                message: message.to_string(),
                source: format!("{service}.log"),
            }
        })
        .collect();

    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    logs
}

const EVENT_TEMPLATES: &[(EventSeverity, &str, &str)] = &[
    (EventSeverity::Critical, "Slow Transaction", "Response time exceeded 5000ms"),
    (
        EventSeverity::Critical,
        "Error Rate Spike",
        "Error rate increased to 15% in last 5 minutes",
    ),
    (EventSeverity::Warning, "Memory Threshold", "Heap memory usage at 80%"),
    (
        EventSeverity::Critical,
        "Service Down",
        "Health check failing for 3 consecutive attempts",
    ),
    (EventSeverity::Warning, "CPU Spike", "CPU utilization at 85% for 2 minutes"),
    (EventSeverity::Info, "Deployment Event", "New version deployed successfully"),
    (
        EventSeverity::Warning,
        "Slow Database Query",
        "Query execution time: 4200ms",
    ),
    (
        EventSeverity::Critical,
        "Circuit Breaker Open",
        "External service circuit breaker tripped",
    ),
    (EventSeverity::Warning, "Cache Miss Rate High", "Cache miss rate at 60%"),
    (EventSeverity::Info, "Scale Event", "Auto-scaling triggered: added 2 instances"),
];

fn generate_events(incident: &Incident) -> Vec<EventRecord> {
    let mut rng = SeededRng::for_incident(&incident.id);
    // Advance past the log draws so logs and events differ.
    rng.next();
    let count = 6 + rng.below(7) as usize;

    let mut events: Vec<EventRecord> = (0..count)
        .map(|i| {
            let (severity, event_type, message) =
                EVENT_TEMPLATES[rng.below(EVENT_TEMPLATES.len() as u64) as usize];
            let application = pick_service(incident, &mut rng);
            let timestamp = incident.created_at - Duration::minutes(2 + rng.below(43) as i64);
            EventRecord {
                id: format!("EVT-{}-{i:03}", incident.id),
                timestamp,
                event_type: event_type.to_string(),
                severity,
                application: application.clone(),
                message: message.to_string(),
                details: Some(format!(
                    "Detected in {application} at {}",
                    timestamp.format("%H:%M:%S")
                )),
            }
        })
        .collect();

    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}
