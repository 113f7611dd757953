//! Quality assessment for similar-incident tickets.
//!
//! Each ticket is scored on the completeness of its description and
//! resolution: a field that is present and at least `min_chars` long earns
//! 0.5, otherwise nothing. Scores map to levels at 0.8 (good) and 0.5
//! (warning).

use serde::{Deserialize, Serialize};

use crate::models::SimilarIncident;

/// Default minimum field length for quality credit.
pub const DEFAULT_MIN_CHARS: usize = 20;

/// Quality level of a ticket or a ticket set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Good,
    Warning,
    Poor,
}

impl QualityLevel {
    fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            QualityLevel::Good
        } else if score >= 0.5 {
            QualityLevel::Warning
        } else {
            QualityLevel::Poor
        }
    }
}

/// Per-ticket quality verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketQuality {
    pub ticket_id: String,
    pub score: f64,
    pub level: QualityLevel,
    pub issues: Vec<String>,
}

/// Aggregate counts over a ticket set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total_tickets: usize,
    pub good_count: usize,
    pub warning_count: usize,
    pub poor_count: usize,
}

/// Quality assessment over a set of similar-incident tickets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub average_score: f64,
    pub overall_level: QualityLevel,
    pub ticket_qualities: Vec<TicketQuality>,
    pub summary: QualitySummary,
}

fn field_credit(value: Option<&str>, min_chars: usize) -> bool {
    value.map(str::trim).is_some_and(|v| v.len() >= min_chars)
}

/// Score one ticket.
pub fn assess_ticket(ticket: &SimilarIncident, min_chars: usize) -> TicketQuality {
    let mut score = 0.0;
    let mut issues = Vec::new();

    if field_credit(ticket.description.as_deref(), min_chars) {
        score += 0.5;
    } else if ticket.description.as_deref().map(str::trim).unwrap_or("").is_empty() {
        issues.push("missing description".to_string());
    } else {
        issues.push(format!("description shorter than {min_chars} characters"));
    }

    if field_credit(ticket.resolution.as_deref(), min_chars) {
        score += 0.5;
    } else if ticket.resolution.as_deref().map(str::trim).unwrap_or("").is_empty() {
        issues.push("missing resolution".to_string());
    } else {
        issues.push(format!("resolution shorter than {min_chars} characters"));
    }

    TicketQuality {
        ticket_id: ticket.ticket_id.clone(),
        score,
        level: QualityLevel::from_score(score),
        issues,
    }
}

/// Score a set of tickets and aggregate.
pub fn assess_tickets(tickets: &[SimilarIncident], min_chars: usize) -> QualityAssessment {
    if tickets.is_empty() {
        return QualityAssessment {
            average_score: 0.0,
            overall_level: QualityLevel::Poor,
            ticket_qualities: Vec::new(),
            summary: QualitySummary::default(),
        };
    }

    let ticket_qualities: Vec<TicketQuality> = tickets
        .iter()
        .map(|t| assess_ticket(t, min_chars))
        .collect();

    let mut summary = QualitySummary {
        total_tickets: tickets.len(),
        ..Default::default()
    };
    let mut total = 0.0;
    for quality in &ticket_qualities {
        total += quality.score;
        match quality.level {
            QualityLevel::Good => summary.good_count += 1,
            QualityLevel::Warning => summary.warning_count += 1,
            QualityLevel::Poor => summary.poor_count += 1,
        }
    }

    let average_score = total / tickets.len() as f64;
    QualityAssessment {
        average_score,
        overall_level: QualityLevel::from_score(average_score),
        ticket_qualities,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentStatus, Severity};

    fn ticket(id: &str, description: Option<&str>, resolution: Option<&str>) -> SimilarIncident {
        SimilarIncident {
            ticket_id: id.to_string(),
            source_incident_id: "INC900".to_string(),
            title: "historical incident".to_string(),
            severity: Severity::High,
            status: IncidentStatus::Resolved,
            similarity_score: 0.5,
            description: description.map(str::to_string),
            resolution: resolution.map(str::to_string),
            source: "mock".to_string(),
        }
    }

    #[test]
    fn complete_ticket_is_good() {
        let quality = assess_ticket(
            &ticket(
                "T1",
                Some("Database pool exhausted under peak load conditions"),
                Some("Increased pool size and restarted the affected services"),
            ),
            DEFAULT_MIN_CHARS,
        );
        assert_eq!(quality.score, 1.0);
        assert_eq!(quality.level, QualityLevel::Good);
        assert!(quality.issues.is_empty());
    }

    #[test]
    fn missing_resolution_is_warning() {
        let quality = assess_ticket(
            &ticket("T2", Some("Database pool exhausted under peak load"), None),
            DEFAULT_MIN_CHARS,
        );
        assert_eq!(quality.score, 0.5);
        assert_eq!(quality.level, QualityLevel::Warning);
        assert!(quality.issues.iter().any(|i| i.contains("missing resolution")));
    }

    #[test]
    fn short_fields_earn_no_credit() {
        let quality = assess_ticket(&ticket("T3", Some("too short"), Some("fixed")), DEFAULT_MIN_CHARS);
        assert_eq!(quality.score, 0.0);
        assert_eq!(quality.level, QualityLevel::Poor);
        assert_eq!(quality.issues.len(), 2);
    }

    #[test]
    fn empty_set_is_poor() {
        let assessment = assess_tickets(&[], DEFAULT_MIN_CHARS);
        assert_eq!(assessment.average_score, 0.0);
        assert_eq!(assessment.overall_level, QualityLevel::Poor);
        assert_eq!(assessment.summary.total_tickets, 0);
    }

    #[test]
    fn aggregate_counts_and_average() {
        let tickets = vec![
            ticket(
                "T1",
                Some("Database pool exhausted under peak load conditions"),
                Some("Increased pool size and restarted affected services"),
            ),
            ticket("T2", Some("Database pool exhausted under peak load"), None),
            ticket("T3", None, None),
        ];
        let assessment = assess_tickets(&tickets, DEFAULT_MIN_CHARS);
        assert_eq!(assessment.summary.good_count, 1);
        assert_eq!(assessment.summary.warning_count, 1);
        assert_eq!(assessment.summary.poor_count, 1);
        assert!((assessment.average_score - 0.5).abs() < 1e-9);
        assert_eq!(assessment.overall_level, QualityLevel::Warning);
    }
}
