//! Deterministic context rendering for synthesis and chat.
//!
//! The (exclusion-filtered) agent data is rendered into a fixed section
//! order: top-suspect change, similar historical incidents, previous
//! resolutions, knowledge articles, log entries, monitoring events, then
//! summary counts. Empty sections are omitted so the LLM never sees hollow
//! headers.

use smartrecover_core::models::AgentData;

/// Maximum log entries and events rendered into the context.
const MAX_TELEMETRY_ITEMS: usize = 5;

/// Maximum characters of article content quoted inline.
const ARTICLE_SNIPPET_CHARS: usize = 200;

/// Render agent data into the textual context handed to the LLM.
///
/// `max_items` bounds the similar-incident and knowledge-article sections.
pub fn build_context(data: &AgentData, max_items: usize) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(changes) = &data.change_results {
        if let Some(top) = &changes.top_suspect {
            sections.push(format!(
                "TOP SUSPECT CHANGE:\n- Change ID: {}\n- Description: {}\n- Deployed At: {}\n- Correlation Score: {:.0}%",
                top.change_id,
                top.description,
                top.deployed_at.to_rfc3339(),
                top.correlation_score * 100.0,
            ));
        }
    }

    if let Some(servicenow) = &data.servicenow_results {
        if !servicenow.similar_incidents.is_empty() {
            let mut lines = vec![format!(
                "SIMILAR HISTORICAL INCIDENTS: {} found",
                servicenow.similar_incidents.len()
            )];
            for (i, similar) in servicenow.similar_incidents.iter().take(max_items).enumerate() {
                lines.push(format!(
                    "{}. {} (similarity: {:.0}%)",
                    i + 1,
                    similar.title,
                    similar.similarity_score * 100.0,
                ));
            }
            sections.push(lines.join("\n"));
        }

        if !servicenow.resolutions.is_empty() {
            let mut lines = vec!["PREVIOUS RESOLUTIONS:".to_string()];
            for (i, resolution) in servicenow.resolutions.iter().take(max_items).enumerate() {
                lines.push(format!("{}. {resolution}", i + 1));
            }
            sections.push(lines.join("\n"));
        }
    }

    if let Some(confluence) = &data.confluence_results {
        if !confluence.documents.is_empty() {
            let mut lines = vec![format!(
                "RELEVANT KNOWLEDGE BASE ARTICLES: {} found",
                confluence.documents.len()
            )];
            for (i, doc) in confluence.documents.iter().take(max_items).enumerate() {
                lines.push(format!("{}. {}", i + 1, doc.title));
                if !doc.content.is_empty() {
                    lines.push(format!("   {}", snippet(&doc.content)));
                }
            }
            sections.push(lines.join("\n"));
        }
    }

    if let Some(logs) = &data.logs_results {
        if !logs.logs.is_empty() {
            let mut lines = vec![format!("RECENT LOG ENTRIES: {} found", logs.total_count)];
            for (i, log) in logs.logs.iter().take(MAX_TELEMETRY_ITEMS).enumerate() {
                lines.push(format!(
                    "{}. [{:?}] {} - {} (confidence: {:.0}%)",
                    i + 1,
                    log.level,
                    log.service,
                    log.message,
                    log.confidence_score * 100.0,
                ));
            }
            sections.push(lines.join("\n"));
        }
    }

    if let Some(events) = &data.events_results {
        if !events.events.is_empty() {
            let mut lines = vec![format!("MONITORING EVENTS: {} found", events.total_count)];
            for (i, event) in events.events.iter().take(MAX_TELEMETRY_ITEMS).enumerate() {
                lines.push(format!(
                    "{}. [{:?}] {} - {}: {} (confidence: {:.0}%)",
                    i + 1,
                    event.severity,
                    event.application,
                    event.event_type,
                    event.message,
                    event.confidence_score * 100.0,
                ));
            }
            sections.push(lines.join("\n"));
        }
    }

    if !sections.is_empty() {
        sections.push(summary_counts(data));
    }

    if sections.is_empty() {
        "No additional context available.".to_string()
    } else {
        sections.join("\n\n")
    }
}

fn summary_counts(data: &AgentData) -> String {
    let similar = data
        .servicenow_results
        .as_ref()
        .map(|s| s.similar_incidents.len())
        .unwrap_or(0);
    let documents = data
        .confluence_results
        .as_ref()
        .map(|c| c.documents.len())
        .unwrap_or(0);
    let changes = data
        .change_results
        .as_ref()
        .map(|c| c.all_correlations.len())
        .unwrap_or(0);
    let (log_total, log_errors) = data
        .logs_results
        .as_ref()
        .map(|l| (l.total_count, l.error_count))
        .unwrap_or((0, 0));
    let (event_total, event_critical) = data
        .events_results
        .as_ref()
        .map(|e| (e.total_count, e.critical_count))
        .unwrap_or((0, 0));

    format!(
        "SUMMARY: {similar} similar incidents, {documents} knowledge articles, \
         {changes} correlated changes, {log_total} log entries ({log_errors} errors), \
         {event_total} events ({event_critical} critical)"
    )
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= ARTICLE_SNIPPET_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(ARTICLE_SNIPPET_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use smartrecover_core::models::*;

    fn data_with_top_suspect() -> AgentData {
        AgentData {
            change_results: Some(ChangeResults {
                source: "change_correlation".into(),
                incident_id: "INC001".into(),
                top_suspect: Some(CorrelatedChange {
                    change_id: "CHG005".into(),
                    description: "Lowered database pool limits".into(),
                    deployed_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
                    service: None,
                    correlation_score: 0.88,
                }),
                high_correlation_changes: vec![],
                medium_correlation_changes: vec![],
                all_correlations: vec![],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn empty_data_renders_placeholder() {
        assert_eq!(
            build_context(&AgentData::default(), 5),
            "No additional context available."
        );
    }

    #[test]
    fn top_suspect_section_comes_first() {
        let context = build_context(&data_with_top_suspect(), 5);
        assert!(context.starts_with("TOP SUSPECT CHANGE:"));
        assert!(context.contains("CHG005"));
        assert!(context.contains("88%"));
        assert!(context.contains("SUMMARY:"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let context = build_context(&data_with_top_suspect(), 5);
        assert!(!context.contains("SIMILAR HISTORICAL INCIDENTS"));
        assert!(!context.contains("RECENT LOG ENTRIES"));
    }

    #[test]
    fn sections_appear_in_contract_order() {
        let mut data = data_with_top_suspect();
        data.servicenow_results = Some(ServiceNowResults {
            source: "mock".into(),
            incident_id: "INC001".into(),
            similar_incidents: vec![SimilarIncident {
                ticket_id: "T1".into(),
                source_incident_id: "INC007".into(),
                title: "Database connection timeout".into(),
                severity: Severity::High,
                status: IncidentStatus::Resolved,
                similarity_score: 0.73,
                description: None,
                resolution: Some("Raised pool limits".into()),
                source: "mock".into(),
            }],
            quality_assessment: None,
            resolutions: vec!["Raised pool limits".into()],
        });
        data.logs_results = Some(LogsResults {
            source: "splunk".into(),
            incident_id: "INC001".into(),
            logs: vec![LogEntry {
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 55, 0).unwrap(),
                level: LogLevel::Error,
                service: "database".into(),
                message: "Connection timeout".into(),
                source: "database.log".into(),
                confidence_score: 0.95,
            }],
            total_count: 1,
            error_count: 1,
            warning_count: 0,
        });

        let context = build_context(&data, 5);
        let top = context.find("TOP SUSPECT CHANGE").unwrap();
        let similar = context.find("SIMILAR HISTORICAL INCIDENTS").unwrap();
        let resolutions = context.find("PREVIOUS RESOLUTIONS").unwrap();
        let logs = context.find("RECENT LOG ENTRIES").unwrap();
        let summary = context.find("SUMMARY:").unwrap();
        assert!(top < similar && similar < resolutions && resolutions < logs && logs < summary);
    }

    #[test]
    fn item_caps_are_applied() {
        let mut data = AgentData::default();
        let incidents: Vec<SimilarIncident> = (0..10)
            .map(|i| SimilarIncident {
                ticket_id: format!("T{i}"),
                source_incident_id: format!("INC{i:03}"),
                title: format!("Historical incident {i}"),
                severity: Severity::Low,
                status: IncidentStatus::Resolved,
                similarity_score: 0.5,
                description: None,
                resolution: None,
                source: "mock".into(),
            })
            .collect();
        data.servicenow_results = Some(ServiceNowResults {
            source: "mock".into(),
            incident_id: "INC001".into(),
            similar_incidents: incidents,
            quality_assessment: None,
            resolutions: vec![],
        });

        let context = build_context(&data, 3);
        assert!(context.contains("SIMILAR HISTORICAL INCIDENTS: 10 found"));
        assert!(context.contains("3. Historical incident 2"));
        assert!(!context.contains("4. Historical incident 3"));
    }
}
