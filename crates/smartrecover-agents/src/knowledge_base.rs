//! Knowledge-base agent.
//!
//! Derives search terms from the incident, queries the knowledge-base
//! connector, and ranks what comes back by keyword overlap. Document bodies
//! are truncated at a word boundary so large runbooks do not flood the LLM
//! context.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use smartrecover_core::config::AgentsConfig;
use smartrecover_core::models::{ConfluenceResults, Incident, ScoredDocument};
use smartrecover_core::prompts::{default_prompt, PromptStore};
use smartrecover_core::similarity::extract_keywords;
use smartrecover_core::Result;
use smartrecover_connectors::KnowledgeBaseConnector;

/// Maximum characters of document content returned per article.
pub const MAX_CONTENT_CHARS: usize = 2000;

pub struct KnowledgeBaseAgent {
    connector: Arc<dyn KnowledgeBaseConnector>,
    prompts: Arc<PromptStore>,
    max_results: usize,
}

impl KnowledgeBaseAgent {
    pub fn new(
        connector: Arc<dyn KnowledgeBaseConnector>,
        prompts: Arc<PromptStore>,
        config: &AgentsConfig,
    ) -> Self {
        Self {
            connector,
            prompts,
            max_results: config.max_results,
        }
    }

    pub fn name(&self) -> &'static str {
        "knowledge_base"
    }

    pub fn default_prompt(&self) -> &'static str {
        default_prompt(self.name())
    }

    pub fn prompt(&self) -> String {
        self.prompts.prompt(self.name())
    }

    #[instrument(skip(self, incident, context), fields(incident_id = %incident.id))]
    pub async fn query(&self, incident: &Incident, context: &str) -> Result<ConfluenceResults> {
        info!(incident_id = %incident.id, "Knowledge-base query");

        let terms = search_terms(incident, context);
        let documents = self.connector.search(&terms, self.max_results).await?;

        let query_set: HashSet<&str> = terms.iter().map(String::as_str).collect();
        let mut scored: Vec<ScoredDocument> = documents
            .into_iter()
            .map(|doc| {
                let doc_terms: HashSet<String> = extract_keywords(&doc.title)
                    .into_iter()
                    .chain(extract_keywords(&doc.content))
                    .collect();
                let hits = doc_terms
                    .iter()
                    .filter(|t| query_set.contains(t.as_str()))
                    .count();
                let relevance_score = if query_set.is_empty() {
                    0.0
                } else {
                    hits as f64 / query_set.len() as f64
                };
                ScoredDocument {
                    doc_id: doc.doc_id,
                    title: doc.title,
                    content: truncate_at_word_boundary(&doc.content, MAX_CONTENT_CHARS),
                    tags: doc.tags,
                    relevance_score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        scored.truncate(self.max_results);

        let knowledge_base_articles = scored.iter().map(|d| d.title.clone()).collect();
        debug!(documents = scored.len(), "Knowledge-base query complete");

        Ok(ConfluenceResults {
            source: self.connector.name().to_string(),
            incident_id: incident.id.clone(),
            documents: scored,
            knowledge_base_articles,
        })
    }
}

/// Search terms from the incident's title, description, affected services,
/// and the caller-supplied context.
fn search_terms(incident: &Incident, context: &str) -> Vec<String> {
    let mut terms: HashSet<String> = extract_keywords(&incident.title)
        .into_iter()
        .chain(extract_keywords(&incident.description))
        .chain(extract_keywords(context))
        .collect();
    for service in &incident.affected_services {
        terms.extend(extract_keywords(service));
    }
    let mut terms: Vec<String> = terms.into_iter().collect();
    terms.sort();
    terms
}

/// Cut `content` to at most `max_chars`, backing up to the last word
/// boundary so no word is split.
fn truncate_at_word_boundary(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => truncated[..idx].trim_end().to_string(),
        _ => truncated,
    }
}
