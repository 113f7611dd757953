//! Confluence knowledge-base connector.
//!
//! Searches pages through the CQL endpoint and fetches bodies through the
//! content API, stripping storage-format markup down to plain text.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use smartrecover_core::config::ConfluenceConfig;
use smartrecover_core::models::KnowledgeDocument;
use smartrecover_core::{Error, Result};

use crate::retry::{status_error, upstream_error, with_retry};

use super::KnowledgeBaseConnector;

pub struct ConfluenceConnector {
    client: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
    space_keys: Vec<String>,
}

impl ConfluenceConnector {
    pub fn new(config: &ConfluenceConfig, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("cannot build Confluence client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
            space_keys: config.space_keys.clone(),
        })
    }

    fn cql_for(&self, query_terms: &[String]) -> String {
        let text = query_terms.join(" ");
        let mut cql = format!("text ~ \"{}\"", text.replace('"', " "));
        if !self.space_keys.is_empty() {
            let spaces = self
                .space_keys
                .iter()
                .map(|key| format!("space = \"{key}\""))
                .collect::<Vec<_>>()
                .join(" OR ");
            cql = format!("{cql} AND ({spaces})");
        }
        cql
    }
}

/// Strip Confluence storage-format tags down to readable text.
fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl KnowledgeBaseConnector for ConfluenceConnector {
    fn name(&self) -> &str {
        "confluence"
    }

    #[instrument(skip(self, query_terms))]
    async fn search(&self, query_terms: &[String], k: usize) -> Result<Vec<KnowledgeDocument>> {
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rest/api/content/search", self.base_url);
        let cql = self.cql_for(query_terms);
        let limit = k.to_string();
        let operation = "confluence search";

        let body: Value = with_retry(operation, || async {
            let response = self
                .client
                .get(&url)
                .basic_auth(&self.username, Some(&self.api_token))
                .query(&[
                    ("cql", cql.as_str()),
                    ("limit", limit.as_str()),
                    ("expand", "body.storage,metadata.labels"),
                ])
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

        let documents: Vec<KnowledgeDocument> = body["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .filter_map(|page| {
                        let tags = page["metadata"]["labels"]["results"]
                            .as_array()
                            .map(|labels| {
                                labels
                                    .iter()
                                    .filter_map(|l| l["name"].as_str().map(str::to_string))
                                    .collect()
                            })
                            .unwrap_or_default();
                        Some(KnowledgeDocument {
                            doc_id: page["id"].as_str()?.to_string(),
                            title: page["title"].as_str().unwrap_or_default().to_string(),
                            content: strip_markup(
                                page["body"]["storage"]["value"].as_str().unwrap_or(""),
                            ),
                            tags,
                            incident_id: None,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        debug!(count = documents.len(), "Confluence search complete");
        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn get(&self, doc_id: &str) -> Result<KnowledgeDocument> {
        let url = format!("{}/rest/api/content/{doc_id}", self.base_url);
        let operation = "confluence get";

        let page: Value = with_retry(operation, || async {
            let response = self
                .client
                .get(&url)
                .basic_auth(&self.username, Some(&self.api_token))
                .query(&[("expand", "body.storage,metadata.labels")])
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

        let id = page["id"]
            .as_str()
            .ok_or_else(|| Error::not_found(format!("document {doc_id} not found")))?;

        Ok(KnowledgeDocument {
            doc_id: id.to_string(),
            title: page["title"].as_str().unwrap_or_default().to_string(),
            content: strip_markup(page["body"]["storage"]["value"].as_str().unwrap_or("")),
            tags: Vec::new(),
            incident_id: None,
        })
    }
}
