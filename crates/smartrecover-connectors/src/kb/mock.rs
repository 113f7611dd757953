//! Mock knowledge base backed by a CSV file and a runbooks directory.
//!
//! The CSV carries incident-associated articles; the runbooks directory is
//! scanned for `.md`/`.txt` files whose titles come from an optional
//! front-matter block delimited by `---` lines (`title:` key), falling back
//! to a prettified file stem.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use smartrecover_core::config::MockKnowledgeBaseConfig;
use smartrecover_core::models::KnowledgeDocument;
use smartrecover_core::similarity::extract_keywords;
use smartrecover_core::{Error, Result};

use super::KnowledgeBaseConnector;

pub struct MockKnowledgeBaseConnector {
    documents: Vec<KnowledgeDocument>,
}

impl MockKnowledgeBaseConnector {
    pub fn load(config: &MockKnowledgeBaseConfig) -> Result<Self> {
        let mut documents = Vec::new();

        if config.csv_path.exists() {
            documents.extend(load_csv_documents(&config.csv_path)?);
        } else {
            warn!(path = %config.csv_path.display(), "Knowledge base CSV not found");
        }

        if let Some(folder) = &config.docs_folder {
            if folder.exists() {
                documents.extend(load_text_documents(folder));
            } else {
                warn!(path = %folder.display(), "Runbooks folder not found");
            }
        }

        info!(documents = documents.len(), "Mock knowledge base loaded");
        Ok(Self { documents })
    }

    /// Build directly from in-memory documents. Test seam.
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl KnowledgeBaseConnector for MockKnowledgeBaseConnector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query_terms: &[String], k: usize) -> Result<Vec<KnowledgeDocument>> {
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut matched: Vec<(usize, &KnowledgeDocument)> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let haystack: std::collections::HashSet<String> = extract_keywords(&doc.title)
                    .into_iter()
                    .chain(extract_keywords(&doc.content))
                    .chain(doc.tags.iter().flat_map(|t| extract_keywords(t)))
                    .collect();
                let hits = query_terms
                    .iter()
                    .filter(|term| haystack.contains(term.as_str()))
                    .count();
                (hits > 0).then_some((hits, doc))
            })
            .collect();

        matched.sort_by(|(ha, a), (hb, b)| hb.cmp(ha).then_with(|| a.doc_id.cmp(&b.doc_id)));
        let results: Vec<KnowledgeDocument> = matched
            .into_iter()
            .take(k)
            .map(|(_, doc)| doc.clone())
            .collect();

        debug!(terms = query_terms.len(), results = results.len(), "Knowledge base search");
        Ok(results)
    }

    async fn get(&self, doc_id: &str) -> Result<KnowledgeDocument> {
        self.documents
            .iter()
            .find(|d| d.doc_id == doc_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("document {doc_id} not found")))
    }
}

fn load_csv_documents(path: &Path) -> Result<Vec<KnowledgeDocument>> {
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
    let idx = |name: &str| headers.iter().position(|h| h == name);
    let (incident_idx, doc_idx, title_idx, content_idx) = (
        idx("incident_id"),
        idx("doc_id"),
        idx("title"),
        idx("content"),
    );

    let mut documents = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::config(format!("bad CSV row in {}: {e}", path.display())))?;
        if record.len() > headers.len() {
            warn!(file = %path.display(), row = line + 2, "Row carries trailing extra fields; ignoring them");
        }
        let field = |i: Option<usize>| i.and_then(|i| record.get(i)).unwrap_or("").to_string();

        let doc_id = field(doc_idx);
        if doc_id.is_empty() {
            warn!(file = %path.display(), row = line + 2, "Row missing doc_id; skipped");
            continue;
        }
        documents.push(KnowledgeDocument {
            doc_id,
            title: field(title_idx),
            content: field(content_idx),
            tags: Vec::new(),
            incident_id: Some(field(incident_idx)).filter(|s| !s.is_empty()),
        });
    }
    Ok(documents)
}

fn load_text_documents(folder: &Path) -> Vec<KnowledgeDocument> {
    let mut documents = Vec::new();
    let mut stack = vec![folder.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            warn!(path = %dir.display(), "Cannot read runbooks directory");
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_doc = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "md" || e == "txt");
            if !is_doc {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("document")
                        .to_string();
                    let title = front_matter_title(&content)
                        .unwrap_or_else(|| prettify_stem(&stem));
                    debug!(doc_id = %stem, path = %path.display(), "Loaded runbook");
                    documents.push(KnowledgeDocument {
                        doc_id: stem,
                        title,
                        content,
                        tags: Vec::new(),
                        incident_id: None,
                    });
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to load runbook"),
            }
        }
    }

    documents.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    documents
}

/// Extract `title:` from a leading `---`-delimited front-matter block.
fn front_matter_title(content: &str) -> Option<String> {
    let mut lines = content.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }
    for line in lines {
        let trimmed = line.trim();
        if trimmed == "---" {
            return None;
        }
        if let Some(value) = trimmed.strip_prefix("title:") {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

fn prettify_stem(stem: &str) -> String {
    let spaced = stem.replace(['_', '-'], " ");
    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn csv_documents_are_searchable() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("confluence_docs.csv");
        let mut f = std::fs::File::create(&csv_path).unwrap();
        writeln!(f, "incident_id,doc_id,title,content").unwrap();
        writeln!(f, "INC001,DOC-101,Database Pool Tuning,How to size connection pools for the database tier").unwrap();
        writeln!(f, "INC002,DOC-102,Payment Gateway Runbook,Steps to drain and restart the payment gateway").unwrap();

        let connector = MockKnowledgeBaseConnector::load(&MockKnowledgeBaseConfig {
            csv_path,
            docs_folder: None,
        })
        .unwrap();

        let results = connector
            .search(&terms(&["database", "pool"]), 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "DOC-101");
        assert_eq!(results[0].incident_id.as_deref(), Some("INC001"));
    }

    #[tokio::test]
    async fn runbooks_use_front_matter_titles() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("runbooks");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("db_failover.md"),
            "---\ntitle: \"Database Failover Procedure\"\n---\nPromote the replica, then repoint the pool.\n",
        )
        .unwrap();
        std::fs::write(
            docs.join("cache-warmup.md"),
            "Warm the cache before peak traffic hours.\n",
        )
        .unwrap();

        let connector = MockKnowledgeBaseConnector::load(&MockKnowledgeBaseConfig {
            csv_path: dir.path().join("missing.csv"),
            docs_folder: Some(docs),
        })
        .unwrap();

        let doc = connector.get("db_failover").await.unwrap();
        assert_eq!(doc.title, "Database Failover Procedure");

        let other = connector.get("cache-warmup").await.unwrap();
        assert_eq!(other.title, "Cache Warmup");
    }

    #[tokio::test]
    async fn search_ranks_by_term_hits() {
        let connector = MockKnowledgeBaseConnector::from_documents(vec![
            KnowledgeDocument {
                doc_id: "A".into(),
                title: "Database pool tuning".into(),
                content: "database pool sizing guidance".into(),
                tags: vec![],
                incident_id: None,
            },
            KnowledgeDocument {
                doc_id: "B".into(),
                title: "General troubleshooting".into(),
                content: "covers database basics".into(),
                tags: vec![],
                incident_id: None,
            },
        ]);

        let results = connector
            .search(&terms(&["database", "pool"]), 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].doc_id, "A");
    }

    #[tokio::test]
    async fn get_unknown_document_is_not_found() {
        let connector = MockKnowledgeBaseConnector::from_documents(vec![]);
        assert!(connector.get("nope").await.is_err());
    }

    #[tokio::test]
    async fn empty_terms_return_nothing() {
        let connector = MockKnowledgeBaseConnector::from_documents(vec![KnowledgeDocument {
            doc_id: "A".into(),
            title: "Anything".into(),
            content: "text".into(),
            tags: vec![],
            incident_id: None,
        }]);
        assert!(connector.search(&[], 5).await.unwrap().is_empty());
    }
}
