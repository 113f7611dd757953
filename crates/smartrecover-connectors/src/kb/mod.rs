//! Knowledge-base connectors.

use std::sync::Arc;

use async_trait::async_trait;

use smartrecover_core::config::{KnowledgeBaseConfig, KnowledgeBaseSource};
use smartrecover_core::models::KnowledgeDocument;
use smartrecover_core::{Error, Result};

pub mod confluence;
pub mod mock;

pub use confluence::ConfluenceConnector;
pub use mock::MockKnowledgeBaseConnector;

/// Capability set of a knowledge-base backend.
#[async_trait]
pub trait KnowledgeBaseConnector: Send + Sync {
    /// Backend name, used as the `source` tag on results.
    fn name(&self) -> &str;

    /// Documents matching any of `query_terms`, at most `k`.
    async fn search(&self, query_terms: &[String], k: usize) -> Result<Vec<KnowledgeDocument>>;

    /// One document by id.
    async fn get(&self, doc_id: &str) -> Result<KnowledgeDocument>;
}

/// Build the connector selected by the configuration record.
pub fn build_knowledge_base_connector(
    config: &KnowledgeBaseConfig,
) -> Result<Arc<dyn KnowledgeBaseConnector>> {
    match config.source {
        KnowledgeBaseSource::Mock => Ok(Arc::new(MockKnowledgeBaseConnector::load(&config.mock)?)),
        KnowledgeBaseSource::Confluence => {
            let conf = config.confluence.as_ref().ok_or_else(|| {
                Error::config("confluence configuration is required when source is 'confluence'")
            })?;
            Ok(Arc::new(ConfluenceConnector::new(conf, config.timeout_secs)?))
        }
    }
}
