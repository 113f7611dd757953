//! SmartRecover core library
//!
//! Shared building blocks for the retrieval-and-synthesis engine:
//!
//! - **error**: the error taxonomy used across every crate
//! - **models**: incidents, tickets, changes, telemetry, and the typed
//!   per-agent result payloads that make up [`models::AgentData`]
//! - **config**: layered configuration (environment > YAML > defaults)
//! - **similarity**: weighted-Jaccard incident ranking
//! - **quality**: completeness scoring for similar-incident tickets
//! - **cache**: the per-incident TTL cache of agent results
//! - **prompts**: editable per-agent system prompts with persistence
//! - **exclusion**: per-incident excluded-item sets and accuracy metrics
//! - **prompt_log**: bounded in-memory record of LLM invocations
//! - **logging**: tracing initialization and sensitive-value redaction

pub mod cache;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod models;
pub mod prompt_log;
pub mod prompts;
pub mod quality;
pub mod similarity;

pub use error::{Error, Result};
