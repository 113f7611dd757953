//! LLM abstraction for SmartRecover.
//!
//! A [`LlmClient`] exposes a blocking completion call and a token-streaming
//! call backed by a bounded channel; providers exist for OpenAI, Gemini, and
//! Ollama. The [`LlmManager`] holds the active client behind a lock with
//! snapshot-then-release semantics so the admin surface can hot-swap
//! providers without stalling in-flight calls, and appends a prompt-log
//! record before every invocation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use smartrecover_core::config::LlmConfig;
use smartrecover_core::models::ChatMessage;
use smartrecover_core::prompt_log::{PromptLog, PromptType};
use smartrecover_core::{Error, Result};

pub mod providers;

pub use providers::build_client;

/// Capability set of an LLM backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider id (`openai`, `gemini`, `ollama`).
    fn provider(&self) -> &str;

    /// Model the client is configured for.
    fn model(&self) -> &str;

    /// Blocking completion of the conversation.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;

    /// Streaming completion. Chunks arrive on the returned channel in
    /// provider order; dropping the receiver cancels the underlying request.
    /// A mid-stream failure is surfaced as a final error-text chunk before
    /// the channel closes.
    async fn stream(&self, system: &str, messages: &[ChatMessage])
        -> Result<mpsc::Receiver<String>>;
}

/// Holds the active LLM client and routes every call through the prompt log.
pub struct LlmManager {
    client: RwLock<Arc<dyn LlmClient>>,
    config: RwLock<LlmConfig>,
    prompt_log: Arc<PromptLog>,
}

impl LlmManager {
    pub fn new(config: LlmConfig, prompt_log: Arc<PromptLog>) -> Result<Self> {
        let client = build_client(&config)?;
        info!(provider = config.provider.as_str(), model = config.active_model(), "LLM client initialized");
        Ok(Self {
            client: RwLock::new(client),
            config: RwLock::new(config),
            prompt_log,
        })
    }

    /// Replace the active client. Builds the new client before taking the
    /// swap lock; in-flight calls keep their snapshot of the old client.
    pub fn swap(&self, config: LlmConfig) -> Result<()> {
        let client = build_client(&config)?;
        info!(provider = config.provider.as_str(), model = config.active_model(), "LLM provider swapped");
        *self.client.write().expect("llm swap lock poisoned") = client;
        *self.config.write().expect("llm config lock poisoned") = config;
        Ok(())
    }

    /// Install a pre-built client directly, bypassing the provider factory.
    /// Used by embedders and tests that script the LLM.
    pub fn install_client(&self, client: Arc<dyn LlmClient>) {
        *self.client.write().expect("llm swap lock poisoned") = client;
    }

    /// The active configuration.
    pub fn config(&self) -> LlmConfig {
        self.config.read().expect("llm config lock poisoned").clone()
    }

    /// Snapshot the active client, releasing the swap lock immediately.
    fn snapshot(&self) -> Arc<dyn LlmClient> {
        self.client.read().expect("llm swap lock poisoned").clone()
    }

    fn log_prompt(
        &self,
        incident_id: &str,
        prompt_type: PromptType,
        system: &str,
        messages: &[ChatMessage],
        context: &str,
        history: Vec<ChatMessage>,
    ) {
        let user_message = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        // Failure to log must never block or fail the call.
        let id = self.prompt_log.append(
            incident_id,
            prompt_type,
            system,
            user_message,
            context,
            history,
        );
        debug!(prompt_log_id = %id, incident_id, "Prompt logged");
    }

    /// Blocking synthesis call with the configured total timeout.
    pub async fn complete(
        &self,
        incident_id: &str,
        prompt_type: PromptType,
        system: &str,
        messages: &[ChatMessage],
        context: &str,
    ) -> Result<String> {
        self.log_prompt(incident_id, prompt_type, system, messages, context, Vec::new());

        let client = self.snapshot();
        let timeout = Duration::from_secs(self.config().complete_timeout_secs);
        metrics::counter!("smartrecover_llm_calls_total", "kind" => "complete").increment(1);

        match tokio::time::timeout(timeout, client.complete(system, messages)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(incident_id, timeout_secs = timeout.as_secs(), "LLM completion timed out");
                Err(Error::upstream("LLM completion timed out"))
            }
        }
    }

    /// Streaming chat call. The conversation history rides along into the
    /// prompt log.
    pub async fn stream(
        &self,
        incident_id: &str,
        system: &str,
        messages: &[ChatMessage],
        context: &str,
        history: Vec<ChatMessage>,
    ) -> Result<mpsc::Receiver<String>> {
        self.log_prompt(incident_id, PromptType::Chat, system, messages, context, history);

        let client = self.snapshot();
        metrics::counter!("smartrecover_llm_calls_total", "kind" => "stream").increment(1);
        client.stream(system, messages).await
    }

    /// One-shot connectivity test used by the admin surface.
    pub async fn test(&self, message: &str) -> Result<(String, String, String)> {
        let client = self.snapshot();
        let provider = client.provider().to_string();
        let model = client.model().to_string();
        let messages = [ChatMessage {
            role: "user".to_string(),
            content: message.to_string(),
        }];
        let timeout = Duration::from_secs(self.config().complete_timeout_secs);
        let response = tokio::time::timeout(timeout, client.complete("", &messages))
            .await
            .map_err(|_| Error::upstream("LLM test timed out"))??;
        Ok((provider, model, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartrecover_core::config::LlmProvider;

    struct ScriptedClient {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.reply.clone())
        }

        async fn stream(
            &self,
            _system: &str,
            _messages: &[ChatMessage],
        ) -> Result<mpsc::Receiver<String>> {
            let (tx, rx) = mpsc::channel(4);
            let reply = self.reply.clone();
            tokio::spawn(async move {
                for word in reply.split_whitespace() {
                    if tx.send(word.to_string()).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn manager_with(reply: &str) -> LlmManager {
        let manager = LlmManager::new(
            LlmConfig {
                provider: LlmProvider::Ollama,
                ..Default::default()
            },
            Arc::new(PromptLog::new(10)),
        )
        .unwrap();
        *manager.client.write().unwrap() = Arc::new(ScriptedClient {
            reply: reply.to_string(),
        });
        manager
    }

    #[tokio::test]
    async fn complete_logs_prompt_before_calling() {
        let manager = manager_with("all good");
        let messages = [ChatMessage {
            role: "user".to_string(),
            content: "what happened?".to_string(),
        }];
        let reply = manager
            .complete("INC001", PromptType::Synthesis, "system prompt", &messages, "ctx")
            .await
            .unwrap();
        assert_eq!(reply, "all good");

        let entries = manager.prompt_log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].incident_id, "INC001");
        assert_eq!(entries[0].user_message, "what happened?");
        assert_eq!(entries[0].prompt_type, PromptType::Synthesis);
    }

    #[tokio::test]
    async fn stream_delivers_chunks_in_order() {
        let manager = manager_with("one two three");
        let messages = [ChatMessage {
            role: "user".to_string(),
            content: "go".to_string(),
        }];
        let mut rx = manager
            .stream("INC001", "system", &messages, "", Vec::new())
            .await
            .unwrap();

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        assert_eq!(chunks, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn swap_replaces_active_client() {
        let manager = manager_with("before");
        let mut config = manager.config();
        config.provider = LlmProvider::Ollama;
        config.ollama.model = "mistral".to_string();
        manager.swap(config).unwrap();
        assert_eq!(manager.config().ollama.model, "mistral");
        assert_eq!(manager.snapshot().provider(), "ollama");
    }
}
