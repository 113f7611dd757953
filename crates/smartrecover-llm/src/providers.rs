//! LLM provider implementations.
//!
//! Each provider speaks its native HTTP API through `reqwest`. Streaming
//! runs in a spawned producer task that forwards chunks into a bounded
//! channel; when the receiver is dropped the next send fails, the task
//! returns, and dropping the response stream aborts the network request.
//! A mid-stream failure or idle timeout is surfaced as a final error-text
//! chunk so the SSE layer can close the stream cleanly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use smartrecover_core::config::{LlmConfig, LlmProvider};
use smartrecover_core::models::ChatMessage;
use smartrecover_core::{Error, Result};

use crate::LlmClient;

/// Channel capacity for streamed chunks.
const STREAM_BUFFER: usize = 100;

/// Build the client selected by the configuration.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let idle_timeout = Duration::from_secs(config.stream_idle_timeout_secs);
    match config.provider {
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiClient::new(&config.openai, idle_timeout)?)),
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(&config.gemini, idle_timeout)?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::new(&config.ollama, idle_timeout)?)),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| Error::config(format!("cannot build HTTP client: {e}")))
}

fn require_key(key: &Option<String>, provider: &str) -> Result<String> {
    key.clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::config(format!("{provider} API key is not configured")))
}

/// Split buffered bytes into complete lines, leaving any partial tail in
/// the buffer.
fn drain_lines(buffer: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(idx) = buffer.find('\n') {
        let line: String = buffer.drain(..=idx).collect();
        lines.push(line.trim_end_matches(['\r', '\n']).to_string());
    }
    lines
}

/// Forward a provider byte stream into the chunk channel, extracting text
/// with `extract`. Lines are framed either as SSE `data:` events or as raw
/// NDJSON depending on `sse_framing`.
async fn pump_stream(
    response: reqwest::Response,
    tx: mpsc::Sender<String>,
    idle_timeout: Duration,
    sse_framing: bool,
    extract: impl Fn(&Value) -> Option<String>,
) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    loop {
        let next = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                warn!(idle_secs = idle_timeout.as_secs(), "LLM stream idle timeout");
                let _ = tx.send("\n\nError: LLM stream timed out".to_string()).await;
                return;
            }
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                warn!(error = %e, "LLM stream failed mid-flight");
                let _ = tx.send(format!("\n\nError: {e}")).await;
                return;
            }
            None => return,
        };

        buffer.push_str(&String::from_utf8_lossy(&bytes));
        for line in drain_lines(&mut buffer) {
            let payload = if sse_framing {
                match line.strip_prefix("data:") {
                    Some(rest) => rest.trim(),
                    None => continue,
                }
            } else {
                line.trim()
            };
            if payload.is_empty() || payload == "[DONE]" {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(payload) else {
                continue;
            };
            if let Some(text) = extract(&value) {
                if !text.is_empty() && tx.send(text).await.is_err() {
                    // Receiver dropped: the client disconnected. Returning
                    // drops the byte stream and aborts the request.
                    debug!("LLM stream receiver dropped, cancelling");
                    return;
                }
            }
        }
    }
}

// =============================================================================
// OPENAI
// =============================================================================

pub struct OpenAiClient {
    client: reqwest::Client,
    model: String,
    temperature: f64,
    api_key: Option<String>,
    idle_timeout: Duration,
}

impl OpenAiClient {
    pub fn new(
        config: &smartrecover_core::config::OpenAiConfig,
        idle_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key.clone(),
            idle_timeout,
        })
    }

    fn body(&self, system: &str, messages: &[ChatMessage], stream: bool) -> Value {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire_messages.push(json!({"role": "system", "content": system}));
        }
        for message in messages {
            wire_messages.push(json!({"role": message.role, "content": message.content}));
        }
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": wire_messages,
            "stream": stream,
        })
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let key = require_key(&self.api_key, "OpenAI")?;
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("OpenAI request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "OpenAI returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let response = self.send(&self.body(system, messages, false)).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("OpenAI response unreadable: {e}")))?;
        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<String>> {
        let response = self.send(&self.body(system, messages, true)).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            pump_stream(response, tx, idle_timeout, true, |value| {
                value["choices"][0]["delta"]["content"]
                    .as_str()
                    .map(str::to_string)
            })
            .await;
        });
        Ok(rx)
    }
}

// =============================================================================
// GEMINI
// =============================================================================

pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    temperature: f64,
    api_key: Option<String>,
    idle_timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        config: &smartrecover_core::config::GeminiConfig,
        idle_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key.clone(),
            idle_timeout,
        })
    }

    fn body(&self, system: &str, messages: &[ChatMessage]) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();
        let mut body = json!({
            "contents": contents,
            "generationConfig": {"temperature": self.temperature},
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        body
    }

    async fn send(&self, endpoint: &str, body: &Value) -> Result<reqwest::Response> {
        let key = require_key(&self.api_key, "Gemini")?;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:{endpoint}",
            self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Gemini request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "Gemini returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

fn gemini_text(value: &Value) -> Option<String> {
    value["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .filter(|text| !text.is_empty())
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .send("generateContent", &self.body(system, messages))
            .await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Gemini response unreadable: {e}")))?;
        Ok(gemini_text(&body).unwrap_or_default())
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<String>> {
        let key = require_key(&self.api_key, "Gemini")?;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent",
            self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse"), ("key", key.as_str())])
            .json(&self.body(system, messages))
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Gemini request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "Gemini returned {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            pump_stream(response, tx, idle_timeout, true, gemini_text).await;
        });
        Ok(rx)
    }
}

// =============================================================================
// OLLAMA
// =============================================================================

pub struct OllamaClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
    temperature: f64,
    idle_timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        config: &smartrecover_core::config::OllamaConfig,
        idle_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            idle_timeout,
        })
    }

    fn body(&self, system: &str, messages: &[ChatMessage], stream: bool) -> Value {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire_messages.push(json!({"role": "system", "content": system}));
        }
        for message in messages {
            wire_messages.push(json!({"role": message.role, "content": message.content}));
        }
        json!({
            "model": self.model,
            "messages": wire_messages,
            "stream": stream,
            "options": {"temperature": self.temperature},
        })
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Ollama request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "Ollama returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let response = self.send(&self.body(system, messages, false)).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Ollama response unreadable: {e}")))?;
        Ok(body["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<String>> {
        // Ollama streams newline-delimited JSON rather than SSE frames.
        let response = self.send(&self.body(system, messages, true)).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            pump_stream(response, tx, idle_timeout, false, |value| {
                value["message"]["content"].as_str().map(str::to_string)
            })
            .await;
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_lines_keeps_partial_tail() {
        let mut buffer = "data: one\ndata: two\ndata: thr".to_string();
        let lines = drain_lines(&mut buffer);
        assert_eq!(lines, vec!["data: one", "data: two"]);
        assert_eq!(buffer, "data: thr");
    }

    #[test]
    fn gemini_text_concatenates_parts() {
        let value = json!({
            "candidates": [{"content": {"parts": [{"text": "Hel"}, {"text": "lo"}]}}]
        });
        assert_eq!(gemini_text(&value), Some("Hello".to_string()));
        assert_eq!(gemini_text(&json!({})), None);
    }

    #[test]
    fn missing_api_key_is_config_error() {
        assert!(matches!(
            require_key(&None, "OpenAI"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            require_key(&Some(String::new()), "OpenAI"),
            Err(Error::Config(_))
        ));
        assert_eq!(require_key(&Some("k".into()), "OpenAI").unwrap(), "k");
    }

    #[test]
    fn openai_body_carries_system_prompt_first() {
        let client = OpenAiClient::new(
            &smartrecover_core::config::OpenAiConfig {
                model: "gpt-4o-mini".into(),
                temperature: 0.2,
                api_key: Some("k".into()),
            },
            Duration::from_secs(30),
        )
        .unwrap();
        let messages = [ChatMessage {
            role: "user".into(),
            content: "hi".into(),
        }];
        let body = client.body("be brief", &messages, true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn gemini_maps_assistant_role_to_model() {
        let client = GeminiClient::new(
            &smartrecover_core::config::GeminiConfig {
                model: "gemini-pro".into(),
                temperature: 0.7,
                api_key: Some("k".into()),
            },
            Duration::from_secs(30),
        )
        .unwrap();
        let messages = [
            ChatMessage {
                role: "user".into(),
                content: "q".into(),
            },
            ChatMessage {
                role: "assistant".into(),
                content: "a".into(),
            },
        ];
        let body = client.body("sys", &messages);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
    }
}
