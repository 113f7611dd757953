//! Bounded in-memory record of LLM invocations.
//!
//! Every synthesis or chat call appends an entry before the LLM is invoked.
//! The buffer is a ring: when the configured maximum is exceeded the oldest
//! entry is dropped. Appending never blocks the LLM call on I/O.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ChatMessage;

/// Maximum characters of context retained in a log entry.
pub const CONTEXT_SUMMARY_CHARS: usize = 200;

/// The kind of LLM invocation being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Synthesis,
    Chat,
}

/// One logged LLM invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub incident_id: String,
    pub prompt_type: PromptType,
    pub system_prompt: String,
    pub user_message: String,
    pub context_summary: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

/// Bounded ring buffer of prompt-log entries.
pub struct PromptLog {
    entries: Mutex<VecDeque<PromptLogEntry>>,
    max_entries: usize,
}

impl PromptLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Append an entry, dropping the oldest once the buffer is full.
    pub fn append(
        &self,
        incident_id: &str,
        prompt_type: PromptType,
        system_prompt: &str,
        user_message: &str,
        context: &str,
        conversation_history: Vec<ChatMessage>,
    ) -> Uuid {
        let entry = PromptLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            incident_id: incident_id.to_string(),
            prompt_type,
            system_prompt: system_prompt.to_string(),
            user_message: user_message.to_string(),
            context_summary: summarize(context),
            conversation_history,
        };
        let id = entry.id;

        let mut entries = self.entries.lock().expect("prompt log lock poisoned");
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
        id
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<PromptLogEntry> {
        self.entries
            .lock()
            .expect("prompt log lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Drop every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().expect("prompt log lock poisoned");
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("prompt log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First `CONTEXT_SUMMARY_CHARS` characters of the context, on a char
/// boundary.
fn summarize(context: &str) -> String {
    if context.chars().count() <= CONTEXT_SUMMARY_CHARS {
        return context.to_string();
    }
    context.chars().take(CONTEXT_SUMMARY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back() {
        let log = PromptLog::new(10);
        let id = log.append("INC001", PromptType::Synthesis, "system", "user", "context", vec![]);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].incident_id, "INC001");
        assert_eq!(entries[0].prompt_type, PromptType::Synthesis);
    }

    #[test]
    fn oldest_entry_dropped_at_capacity() {
        let log = PromptLog::new(2);
        log.append("INC001", PromptType::Chat, "s", "first", "", vec![]);
        log.append("INC001", PromptType::Chat, "s", "second", "", vec![]);
        log.append("INC001", PromptType::Chat, "s", "third", "", vec![]);

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_message, "second");
        assert_eq!(entries[1].user_message, "third");
    }

    #[test]
    fn context_is_summarized_to_200_chars() {
        let log = PromptLog::new(10);
        let long_context = "x".repeat(500);
        log.append("INC001", PromptType::Synthesis, "s", "u", &long_context, vec![]);
        assert_eq!(log.entries()[0].context_summary.len(), CONTEXT_SUMMARY_CHARS);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let log = PromptLog::new(10);
        log.append("INC001", PromptType::Chat, "s", "u", "", vec![]);
        assert_eq!(log.clear(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn history_is_retained_for_chat() {
        let log = PromptLog::new(10);
        let history = vec![ChatMessage {
            role: "user".to_string(),
            content: "what happened?".to_string(),
        }];
        log.append("INC001", PromptType::Chat, "s", "u", "", history);
        assert_eq!(log.entries()[0].conversation_history.len(), 1);
    }
}
