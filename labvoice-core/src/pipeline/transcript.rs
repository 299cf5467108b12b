use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::message::{Message, Role};

/// Folds streamed transcription deltas into whole utterances.
///
/// A fragment extends the last message when the role matches and that
/// message started less than `merge_window` ago; otherwise it opens a new
/// message. Merging replaces the last element rather than editing it, so
/// snapshots handed out earlier never change.
#[derive(Debug, Clone)]
pub struct TranscriptAggregator {
    messages: Vec<Message>,
    merge_window: chrono::Duration,
}

impl TranscriptAggregator {
    pub fn new(merge_window: Duration) -> Self {
        Self {
            messages: Vec::new(),
            merge_window: chrono::Duration::from_std(merge_window)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Start from an earlier conversation, e.g. the previous session's transcript.
    pub fn with_history(merge_window: Duration, history: Vec<Message>) -> Self {
        Self {
            messages: history,
            ..Self::new(merge_window)
        }
    }

    pub fn push(&mut self, role: Role, text: &str) -> &Message {
        self.push_at(role, text, Utc::now())
    }

    pub fn push_at(&mut self, role: Role, text: &str, now: DateTime<Utc>) -> &Message {
        let window = self.merge_window;
        let merged = self
            .messages
            .last()
            .filter(|last| last.role == role && now - last.timestamp < window)
            .map(|last| Message::new(role, format!("{}{}", last.text, text), last.timestamp));

        match merged {
            Some(message) => {
                let index = self.messages.len() - 1;
                self.messages[index] = message;
            }
            None => self.messages.push(Message::new(role, text, now)),
        }
        // Both arms leave at least one message behind.
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `role: text` lines, oldest first.
    pub fn history_text(&self) -> String {
        render_history(&self.messages)
    }
}

pub(crate) fn render_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}
