//! Chat service (§4.7): per-user rate limiting, content filtering, and a
//! bounded per-channel history, grounded on
//! `original_source/server/services/chat_service.py`.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use aether_protocol::UserId;

const MAX_MESSAGE_LENGTH: usize = 500;
const RATE_LIMIT_MESSAGES: usize = 10;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const HISTORY_CAP: usize = 100;

/// Why a chat send was rejected. The `kind` string is what goes out on
/// the wire in a `chat_error` envelope (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("message content is empty")]
    Empty,
    #[error("message exceeds the maximum length")]
    TooLong,
    #[error("sending too frequently")]
    RateLimited,
}

impl ChatError {
    pub fn kind(self) -> &'static str {
        match self {
            Self::Empty => "empty_message",
            Self::TooLong => "message_too_long",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// One retained chat line (§3 `Chat message`).
#[derive(Debug, Clone)]
pub struct ChatRecord {
    pub channel: String,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub timestamp: u64,
}

/// Rate-limited, filtered, history-retaining chat fan-out input stage.
/// Holds no reference to the connection registry — the caller takes the
/// returned [`ChatRecord`] and forwards it to the right recipient set
/// (`lobby`, `room_<id>`, `team_<…>`) themselves (§4.7).
#[derive(Default)]
pub struct ChatService {
    history: HashMap<String, VecDeque<ChatRecord>>,
    rate_limits: HashMap<UserId, VecDeque<Instant>>,
}

impl ChatService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates, rate-limits, filters, and records a message. Returns
    /// the record to fan out, or the rejection reason.
    pub fn send(
        &mut self,
        sender_id: UserId,
        sender_name: impl Into<String>,
        channel: impl Into<String>,
        content: &str,
        now: u64,
    ) -> Result<ChatRecord, ChatError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ChatError::Empty);
        }
        if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::TooLong);
        }
        if !self.check_rate_limit(sender_id) {
            return Err(ChatError::RateLimited);
        }

        let channel = channel.into();
        let record = ChatRecord {
            channel: channel.clone(),
            sender_id,
            sender_name: sender_name.into(),
            content: filter_content(trimmed),
            timestamp: now,
        };
        self.push_history(channel, record.clone());
        Ok(record)
    }

    fn check_rate_limit(&mut self, user_id: UserId) -> bool {
        let window = self.rate_limits.entry(user_id).or_default();
        let cutoff = Instant::now().checked_sub(RATE_LIMIT_WINDOW).unwrap_or(Instant::now());
        while window.front().is_some_and(|t| *t < cutoff) {
            window.pop_front();
        }
        if window.len() >= RATE_LIMIT_MESSAGES {
            return false;
        }
        window.push_back(Instant::now());
        true
    }

    fn push_history(&mut self, channel: String, record: ChatRecord) {
        let entries = self.history.entry(channel).or_default();
        entries.push_back(record);
        while entries.len() > HISTORY_CAP {
            entries.pop_front();
        }
    }

    pub fn history(&self, channel: &str, limit: usize) -> Vec<ChatRecord> {
        self.history
            .get(channel)
            .map(|entries| entries.iter().rev().take(limit).rev().cloned().collect())
            .unwrap_or_default()
    }
}

/// Simple substring replacement filter (§4.7 "pluggable content filter").
/// Not meant to be exhaustive — a real deployment swaps this for a proper
/// moderation service.
fn filter_content(content: &str) -> String {
    const SENSITIVE: &[&str] = &["fuck", "shit"];
    let mut out = content.to_string();
    for word in SENSITIVE {
        if out.to_lowercase().contains(word) {
            let mask = "*".repeat(word.len());
            out = replace_case_insensitive(&out, word, &mask);
        }
    }
    out
}

fn replace_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> String {
    let lower_haystack = haystack.to_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut lower_rest = lower_haystack.as_str();
    while let Some(idx) = lower_rest.find(needle) {
        result.push_str(&rest[..idx]);
        result.push_str(replacement);
        rest = &rest[idx + needle.len()..];
        lower_rest = &lower_rest[idx + needle.len()..];
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message_rejected() {
        let mut chat = ChatService::new();
        let err = chat.send(UserId(1), "alice", "lobby", "   ", 0).unwrap_err();
        assert_eq!(err, ChatError::Empty);
    }

    #[test]
    fn test_too_long_message_rejected() {
        let mut chat = ChatService::new();
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        let err = chat.send(UserId(1), "alice", "lobby", &long, 0).unwrap_err();
        assert_eq!(err, ChatError::TooLong);
    }

    #[test]
    fn test_eleventh_message_in_window_is_rate_limited() {
        let mut chat = ChatService::new();
        for i in 0..RATE_LIMIT_MESSAGES {
            chat.send(UserId(1), "alice", "lobby", &format!("msg {i}"), 0).unwrap();
        }
        let err = chat.send(UserId(1), "alice", "lobby", "one too many", 0).unwrap_err();
        assert_eq!(err, ChatError::RateLimited);
    }

    #[test]
    fn test_sensitive_words_are_masked() {
        let mut chat = ChatService::new();
        let record = chat.send(UserId(1), "alice", "lobby", "what the fuck", 0).unwrap();
        assert!(!record.content.contains("fuck"));
        assert!(record.content.contains("****"));
    }

    #[test]
    fn test_history_capped_at_100() {
        let mut chat = ChatService::new();
        for i in 0..150 {
            chat.rate_limits.remove(&UserId(1));
            chat.send(UserId(1), "alice", "lobby", &format!("m{i}"), 0).unwrap();
        }
        assert_eq!(chat.history("lobby", 1000).len(), HISTORY_CAP);
    }

    #[test]
    fn test_history_returns_most_recent_first_to_last() {
        let mut chat = ChatService::new();
        chat.send(UserId(1), "alice", "lobby", "first", 0).unwrap();
        chat.send(UserId(1), "alice", "lobby", "second", 0).unwrap();
        let history = chat.history("lobby", 10);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
    }
}
