//! `SessionStore` trait — the single interface the relay flow uses for per-chat state.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::channels::ChatId;

/// A chat that has supplied a validated email and is waiting to send the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSession {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl PendingSession {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Backend-agnostic store of pending sessions, last-writer-wins per chat.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite the session for `chat_id`.
    async fn put(&self, chat_id: ChatId, email: &str);

    /// Pending email for `chat_id`, if any.
    async fn get(&self, chat_id: ChatId) -> Option<String>;

    /// Delete the session for `chat_id`. No-op if absent.
    async fn remove(&self, chat_id: ChatId);

    /// Remove the session for `chat_id` and return its email.
    async fn take(&self, chat_id: ChatId) -> Option<String>;

    /// Remove sessions created more than `max_age` ago.
    /// Returns the number of sessions removed.
    async fn prune_older_than(&self, max_age: Duration) -> usize;

    /// Number of pending sessions.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
