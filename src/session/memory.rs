//! In-memory session store. State is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::traits::{PendingSession, SessionStore};
use crate::channels::ChatId;

/// Upper bound on how long an expired session can linger before a sweep.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// `HashMap` behind an async `RwLock`.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<ChatId, PendingSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, chat_id: ChatId, email: &str) {
        let previous = self
            .sessions
            .write()
            .await
            .insert(chat_id, PendingSession::new(email));
        if previous.is_some() {
            debug!(chat_id = %chat_id, "Pending session overwritten");
        }
    }

    async fn get(&self, chat_id: ChatId) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(&chat_id)
            .map(|s| s.email.clone())
    }

    async fn remove(&self, chat_id: ChatId) {
        self.sessions.write().await.remove(&chat_id);
    }

    async fn take(&self, chat_id: ChatId) -> Option<String> {
        self.sessions
            .write()
            .await
            .remove(&chat_id)
            .map(|s| s.email)
    }

    async fn prune_older_than(&self, max_age: Duration) -> usize {
        // An age too large for chrono can never be exceeded.
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at >= cutoff);
        before - sessions.len()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Periodically drop sessions older than `ttl`.
pub fn spawn_expiry_task(
    store: Arc<dyn SessionStore>,
    ttl: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl.min(MAX_SWEEP_INTERVAL));
        interval.tick().await; // first tick is immediate
        loop {
            interval.tick().await;
            let pruned = store.prune_older_than(ttl).await;
            if pruned > 0 {
                let remaining = store.len().await;
                info!(pruned, remaining, "Expired pending sessions");
            }
        }
    })
}
