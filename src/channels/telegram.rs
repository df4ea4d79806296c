//! Telegram channel — long-polls the Bot API for updates.
//!
//! Talks to the HTTP Bot API directly with reqwest; only text messages are
//! surfaced, replies are sent as plain text.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::{Channel, ChatId, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Server-side long-poll timeout for `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

// ── Bot API payloads ────────────────────────────────────────────────

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TgMessage {
    pub chat: TgChat,
    pub from: Option<TgUser>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Update {
    /// Convert into an [`IncomingMessage`], skipping anything without text.
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        let text = message.text?;

        let mut incoming = IncomingMessage::new("telegram", ChatId(message.chat.id), &text);
        if let Some(user) = message.from {
            if let Some(name) = user.first_name.or(user.username) {
                incoming = incoming.with_user_name(&name);
            }
        }

        Some(incoming)
    }
}

// ── Channel ─────────────────────────────────────────────────────────

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
    shutdown: Arc<AtomicBool>,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Call `getMe` and return the bot's username.
    ///
    /// Doubles as the startup token check.
    pub async fn bot_username(&self) -> Result<String, ChannelError> {
        let startup_failed = |reason: String| ChannelError::StartupFailed {
            name: "telegram".into(),
            reason,
        };

        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| startup_failed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(startup_failed(format!("getMe returned {}", resp.status())));
        }

        let data: ApiResponse<TgUser> = resp
            .json()
            .await
            .map_err(|e| startup_failed(format!("getMe parse error: {e}")))?;
        bot_username_from(data).map_err(startup_failed)
    }

    /// Send a plain-text message to a chat.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id.0,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();
        let shutdown = Arc::clone(&self.shutdown);

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    tracing::info!("Telegram poll loop shutting down");
                    return;
                }

                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: ApiResponse<Vec<Update>> = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                if !data.ok {
                    tracing::warn!(
                        description = data.description.as_deref().unwrap_or("none"),
                        "Telegram getUpdates rejected"
                    );
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }

                for update in data.result.unwrap_or_default() {
                    // Advance offset past this update
                    offset = offset.max(update.update_id + 1);

                    let Some(incoming) = update.into_incoming() else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.send_message(msg.chat_id, &response.content).await
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        self.shutdown.store(true, Ordering::Relaxed);
        Ok(())
    }
}

fn bot_username_from(data: ApiResponse<TgUser>) -> Result<String, String> {
    if !data.ok {
        return Err(data
            .description
            .unwrap_or_else(|| "getMe rejected".to_string()));
    }
    data.result
        .and_then(|user| user.username)
        .ok_or_else(|| "getMe returned no username".to_string())
}

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        bot_token.expose_secret()
    )
}

// ── Tests ───────────────────────────────────────────────────────────
