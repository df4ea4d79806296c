//! Per-chat relay flow: collect an email address, then forward the next text.
//!
//! A chat with no pending session is awaiting an email; a chat with one is
//! awaiting the message body. Email-shaped text always (re)sets the pending
//! address, even mid-flow, so an address can never be sent as a body.

use std::sync::Arc;

use tracing::{debug, info};

use crate::channels::ChatId;
use crate::mail::MailDispatcher;
use crate::session::SessionStore;
use crate::validate::is_valid_email;

pub const GREETING: &str = "Hi! Send me the email address you want to write to.";
pub const EMAIL_ACCEPTED: &str =
    "Email accepted. Now send the text of the message you want to deliver.";
pub const EMAIL_REJECTED: &str = "Please enter your email address first.";
pub const SEND_OK: &str = "Message sent successfully!";
pub const SEND_FAILED: &str = "Failed to send the message. Check the SMTP settings.";

/// What an inbound text is, in handler priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// `/start`, `/start@ThisBot`, or `/start <payload>`.
    Start,
    /// Any other slash command. No handler is registered for these.
    OtherCommand(&'a str),
    /// A command addressed to a different bot, e.g. `/start@OtherBot`.
    ForeignCommand(&'a str),
    /// Trimmed text that passes the email check.
    Email(&'a str),
    /// Anything else, trimmed.
    Text(&'a str),
}

impl<'a> Inbound<'a> {
    /// Classify `raw`. With `bot_username` set, `/cmd@name` only counts as a
    /// command for this bot when `name` matches it (case-insensitively).
    pub fn classify(raw: &'a str, bot_username: Option<&str>) -> Self {
        let text = raw.trim();

        if let Some(rest) = text.strip_prefix('/') {
            let word = rest.split_whitespace().next().unwrap_or_default();
            let (command, target) = match word.split_once('@') {
                Some((command, target)) => (command, Some(target)),
                None => (word, None),
            };
            if target
                .zip(bot_username)
                .is_some_and(|(target, me)| !target.eq_ignore_ascii_case(me))
            {
                return Self::ForeignCommand(word);
            }
            return if command == "start" {
                Self::Start
            } else {
                Self::OtherCommand(command)
            };
        }

        if is_valid_email(text) {
            Self::Email(text)
        } else {
            Self::Text(text)
        }
    }
}

/// A body ready to be mailed. The session it came from is already gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub chat_id: ChatId,
    pub to: String,
    pub body: String,
}

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send this reply; nothing else to do.
    Reply(&'static str),
    /// Mail this, then reply with the result of [`Relay::deliver`].
    Deliver(Delivery),
    /// No reply.
    Ignore,
}

/// The relay state machine over an injected session store and mailer.
pub struct Relay {
    sessions: Arc<dyn SessionStore>,
    mailer: Arc<dyn MailDispatcher>,
    bot_username: Option<String>,
}

impl Relay {
    pub fn new(sessions: Arc<dyn SessionStore>, mailer: Arc<dyn MailDispatcher>) -> Self {
        Self {
            sessions,
            mailer,
            bot_username: None,
        }
    }

    /// Ignore commands addressed to any bot other than `username`.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Apply the state transition for one inbound text.
    ///
    /// Only touches the session store; mail is sent by [`Relay::deliver`].
    pub async fn route(&self, chat_id: ChatId, text: &str) -> Step {
        match Inbound::classify(text, self.bot_username.as_deref()) {
            Inbound::Start => Step::Reply(GREETING),
            Inbound::OtherCommand(command) => {
                debug!(chat_id = %chat_id, command, "Ignoring unknown command");
                Step::Ignore
            }
            Inbound::ForeignCommand(command) => {
                debug!(chat_id = %chat_id, command, "Ignoring command for another bot");
                Step::Ignore
            }
            Inbound::Email(email) => {
                self.sessions.put(chat_id, email).await;
                info!(chat_id = %chat_id, "Email accepted, awaiting message body");
                Step::Reply(EMAIL_ACCEPTED)
            }
            Inbound::Text(body) => match self.sessions.take(chat_id).await {
                Some(to) => Step::Deliver(Delivery {
                    chat_id,
                    to,
                    body: body.to_string(),
                }),
                None => {
                    debug!(chat_id = %chat_id, "Text without pending email");
                    Step::Reply(EMAIL_REJECTED)
                }
            },
        }
    }

    /// Mail a body and return the reply for the user.
    pub async fn deliver(&self, delivery: Delivery) -> &'static str {
        info!(chat_id = %delivery.chat_id, to = %delivery.to, "Relaying message");
        if self.mailer.send(&delivery.to, &delivery.body).await {
            SEND_OK
        } else {
            SEND_FAILED
        }
    }

    /// Route and, if needed, deliver inline. Returns the reply, if any.
    pub async fn handle(&self, chat_id: ChatId, text: &str) -> Option<&'static str> {
        match self.route(chat_id, text).await {
            Step::Reply(reply) => Some(reply),
            Step::Deliver(delivery) => Some(self.deliver(delivery).await),
            Step::Ignore => None,
        }
    }
}
