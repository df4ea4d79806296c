//! Outbound mail — plain-text submit over STARTTLS SMTP via lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::{MAIL_SUBJECT, SmtpConfig};
use crate::error::MailError;

/// Delivers a message body to an email address.
///
/// Implementations report failure as `false` and log the cause themselves;
/// callers only decide what to tell the chat user.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> bool;
}

/// SMTP dispatcher. Opens a fresh connection per message.
pub struct SmtpDispatcher {
    config: SmtpConfig,
}

impl SmtpDispatcher {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Build the outbound email without sending it.
    pub fn build_message(&self, to: &str, body: &str) -> Result<Message, MailError> {
        let from = self
            .config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| MailError::InvalidAddress {
                field: "from",
                reason: format!("{e}"),
            })?;
        let to = to.trim().parse::<Mailbox>().map_err(|e| MailError::InvalidAddress {
            field: "to",
            reason: format!("{e}"),
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(MAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))
    }

    /// Send an email, off the async runtime.
    pub async fn try_send(&self, to: &str, body: &str) -> Result<(), MailError> {
        let email = self.build_message(to, body)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || submit(&config, &email))
            .await
            .map_err(|e| MailError::Join(e.to_string()))?
    }
}

#[async_trait]
impl MailDispatcher for SmtpDispatcher {
    async fn send(&self, to: &str, body: &str) -> bool {
        match self.try_send(to, body).await {
            Ok(()) => {
                tracing::info!(to = %to, "Email sent");
                true
            }
            Err(e) => {
                tracing::error!(to = %to, error = %e, "Email send failed");
                false
            }
        }
    }
}

/// Connect, STARTTLS, authenticate, submit. Blocking.
fn submit(config: &SmtpConfig, email: &Message) -> Result<(), MailError> {
    let creds = Credentials::new(
        config.login.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::starttls_relay(&config.host)
        .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
        .port(config.port)
        .credentials(creds)
        .build();

    transport
        .send(email)
        .map_err(|e| MailError::Transport(format!("SMTP send failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(host: &str, port: u16) -> SmtpConfig {
        SmtpConfig {
            host: host.into(),
            port,
            login: "bot@example.com".into(),
            password: SecretString::from("pass"),
            from_address: "bot@example.com".into(),
        }
    }

    #[test]
    fn message_has_fixed_subject_and_addresses() {
        let dispatcher = SmtpDispatcher::new(config("smtp.example.com", 587));
        let email = dispatcher
            .build_message("user@example.com", "Hello there")
            .unwrap();

        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("From: bot@example.com"));
        assert!(raw.contains("To: user@example.com"));
        assert!(raw.contains(&format!("Subject: {MAIL_SUBJECT}")));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("Hello there"));

        let envelope = email.envelope();
        assert_eq!(envelope.to().len(), 1);
        assert_eq!(envelope.to()[0].to_string(), "user@example.com");
    }

    #[test]
    fn message_rejects_bad_recipient() {
        let dispatcher = SmtpDispatcher::new(config("smtp.example.com", 587));
        let err = dispatcher.build_message("not an address", "hi").unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress { field: "to", .. }));
    }

    #[test]
    fn message_rejects_bad_sender() {
        let mut cfg = config("smtp.example.com", 587);
        cfg.from_address = "nobody".into();
        let dispatcher = SmtpDispatcher::new(cfg);
        let err = dispatcher
            .build_message("user@example.com", "hi")
            .unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress { field: "from", .. }));
    }

    // ── Network failure (expected: nothing listens on the port) ─────

    #[tokio::test]
    async fn unreachable_relay_reports_false() {
        let _ = rustls::crypto::ring::default_provider().install_default();

        // Grab a free port, then close it so the connect is refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let dispatcher = SmtpDispatcher::new(config("127.0.0.1", port));
        assert!(!dispatcher.send("user@example.com", "Hello there").await);
    }

    #[tokio::test]
    async fn invalid_recipient_reports_false_without_connecting() {
        let dispatcher = SmtpDispatcher::new(config("127.0.0.1", 1));
        assert!(!dispatcher.send("bad-email", "Hello there").await);
    }
}
