use std::sync::Arc;

use mail_relay_bot::channels::{Channel, TelegramChannel};
use mail_relay_bot::config::RelayConfig;
use mail_relay_bot::error::Error;
use mail_relay_bot::mail::SmtpDispatcher;
use mail_relay_bot::relay::{Relay, run};
use mail_relay_bot::session::{self, InMemorySessionStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Load .env if present; real environment variables take precedence
    let _ = dotenvy::dotenv();

    let config = RelayConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", Error::from(e));
        eprintln!("  Required: BOT_TOKEN, SMTP_SERVER, SMTP_PORT, SMTP_LOGIN, SMTP_PASSWORD");
        eprintln!("  Set them in the environment or in a .env file.");
        std::process::exit(1);
    });

    eprintln!("📨 Mail relay bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   SMTP: {}:{} (STARTTLS) as {}",
        config.smtp.host, config.smtp.port, config.smtp.login
    );
    eprintln!("   From: {}", config.smtp.from_address);
    match config.session_ttl {
        Some(ttl) => eprintln!("   Session TTL: {}s", ttl.as_secs()),
        None => eprintln!("   Session TTL: none"),
    }

    // ── Telegram ────────────────────────────────────────────────────────
    let telegram = TelegramChannel::new(config.bot_token.clone());
    let bot_username = telegram.bot_username().await.map_err(Error::from)?;
    tracing::info!(bot = %bot_username, "Telegram token verified");
    let channel: Arc<dyn Channel> = Arc::new(telegram);

    // ── Sessions ────────────────────────────────────────────────────────
    let sessions: Arc<dyn SessionStore> = InMemorySessionStore::new();
    let _expiry_handle = config
        .session_ttl
        .map(|ttl| session::spawn_expiry_task(Arc::clone(&sessions), ttl));

    // ── Relay ───────────────────────────────────────────────────────────
    let mailer = Arc::new(SmtpDispatcher::new(config.smtp));
    let relay = Arc::new(Relay::new(sessions, mailer).with_bot_username(bot_username));

    tracing::info!("Bot started. Press Ctrl+C to stop.");
    run(channel, relay).await?;

    Ok(())
}
