//! Configuration types, read from the process environment at startup.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Subject line of every relayed email.
pub const MAIL_SUBJECT: &str = "Notification from Telegram bot";

/// SMTP settings for the outbound mail relay.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: SecretString,
    /// `From` address of relayed mail. Defaults to the login.
    pub from_address: String,
}

/// Everything the relay needs to run.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bot_token: SecretString,
    pub smtp: SmtpConfig,
    /// Pending sessions older than this are swept. `None` keeps them forever.
    pub session_ttl: Option<Duration>,
}

impl RelayConfig {
    /// Build config from environment variables.
    ///
    /// Fails on the first missing or malformed required setting.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let bot_token = SecretString::from(required("BOT_TOKEN")?);
        let host = required("SMTP_SERVER")?;
        let port = required("SMTP_PORT")?
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SMTP_PORT".into(),
                message: e.to_string(),
            })?;
        let login = required("SMTP_LOGIN")?;
        let password = SecretString::from(required("SMTP_PASSWORD")?);

        let from_address = lookup("SMTP_FROM")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| login.clone());

        let session_ttl = match lookup("RELAY_SESSION_TTL_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "RELAY_SESSION_TTL_SECS".into(),
                        message: e.to_string(),
                    })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            bot_token,
            smtp: SmtpConfig {
                host,
                port,
                login,
                password,
                from_address,
            },
            session_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            ("BOT_TOKEN", "123:ABC"),
            ("SMTP_SERVER", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_LOGIN", "bot@example.com"),
            ("SMTP_PASSWORD", "hunter2"),
        ])
    }

    #[test]
    fn config_loads_required_values() {
        let vars = full_env();
        let cfg = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.bot_token.expose_secret(), "123:ABC");
        assert_eq!(cfg.smtp.host, "smtp.example.com");
        assert_eq!(cfg.smtp.port, 587);
        assert_eq!(cfg.smtp.login, "bot@example.com");
        assert_eq!(cfg.smtp.password.expose_secret(), "hunter2");
        assert!(cfg.session_ttl.is_none());
    }

    #[test]
    fn config_from_address_defaults_to_login() {
        let vars = full_env();
        let cfg = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.smtp.from_address, "bot@example.com");

        let mut vars = full_env();
        vars.insert("SMTP_FROM".into(), "Relay <relay@example.com>".into());
        let cfg = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.smtp.from_address, "Relay <relay@example.com>");
    }

    #[test]
    fn config_missing_var_is_reported_by_name() {
        for key in ["BOT_TOKEN", "SMTP_SERVER", "SMTP_PORT", "SMTP_LOGIN", "SMTP_PASSWORD"] {
            let mut vars = full_env();
            vars.remove(key);
            let err = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingEnvVar(ref name) if name == key),
                "expected MissingEnvVar({key}), got {err:?}"
            );
        }
    }

    #[test]
    fn config_empty_value_counts_as_missing() {
        let mut vars = full_env();
        vars.insert("SMTP_PASSWORD".into(), "   ".into());
        let err = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn config_rejects_non_numeric_port() {
        let mut vars = full_env();
        vars.insert("SMTP_PORT".into(), "smtp".into());
        let err = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SMTP_PORT"));
    }

    #[test]
    fn config_session_ttl() {
        let mut vars = full_env();
        vars.insert("RELAY_SESSION_TTL_SECS".into(), "900".into());
        let cfg = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.session_ttl, Some(Duration::from_secs(900)));

        vars.insert("RELAY_SESSION_TTL_SECS".into(), "0".into());
        let cfg = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert!(cfg.session_ttl.is_none());

        vars.insert("RELAY_SESSION_TTL_SECS".into(), "soon".into());
        assert!(RelayConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn config_loads_from_dotenv_contents() {
        let file = "# relay settings\n\
                    BOT_TOKEN=123:ABC\n\
                    SMTP_SERVER=smtp.example.com\n\
                    SMTP_PORT=465\n\
                    SMTP_LOGIN=bot@example.com\n\
                    SMTP_PASSWORD=\"hunter2\"\n";
        let vars: HashMap<String, String> = dotenvy::from_read_iter(file.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        let cfg = RelayConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.smtp.port, 465);
        assert_eq!(cfg.smtp.password.expose_secret(), "hunter2");
    }
}
