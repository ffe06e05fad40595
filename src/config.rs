//! Configuration, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port for the HTTP surface (API + webhook).
    pub port: u16,
    /// Path to the libSQL database file.
    pub db_path: String,
    /// LLM backend used for both generation and application.
    pub llm_backend: LlmBackend,
    /// API key for the LLM backend.
    pub llm_api_key: SecretString,
    /// Model used to turn a user prompt into a styling config.
    pub style_model: String,
    /// Model used to apply a styling config to an email body.
    pub restyle_model: String,
    /// Mail transport configuration.
    pub mail: MailConfig,
    /// Bound timeout applied to each external call.
    pub call_timeout: Duration,
    /// How long a processed email id is remembered for webhook dedup.
    pub dedup_retention: Duration,
}

/// Mail transport configuration: inbound fetch (provider HTTP API) and
/// outbound send (SMTP).
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Base URL of the mail provider's API (inbound email fetch).
    pub api_base_url: String,
    /// Bearer token for the mail provider's API.
    pub api_key: SecretString,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// From address on restyled outbound mail.
    pub from_address: String,
    /// Fixed forwarding address. `None` means reply to the original sender.
    pub forward_to: Option<String>,
    /// Prefix prepended to the original subject on dispatch.
    pub subject_prefix: String,
}

impl AppConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = env_parsed("MAIL_RESTYLE_PORT", 8080)?;

        let db_path = std::env::var("MAIL_RESTYLE_DB_PATH")
            .unwrap_or_else(|_| "./data/mail-restyle.db".to_string());

        let llm_backend = match std::env::var("MAIL_RESTYLE_LLM_BACKEND")
            .unwrap_or_else(|_| "anthropic".to_string())
            .to_lowercase()
            .as_str()
        {
            "anthropic" => LlmBackend::Anthropic,
            "openai" => LlmBackend::OpenAi,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "MAIL_RESTYLE_LLM_BACKEND".into(),
                    message: format!("unknown backend '{other}'"),
                });
            }
        };

        let key_var = match llm_backend {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        };
        let llm_api_key = std::env::var(key_var)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let style_model = std::env::var("MAIL_RESTYLE_STYLE_MODEL")
            .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string());
        let restyle_model = std::env::var("MAIL_RESTYLE_RESTYLE_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

        let call_timeout = Duration::from_secs(env_parsed("MAIL_RESTYLE_CALL_TIMEOUT_SECS", 60)?);
        let dedup_retention =
            Duration::from_secs(env_parsed("MAIL_RESTYLE_DEDUP_RETENTION_SECS", 600)?);

        Ok(Self {
            port,
            db_path,
            llm_backend,
            llm_api_key,
            style_model,
            restyle_model,
            mail: MailConfig::from_env()?,
            call_timeout,
            dedup_retention,
        })
    }
}

impl MailConfig {
    /// Build mail transport config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("MAIL_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.resend.com".to_string());

        let api_key = std::env::var("MAIL_API_KEY")
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar("MAIL_API_KEY".to_string()))?;

        let smtp_host = std::env::var("MAIL_SMTP_HOST")
            .map_err(|_| ConfigError::MissingEnvVar("MAIL_SMTP_HOST".to_string()))?;
        let smtp_port: u16 = env_parsed("MAIL_SMTP_PORT", 587)?;
        let smtp_username = std::env::var("MAIL_SMTP_USERNAME").unwrap_or_default();
        let smtp_password = std::env::var("MAIL_SMTP_PASSWORD").unwrap_or_default();

        let from_address = std::env::var("MAIL_FROM_ADDRESS")
            .unwrap_or_else(|_| smtp_username.clone());

        let forward_to = std::env::var("MAIL_FORWARD_TO")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let subject_prefix =
            std::env::var("MAIL_SUBJECT_PREFIX").unwrap_or_else(|_| "Re: ".to_string());

        Ok(Self {
            api_base_url,
            api_key,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_address,
            forward_to,
            subject_prefix,
        })
    }
}

/// Read an env var and parse it, falling back to `default` when unset.
fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}
