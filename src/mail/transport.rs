//! Production transport: provider HTTP API for inbound fetch, SMTP via
//! lettre for outbound send.
//!
//! The webhook notification carries only an email id; the full message has
//! to be fetched from the provider's API. Outbound goes through plain SMTP
//! so the restyled mail lands like any other message.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::MailConfig;
use crate::error::TransportError;
use crate::mail::{InboundEmail, MailTransport, OutboundMessage};

pub struct HttpMailTransport {
    config: MailConfig,
    http: reqwest::Client,
    call_timeout: Duration,
}

impl HttpMailTransport {
    pub fn new(config: MailConfig, call_timeout: Duration) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            call_timeout,
        }
    }

    /// Blocking SMTP send; runs under `spawn_blocking`.
    fn send_smtp(config: &MailConfig, message: &OutboundMessage, timeout: Duration) -> Result<(), TransportError> {
        let creds = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        );

        let transport = SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| TransportError::Send {
                to: message.to.clone(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(config.smtp_port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        let email = Message::builder()
            .from(config.from_address.parse().map_err(|e| {
                TransportError::InvalidAddress {
                    address: config.from_address.clone(),
                    reason: format!("{e}"),
                }
            })?)
            .to(message.to.parse().map_err(|e| TransportError::InvalidAddress {
                address: message.to.clone(),
                reason: format!("{e}"),
            })?)
            .subject(&message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|e| TransportError::Send {
                to: message.to.clone(),
                reason: format!("Failed to build email: {e}"),
            })?;

        transport.send(&email).map_err(|e| TransportError::Send {
            to: message.to.clone(),
            reason: format!("SMTP send failed: {e}"),
        })?;

        Ok(())
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn fetch(&self, email_id: &str) -> Result<InboundEmail, TransportError> {
        let url = format!(
            "{}/emails/{}",
            self.config.api_base_url.trim_end_matches('/'),
            email_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(|e| TransportError::Fetch {
                email_id: email_id.to_string(),
                reason: format!("{e}"),
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Fetch {
                email_id: email_id.to_string(),
                reason: format!("provider returned HTTP {}", response.status()),
            });
        }

        response
            .json::<InboundEmail>()
            .await
            .map_err(|e| TransportError::Fetch {
                email_id: email_id.to_string(),
                reason: format!("invalid response body: {e}"),
            })
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let config = self.config.clone();
        let message = message.clone();
        let timeout = self.call_timeout;
        let to = message.to.clone();

        tokio::task::spawn_blocking(move || Self::send_smtp(&config, &message, timeout))
            .await
            .map_err(|e| TransportError::Send {
                to: to.clone(),
                reason: format!("send task failed: {e}"),
            })??;

        info!(to = %to, "Email sent");
        Ok(())
    }
}
