//! Mail transport: inbound email fetch and outbound dispatch.

mod transport;

pub use transport::HttpMailTransport;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;

/// Read-only snapshot of an inbound email, fetched per pipeline run.
/// Never persisted by this system.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEmail {
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl InboundEmail {
    /// The body to restyle: HTML preferred over plain text.
    pub fn body(&self) -> Option<&str> {
        self.html.as_deref().or(self.text.as_deref())
    }
}

/// An outbound message ready for dispatch.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Transport collaborator: fetch an inbound email by id, send an outbound
/// message. Both sides are single-attempt; retry policy lives with callers
/// (and callers choose not to retry).
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn fetch(&self, email_id: &str) -> Result<InboundEmail, TransportError>;

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}
