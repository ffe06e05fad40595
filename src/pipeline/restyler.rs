//! Webhook-triggered restyle workflow: fetch the inbound email, apply the
//! active style, dispatch the result.
//!
//! Runs detached from the webhook response (`tokio::spawn` in the handler).
//! Nothing here may surface an error to the trigger: every failure is
//! caught, logged, and converted into the best available degraded behavior
//! (unstyled delivery) or a silent abort (nothing fetchable, nothing
//! sendable). Within a run the steps are strictly sequential; across runs
//! there is no coordination.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::mail::{MailTransport, OutboundMessage};
use crate::store::StyleStore;
use crate::styles::StyleApplier;

/// Dispatch policy for restyled mail.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fixed forwarding address; `None` sends back to the original sender.
    pub forward_to: Option<String>,
    /// Prefix marking the outbound message as a derivative of the original.
    pub subject_prefix: String,
    /// How long a processed email id is remembered for webhook dedup.
    pub dedup_retention: Duration,
}

pub struct RestylePipeline {
    store: Arc<dyn StyleStore>,
    transport: Arc<dyn MailTransport>,
    applier: StyleApplier,
    config: PipelineConfig,
    processed: ProcessedIds,
}

impl RestylePipeline {
    pub fn new(
        store: Arc<dyn StyleStore>,
        transport: Arc<dyn MailTransport>,
        applier: StyleApplier,
        config: PipelineConfig,
    ) -> Self {
        let processed = ProcessedIds::new(config.dedup_retention);
        Self {
            store,
            transport,
            applier,
            config,
            processed,
        }
    }

    /// Process one inbound email end to end.
    ///
    /// Webhook redelivery of an id already seen within the retention window
    /// skips the run, keeping side effects at-most-once per logical email.
    pub async fn run(&self, email_id: &str) {
        if !self.processed.mark(email_id) {
            info!(email_id, "Duplicate webhook delivery, skipping run");
            return;
        }

        // Step 1: without the original there is nothing to restyle or
        // forward. Terminal for this run.
        let email = match self.transport.fetch(email_id).await {
            Ok(email) => email,
            Err(e) => {
                error!(email_id, error = %e, "Failed to fetch inbound email, aborting run");
                return;
            }
        };

        // Step 2: degraded delivery beats no delivery, so a storage failure
        // degrades to unstyled forwarding just like the valid empty state —
        // but the two are logged distinguishably.
        let active_style = match self.store.get_active().await {
            Ok(Some(style)) => Some(style),
            Ok(None) => {
                info!(email_id, "No active style configured, forwarding original body");
                None
            }
            Err(e) => {
                error!(
                    email_id,
                    error = %e,
                    "Could not resolve active style, forwarding original body"
                );
                None
            }
        };

        // Step 3: HTML preferred over plain text.
        let original_body = match email.body() {
            Some(body) => body.to_string(),
            None => {
                warn!(email_id, "Inbound email has no body");
                String::new()
            }
        };

        // Step 4: styling is best-effort; the original body is always a
        // valid outcome.
        let outbound_body = match &active_style {
            Some(style) => match self
                .applier
                .apply(&original_body, &style.styling_json)
                .await
            {
                Ok(styled) => styled,
                Err(e) => {
                    warn!(
                        email_id,
                        style_id = %style.id,
                        error = %e,
                        "Style application failed, falling back to original body"
                    );
                    original_body
                }
            },
            None => original_body,
        };

        // Step 5: dispatch. Failure is terminal and not retried.
        let to = self
            .config
            .forward_to
            .clone()
            .unwrap_or_else(|| email.sender.clone());
        let subject = format!(
            "{}{}",
            self.config.subject_prefix,
            email.subject.as_deref().unwrap_or_default()
        );

        let message = OutboundMessage {
            to,
            subject,
            html_body: outbound_body,
        };
        match self.transport.send(&message).await {
            Ok(()) => info!(
                email_id,
                to = %message.to,
                styled = active_style.is_some(),
                "Restyled email dispatched"
            ),
            Err(e) => {
                error!(email_id, error = %e, "Failed to dispatch restyled email");
            }
        }
    }
}

/// Short-lived set of already-processed email ids.
///
/// In-process only: a restart forgets the set and a redelivered webhook
/// would then produce a duplicate outbound message. Accepted trade-off for
/// not persisting idempotency records.
struct ProcessedIds {
    inner: Mutex<HashMap<String, Instant>>,
    retention: Duration,
}

impl ProcessedIds {
    fn new(retention: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Record `id` as processed. Returns `false` if it was already recorded
    /// within the retention window. Expired entries are pruned on the way.
    fn mark(&self, id: &str) -> bool {
        let mut guard = self.inner.lock().expect("processed-id mutex poisoned");
        let now = Instant::now();
        guard.retain(|_, seen_at| now.duration_since(*seen_at) < self.retention);

        if guard.contains_key(id) {
            return false;
        }
        guard.insert(id.to_string(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::{GenerationError, StoreError, TransportError};
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::mail::InboundEmail;
    use crate::store::LibSqlStyleStore;
    use crate::styles::StyleConfig;
    use uuid::Uuid;

    // ── Test doubles ────────────────────────────────────────────────

    /// Transport that serves one fixed inbound email and records sends.
    struct FakeTransport {
        email: Option<InboundEmail>,
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl FakeTransport {
        fn with_email(email: InboundEmail) -> Arc<Self> {
            Arc::new(Self {
                email: Some(email),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                email: None,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for FakeTransport {
        async fn fetch(&self, email_id: &str) -> Result<InboundEmail, TransportError> {
            self.email.clone().ok_or_else(|| TransportError::Fetch {
                email_id: email_id.to_string(),
                reason: "unreachable".into(),
            })
        }

        async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    /// Store whose get_active always fails.
    struct BrokenStore;

    #[async_trait]
    impl StyleStore for BrokenStore {
        async fn create(
            &self,
            _user_prompt: &str,
            _styling_json: &serde_json::Value,
        ) -> Result<StyleConfig, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn get_active(&self) -> Result<Option<StyleConfig>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn list_history(&self) -> Result<Vec<StyleConfig>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn activate(&self, id: Uuid) -> Result<StyleConfig, StoreError> {
            Err(StoreError::NotFound { id })
        }
        async fn deactivate_all(&self) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
    }

    /// LLM that returns fixed output, or always fails.
    struct StubLlm {
        response: Option<String>,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, GenerationError> {
            match &self.response {
                Some(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 10,
                    output_tokens: 10,
                }),
                None => Err(GenerationError::RequestFailed("stub failure".into())),
            }
        }
    }

    fn applier_returning(response: Option<&str>) -> StyleApplier {
        StyleApplier::new(
            Arc::new(StubLlm {
                response: response.map(str::to_string),
            }),
            Duration::from_secs(5),
        )
    }

    fn inbound() -> InboundEmail {
        InboundEmail {
            sender: "alice@example.com".into(),
            to: vec!["inbox@restyle.example".into()],
            subject: Some("Quarterly update".into()),
            html: Some("<p>numbers look good</p>".into()),
            text: Some("numbers look good".into()),
        }
    }

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            forward_to: None,
            subject_prefix: "Re: ".into(),
            dedup_retention: Duration::from_secs(600),
        }
    }

    async fn store_with_active_style() -> Arc<LibSqlStyleStore> {
        let store = LibSqlStyleStore::new_memory().await.unwrap();
        store
            .create("dark", &serde_json::json!({"paragraph": "color: #0ff;"}))
            .await
            .unwrap();
        Arc::new(store)
    }

    // ── Runs ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn no_active_style_forwards_original_body() {
        let store = Arc::new(LibSqlStyleStore::new_memory().await.unwrap());
        let transport = FakeTransport::with_email(inbound());
        let pipeline = RestylePipeline::new(
            store,
            transport.clone(),
            applier_returning(Some("<styled/>")),
            pipeline_config(),
        );

        pipeline.run("e1").await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].html_body, "<p>numbers look good</p>");
        assert_eq!(sent[0].subject, "Re: Quarterly update");
        assert_eq!(sent[0].to, "alice@example.com");
    }

    #[tokio::test]
    async fn active_style_dispatches_styled_body() {
        let store = store_with_active_style().await;
        let transport = FakeTransport::with_email(inbound());
        let pipeline = RestylePipeline::new(
            store,
            transport.clone(),
            applier_returning(Some("<p style=\"color: #0ff\">numbers look good</p>")),
            pipeline_config(),
        );

        pipeline.run("e1").await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].html_body,
            "<p style=\"color: #0ff\">numbers look good</p>"
        );
    }

    #[tokio::test]
    async fn applier_failure_falls_back_to_original_body() {
        let store = store_with_active_style().await;
        let transport = FakeTransport::with_email(inbound());
        let pipeline = RestylePipeline::new(
            store,
            transport.clone(),
            applier_returning(None),
            pipeline_config(),
        );

        pipeline.run("e1").await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].html_body, "<p>numbers look good</p>");
    }

    #[tokio::test]
    async fn storage_failure_still_delivers_unstyled() {
        let transport = FakeTransport::with_email(inbound());
        let pipeline = RestylePipeline::new(
            Arc::new(BrokenStore),
            transport.clone(),
            applier_returning(Some("<styled/>")),
            pipeline_config(),
        );

        pipeline.run("e1").await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].html_body, "<p>numbers look good</p>");
    }

    #[tokio::test]
    async fn fetch_failure_aborts_without_dispatch() {
        let transport = FakeTransport::unreachable();
        let pipeline = RestylePipeline::new(
            Arc::new(LibSqlStyleStore::new_memory().await.unwrap()),
            transport.clone(),
            applier_returning(Some("<styled/>")),
            pipeline_config(),
        );

        pipeline.run("e1").await;

        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn duplicate_delivery_is_skipped() {
        let store = Arc::new(LibSqlStyleStore::new_memory().await.unwrap());
        let transport = FakeTransport::with_email(inbound());
        let pipeline = RestylePipeline::new(
            store,
            transport.clone(),
            applier_returning(Some("<styled/>")),
            pipeline_config(),
        );

        pipeline.run("e1").await;
        pipeline.run("e1").await;
        pipeline.run("e2").await;

        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn forward_to_overrides_sender() {
        let transport = FakeTransport::with_email(inbound());
        let config = PipelineConfig {
            forward_to: Some("archive@restyle.example".into()),
            ..pipeline_config()
        };
        let pipeline = RestylePipeline::new(
            Arc::new(LibSqlStyleStore::new_memory().await.unwrap()),
            transport.clone(),
            applier_returning(Some("<styled/>")),
            config,
        );

        pipeline.run("e1").await;

        assert_eq!(transport.sent()[0].to, "archive@restyle.example");
    }

    #[tokio::test]
    async fn missing_subject_gets_bare_prefix() {
        let mut email = inbound();
        email.subject = None;
        let transport = FakeTransport::with_email(email);
        let pipeline = RestylePipeline::new(
            Arc::new(LibSqlStyleStore::new_memory().await.unwrap()),
            transport.clone(),
            applier_returning(Some("<styled/>")),
            pipeline_config(),
        );

        pipeline.run("e1").await;

        assert_eq!(transport.sent()[0].subject, "Re: ");
    }

    // ── ProcessedIds ────────────────────────────────────────────────

    #[test]
    fn processed_ids_dedupe_within_window() {
        let ids = ProcessedIds::new(Duration::from_secs(60));
        assert!(ids.mark("e1"));
        assert!(!ids.mark("e1"));
        assert!(ids.mark("e2"));
    }

    #[test]
    fn processed_ids_expire_after_retention() {
        let ids = ProcessedIds::new(Duration::from_millis(0));
        assert!(ids.mark("e1"));
        // Zero retention: the entry is already expired on the next mark.
        assert!(ids.mark("e1"));
    }
}
