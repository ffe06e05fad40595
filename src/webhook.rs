//! Inbound webhook events and routing.
//!
//! Maps a provider event envelope to a routing decision. Pure — no I/O;
//! the caller decides what a decision means for scheduling and responses.

use serde::Deserialize;

/// Provider event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// The only actionable event kind.
const EMAIL_RECEIVED: &str = "email.received";

/// Field names that may carry the arrived email's id, tried in priority
/// order. The provider has renamed this field across payload versions;
/// tolerating the old names avoids a hard schema dependency.
const EMAIL_ID_FIELDS: [&str; 3] = ["email_id", "id", "message_id"];

/// Routing decision for a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// A new email arrived and can be fetched under this id.
    EmailArrived { email_id: String },
    /// Event kind we don't act on. Not an error.
    Ignored,
    /// An `email.received` event whose payload carries no resolvable email
    /// id — distinct from `Ignored` so the caller can log rather than
    /// silently drop.
    Malformed,
}

/// Normalize a webhook event into a routing decision.
pub fn route(event: &WebhookEvent) -> RouteDecision {
    if event.event_type != EMAIL_RECEIVED {
        return RouteDecision::Ignored;
    }

    for field in EMAIL_ID_FIELDS {
        if let Some(id) = event.data.get(field).and_then(|v| v.as_str()) {
            if !id.trim().is_empty() {
                return RouteDecision::EmailArrived {
                    email_id: id.to_string(),
                };
            }
        }
    }

    RouteDecision::Malformed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, data: serde_json::Value) -> WebhookEvent {
        WebhookEvent {
            event_type: event_type.to_string(),
            data,
        }
    }

    #[test]
    fn email_received_with_id_routes() {
        let decision = route(&event("email.received", serde_json::json!({"id": "e1"})));
        assert_eq!(
            decision,
            RouteDecision::EmailArrived {
                email_id: "e1".into()
            }
        );
    }

    #[test]
    fn primary_field_wins_over_legacy() {
        let decision = route(&event(
            "email.received",
            serde_json::json!({"id": "legacy", "email_id": "primary"}),
        ));
        assert_eq!(
            decision,
            RouteDecision::EmailArrived {
                email_id: "primary".into()
            }
        );
    }

    #[test]
    fn legacy_message_id_is_last_resort() {
        let decision = route(&event(
            "email.received",
            serde_json::json!({"message_id": "m1"}),
        ));
        assert_eq!(
            decision,
            RouteDecision::EmailArrived {
                email_id: "m1".into()
            }
        );
    }

    #[test]
    fn other_event_kinds_are_ignored() {
        assert_eq!(
            route(&event("email.delivered", serde_json::json!({"id": "e1"}))),
            RouteDecision::Ignored
        );
        assert_eq!(
            route(&event("other.event", serde_json::json!({}))),
            RouteDecision::Ignored
        );
    }

    #[test]
    fn missing_id_is_malformed_not_ignored() {
        assert_eq!(
            route(&event("email.received", serde_json::json!({}))),
            RouteDecision::Malformed
        );
        assert_eq!(
            route(&event("email.received", serde_json::json!({"id": ""}))),
            RouteDecision::Malformed
        );
        assert_eq!(
            route(&event("email.received", serde_json::Value::Null)),
            RouteDecision::Malformed
        );
    }

    #[test]
    fn envelope_deserializes() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"type": "email.received", "data": {"id": "e1"}}"#).unwrap();
        assert_eq!(event.event_type, "email.received");
        assert_eq!(
            route(&event),
            RouteDecision::EmailArrived {
                email_id: "e1".into()
            }
        );
    }
}
