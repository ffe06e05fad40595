//! HTTP surface: style management API + inbound-email webhook.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::pipeline::RestylePipeline;
use crate::store::StyleStore;
use crate::styles::StyleGenerator;
use crate::webhook::{self, RouteDecision, WebhookEvent};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StyleStore>,
    pub generator: Arc<StyleGenerator>,
    pub pipeline: Arc<RestylePipeline>,
}

/// Build the Axum router.
pub fn app_routes(
    store: Arc<dyn StyleStore>,
    generator: Arc<StyleGenerator>,
    pipeline: Arc<RestylePipeline>,
) -> Router {
    let state = AppState {
        store,
        generator,
        pipeline,
    };

    Router::new()
        .route("/health", get(health))
        .route("/create-style", post(create_style))
        .route("/webhook/inbound-email", post(inbound_email_webhook))
        .route("/styles/active", get(get_active_style))
        .route("/styles/history", get(get_style_history))
        .route("/styles/{id}/activate", post(activate_style))
        .route("/styles/{id}", delete(delete_style))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mail-restyle"
    }))
}

// ── Style creation ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateStyleRequest {
    user_prompt: String,
}

async fn create_style(
    State(state): State<AppState>,
    Json(body): Json<CreateStyleRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    info!(prompt = %body.user_prompt, "Creating style from prompt");

    let styling_json = match state.generator.generate(&body.user_prompt).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Style generation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            );
        }
    };

    match state.store.create(&body.user_prompt, &styling_json).await {
        Ok(style) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "message": "Style created successfully",
                "style_id": style.id,
                "styling_json": style.styling_json,
            })),
        ),
        Err(e) => {
            error!(error = %e, "Failed to persist style");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

// ── Webhook ─────────────────────────────────────────────────────────────

/// Acknowledge the provider immediately and process in the background.
/// Pipeline failures never reflect into this response.
async fn inbound_email_webhook(
    State(state): State<AppState>,
    Json(event): Json<WebhookEvent>,
) -> (StatusCode, Json<serde_json::Value>) {
    match webhook::route(&event) {
        RouteDecision::EmailArrived { email_id } => {
            info!(email_id = %email_id, "Received email.received event");
            let pipeline = Arc::clone(&state.pipeline);
            tokio::spawn(async move {
                pipeline.run(&email_id).await;
            });
            (
                StatusCode::OK,
                Json(serde_json::json!({"message": "Email received and processing"})),
            )
        }
        RouteDecision::Ignored => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "Event type not supported"})),
        ),
        RouteDecision::Malformed => {
            warn!(event_type = %event.event_type, "Webhook event carried no email id");
            (
                StatusCode::OK,
                Json(serde_json::json!({"message": "Event carried no email id"})),
            )
        }
    }
}

// ── Style management ────────────────────────────────────────────────────

async fn get_active_style(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.get_active().await {
        Ok(Some(style)) => (StatusCode::OK, Json(serde_json::json!(style))),
        Ok(None) => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "No active style configured"})),
        ),
        Err(e) => {
            // This endpoint never errors the caller; degrade to the empty
            // message but keep the failure visible in the logs.
            error!(error = %e, "Failed to read active style");
            (
                StatusCode::OK,
                Json(serde_json::json!({"message": "No active style configured"})),
            )
        }
    }
}

async fn get_style_history(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.list_history().await {
        Ok(styles) => (StatusCode::OK, Json(serde_json::json!(styles))),
        Err(e) => {
            error!(error = %e, "Failed to list style history");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

async fn activate_style(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let style_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid style ID"})),
            );
        }
    };

    match state.store.activate(style_id).await {
        Ok(style) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "message": "Style activated successfully",
                "style": style,
            })),
        ),
        Err(StoreError::NotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Style not found"})),
        ),
        Err(e) => {
            error!(style_id = %style_id, error = %e, "Failed to activate style");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

async fn delete_style(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let style_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid style ID"})),
            );
        }
    };

    match state.store.delete(style_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "Style deleted successfully"})),
        ),
        Err(StoreError::DeleteActive { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Cannot delete active style"})),
        ),
        Err(StoreError::NotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Style not found"})),
        ),
        Err(e) => {
            error!(style_id = %style_id, error = %e, "Failed to delete style");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}
