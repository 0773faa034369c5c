//! Event endpoint handlers.
//!
//! Each request is one event: it is handled inline and the outcome is the
//! response. Nothing is queued or retried here; the provider redelivers on
//! a non-2xx answer.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::events::{
    confirm_subscription, handle_notification, handle_receipt, parse_notification_input,
    subscription_client, HandlerError, NotificationInput, ReceiptEvent, ReceiptResponse,
};
use crate::notify::{DispatchOutcome, Dispatcher};
use crate::provider::BounceApi;
use crate::Config;

/// Shared application state.
pub struct AppState<B> {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub bounce_api: Arc<B>,
    /// Client for subscription confirmation
    pub http: Client,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            bounce_api: self.bounce_api.clone(),
            http: self.http.clone(),
        }
    }
}

impl<B> AppState<B> {
    pub fn new(
        config: Arc<Config>,
        dispatcher: Dispatcher,
        bounce_api: B,
    ) -> Result<Self, HandlerError> {
        let http = subscription_client(&config)?;

        Ok(Self {
            config,
            dispatcher,
            bounce_api: Arc::new(bounce_api),
            http,
        })
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Header carrying the shared event secret.
pub const EVENT_AUTH_HEADER: &str = "X-Event-Auth";

/// Check the event secret header against the configured token.
///
/// With no token configured every request passes.
fn authorized(config: &Config, headers: &HeaderMap, endpoint: &str) -> bool {
    let provided = headers
        .get(EVENT_AUTH_HEADER)
        .and_then(|v| v.to_str().ok());

    match (provided, config.event_auth_token.as_deref()) {
        (Some(provided), Some(expected)) if provided == expected => true,
        (None, Some(_)) => {
            warn!(endpoint = endpoint, "event_auth_missing");
            false
        }
        (Some(_), Some(_)) => {
            warn!(endpoint = endpoint, "event_auth_invalid");
            false
        }
        (_, None) => true,
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Notification Events
// =============================================================================

/// Notification endpoint response.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationResponse {
    fn ok(status: &'static str) -> Json<Self> {
        Json(Self {
            status,
            error: None,
        })
    }
}

fn error_status(err: &HandlerError) -> StatusCode {
    if err.is_malformed_input() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// Delivery / bounce / complaint notification endpoint.
pub async fn notification_event<B: Send + Sync + 'static>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&state.config, &headers, "notification") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(NotificationResponse {
                status: "unauthorized",
                error: None,
            }),
        );
    }

    let result = match parse_notification_input(payload) {
        Ok(NotificationInput::Notification(event)) => {
            handle_notification(&state.config, &state.dispatcher, &event)
                .await
                .map(|outcome| match outcome {
                    DispatchOutcome::Delivered { .. } => "delivered",
                    DispatchOutcome::Skipped => "skipped",
                })
        }
        Ok(NotificationInput::SubscriptionConfirmation { subscribe_url }) => {
            info!("notification_subscription_requested");
            confirm_subscription(&state.http, &subscribe_url)
                .await
                .map(|_| "subscribed")
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(status) => (StatusCode::OK, NotificationResponse::ok(status)),
        Err(e) => {
            let code = error_status(&e);
            if code == StatusCode::BAD_REQUEST {
                warn!(error = %e, "notification_event_rejected");
            } else {
                error!(error = %e, "notification_event_failed");
            }
            (
                code,
                Json(NotificationResponse {
                    status: "error",
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

// =============================================================================
// Receipt Events
// =============================================================================

/// Received-mail endpoint.
///
/// Answers `null` (continue) or `{"disposition": "STOP_RULE_SET"}`.
pub async fn receipt_event<B: BounceApi + 'static>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&state.config, &headers, "receipt") {
        return (StatusCode::UNAUTHORIZED, Json(None::<ReceiptResponse>)).into_response();
    }

    let event: ReceiptEvent = match serde_json::from_value(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "receipt_event_rejected");
            return (StatusCode::BAD_REQUEST, Json(None::<ReceiptResponse>)).into_response();
        }
    };

    match handle_receipt(&state.config, state.bounce_api.as_ref(), &event).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            warn!(error = %e, "receipt_event_rejected");
            (error_status(&e), Json(None::<ReceiptResponse>)).into_response()
        }
    }
}
