//! HTTP surface for provider events.
//!
//! - `POST /events/notification`: delivery, bounce and complaint notifications
//! - `POST /events/receipt`: received-mail verdicts, answered with a disposition
//! - `GET /health`
//!
//! When `EVENT_AUTH_TOKEN` is set, both event endpoints require it in the
//! `X-Event-Auth` header and answer 401 otherwise.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::provider::BounceApi;

pub use handlers::{
    health, notification_event, receipt_event, AppState, HealthResponse, NotificationResponse,
    EVENT_AUTH_HEADER,
};

/// Build the event router.
pub fn router<B: BounceApi + 'static>(state: AppState<B>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events/notification", post(notification_event::<B>))
        .route("/events/receipt", post(receipt_event::<B>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
