//! Outbound webhook delivery.
//!
//! The HTTP client never follows redirects on its own: a 301/302 is re-sent
//! as the same POST to the `Location` target, at most `max_redirects` times.
//! The api token only follows redirects that stay on the webhook's origin.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, StatusCode};
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use super::types::DeliveryNotification;
use crate::routing::EnvironmentContext;
use crate::Config;

/// Query parameter carrying the webhook api token.
pub const API_TOKEN_PARAM: &str = "api-token";

/// Terminal webhook delivery failures. None are retried here.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("redirect from {url} has no usable Location header")]
    MissingRedirectLocation { url: String },

    #[error("webhook returned {status} {status_text} (request body: {request_body})")]
    UnexpectedStatus {
        status: u16,
        status_text: String,
        request_body: String,
    },

    #[error("more than {max} redirects")]
    TooManyRedirects { max: usize },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid webhook url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to serialize notification: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Successful outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The webhook answered 200 after following `redirects` hops
    Delivered { status: u16, redirects: usize },
    /// No-reply notification; nothing was sent
    Skipped,
}

/// Sends delivery notifications to tenant webhooks.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    config: Arc<Config>,
}

impl Dispatcher {
    /// Create a dispatcher with its own HTTP client.
    pub fn new(config: Arc<Config>) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(DispatchError::Client)?;

        Ok(Self { client, config })
    }

    /// Deliver `notification` to the webhook of `ctx`.
    pub async fn dispatch(
        &self,
        ctx: &EnvironmentContext,
        notification: &DeliveryNotification,
    ) -> Result<DispatchOutcome, DispatchError> {
        if ctx.recipient_local_part == self.config.noreply_local_part {
            info!(
                message_id = %notification.message_id,
                tenant = %ctx.tenant,
                "notification_skipped_noreply"
            );
            return Ok(DispatchOutcome::Skipped);
        }

        let body = serde_json::to_string(notification)?;
        let mut url = self.webhook_url(ctx)?;
        let origin = url.origin();

        info!(
            message_id = %notification.message_id,
            notification_type = %notification.notification_type,
            tenant = %ctx.tenant,
            environment = %ctx.environment,
            host = %ctx.hostname,
            "notification_dispatch_start"
        );

        for hop in 0..=self.config.max_redirects {
            let response = self
                .client
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .body(body.clone())
                .send()
                .await
                .map_err(|source| {
                    error!(
                        message_id = %notification.message_id,
                        host = url.host_str().unwrap_or(""),
                        is_timeout = source.is_timeout(),
                        error = %source,
                        "notification_transport_error"
                    );
                    DispatchError::Transport {
                        url: redact(&url),
                        source,
                    }
                })?;

            let status = response.status();

            match status {
                StatusCode::OK => {
                    info!(
                        message_id = %notification.message_id,
                        status_code = status.as_u16(),
                        redirects = hop,
                        "notification_dispatched"
                    );
                    return Ok(DispatchOutcome::Delivered {
                        status: status.as_u16(),
                        redirects: hop,
                    });
                }
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => {
                    let next = response
                        .headers()
                        .get(LOCATION)
                        .and_then(|value| value.to_str().ok())
                        .and_then(|location| url.join(location).ok())
                        .ok_or_else(|| DispatchError::MissingRedirectLocation { url: redact(&url) })?;

                    let same_origin = next.origin() == origin;
                    url = if same_origin {
                        self.with_api_token(next)
                    } else {
                        next
                    };

                    info!(
                        message_id = %notification.message_id,
                        status_code = status.as_u16(),
                        hop = hop + 1,
                        target_host = url.host_str().unwrap_or(""),
                        target_path = url.path(),
                        same_origin,
                        "notification_redirected"
                    );
                }
                _ => {
                    warn!(
                        message_id = %notification.message_id,
                        status_code = status.as_u16(),
                        "notification_unexpected_status"
                    );
                    return Err(DispatchError::UnexpectedStatus {
                        status: status.as_u16(),
                        status_text: status.canonical_reason().unwrap_or("").to_string(),
                        request_body: body,
                    });
                }
            }
        }

        warn!(
            message_id = %notification.message_id,
            max_redirects = self.config.max_redirects,
            "notification_too_many_redirects"
        );
        Err(DispatchError::TooManyRedirects {
            max: self.config.max_redirects,
        })
    }

    fn webhook_url(&self, ctx: &EnvironmentContext) -> Result<Url, DispatchError> {
        let raw = ctx.webhook_url();
        let url = Url::parse(&raw).map_err(|source| DispatchError::InvalidUrl { url: raw, source })?;
        Ok(self.with_api_token(url))
    }

    /// Make sure the api token travels with every same-origin hop.
    fn with_api_token(&self, mut url: Url) -> Url {
        let has_token = url.query_pairs().any(|(key, _)| key == API_TOKEN_PARAM);
        if !has_token {
            url.query_pairs_mut()
                .append_pair(API_TOKEN_PARAM, &self.config.api_token);
        }
        url
    }
}

/// Render a URL for logs and errors without its query string.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
