//! Errors raised by the event handlers.

use thiserror::Error;

use crate::notify::DispatchError;
use crate::routing::AddressError;

/// Fatal failure of a single event invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("event has no records")]
    NoRecords,

    #[error("event has no recipients")]
    MissingRecipients,

    #[error("received mail has no From header")]
    MissingFrom,

    #[error("unsupported envelope type: {0}")]
    UnsupportedEnvelope(String),

    #[error("subscription confirmation failed: {0}")]
    Subscription(#[source] reqwest::Error),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl HandlerError {
    /// Whether the event itself was malformed, as opposed to a downstream
    /// failure.
    pub fn is_malformed_input(&self) -> bool {
        !matches!(
            self,
            HandlerError::Dispatch(_) | HandlerError::Subscription(_)
        )
    }
}
