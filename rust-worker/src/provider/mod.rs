//! Mail provider APIs used by the pipeline.

pub mod ses;

use std::future::Future;

use thiserror::Error;

use crate::policy::BounceRequest;

pub use ses::SesBounceApi;

/// Failure to submit a bounce.
#[derive(Debug, Error)]
pub enum BounceApiError {
    #[error("bounce request rejected before sending: {0}")]
    InvalidRequest(String),

    #[error("provider error: {0}")]
    Provider(String),
}

/// Submits bounces to the mail provider.
pub trait BounceApi: Send + Sync {
    /// Send `request`, returning the provider's id for the bounce message.
    fn send_bounce(
        &self,
        request: &BounceRequest,
    ) -> impl Future<Output = Result<String, BounceApiError>> + Send;
}
