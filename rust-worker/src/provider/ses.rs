//! Bounce submission through the SES `SendBounce` API.

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_ses::error::DisplayErrorContext;
use aws_sdk_ses::primitives::DateTime;
use aws_sdk_ses::types::{
    BounceType as SesBounceType, BouncedRecipientInfo, ExtensionField as SesExtensionField,
    MessageDsn,
};
use aws_sdk_ses::Client;
use tracing::info;

use super::{BounceApi, BounceApiError};
use crate::policy::{BounceRequest, BounceType};

/// SES-backed [`BounceApi`].
///
/// Cloning is cheap; all clones share one SDK client.
#[derive(Clone)]
pub struct SesBounceApi {
    client: Arc<Client>,
}

impl SesBounceApi {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Build a client from the default credential and region chain.
    pub async fn from_env() -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        info!(region = ?shared.region(), "ses_client_created");
        Self::new(Client::new(&shared))
    }
}

fn ses_bounce_type(bounce_type: BounceType) -> SesBounceType {
    match bounce_type {
        BounceType::DoesNotExist => SesBounceType::DoesNotExist,
        BounceType::MessageTooLarge => SesBounceType::MessageTooLarge,
        BounceType::ExceededQuota => SesBounceType::ExceededQuota,
        BounceType::ContentRejected => SesBounceType::ContentRejected,
        BounceType::Undefined => SesBounceType::Undefined,
        BounceType::TemporaryFailure => SesBounceType::TemporaryFailure,
    }
}

impl BounceApi for SesBounceApi {
    async fn send_bounce(&self, request: &BounceRequest) -> Result<String, BounceApiError> {
        let extension_fields = request
            .extension_fields
            .iter()
            .map(|field| {
                SesExtensionField::builder()
                    .name(&field.name)
                    .value(&field.value)
                    .build()
                    .map_err(|e| BounceApiError::InvalidRequest(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dsn = MessageDsn::builder()
            .reporting_mta(format!("dns; {}", request.reporting_domain))
            .arrival_date(DateTime::from_secs(request.arrival_date.timestamp()))
            .set_extension_fields(Some(extension_fields))
            .build()
            .map_err(|e| BounceApiError::InvalidRequest(e.to_string()))?;

        let recipients = request
            .bounced_recipients
            .iter()
            .map(|bounced| {
                BouncedRecipientInfo::builder()
                    .recipient(bounced.recipient.as_str())
                    .bounce_type(ses_bounce_type(bounced.bounce_type))
                    .build()
                    .map_err(|e| BounceApiError::InvalidRequest(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .send_bounce()
            .original_message_id(&request.original_message_id)
            .bounce_sender(request.bounce_sender.as_str())
            .explanation(&request.explanation)
            .message_dsn(dsn)
            .set_bounced_recipient_info_list(Some(recipients))
            .send()
            .await
            .map_err(|e| BounceApiError::Provider(DisplayErrorContext(e).to_string()))?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }
}
