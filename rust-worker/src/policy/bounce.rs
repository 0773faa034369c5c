//! Bounce requests for rejected mail.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::classifier::{MailReceiptVerdict, RejectReason};
use crate::routing::MailAddress;

/// Text returned to the sender of a rejected message.
pub const BOUNCE_EXPLANATION: &str = "Your message could not be delivered: it was rejected \
     by the recipient's mail policy. Please contact the recipient through another channel.";

/// Extension field naming why the message was rejected.
pub const REJECTION_REASON_FIELD: &str = "X-Rejection-Reason";

/// Provider bounce types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BounceType {
    DoesNotExist,
    MessageTooLarge,
    ExceededQuota,
    ContentRejected,
    Undefined,
    TemporaryFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BouncedRecipient {
    pub recipient: MailAddress,
    pub bounce_type: BounceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionField {
    pub name: String,
    pub value: String,
}

/// A bounce ready to submit to the provider's bounce API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BounceRequest {
    pub bounce_sender: MailAddress,
    pub explanation: String,
    pub original_message_id: String,
    pub reporting_domain: String,
    pub arrival_date: DateTime<Utc>,
    pub extension_fields: Vec<ExtensionField>,
    pub bounced_recipients: Vec<BouncedRecipient>,
}

/// Build the bounce for a rejected message.
///
/// The bounce is sent from `mailer-daemon@` on the rejected recipient's
/// domain. Every verdict recipient is bounced as `ContentRejected`; an empty
/// recipient list yields an empty list rather than an error.
pub fn build_bounce_request(
    verdict: &MailReceiptVerdict,
    message_id: &str,
    rejected_recipient: &MailAddress,
    reason: RejectReason,
) -> BounceRequest {
    let domain = rejected_recipient.domain();

    // Local part and domain are both non-empty, so this always parses.
    let bounce_sender = MailAddress::parse(&format!("mailer-daemon@{}", domain))
        .unwrap_or_else(|_| rejected_recipient.clone());

    let bounced_recipients = verdict
        .recipients
        .iter()
        .map(|recipient| BouncedRecipient {
            recipient: recipient.clone(),
            bounce_type: BounceType::ContentRejected,
        })
        .collect();

    BounceRequest {
        bounce_sender,
        explanation: BOUNCE_EXPLANATION.to_string(),
        original_message_id: message_id.to_string(),
        reporting_domain: domain.to_string(),
        arrival_date: Utc::now(),
        extension_fields: vec![ExtensionField {
            name: REJECTION_REASON_FIELD.to_string(),
            value: reason.as_str().to_string(),
        }],
        bounced_recipients,
    }
}
