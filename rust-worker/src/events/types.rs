//! Provider event payloads and handler responses.
//!
//! Field names follow the provider's JSON. Addresses stay as strings here and
//! are validated by the handlers, so a bad address is reported as such rather
//! than as a generic parse failure.

use serde::{Deserialize, Serialize};

use crate::notify::NotificationType;
use crate::policy::VerdictStatus;

// =============================================================================
// Delivery / Bounce / Complaint Notifications
// =============================================================================

/// A delivery, bounce or complaint notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub notification_type: NotificationType,
    pub mail: NotifiedMail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounce: Option<BounceDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complaint: Option<ComplaintDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedMail {
    pub message_id: String,
    /// Sender, possibly decorated as `"Name" <addr>`
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BounceDetail {
    #[serde(default)]
    pub bounced_recipients: Vec<RecipientEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetail {
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintDetail {
    #[serde(default)]
    pub complained_recipients: Vec<RecipientEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientEntry {
    pub email_address: String,
}

impl NotificationEvent {
    /// Raw recipient strings for this notification's type.
    pub fn recipient_strings(&self) -> Vec<&str> {
        match self.notification_type {
            NotificationType::Bounce => self
                .bounce
                .iter()
                .flat_map(|b| b.bounced_recipients.iter().map(|r| r.email_address.as_str()))
                .collect(),
            NotificationType::Delivery => self
                .delivery
                .iter()
                .flat_map(|d| d.recipients.iter().map(String::as_str))
                .collect(),
            NotificationType::Complaint => self
                .complaint
                .iter()
                .flat_map(|c| {
                    c.complained_recipients
                        .iter()
                        .map(|r| r.email_address.as_str())
                })
                .collect(),
        }
    }
}

/// Notification channel envelope (`Type`, `Message`, `SubscribeURL`).
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEnvelope {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "SubscribeURL", default)]
    pub subscribe_url: Option<String>,
}

// =============================================================================
// Received Mail
// =============================================================================

/// Receipt-rule invocation for a received message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEvent {
    #[serde(rename = "Records")]
    pub records: Vec<ReceiptRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub ses: ReceivedMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub mail: ReceivedMail,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMail {
    pub message_id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub common_headers: CommonHeaders,
    #[serde(default)]
    pub headers: Vec<MailHeader>,
}

impl ReceivedMail {
    /// The `From` header, preferring the provider's pre-parsed copy.
    pub fn from_header(&self) -> Option<&str> {
        self.common_headers
            .from
            .first()
            .map(String::as_str)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|h| h.name.eq_ignore_ascii_case("from"))
                    .map(|h| h.value.as_str())
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonHeaders {
    #[serde(default)]
    pub from: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(default)]
    pub recipients: Vec<String>,
    pub spam_verdict: Verdict,
    pub virus_verdict: Verdict,
    pub spf_verdict: Verdict,
    pub dkim_verdict: Verdict,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
}

/// How the receipt rule set should continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    StopRuleSet,
}

/// Non-null answer to a receipt invocation. `None` means continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiptResponse {
    pub disposition: Disposition,
}

impl ReceiptResponse {
    pub fn stop_rule_set() -> Self {
        Self {
            disposition: Disposition::StopRuleSet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounce_notification_recipients() {
        let event: NotificationEvent = serde_json::from_str(
            r#"{
                "notificationType": "Bounce",
                "mail": {"messageId": "m1", "source": "a@red.mail.reva.tech"},
                "bounce": {"bouncedRecipients": [{"emailAddress": "x@y.com"}, {"emailAddress": "z@y.com"}]}
            }"#,
        )
        .unwrap();

        assert_eq!(event.notification_type, NotificationType::Bounce);
        assert_eq!(event.recipient_strings(), vec!["x@y.com", "z@y.com"]);
    }

    #[test]
    fn test_delivery_notification_recipients() {
        let event: NotificationEvent = serde_json::from_str(
            r#"{
                "notificationType": "Delivery",
                "mail": {"messageId": "m1", "source": "a@red.mail.reva.tech"},
                "delivery": {"recipients": ["x@y.com"]}
            }"#,
        )
        .unwrap();

        assert_eq!(event.recipient_strings(), vec!["x@y.com"]);
    }

    #[test]
    fn test_missing_detail_block_has_no_recipients() {
        let event: NotificationEvent = serde_json::from_str(
            r#"{"notificationType": "Delivery", "mail": {"messageId": "m1", "source": "a@b.c"}}"#,
        )
        .unwrap();

        assert!(event.recipient_strings().is_empty());
    }

    #[test]
    fn test_from_header_fallback_to_raw_headers() {
        let mail: ReceivedMail = serde_json::from_str(
            r#"{
                "messageId": "m1",
                "headers": [{"name": "Subject", "value": "hi"}, {"name": "FROM", "value": "Jo <jo@x.com>"}]
            }"#,
        )
        .unwrap();

        assert_eq!(mail.from_header(), Some("Jo <jo@x.com>"));
    }

    #[test]
    fn test_receipt_response_shape() {
        let json = serde_json::to_string(&ReceiptResponse::stop_rule_set()).unwrap();
        assert_eq!(json, r#"{"disposition":"STOP_RULE_SET"}"#);

        let none: Option<ReceiptResponse> = None;
        assert_eq!(serde_json::to_string(&none).unwrap(), "null");
    }
}
