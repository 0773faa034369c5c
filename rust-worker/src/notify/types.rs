//! Webhook message types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::routing::{EnvironmentContext, MailAddress};

/// Kind of provider notification being relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    Bounce,
    Delivery,
    Complaint,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationType::Bounce => "Bounce",
            NotificationType::Delivery => "Delivery",
            NotificationType::Complaint => "Complaint",
        };
        f.write_str(name)
    }
}

/// Body of the tenant webhook call.
///
/// Built once per notification event and sent at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNotification {
    pub message_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Tenant address the original message was sent from
    pub email: MailAddress,
    pub recipients: Vec<MailAddress>,
    pub tenant: String,
    pub env: String,
}

impl DeliveryNotification {
    pub fn new(
        message_id: String,
        notification_type: NotificationType,
        email: MailAddress,
        recipients: Vec<MailAddress>,
        ctx: &EnvironmentContext,
    ) -> Self {
        Self {
            message_id,
            notification_type,
            email,
            recipients,
            tenant: ctx.tenant.clone(),
            env: ctx.environment.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::resolve;
    use crate::Config;

    #[test]
    fn test_webhook_body_shape() {
        let source = MailAddress::parse("bayarea@red.mail.reva.tech").unwrap();
        let recipient = MailAddress::parse("jane@gmail.com").unwrap();
        let ctx = resolve(&Config::default(), &source, &recipient);

        let notification = DeliveryNotification::new(
            "msg-1".to_string(),
            NotificationType::Bounce,
            source,
            vec![recipient],
            &ctx,
        );

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messageId": "msg-1",
                "type": "Bounce",
                "email": "bayarea@red.mail.reva.tech",
                "recipients": ["jane@gmail.com"],
                "tenant": "red",
                "env": "prod",
            })
        );
    }
}
