//! Received-mail handling: accept, bounce or drop.

use tracing::{error, info};

use super::error::HandlerError;
use super::types::{ReceiptEvent, ReceiptResponse};
use crate::policy::{build_bounce_request, classify, Decision, MailReceiptVerdict};
use crate::provider::BounceApi;
use crate::routing::MailAddress;
use crate::Config;

/// Decide what happens to a received message.
///
/// Returns `None` to let the rule set continue, or `STOP_RULE_SET` when the
/// message was bounced or dropped. A failed bounce submission is logged and
/// does not change the answer: the message is rejected either way.
pub async fn handle_receipt<B: BounceApi>(
    config: &Config,
    bounce_api: &B,
    event: &ReceiptEvent,
) -> Result<Option<ReceiptResponse>, HandlerError> {
    let record = event.records.first().ok_or(HandlerError::NoRecords)?;
    let mail = &record.ses.mail;
    let receipt = &record.ses.receipt;

    info!(
        message_id = %mail.message_id,
        source = %mail.source,
        recipient_count = receipt.recipients.len(),
        "receipt_received"
    );

    let recipients = receipt
        .recipients
        .iter()
        .map(|r| MailAddress::parse(r))
        .collect::<Result<Vec<_>, _>>()?;

    let first_recipient = recipients
        .first()
        .cloned()
        .ok_or(HandlerError::MissingRecipients)?;

    let from = MailAddress::from_header(mail.from_header().ok_or(HandlerError::MissingFrom)?)?;

    let verdict = MailReceiptVerdict {
        spam: receipt.spam_verdict.status,
        virus: receipt.virus_verdict.status,
        spf: receipt.spf_verdict.status,
        dkim: receipt.dkim_verdict.status,
        recipients,
    };

    match classify(config, &verdict, &first_recipient, &from) {
        Decision::Accept => Ok(None),
        Decision::SilentlyDrop => {
            info!(
                message_id = %mail.message_id,
                from = %from,
                "receipt_dropped"
            );
            Ok(Some(ReceiptResponse::stop_rule_set()))
        }
        Decision::RejectAndBounce(reason) => {
            let request =
                build_bounce_request(&verdict, &mail.message_id, &first_recipient, reason);

            match bounce_api.send_bounce(&request).await {
                Ok(bounce_id) => info!(
                    message_id = %mail.message_id,
                    bounce_id = %bounce_id,
                    bounce_sender = %request.bounce_sender,
                    reason = %reason,
                    "receipt_bounced"
                ),
                Err(e) => error!(
                    message_id = %mail.message_id,
                    reason = %reason,
                    error = %e,
                    "receipt_bounce_failed"
                ),
            }

            Ok(Some(ReceiptResponse::stop_rule_set()))
        }
    }
}
