//! Spam and abuse classification of received mail.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::routing::MailAddress;
use crate::Config;

/// Local parts (with the `@`) that never get tenant mail.
const NOREPLY_PATTERNS: &[&str] = &["noreply@", "no-reply@", "mailer-daemon@"];

/// Status of a single provider verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Gray,
    ProcessingFailed,
    Disabled,
    #[serde(other)]
    Unknown,
}

impl VerdictStatus {
    pub fn is_fail(self) -> bool {
        self == VerdictStatus::Fail
    }
}

/// Verdicts the provider attached to a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailReceiptVerdict {
    pub spam: VerdictStatus,
    pub virus: VerdictStatus,
    pub spf: VerdictStatus,
    pub dkim: VerdictStatus,
    pub recipients: Vec<MailAddress>,
}

/// Why a message is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Virus,
    Spam,
    NoReplyRecipient,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Virus => "virus",
            RejectReason::Spam => "spam",
            RejectReason::NoReplyRecipient => "noreply-recipient",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    RejectAndBounce(RejectReason),
    /// Stop processing without bouncing
    SilentlyDrop,
}

/// Whether an address is one of the no-reply style senders/recipients.
pub fn is_noreply_address(address: &MailAddress) -> bool {
    let lower = address.as_str().to_lowercase();
    NOREPLY_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Classify a received message. First matching rule wins:
///
/// 1. virus or spam verdict `FAIL`, or a no-reply first recipient → bounce
/// 2. `From` is the provider's failure relay → drop silently
/// 3. otherwise → accept
///
/// SPF and DKIM failures are logged only; they never reject.
pub fn classify(
    config: &Config,
    verdict: &MailReceiptVerdict,
    first_recipient: &MailAddress,
    from: &MailAddress,
) -> Decision {
    if verdict.spf.is_fail() || verdict.dkim.is_fail() {
        warn!(
            from = %from,
            spf = ?verdict.spf,
            dkim = ?verdict.dkim,
            "receipt_auth_verdict_failed"
        );
    }

    let decision = if verdict.virus.is_fail() {
        Decision::RejectAndBounce(RejectReason::Virus)
    } else if verdict.spam.is_fail() {
        Decision::RejectAndBounce(RejectReason::Spam)
    } else if is_noreply_address(first_recipient) {
        Decision::RejectAndBounce(RejectReason::NoReplyRecipient)
    } else if from
        .as_str()
        .eq_ignore_ascii_case(&config.failure_relay_address)
    {
        Decision::SilentlyDrop
    } else {
        Decision::Accept
    };

    info!(
        from = %from,
        recipient = %first_recipient,
        spam = ?verdict.spam,
        virus = ?verdict.virus,
        decision = ?decision,
        "receipt_classified"
    );

    decision
}
