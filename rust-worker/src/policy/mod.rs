//! Accept/reject policy for received mail.
//!
//! ## Flow
//!
//! ```text
//! MailReceiptVerdict → classify() → Decision
//!                                     └─ RejectAndBounce → build_bounce_request() → BounceRequest
//! ```

pub mod bounce;
pub mod classifier;

pub use bounce::{
    build_bounce_request, BounceRequest, BounceType, BouncedRecipient, ExtensionField,
    BOUNCE_EXPLANATION,
};
pub use classifier::{
    classify, is_noreply_address, Decision, MailReceiptVerdict, RejectReason, VerdictStatus,
};
