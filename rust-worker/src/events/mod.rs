//! Event handlers: the two entry points of the pipeline.
//!
//! ## Processing Flow
//!
//! ```text
//! NotificationEvent → handle_notification() → Dispatcher → tenant webhook
//! ReceiptEvent      → handle_receipt()      → classify → bounce | drop | continue
//! ```
//!
//! Each invocation is independent; nothing is shared between events except
//! the read-only configuration and HTTP/provider clients.

pub mod error;
pub mod notification;
pub mod receipt;
pub mod types;

pub use error::HandlerError;
pub use notification::{
    confirm_subscription, handle_notification, parse_notification_input, subscription_client,
    NotificationInput,
};
pub use receipt::handle_receipt;
pub use types::{Disposition, NotificationEvent, ReceiptEvent, ReceiptResponse};
