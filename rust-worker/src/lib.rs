//! Mail Relay - inbound mail event pipeline for multi-tenant email.
//!
//! This library provides the shared modules for the two binaries:
//! - `mail-relay-web`: HTTP server receiving provider events
//! - `mail-relay-invoke`: one-shot handler reading a single event from stdin
//!
//! ## Architecture
//!
//! ```text
//! notification event → routing::resolve → notify::Dispatcher → tenant webhook
//! receipt event      → policy::classify → provider::BounceApi (on reject) → disposition
//! ```

pub mod config;
pub mod events;
pub mod notify;
pub mod policy;
pub mod provider;
pub mod routing;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use events::{handle_notification, handle_receipt, HandlerError, ReceiptEvent, ReceiptResponse};
pub use notify::{DeliveryNotification, DispatchError, DispatchOutcome, Dispatcher};
pub use policy::{classify, Decision, MailReceiptVerdict};
pub use provider::{BounceApi, SesBounceApi};
pub use routing::{resolve, EnvironmentContext, MailAddress};
pub use web::AppState;
