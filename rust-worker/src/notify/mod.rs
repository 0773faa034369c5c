//! Tenant webhook notifications.
//!
//! ```text
//! EnvironmentContext + DeliveryNotification → Dispatcher::dispatch() → POST webhook
//! ```

pub mod dispatcher;
pub mod types;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher, API_TOKEN_PARAM};
pub use types::{DeliveryNotification, NotificationType};
