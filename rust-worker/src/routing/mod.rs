//! Address parsing and tenant/environment resolution.
//!
//! ```text
//! (tenant address, counterpart address) → resolve() → EnvironmentContext
//! ```

pub mod address;
pub mod environment;

pub use address::{AddressError, MailAddress};
pub use environment::{resolve, routing_key, Environment, EnvironmentContext, PROD_MAX_LABELS};
