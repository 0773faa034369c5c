//! Configuration module for environment variable parsing.
//!
//! All settings are read once at startup and shared read-only (behind an
//! `Arc`) by every handler invocation.

use std::collections::HashMap;
use std::env;
use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base domain tenant hostnames are built on (e.g. `reva.tech`)
    pub base_domain: String,

    /// Token appended to every webhook call as `api-token`
    pub api_token: String,

    /// Shared secret expected in the `X-Event-Auth` header of inbound events.
    /// Unset means the event endpoints are open.
    pub event_auth_token: Option<String>,

    /// Path of the tenant webhook that receives delivery notifications
    pub webhook_path: String,

    /// Routing key (or environment name) to hostname table for local and
    /// test-harness environments
    pub local_hostnames: HashMap<String, String>,

    /// Hostname used when no local table entry matches
    pub default_test_hostname: String,

    /// Plain HTTP port used for local and test-harness delivery
    pub local_port: u16,

    /// Substring that marks an environment label as a test-harness one
    pub test_harness_marker: String,

    /// Local part that marks an address as no-reply
    pub noreply_local_part: String,

    /// The mail provider's own failure relay sender
    pub failure_relay_address: String,

    /// Maximum number of redirect hops followed per webhook call
    pub max_redirects: usize,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_domain: "reva.tech".to_string(),
            api_token: String::new(),
            event_auth_token: None,
            webhook_path: "/webhooks/email/status".to_string(),
            local_hostnames: HashMap::new(),
            default_test_hostname: "localhost".to_string(),
            local_port: 3000,
            test_harness_marker: "cucumber".to_string(),
            noreply_local_part: "noreply".to_string(),
            failure_relay_address: "MAILER-DAEMON@amazonses.com".to_string(),
            max_redirects: 5,
            request_timeout_ms: 8000,
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            base_domain: env::var("BASE_DOMAIN").unwrap_or(defaults.base_domain),

            api_token: env::var("API_TOKEN").unwrap_or(defaults.api_token),

            event_auth_token: env::var("EVENT_AUTH_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),

            webhook_path: env::var("WEBHOOK_PATH").unwrap_or(defaults.webhook_path),

            local_hostnames: parse_table("LOCAL_HOSTNAMES").unwrap_or(defaults.local_hostnames),

            default_test_hostname: env::var("DEFAULT_TEST_HOSTNAME")
                .unwrap_or(defaults.default_test_hostname),

            local_port: parse_num("LOCAL_PORT", defaults.local_port),

            test_harness_marker: env::var("TEST_HARNESS_MARKER")
                .unwrap_or(defaults.test_harness_marker),

            noreply_local_part: env::var("NOREPLY_LOCAL_PART")
                .unwrap_or(defaults.noreply_local_part),

            failure_relay_address: env::var("FAILURE_RELAY_ADDRESS")
                .unwrap_or(defaults.failure_relay_address),

            max_redirects: parse_num("MAX_REDIRECTS", defaults.max_redirects),

            request_timeout_ms: parse_num("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),

            port: parse_num("PORT", defaults.port),
        }
    }
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
fn parse_num<T: std::str::FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}

/// Parse a comma-separated `key=value` table like "qa=qa.local,dev=dev.local".
///
/// Keys are lowercased. Malformed entries are skipped with a warning.
fn parse_table(name: &str) -> Option<HashMap<String, String>> {
    let raw = env::var(name).ok()?;

    let table = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((key, host)) if !key.trim().is_empty() && !host.trim().is_empty() => {
                Some((key.trim().to_lowercase(), host.trim().to_string()))
            }
            _ => {
                warn!(env_var = name, entry = %entry, "Invalid table entry, skipping");
                None
            }
        })
        .collect();

    Some(table)
}
