//! Tenant and environment resolution from mail domains.
//!
//! Tenant mail domains encode the deployment they belong to:
//!
//! ```text
//! bayarea@red.mail.reva.tech          → tenant "red", prod
//! bayarea@red.demo.env.mail.reva.tech → tenant "red", environment "demo"
//! ```
//!
//! A domain with at most [`PROD_MAX_LABELS`] labels is production. Local and
//! test-harness environments cannot be reached through DNS, so their host is
//! looked up from the other party on the thread instead.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::address::MailAddress;
use crate::Config;

/// Domains with this many labels or fewer belong to production.
pub const PROD_MAX_LABELS: usize = 4;

/// Deployment environment a tenant address belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Prod,
    Demo,
    DemoStaging,
    Local,
    /// Test-harness environments, e.g. `cucumber` or `cucumber2`
    TestHarness(String),
    Named(String),
}

impl Environment {
    /// Classify an environment label taken from a mail domain.
    ///
    /// Never yields [`Environment::Prod`]: production is decided by label
    /// count alone, so a `prod` label on a long domain is just a name.
    pub fn from_label(label: &str, test_harness_marker: &str) -> Self {
        let lower = label.to_lowercase();
        match lower.as_str() {
            "demo" => Environment::Demo,
            "demo-staging" => Environment::DemoStaging,
            "local" => Environment::Local,
            _ if !test_harness_marker.is_empty() && lower.contains(test_harness_marker) => {
                Environment::TestHarness(lower)
            }
            _ => Environment::Named(lower),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Environment::Prod => "prod",
            Environment::Demo => "demo",
            Environment::DemoStaging => "demo-staging",
            Environment::Local => "local",
            Environment::TestHarness(name) | Environment::Named(name) => name.as_str(),
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Environment::Prod)
    }

    /// Local and test-harness environments are delivered to over plain HTTP
    /// on a fixed port.
    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Local | Environment::TestHarness(_))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Environment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Where and for whom an event is processed. Recomputed for every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentContext {
    pub tenant: String,
    pub environment: Environment,
    pub hostname: String,
    pub storage_bucket: String,
    pub recipient_local_part: String,
    pub webhook_path: String,
    /// Explicit port, only set for local delivery
    pub port: Option<u16>,
}

impl EnvironmentContext {
    pub fn scheme(&self) -> &'static str {
        if self.environment.is_local() {
            "http"
        } else {
            "https"
        }
    }

    /// Base URL of the tenant webhook, without the api token.
    pub fn webhook_url(&self) -> String {
        match self.port {
            Some(port) => format!(
                "{}://{}:{}{}",
                self.scheme(),
                self.hostname,
                port,
                self.webhook_path
            ),
            None => format!("{}://{}{}", self.scheme(), self.hostname, self.webhook_path),
        }
    }
}

/// Resolve the environment context for an event.
///
/// `tenant_address` carries the tenant mail domain; `counterpart` is the
/// other party on the thread and only matters for local routing.
pub fn resolve(
    config: &Config,
    tenant_address: &MailAddress,
    counterpart: &MailAddress,
) -> EnvironmentContext {
    let labels = tenant_address.domain_labels();
    let tenant = labels[0].to_lowercase();

    let environment = if labels.len() <= PROD_MAX_LABELS {
        Environment::Prod
    } else {
        Environment::from_label(labels[1], &config.test_harness_marker)
    };

    let storage_bucket = format!("{}-{}-emails", tenant, environment);

    let (hostname, port) = if environment.is_local() {
        (
            local_hostname(config, &environment, counterpart),
            Some(config.local_port),
        )
    } else if environment.is_prod() {
        (format!("{}.{}", tenant, config.base_domain), None)
    } else {
        (
            format!("{}.{}.env.{}", tenant, environment, config.base_domain),
            None,
        )
    };

    debug!(
        address = %tenant_address,
        label_count = labels.len(),
        tenant = %tenant,
        environment = %environment,
        hostname = %hostname,
        "environment_resolved"
    );

    EnvironmentContext {
        tenant,
        environment,
        hostname,
        storage_bucket,
        recipient_local_part: tenant_address.local_part().to_string(),
        webhook_path: config.webhook_path.clone(),
        port,
    }
}

/// Routing key encoded in a counterpart address.
///
/// For `qatest+run42_alice@reva.tech` the key is `qatest`: the `+alias` is
/// dropped, then everything from the first `_` on.
pub fn routing_key(counterpart: &MailAddress) -> String {
    let local = counterpart.local_part();
    let unaliased = local.split('+').next().unwrap_or(local);
    let key = unaliased.split('_').next().unwrap_or(unaliased);
    key.to_lowercase()
}

/// Look up a local host by routing key, then by environment name, then fall
/// back to the default test-harness host.
fn local_hostname(config: &Config, environment: &Environment, counterpart: &MailAddress) -> String {
    let key = routing_key(counterpart);

    config
        .local_hostnames
        .get(&key)
        .or_else(|| config.local_hostnames.get(environment.as_str()))
        .cloned()
        .unwrap_or_else(|| config.default_test_hostname.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> MailAddress {
        MailAddress::parse(s).unwrap()
    }

    fn local_config() -> Config {
        let mut config = Config::default();
        config
            .local_hostnames
            .insert("qatest".to_string(), "qa.reva.local".to_string());
        config
            .local_hostnames
            .insert("cucumber2".to_string(), "cuke2.reva.local".to_string());
        config.default_test_hostname = "cucumber.reva.local".to_string();
        config
    }

    #[test]
    fn test_resolve_prod() {
        let config = Config::default();
        let ctx = resolve(
            &config,
            &addr("bayarea@red.mail.reva.tech"),
            &addr("someone@gmail.com"),
        );

        assert_eq!(ctx.tenant, "red");
        assert_eq!(ctx.environment, Environment::Prod);
        assert_eq!(ctx.hostname, "red.reva.tech");
        assert_eq!(ctx.storage_bucket, "red-prod-emails");
        assert_eq!(ctx.recipient_local_part, "bayarea");
        assert_eq!(ctx.port, None);
        assert_eq!(
            ctx.webhook_url(),
            "https://red.reva.tech/webhooks/email/status"
        );
    }

    #[test]
    fn test_resolve_prod_by_label_count_only() {
        // Three labels is still production, whatever the labels say.
        let ctx = resolve(&Config::default(), &addr("x@blue.demo.tech"), &addr("y@z.com"));
        assert_eq!(ctx.environment, Environment::Prod);
        assert_eq!(ctx.tenant, "blue");
        assert_eq!(ctx.hostname, "blue.reva.tech");
    }

    #[test]
    fn test_resolve_named_environment() {
        let ctx = resolve(
            &Config::default(),
            &addr("bayarea@red.demo.env.mail.reva.tech"),
            &addr("someone@gmail.com"),
        );

        assert_eq!(ctx.tenant, "red");
        assert_eq!(ctx.environment, Environment::Demo);
        assert_eq!(ctx.hostname, "red.demo.env.reva.tech");
        assert_eq!(ctx.storage_bucket, "red-demo-emails");
    }

    #[test]
    fn test_resolve_prod_label_on_long_domain_is_not_production() {
        let ctx = resolve(
            &Config::default(),
            &addr("bayarea@red.prod.env.mail.reva.tech"),
            &addr("x@gmail.com"),
        );

        assert_eq!(ctx.environment, Environment::Named("prod".to_string()));
        assert!(!ctx.environment.is_prod());
        assert_eq!(ctx.hostname, "red.prod.env.reva.tech");
        assert_eq!(ctx.storage_bucket, "red-prod-emails");
    }

    #[test]
    fn test_resolve_demo_staging_and_other_names() {
        let staging = resolve(
            &Config::default(),
            &addr("a@red.demo-staging.env.mail.reva.tech"),
            &addr("b@c.com"),
        );
        assert_eq!(staging.environment, Environment::DemoStaging);
        assert_eq!(staging.hostname, "red.demo-staging.env.reva.tech");

        let named = resolve(
            &Config::default(),
            &addr("a@red.perf.env.mail.reva.tech"),
            &addr("b@c.com"),
        );
        assert_eq!(named.environment, Environment::Named("perf".to_string()));
        assert_eq!(named.hostname, "red.perf.env.reva.tech");
    }

    #[test]
    fn test_resolve_local_by_routing_key() {
        let ctx = resolve(
            &local_config(),
            &addr("bayarea@red.local.env.mail.reva.tech"),
            &addr("qatest+run42_alice@reva.tech"),
        );

        assert_eq!(ctx.environment, Environment::Local);
        assert_eq!(ctx.hostname, "qa.reva.local");
        assert_eq!(ctx.port, Some(3000));
        assert_eq!(
            ctx.webhook_url(),
            "http://qa.reva.local:3000/webhooks/email/status"
        );
    }

    #[test]
    fn test_resolve_test_harness_falls_back_to_environment_name() {
        let ctx = resolve(
            &local_config(),
            &addr("bayarea@red.cucumber2.env.mail.reva.tech"),
            &addr("stranger_bob@gmail.com"),
        );

        assert_eq!(ctx.environment, Environment::TestHarness("cucumber2".to_string()));
        assert_eq!(ctx.hostname, "cuke2.reva.local");
    }

    #[test]
    fn test_resolve_test_harness_falls_back_to_default() {
        let ctx = resolve(
            &local_config(),
            &addr("bayarea@red.cucumber.env.mail.reva.tech"),
            &addr("stranger@gmail.com"),
        );

        assert_eq!(ctx.hostname, "cucumber.reva.local");
        assert_eq!(ctx.scheme(), "http");
    }

    #[test]
    fn test_routing_key() {
        assert_eq!(routing_key(&addr("qatest+abc_def@x.com")), "qatest");
        assert_eq!(routing_key(&addr("Dev_alice@x.com")), "dev");
        assert_eq!(routing_key(&addr("plain@x.com")), "plain");
    }
}
