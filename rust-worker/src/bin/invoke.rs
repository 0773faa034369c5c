//! Mail Relay Invoke - handles exactly one event read from stdin.
//!
//! Usage:
//!
//! ```text
//! mail-relay-invoke notification < notification.json
//! mail-relay-invoke receipt < receipt.json
//! ```
//!
//! The handler's response is printed to stdout as JSON; a failed invocation
//! exits non-zero. Logs go to stderr.

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailrelay::events::{
    confirm_subscription, parse_notification_input, subscription_client, NotificationInput,
};
use mailrelay::{
    handle_notification, handle_receipt, Config, DispatchOutcome, Dispatcher, ReceiptEvent,
    SesBounceApi,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    let kind = std::env::args().nth(1).unwrap_or_default();

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read event from stdin")?;
    let payload: Value = serde_json::from_str(&raw).context("Event is not valid JSON")?;

    let config = Arc::new(Config::from_env());
    info!(kind = %kind, payload_length = raw.len(), "invoke_starting");

    let response = match kind.as_str() {
        "notification" => run_notification(config, payload).await?,
        "receipt" => {
            let event: ReceiptEvent =
                serde_json::from_value(payload).context("Invalid receipt event")?;
            let bounce_api = SesBounceApi::from_env().await;
            let response = handle_receipt(&config, &bounce_api, &event)
                .await
                .context("Receipt handling failed")?;
            serde_json::to_value(response)?
        }
        other => bail!("unknown event kind {:?}, expected notification or receipt", other),
    };

    println!("{}", response);
    info!(kind = %kind, "invoke_complete");

    Ok(())
}

async fn run_notification(config: Arc<Config>, payload: Value) -> Result<Value> {
    let status = match parse_notification_input(payload).context("Invalid notification")? {
        NotificationInput::Notification(event) => {
            let dispatcher =
                Dispatcher::new(config.clone()).context("Failed to create dispatcher")?;
            let outcome = handle_notification(&config, &dispatcher, &event)
                .await
                .context("Notification handling failed")?;
            match outcome {
                DispatchOutcome::Delivered { .. } => "delivered",
                DispatchOutcome::Skipped => "skipped",
            }
        }
        NotificationInput::SubscriptionConfirmation { subscribe_url } => {
            let client =
                subscription_client(&config).context("Failed to create subscription client")?;
            confirm_subscription(&client, &subscribe_url)
                .await
                .context("Subscription confirmation failed")?;
            "subscribed"
        }
    };

    Ok(json!({ "status": status }))
}
