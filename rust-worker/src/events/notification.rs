//! Delivery, bounce and complaint notification handling.
//!
//! ```text
//! NotificationEvent → resolve(source, first recipient) → DeliveryNotification → dispatch
//! ```

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use super::error::HandlerError;
use super::types::{ChannelEnvelope, NotificationEvent};
use crate::notify::{DeliveryNotification, DispatchOutcome, Dispatcher};
use crate::routing::{resolve, MailAddress};
use crate::Config;

/// What arrived on the notification channel.
#[derive(Debug, Clone)]
pub enum NotificationInput {
    Notification(Box<NotificationEvent>),
    /// The channel asks us to confirm a new subscription
    SubscriptionConfirmation { subscribe_url: String },
}

/// Unwrap a notification from whichever shape it was delivered in:
///
/// - the bare notification object
/// - a channel envelope (`{"Type": "Notification", "Message": "<json>"}`)
/// - a batch of channel records (`{"Records": [{"Sns": {"Message": "<json>"}}]}`),
///   of which only the first is used
pub fn parse_notification_input(value: Value) -> Result<NotificationInput, HandlerError> {
    if let Some(message) = value
        .get("Records")
        .and_then(|records| records.get(0))
        .and_then(|record| record.get("Sns"))
        .and_then(|sns| sns.get("Message"))
        .and_then(Value::as_str)
    {
        let event: NotificationEvent = serde_json::from_str(message)?;
        return Ok(NotificationInput::Notification(Box::new(event)));
    }

    if value.get("Type").is_some() {
        let envelope: ChannelEnvelope = serde_json::from_value(value)?;
        return match (envelope.kind.as_str(), envelope.message, envelope.subscribe_url) {
            ("Notification", Some(message), _) => {
                let event: NotificationEvent = serde_json::from_str(&message)?;
                Ok(NotificationInput::Notification(Box::new(event)))
            }
            ("SubscriptionConfirmation", _, Some(subscribe_url)) => {
                Ok(NotificationInput::SubscriptionConfirmation { subscribe_url })
            }
            (kind, _, _) => Err(HandlerError::UnsupportedEnvelope(kind.to_string())),
        };
    }

    let event: NotificationEvent = serde_json::from_value(value)?;
    Ok(NotificationInput::Notification(Box::new(event)))
}

/// HTTP client for subscription confirmation, bounded by the configured
/// request timeout.
pub fn subscription_client(config: &Config) -> Result<Client, HandlerError> {
    Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()
        .map_err(HandlerError::Subscription)
}

/// Confirm a channel subscription by fetching its `SubscribeURL`.
pub async fn confirm_subscription(client: &Client, subscribe_url: &str) -> Result<(), HandlerError> {
    let response = client
        .get(subscribe_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(HandlerError::Subscription)?;

    info!(
        status_code = response.status().as_u16(),
        "notification_subscription_confirmed"
    );

    Ok(())
}

/// Relay one notification to its tenant webhook.
///
/// Malformed addresses, a missing recipient list and dispatch failures are
/// all fatal for the invocation.
pub async fn handle_notification(
    config: &Config,
    dispatcher: &Dispatcher,
    event: &NotificationEvent,
) -> Result<DispatchOutcome, HandlerError> {
    info!(
        message_id = %event.mail.message_id,
        notification_type = %event.notification_type,
        source = %event.mail.source,
        "notification_received"
    );

    let source = MailAddress::from_header(&event.mail.source)?;

    let recipients = event
        .recipient_strings()
        .into_iter()
        .map(MailAddress::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let first = match recipients.first() {
        Some(first) => first,
        None => {
            warn!(message_id = %event.mail.message_id, "notification_without_recipients");
            return Err(HandlerError::MissingRecipients);
        }
    };

    let ctx = resolve(config, &source, first);

    let notification = DeliveryNotification::new(
        event.mail.message_id.clone(),
        event.notification_type,
        source,
        recipients,
        &ctx,
    );

    let outcome = dispatcher.dispatch(&ctx, &notification).await?;

    info!(
        message_id = %notification.message_id,
        tenant = %ctx.tenant,
        environment = %ctx.environment,
        outcome = ?outcome,
        "notification_handled"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use crate::notify::NotificationType;

    type Captured = Arc<Mutex<Vec<Value>>>;

    async fn capture(State(captured): State<Captured>, Json(body): Json<Value>) -> StatusCode {
        captured.lock().unwrap().push(body);
        StatusCode::OK
    }

    async fn spawn_webhook() -> (SocketAddr, Captured) {
        let captured = Captured::default();
        let router = Router::new()
            .route("/webhooks/email/status", post(capture))
            .with_state(captured.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (addr, captured)
    }

    fn local_config(port: u16) -> Config {
        let mut config = Config::default();
        config
            .local_hostnames
            .insert("qatest".to_string(), "127.0.0.1".to_string());
        config.local_port = port;
        config
    }

    fn bounce_event(source: &str) -> NotificationEvent {
        serde_json::from_value(json!({
            "notificationType": "Bounce",
            "mail": {"messageId": "msg-42", "source": source},
            "bounce": {"bouncedRecipients": [{"emailAddress": "qatest+run1_bob@reva.tech"}]}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_bounce_notification_is_relayed() {
        let (addr, captured) = spawn_webhook().await;
        let config = local_config(addr.port());
        let dispatcher = Dispatcher::new(Arc::new(config.clone())).unwrap();

        let event = bounce_event("\"Red Leasing\" <bayarea@red.cucumber.env.mail.reva.tech>");
        let outcome = handle_notification(&config, &dispatcher, &event)
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Delivered { redirects: 0, .. }));

        let bodies = captured.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(
            bodies[0],
            json!({
                "messageId": "msg-42",
                "type": "Bounce",
                "email": "bayarea@red.cucumber.env.mail.reva.tech",
                "recipients": ["qatest+run1_bob@reva.tech"],
                "tenant": "red",
                "env": "cucumber",
            })
        );
    }

    #[tokio::test]
    async fn test_noreply_source_is_skipped() {
        let (addr, captured) = spawn_webhook().await;
        let config = local_config(addr.port());
        let dispatcher = Dispatcher::new(Arc::new(config.clone())).unwrap();

        let event = bounce_event("noreply@red.cucumber.env.mail.reva.tech");
        let outcome = handle_notification(&config, &dispatcher, &event)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert!(captured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipients_is_fatal() {
        let config = Config::default();
        let dispatcher = Dispatcher::new(Arc::new(config.clone())).unwrap();
        let event: NotificationEvent = serde_json::from_value(json!({
            "notificationType": "Delivery",
            "mail": {"messageId": "m", "source": "bayarea@red.mail.reva.tech"},
            "delivery": {"recipients": []}
        }))
        .unwrap();

        let result = handle_notification(&config, &dispatcher, &event).await;
        assert!(matches!(result, Err(HandlerError::MissingRecipients)));
    }

    #[tokio::test]
    async fn test_invalid_source_is_fatal() {
        let config = Config::default();
        let dispatcher = Dispatcher::new(Arc::new(config.clone())).unwrap();
        let event = bounce_event("not-an-address");

        let result = handle_notification(&config, &dispatcher, &event).await;
        assert!(matches!(result, Err(HandlerError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_dispatch_failure_propagates() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = local_config(port);
        let dispatcher = Dispatcher::new(Arc::new(config.clone())).unwrap();
        let event = bounce_event("bayarea@red.cucumber.env.mail.reva.tech");

        let result = handle_notification(&config, &dispatcher, &event).await;
        match result {
            Err(err @ HandlerError::Dispatch(_)) => assert!(!err.is_malformed_input()),
            other => panic!("expected dispatch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscription_confirmation_times_out() {
        let router = Router::new().route(
            "/confirm",
            axum::routing::get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = Config {
            request_timeout_ms: 100,
            ..Config::default()
        };
        let client = subscription_client(&config).unwrap();

        let result = confirm_subscription(&client, &format!("http://{}/confirm", addr)).await;
        match result {
            Err(HandlerError::Subscription(e)) => assert!(e.is_timeout()),
            other => panic!("expected subscription timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_notification() {
        let input = parse_notification_input(json!({
            "notificationType": "Delivery",
            "mail": {"messageId": "m", "source": "a@b.c"},
            "delivery": {"recipients": ["x@y.z"]}
        }))
        .unwrap();

        match input {
            NotificationInput::Notification(event) => {
                assert_eq!(event.notification_type, NotificationType::Delivery)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_channel_envelope() {
        let message = json!({
            "notificationType": "Complaint",
            "mail": {"messageId": "m", "source": "a@b.c"},
            "complaint": {"complainedRecipients": [{"emailAddress": "x@y.z"}]}
        })
        .to_string();

        let input = parse_notification_input(json!({"Type": "Notification", "Message": message}))
            .unwrap();

        match input {
            NotificationInput::Notification(event) => {
                assert_eq!(event.notification_type, NotificationType::Complaint);
                assert_eq!(event.recipient_strings(), vec!["x@y.z"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_channel_records() {
        let message = json!({
            "notificationType": "Bounce",
            "mail": {"messageId": "m", "source": "a@b.c"},
            "bounce": {"bouncedRecipients": [{"emailAddress": "x@y.z"}]}
        })
        .to_string();

        let input =
            parse_notification_input(json!({"Records": [{"Sns": {"Message": message}}]})).unwrap();

        assert!(matches!(input, NotificationInput::Notification(_)));
    }

    #[test]
    fn test_parse_subscription_confirmation() {
        let input = parse_notification_input(json!({
            "Type": "SubscriptionConfirmation",
            "SubscribeURL": "https://sns.example.com/confirm?token=abc"
        }))
        .unwrap();

        match input {
            NotificationInput::SubscriptionConfirmation { subscribe_url } => {
                assert_eq!(subscribe_url, "https://sns.example.com/confirm?token=abc")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_unsupported_envelope() {
        let result = parse_notification_input(json!({"Type": "UnsubscribeConfirmation"}));
        assert!(matches!(result, Err(HandlerError::UnsupportedEnvelope(_))));
    }

    #[test]
    fn test_parse_garbage_is_invalid_payload() {
        let result = parse_notification_input(json!({"hello": "world"}));
        assert!(matches!(result, Err(HandlerError::InvalidPayload(_))));
    }
}
