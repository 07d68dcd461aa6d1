//! Mail transports.
//!
//! Delivery itself is somebody else's job: [`RelayTransport`] hands each
//! message to an HTTP mail relay, [`LogTransport`] only logs it.

use super::templates::Notification;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The relay answered with a non-2xx status
    #[error("mail relay refused message with status {status}: {body}")]
    Refused { status: u16, body: String },
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts each message as JSON to a mail relay endpoint.
#[derive(Debug, Clone)]
pub struct RelayTransport {
    http_client: reqwest::Client,
    endpoint: Url,
    from: String,
}

impl RelayTransport {
    /// Fails when the HTTP client cannot be built with the given timeout.
    pub fn new(endpoint: Url, from: String, timeout: Duration) -> Result<Self, DeliveryError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint,
            from,
        })
    }
}

#[async_trait]
impl MailTransport for RelayTransport {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let message = RelayMessage {
            from: &self.from,
            to: &notification.to,
            subject: &notification.subject,
            body: &notification.body,
        };
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Refused {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            body = %notification.body,
            "Mail (log transport)"
        );
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;

    fn message() -> Notification {
        Notification {
            to: "ada@example.com".to_string(),
            subject: "Offer Received".to_string(),
            body: "hello".to_string(),
        }
    }

    #[test]
    fn test_relay_message_shape() {
        let n = message();
        let json = serde_json::to_value(RelayMessage {
            from: "noreply@gametrader.local",
            to: &n.to,
            subject: &n.subject,
            body: &n.body,
        })
        .unwrap();
        assert_eq!(json["from"], "noreply@gametrader.local");
        assert_eq!(json["to"], "ada@example.com");
        assert_eq!(json["subject"], "Offer Received");
    }

    #[tokio::test]
    async fn test_recording_transport_refuses_then_delivers() {
        let transport = RecordingTransport::default();
        transport.fail_next(1);
        assert!(transport.send(&message()).await.is_err());
        assert!(transport.send(&message()).await.is_ok());
        assert_eq!(transport.sent().await, vec![message()]);
    }

    #[tokio::test]
    async fn test_relay_unreachable_is_request_error() {
        let relay = RelayTransport::new(
            Url::parse("http://127.0.0.1:1/send").unwrap(),
            "noreply@gametrader.local".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(
            relay.send(&message()).await,
            Err(DeliveryError::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        assert!(LogTransport.send(&message()).await.is_ok());
    }
}
