use crate::domain::ports::WebhookSender;
use crate::domain::webhook::WebhookPayload;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single webhook call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers webhooks as JSON `POST` requests.
///
/// Connection errors, timeouts and any non-2xx response count as a failed
/// attempt.
#[derive(Clone)]
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("quantia/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PaymentError::InternalError(Box::new(e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<()> {
        let response = self
            .client
            .post(payload.url.as_str())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        debug!(transaction_id = %payload.id, url = %payload.url, %status, "Webhook responded");

        if status.is_success() {
            Ok(())
        } else {
            Err(PaymentError::DeliveryFailed(format!(
                "{} responded with {}",
                payload.url, status
            )))
        }
    }
}
