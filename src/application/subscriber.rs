use crate::domain::ports::TransportRef;
use crate::domain::webhook::{WebhookPayload, WebhookUrl};
use crate::error::{PaymentError, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the queue between the feeder and the delivery workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Creates the bounded queue the feeder pushes into and the worker pool
/// drains.
pub fn delivery_queue(
    capacity: usize,
) -> (mpsc::Sender<WebhookPayload>, mpsc::Receiver<WebhookPayload>) {
    mpsc::channel(capacity)
}

/// Subscribes to a destination channel and feeds decoded payloads into the
/// delivery queue.
#[derive(Clone)]
pub struct QueueFeeder {
    transport: TransportRef,
}

impl QueueFeeder {
    pub fn new(transport: TransportRef) -> Self {
        Self { transport }
    }

    /// Runs until `cancel` fires or the subscription fails.
    ///
    /// A message that does not decode is logged and skipped. A receive error
    /// ends the run with `SubscriptionFailed`; the caller is expected to
    /// restart the feeder. When the queue is full this blocks until a worker
    /// makes room, so a payload taken off the transport is never dropped here.
    pub async fn run(
        &self,
        url: &WebhookUrl,
        queue: mpsc::Sender<WebhookPayload>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut subscription = self
            .transport
            .subscribe(url.as_str())
            .await
            .map_err(subscription_failed)?;
        info!(%url, "Subscribed to webhook channel");

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(%url, "Subscription cancelled");
                    return Ok(());
                }
                received = subscription.next_message() => received,
            };

            let raw = match received {
                Ok(raw) => raw,
                Err(e) => {
                    error!(%url, error = %e, "Error receiving message from webhook channel");
                    return Err(subscription_failed(e));
                }
            };

            let payload: WebhookPayload = match serde_json::from_slice(&raw) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%url, error = %e, "Skipping malformed webhook payload");
                    continue;
                }
            };

            debug!(transaction_id = %payload.id, "Queueing webhook payload");
            queue
                .send(payload)
                .await
                .map_err(|_| PaymentError::QueueClosed)?;
        }
    }
}

fn subscription_failed(err: PaymentError) -> PaymentError {
    match err {
        PaymentError::SubscriptionFailed(_) => err,
        other => PaymentError::SubscriptionFailed(other.to_string()),
    }
}
