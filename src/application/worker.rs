use crate::domain::ports::WebhookSenderRef;
use crate::domain::retry::RetryPolicy;
use crate::domain::transaction::TransactionId;
use crate::domain::webhook::WebhookPayload;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Terminal result of one payload's delivery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    GaveUp,
}

/// Emitted once per payload when its delivery loop ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub transaction_id: TransactionId,
    /// Number of outbound calls made, including the final one.
    pub attempts: u32,
    pub result: DeliveryResult,
}

/// Spawns one independent delivery loop per dequeued payload.
///
/// Loops never share retry state and never wait on one another. Nothing is
/// returned to the original publisher; terminal outcomes are logged and,
/// when an outcome channel is attached, reported there.
#[derive(Clone)]
pub struct DeliveryWorkerPool {
    sender: WebhookSenderRef,
    policy: RetryPolicy,
    outcomes: Option<mpsc::UnboundedSender<DeliveryOutcome>>,
}

impl DeliveryWorkerPool {
    pub fn new(sender: WebhookSenderRef, policy: RetryPolicy) -> Self {
        Self {
            sender,
            policy,
            outcomes: None,
        }
    }

    /// Reports every terminal outcome on `outcomes`.
    pub fn with_outcomes(mut self, outcomes: mpsc::UnboundedSender<DeliveryOutcome>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    /// Consumes `queue` until it is closed, then waits for the deliveries
    /// still in flight. In-flight deliveries are never cancelled.
    pub async fn run(&self, mut queue: mpsc::Receiver<WebhookPayload>) {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                next = queue.recv() => match next {
                    Some(payload) => {
                        let worker = self.clone();
                        in_flight.spawn(async move { worker.deliver(payload).await });
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join_error(joined);
                }
            }
        }

        info!(in_flight = in_flight.len(), "Delivery queue closed, draining");
        while let Some(joined) = in_flight.join_next().await {
            log_join_error(joined);
        }
    }

    /// Runs the retry loop for a single payload to completion.
    pub async fn deliver(&self, payload: WebhookPayload) -> DeliveryOutcome {
        let mut retry = self.policy.start();
        let mut attempts = 0;

        let result = loop {
            attempts += 1;
            match self.sender.deliver(&payload).await {
                Ok(()) => {
                    info!(transaction_id = %payload.id, attempts, "Webhook delivered");
                    break DeliveryResult::Delivered;
                }
                Err(e) => match retry.record_failure() {
                    Some(backoff) => {
                        warn!(
                            transaction_id = %payload.id,
                            attempt = attempts,
                            error = %e,
                            ?backoff,
                            "Webhook delivery failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    None => {
                        error!(
                            transaction_id = %payload.id,
                            attempts,
                            error = %e,
                            "Max retries reached, giving up on webhook"
                        );
                        break DeliveryResult::GaveUp;
                    }
                },
            }
        };

        let outcome = DeliveryOutcome {
            transaction_id: payload.id,
            attempts,
            result,
        };
        if let Some(outcomes) = &self.outcomes
            && outcomes.send(outcome.clone()).is_err()
        {
            debug!(transaction_id = %payload.id, "No outcome listener");
        }
        outcome
    }
}

fn log_join_error(joined: Result<DeliveryOutcome, tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Delivery task aborted");
    }
}
