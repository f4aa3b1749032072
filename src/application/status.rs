use super::worker::{DeliveryOutcome, DeliveryResult};
use crate::domain::ports::TransactionStoreRef;
use crate::domain::transaction::TransactionStatus;
use crate::error::PaymentError;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Moves stored transactions to their final status as delivery outcomes
/// arrive from the worker pool.
pub struct StatusRecorder {
    transactions: TransactionStoreRef,
}

impl StatusRecorder {
    pub fn new(transactions: TransactionStoreRef) -> Self {
        Self { transactions }
    }

    /// Applies outcomes until every sender is dropped.
    pub async fn run(&self, mut outcomes: mpsc::UnboundedReceiver<DeliveryOutcome>) {
        while let Some(outcome) = outcomes.recv().await {
            self.apply(&outcome).await;
        }
    }

    async fn apply(&self, outcome: &DeliveryOutcome) {
        let status = match outcome.result {
            DeliveryResult::Delivered => TransactionStatus::Success,
            DeliveryResult::GaveUp => TransactionStatus::Failed,
        };

        match self
            .transactions
            .update_status(outcome.transaction_id, status)
            .await
        {
            Ok(()) => debug!(transaction_id = %outcome.transaction_id, ?status, "Transaction status updated"),
            // Payloads may come from a publisher with its own store.
            Err(PaymentError::TransactionNotFound(id)) => {
                warn!(transaction_id = %id, "Outcome for unknown transaction")
            }
            Err(e) => error!(transaction_id = %outcome.transaction_id, error = %e, "Failed to update transaction status"),
        }
    }
}
