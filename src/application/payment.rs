use super::publisher::Publisher;
use super::subscriber::QueueFeeder;
use crate::domain::ports::{TransactionStoreRef, TransportRef};
use crate::domain::transaction::{Amount, Transaction, TransactionId, TransactionStatus};
use crate::domain::webhook::{WebhookPayload, WebhookUrl};
use crate::error::Result;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Entry point for payment requests.
///
/// This is the only place raw caller input is validated. The caller learns
/// whether the payment was published, never whether its webhook was
/// eventually delivered.
pub struct PaymentUseCase {
    publisher: Publisher,
    feeder: QueueFeeder,
    transactions: TransactionStoreRef,
}

impl PaymentUseCase {
    /// Creates a new `PaymentUseCase`.
    ///
    /// # Arguments
    ///
    /// * `transport` - The publish/subscribe transport shared by the publisher and feeder.
    /// * `transactions` - The store that keeps every published transaction.
    pub fn new(transport: TransportRef, transactions: TransactionStoreRef) -> Self {
        Self {
            publisher: Publisher::new(transport.clone()),
            feeder: QueueFeeder::new(transport),
            transactions,
        }
    }

    /// Validates the request, records the pending transaction and publishes
    /// it.
    ///
    /// The transaction is stored before it is published. If publishing fails
    /// the stored transaction is marked `Failed` and the error is returned.
    pub async fn make_payment(&self, amount: Decimal, url: &str) -> Result<Transaction> {
        let amount = Amount::new(amount).inspect_err(|e| {
            warn!(%amount, error = %e, "Error validating amount");
        })?;
        let url = parse_url(url)?;

        let transaction = Transaction::new(amount);
        self.transactions.store(transaction.clone()).await?;

        if let Err(e) = self.publisher.publish_transaction(&transaction, &url).await {
            warn!(transaction_id = %transaction.id, error = %e, "Error publishing payment");
            self.transactions
                .update_status(transaction.id, TransactionStatus::Failed)
                .await?;
            return Err(e);
        }
        Ok(transaction)
    }

    /// Validates `url` and feeds its channel into `queue` until cancelled or
    /// the subscription fails.
    pub async fn subscribe(
        &self,
        url: &str,
        queue: mpsc::Sender<WebhookPayload>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let url = parse_url(url)?;
        self.feeder.run(&url, queue, cancel).await
    }

    pub async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.transactions.get(id).await
    }
}

fn parse_url(url: &str) -> Result<WebhookUrl> {
    WebhookUrl::parse(url).inspect_err(|e| {
        warn!(url, error = %e, "Error validating URL");
    })
}
