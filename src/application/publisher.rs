use crate::domain::ports::TransportRef;
use crate::domain::transaction::{Amount, Transaction};
use crate::domain::webhook::{WebhookPayload, WebhookUrl};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use tracing::{debug, info};

/// Records a pending transaction and hands it to the transport for
/// asynchronous delivery.
///
/// Publishing is fire-and-forget: the returned transaction says nothing about
/// whether the webhook will eventually be delivered.
#[derive(Clone)]
pub struct Publisher {
    transport: TransportRef,
}

impl Publisher {
    pub fn new(transport: TransportRef) -> Self {
        Self { transport }
    }

    /// Creates a pending transaction for `amount` and publishes its webhook
    /// payload on the channel named by `url`.
    ///
    /// A `SerializationFailed` or `PublishFailed` error means the transaction
    /// was created but will not be delivered.
    pub async fn publish(&self, amount: Amount, url: &WebhookUrl) -> Result<Transaction> {
        let transaction = Transaction::new(amount);
        self.publish_transaction(&transaction, url).await?;
        Ok(transaction)
    }

    /// Publishes the webhook payload of an already created transaction.
    ///
    /// Callers that keep a transaction store must store `transaction` first:
    /// its outcome can arrive as soon as this returns.
    pub async fn publish_transaction(
        &self,
        transaction: &Transaction,
        url: &WebhookUrl,
    ) -> Result<()> {
        let payload = WebhookPayload::from_transaction(transaction, url.clone(), Utc::now());

        let bytes = encode(&payload)?;
        debug!(transaction_id = %transaction.id, bytes = bytes.len(), "Encoded webhook payload");

        self.transport.publish(url.as_str(), bytes).await?;
        info!(
            transaction_id = %transaction.id,
            amount = %transaction.amount,
            %url,
            "Published payment"
        );

        Ok(())
    }
}

fn encode(payload: &WebhookPayload) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|source| PaymentError::SerializationFailed {
        transaction_id: payload.id,
        source,
    })
}
