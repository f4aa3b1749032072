use crate::domain::transaction::TransactionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("invalid amount. Please check and try again")]
    InvalidAmount,
    #[error("invalid URL '{0}'. Please check and try again")]
    InvalidUrl(String),
    #[error("failed to serialize payload for transaction {transaction_id}: {source}")]
    SerializationFailed {
        transaction_id: TransactionId,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to publish to transport: {0}")]
    PublishFailed(String),
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),
    #[error("delivery queue closed")]
    QueueClosed,
    #[error("webhook delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::DeliveryFailed(err.to_string())
    }
}

#[cfg(feature = "transport-redis")]
impl From<redis::RedisError> for PaymentError {
    fn from(err: redis::RedisError) -> Self {
        PaymentError::InternalError(Box::new(err))
    }
}
