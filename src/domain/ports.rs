use super::transaction::{Transaction, TransactionId, TransactionStatus};
use super::webhook::WebhookPayload;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Publish/subscribe transport connecting the publisher to subscribers.
///
/// Implementations make no durability or ordering promises beyond what the
/// underlying mechanism offers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<()>;
    async fn subscribe(&self, channel: &str) -> Result<SubscriptionBox>;
}

/// An open subscription to a single channel. Dropping it releases the
/// subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next raw message. An error means the subscription is
    /// unusable and must be reopened.
    async fn next_message(&mut self) -> Result<Vec<u8>>;
}

/// Performs the outbound webhook call for one attempt.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<()>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn store(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn update_status(&self, id: TransactionId, status: TransactionStatus) -> Result<()>;
}

pub type TransportRef = Arc<dyn Transport>;
pub type SubscriptionBox = Box<dyn Subscription>;
pub type WebhookSenderRef = Arc<dyn WebhookSender>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
