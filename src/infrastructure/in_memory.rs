use crate::domain::ports::{Subscription, SubscriptionBox, TransactionStore, Transport};
use crate::domain::transaction::{Transaction, TransactionId, TransactionStatus};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

/// Messages buffered per channel before slow subscribers start losing them.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// An in-process publish/subscribe transport.
///
/// Each channel is a `tokio::sync::broadcast` channel. Like Redis pub/sub,
/// a message published while nobody is subscribed is dropped, and every
/// subscriber sees every message published after it subscribed.
#[derive(Clone)]
pub struct InMemoryTransport {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
    capacity: usize,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of channels currently held open.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Tears down a channel. Current subscribers receive an error on their
    /// next receive once buffered messages are drained.
    pub async fn close_channel(&self, channel: &str) {
        self.channels.write().await.remove(channel);
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<()> {
        let channels = self.channels.read().await;
        match channels.get(channel) {
            Some(sender) => {
                // A send error only means nobody is listening right now.
                let receivers = sender.send(message).unwrap_or(0);
                debug!(channel, receivers, "Published message");
            }
            None => debug!(channel, "Published message to channel without subscribers"),
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<SubscriptionBox> {
        let mut channels = self.channels.write().await;
        // Channels whose subscribers all went away are dropped here.
        channels.retain(|_, sender| sender.receiver_count() > 0);
        let receiver = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        Ok(Box::new(InMemorySubscription {
            channel: channel.to_string(),
            receiver,
        }))
    }
}

struct InMemorySubscription {
    channel: String,
    receiver: broadcast::Receiver<Vec<u8>>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next_message(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Ok(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(PaymentError::SubscriptionFailed(format!(
                        "channel '{}' closed",
                        self.channel
                    )));
                }
            }
        }
    }
}

/// A thread-safe in-memory store for payment transactions.
///
/// Uses `Arc<RwLock<HashMap<TransactionId, Transaction>>>` for shared
/// concurrent access between the use case and the outcome recorder.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored transaction, in no particular order.
    pub async fn all(&self) -> Vec<Transaction> {
        self.transactions.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&id).cloned())
    }

    async fn update_status(&self, id: TransactionId, status: TransactionStatus) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or(PaymentError::TransactionNotFound(id))?;
        tx.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::Amount;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_in_memory_transaction_store() {
        let store = InMemoryTransactionStore::new();
        let tx = Transaction::new(Amount::new(dec!(100.0)).unwrap());

        store.store(tx.clone()).await.unwrap();
        let retrieved = store.get(tx.id).await.unwrap().unwrap();
        assert_eq!(retrieved, tx);

        assert!(store.get(TransactionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status() {
        let store = InMemoryTransactionStore::new();
        let tx = Transaction::new(Amount::new(dec!(5.0)).unwrap());
        store.store(tx.clone()).await.unwrap();

        store
            .update_status(tx.id, TransactionStatus::Success)
            .await
            .unwrap();
        let retrieved = store.get(tx.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, TransactionStatus::Success);

        let missing = TransactionId::new();
        assert!(matches!(
            store.update_status(missing, TransactionStatus::Failed).await,
            Err(PaymentError::TransactionNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_all_returns_every_transaction() {
        let store = InMemoryTransactionStore::new();
        for amount in [dec!(1.0), dec!(2.0), dec!(3.0)] {
            store
                .store(Transaction::new(Amount::new(amount).unwrap()))
                .await
                .unwrap();
        }
        assert_eq!(store.all().await.len(), 3);
    }

    #[tokio::test]
    async fn test_transport_delivers_to_subscriber() {
        let transport = InMemoryTransport::new();
        let mut sub = transport.subscribe("https://a.example.com").await.unwrap();
        assert_eq!(transport.subscriber_count("https://a.example.com").await, 1);

        transport
            .publish("https://a.example.com", b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(sub.next_message().await.unwrap(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_transport_channels_are_isolated() {
        let transport = InMemoryTransport::new();
        let mut a = transport.subscribe("https://a.example.com").await.unwrap();
        let _b = transport.subscribe("https://b.example.com").await.unwrap();

        transport
            .publish("https://b.example.com", b"for b".to_vec())
            .await
            .unwrap();
        transport
            .publish("https://a.example.com", b"for a".to_vec())
            .await
            .unwrap();

        assert_eq!(a.next_message().await.unwrap(), b"for a".to_vec());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let transport = InMemoryTransport::new();
        transport
            .publish("https://nobody.example.com", b"lost".to_vec())
            .await
            .unwrap();

        let mut sub = transport.subscribe("https://nobody.example.com").await.unwrap();
        transport
            .publish("https://nobody.example.com", b"seen".to_vec())
            .await
            .unwrap();
        assert_eq!(sub.next_message().await.unwrap(), b"seen".to_vec());
    }

    #[tokio::test]
    async fn test_closed_channel_fails_subscription() {
        let transport = InMemoryTransport::new();
        let mut sub = transport.subscribe("https://a.example.com").await.unwrap();

        transport.close_channel("https://a.example.com").await;
        assert!(matches!(
            sub.next_message().await,
            Err(PaymentError::SubscriptionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_abandoned_channels_are_pruned() {
        let transport = InMemoryTransport::new();
        for i in 0..10 {
            let sub = transport
                .subscribe(&format!("https://{i}.example.com"))
                .await
                .unwrap();
            drop(sub);
        }

        let _live = transport.subscribe("https://live.example.com").await.unwrap();
        assert_eq!(transport.channel_count().await, 1);
        assert_eq!(transport.subscriber_count("https://live.example.com").await, 1);
        assert_eq!(transport.subscriber_count("https://0.example.com").await, 0);
    }
}
