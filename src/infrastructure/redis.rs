use crate::domain::ports::{Subscription, SubscriptionBox, TransactionStore, Transport};
use crate::domain::transaction::{Transaction, TransactionId, TransactionStatus};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Msg};
use std::pin::Pin;
use tracing::{debug, info};

/// A transport backed by Redis pub/sub.
///
/// Publishing goes through a shared multiplexed connection; every
/// subscription opens its own dedicated pub/sub connection, which is closed
/// when the subscription is dropped.
#[derive(Clone)]
pub struct RedisTransport {
    client: Client,
    connection: MultiplexedConnection,
}

impl RedisTransport {
    /// Connects to Redis at `uri` and checks the connection with a `PING`.
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = Client::open(uri)?;
        let mut connection = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        info!(uri, "Connected to Redis");

        Ok(Self { client, connection })
    }

    /// A transaction store sharing this transport's connection.
    pub fn transaction_store(&self) -> RedisTransactionStore {
        RedisTransactionStore {
            connection: self.connection.clone(),
        }
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<()> {
        let mut connection = self.connection.clone();
        let receivers: i64 = connection
            .publish(channel, message)
            .await
            .map_err(|e| PaymentError::PublishFailed(e.to_string()))?;
        debug!(channel, receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<SubscriptionBox> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| PaymentError::SubscriptionFailed(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| PaymentError::SubscriptionFailed(e.to_string()))?;

        Ok(Box::new(RedisSubscription {
            channel: channel.to_string(),
            messages: Box::pin(pubsub.into_on_message()),
        }))
    }
}

struct RedisSubscription {
    channel: String,
    messages: Pin<Box<dyn Stream<Item = Msg> + Send>>,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next_message(&mut self) -> Result<Vec<u8>> {
        let msg = self.messages.next().await.ok_or_else(|| {
            PaymentError::SubscriptionFailed(format!(
                "connection for channel '{}' closed",
                self.channel
            ))
        })?;

        msg.get_payload::<Vec<u8>>()
            .map_err(|e| PaymentError::SubscriptionFailed(e.to_string()))
    }
}

/// A transaction store kept in Redis, one JSON value per transaction.
///
/// Lets the process that publishes a payment and the process that delivers
/// its webhook see the same transaction.
#[derive(Clone)]
pub struct RedisTransactionStore {
    connection: MultiplexedConnection,
}

fn transaction_key(id: TransactionId) -> String {
    format!("quantia:transaction:{id}")
}

#[async_trait]
impl TransactionStore for RedisTransactionStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        let json = serde_json::to_string(&tx).map_err(|source| {
            PaymentError::SerializationFailed {
                transaction_id: tx.id,
                source,
            }
        })?;
        let mut connection = self.connection.clone();
        let _: () = connection.set(transaction_key(tx.id), json).await?;
        debug!(transaction_id = %tx.id, "Stored transaction");
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let mut connection = self.connection.clone();
        let json: Option<String> = connection.get(transaction_key(id)).await?;
        json.map(|json| {
            serde_json::from_str(&json).map_err(|e| PaymentError::InternalError(Box::new(e)))
        })
        .transpose()
    }

    async fn update_status(&self, id: TransactionId, status: TransactionStatus) -> Result<()> {
        let mut tx = self
            .get(id)
            .await?
            .ok_or(PaymentError::TransactionNotFound(id))?;
        tx.status = status;
        self.store(tx).await
    }
}
