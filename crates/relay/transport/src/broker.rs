//! Broker trait and message types

use crate::error::BrokerResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// A message as delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub offset: u64,
    pub published_at: DateTime<Utc>,
}

/// Acknowledgement returned once the broker accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// A live subscription on one topic within one consumer group.
///
/// Dropping the subscription leaves the group.
pub struct Subscription {
    topic: String,
    group: String,
    receiver: mpsc::UnboundedReceiver<BrokerMessage>,
}

impl Subscription {
    pub fn new(
        topic: impl Into<String>,
        group: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<BrokerMessage>,
    ) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Wait for the next message. Returns `None` once the broker side closed.
    pub async fn recv(&mut self) -> Option<BrokerMessage> {
        self.receiver.recv().await
    }
}

/// Publish/subscribe transport used by gateways and workers.
///
/// Every consumer group subscribed to a topic receives every message on it;
/// inside a group each message goes to exactly one live member.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish `payload` to `topic`, keyed by `key`.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>)
        -> BrokerResult<PublishReceipt>;

    /// Join consumer group `group` on `topic`.
    async fn subscribe(&self, topic: &str, group: &str) -> BrokerResult<Subscription>;
}
