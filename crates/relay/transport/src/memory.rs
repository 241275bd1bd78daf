//! In-memory broker
//!
//! Deterministic broker used for development, tests and the single-process
//! daemon. Messages are handed to consumer groups and then forgotten; a
//! broker built with [`InMemoryBroker::with_history`] also keeps a copy of
//! every accepted message for assertions.

use crate::broker::{BrokerMessage, MessageBroker, PublishReceipt, Subscription};
use crate::error::{BrokerError, BrokerResult};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// In-memory publish/subscribe broker.
pub struct InMemoryBroker {
    topics: DashMap<String, TopicState>,
    failing_topics: DashSet<String>,
    keep_history: bool,
}

#[derive(Default)]
struct TopicState {
    next_offset: u64,
    groups: HashMap<String, ConsumerGroup>,
    history: Vec<BrokerMessage>,
}

#[derive(Default)]
struct ConsumerGroup {
    members: Vec<mpsc::UnboundedSender<BrokerMessage>>,
    cursor: usize,
}

impl ConsumerGroup {
    /// Hand the message to the next live member, round-robin.
    fn deliver(&mut self, mut message: BrokerMessage) -> bool {
        self.members.retain(|member| !member.is_closed());

        for _ in 0..self.members.len() {
            let index = self.cursor % self.members.len();
            self.cursor = self.cursor.wrapping_add(1);
            match self.members[index].send(message) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(returned)) => message = returned,
            }
        }
        false
    }

    fn live_members(&self) -> usize {
        self.members.iter().filter(|m| !m.is_closed()).count()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            failing_topics: DashSet::new(),
            keep_history: false,
        }
    }

    /// Broker that records every accepted message. Memory grows with traffic.
    pub fn with_history() -> Self {
        Self {
            keep_history: true,
            ..Self::new()
        }
    }

    /// Make every publish to `topic` fail until [`restore_topic`](Self::restore_topic).
    pub fn fail_topic(&self, topic: impl Into<String>) {
        self.failing_topics.insert(topic.into());
    }

    pub fn restore_topic(&self, topic: &str) {
        self.failing_topics.remove(topic);
    }

    /// Every message accepted on `topic`, in publish order. Always empty
    /// unless the broker was built [`with_history`](Self::with_history).
    pub fn published(&self, topic: &str) -> Vec<BrokerMessage> {
        self.topics
            .get(topic)
            .map(|state| state.history.clone())
            .unwrap_or_default()
    }

    /// Total number of messages accepted across all topics.
    pub fn total_published(&self) -> u64 {
        self.topics.iter().map(|state| state.next_offset).sum()
    }

    /// Messages currently held in topic history.
    pub fn retained(&self) -> usize {
        self.topics.iter().map(|state| state.history.len()).sum()
    }

    /// Live members of `group` on `topic`.
    pub fn subscriber_count(&self, topic: &str, group: &str) -> usize {
        self.topics
            .get(topic)
            .and_then(|state| state.groups.get(group).map(ConsumerGroup::live_members))
            .unwrap_or(0)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> BrokerResult<PublishReceipt> {
        if topic.is_empty() {
            return Err(BrokerError::InvalidName("topic must not be empty".into()));
        }

        if self.failing_topics.contains(topic) {
            return Err(BrokerError::PublishFailed {
                topic: topic.to_string(),
                reason: "simulated broker failure".to_string(),
            });
        }

        let mut state = self.topics.entry(topic.to_string()).or_default();
        let offset = state.next_offset;
        state.next_offset += 1;

        let message = BrokerMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
            offset,
            published_at: chrono::Utc::now(),
        };

        let mut delivered = 0usize;
        for group in state.groups.values_mut() {
            if group.deliver(message.clone()) {
                delivered += 1;
            }
        }
        if self.keep_history {
            state.history.push(message);
        }

        debug!(topic, key, offset, groups = delivered, "Message published");
        if delivered == 0 {
            trace!(topic, offset, "No live consumer group on topic");
        }

        Ok(PublishReceipt {
            topic: topic.to_string(),
            partition: 0,
            offset,
        })
    }

    async fn subscribe(&self, topic: &str, group: &str) -> BrokerResult<Subscription> {
        if topic.is_empty() || group.is_empty() {
            return Err(BrokerError::InvalidName(format!(
                "topic '{}' / group '{}'",
                topic, group
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .entry(topic.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default()
            .members
            .push(tx);

        debug!(topic, group, "Subscribed");
        Ok(Subscription::new(topic, group, rx))
    }
}
