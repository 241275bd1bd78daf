//! Reply listener
//!
//! Consumes this instance's private reply topic and completes pending calls.

use crate::config::GatewayConfig;
use crate::pending::PendingRequestTable;
use relay_transport::{BrokerResult, MessageBroker, Subscription};
use relay_types::Response;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Running reply consumer for one gateway instance.
pub struct ReplyListener {
    topic: String,
    task: JoinHandle<()>,
}

impl ReplyListener {
    /// Subscribe to the reply topic and start completing `pending`.
    ///
    /// Must be started before the first call is published.
    pub async fn start(
        config: &GatewayConfig,
        broker: &dyn MessageBroker,
        pending: PendingRequestTable,
    ) -> BrokerResult<Self> {
        let subscription = broker
            .subscribe(config.reply_topic(), config.reply_group())
            .await?;
        let topic = subscription.topic().to_string();

        info!(topic = %topic, group = %config.reply_group(), "Reply listener started");
        let task = tokio::spawn(listen(subscription, pending));
        Ok(Self { topic, task })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn shutdown(self) {
        self.task.abort();
        info!(topic = %self.topic, "Reply listener stopped");
    }
}

async fn listen(mut subscription: Subscription, pending: PendingRequestTable) {
    while let Some(message) = subscription.recv().await {
        match Response::from_bytes(&message.payload) {
            Ok(response) => {
                debug!(
                    request_id = %response.request_id,
                    success = response.is_success(),
                    "Reply received"
                );
                pending.complete(response);
            }
            Err(e) => warn!(
                topic = %message.topic,
                offset = message.offset,
                key = %message.key,
                error = %e,
                "Discarding undecodable reply"
            ),
        }
    }
    debug!(topic = %subscription.topic(), "Reply subscription closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_transport::InMemoryBroker;
    use relay_types::RequestId;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reply_completes_pending() {
        let broker = InMemoryBroker::new();
        let config = GatewayConfig::new("gw-1");
        let pending = PendingRequestTable::new();
        let listener = ReplyListener::start(&config, &broker, pending.clone())
            .await
            .unwrap();
        assert_eq!(listener.topic(), "gw-1-replies");
        assert!(listener.is_running());

        let id = RequestId::generate();
        let handle = pending.create(id).unwrap();
        let reply = Response::success(id, json!({"ok": true}));
        broker
            .publish("gw-1-replies", &id.to_string(), reply.to_bytes().unwrap())
            .await
            .unwrap();

        let response = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("in time")
            .unwrap();
        assert_eq!(response, reply);
        listener.shutdown();
    }

    #[tokio::test]
    async fn test_garbage_does_not_stop_listener() {
        let broker = InMemoryBroker::new();
        let config = GatewayConfig::new("gw-1");
        let pending = PendingRequestTable::new();
        let _listener = ReplyListener::start(&config, &broker, pending.clone())
            .await
            .unwrap();

        broker
            .publish("gw-1-replies", "x", br#"{"requestId": 1}"#.to_vec())
            .await
            .unwrap();

        let id = RequestId::generate();
        let handle = pending.create(id).unwrap();
        broker
            .publish(
                "gw-1-replies",
                &id.to_string(),
                Response::failure(id, "nope").to_bytes().unwrap(),
            )
            .await
            .unwrap();

        let response = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("in time")
            .unwrap();
        assert_eq!(response.error_message(), Some("nope"));
    }
}
