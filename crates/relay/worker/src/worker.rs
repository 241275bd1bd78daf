//! Broker consumer for a worker pool
//!
//! One consumer task per topic pulls envelopes off its subscription and hands
//! each to the dispatcher on its own task, bounded by a semaphore shared by
//! all topics of the pool. Every envelope whose `requestId` and `replyTo`
//! can be read yields exactly one reply.

use crate::config::WorkerConfig;
use crate::dispatcher::ProcedureDispatcher;
use crate::error::{WorkerError, WorkerResult};
use relay_transport::{BrokerMessage, MessageBroker, Subscription};
use relay_types::{service_name, Envelope, EnvelopeHeader, Response, WireError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A worker pool replica bound to a broker.
pub struct ProcedureWorker {
    config: WorkerConfig,
    broker: Arc<dyn MessageBroker>,
    dispatcher: Arc<ProcedureDispatcher>,
}

impl ProcedureWorker {
    pub fn new(
        config: WorkerConfig,
        broker: Arc<dyn MessageBroker>,
        dispatcher: ProcedureDispatcher,
    ) -> Self {
        let dispatcher = dispatcher
            .with_coercer(config.coercer())
            .with_execution_timeout(config.execution_timeout());
        Self {
            config,
            broker,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Subscribe to the pool's topics and start consuming.
    pub async fn start(self) -> WorkerResult<WorkerHandle> {
        if service_name(&self.config.service).is_empty() {
            return Err(WorkerError::InvalidConfig(format!(
                "service name '{}' is empty after normalisation",
                self.config.service
            )));
        }
        if self.config.concurrency == 0 {
            return Err(WorkerError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }

        let group = self.config.consumer_group();
        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let mut subscriptions = Vec::new();
        for topic in self.config.topics() {
            subscriptions.push(self.broker.subscribe(&topic, &group).await?);
        }

        let topics: Vec<String> = subscriptions.iter().map(|s| s.topic().to_string()).collect();
        let tasks = subscriptions
            .into_iter()
            .map(|subscription| {
                tokio::spawn(consume(
                    subscription,
                    self.broker.clone(),
                    self.dispatcher.clone(),
                    permits.clone(),
                ))
            })
            .collect();

        info!(
            service = %self.config.service,
            group = %group,
            ?topics,
            concurrency = self.config.concurrency,
            procedures = ?self.dispatcher.registry().names(),
            "Worker started"
        );

        Ok(WorkerHandle {
            service: self.config.service,
            topics,
            tasks,
        })
    }
}

/// Running worker. Consumers stop on [`shutdown`](Self::shutdown); dispatches
/// already in progress finish and still reply.
pub struct WorkerHandle {
    service: String,
    topics: Vec<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!(service = %self.service, "Worker stopped");
    }
}

async fn consume(
    mut subscription: Subscription,
    broker: Arc<dyn MessageBroker>,
    dispatcher: Arc<ProcedureDispatcher>,
    permits: Arc<Semaphore>,
) {
    while let Some(message) = subscription.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let broker = broker.clone();
        let dispatcher = dispatcher.clone();

        tokio::spawn(async move {
            handle_message(broker.as_ref(), &dispatcher, message).await;
            drop(permit);
        });
    }
    debug!(topic = %subscription.topic(), "Subscription closed");
}

async fn handle_message(
    broker: &dyn MessageBroker,
    dispatcher: &ProcedureDispatcher,
    message: BrokerMessage,
) {
    let envelope = match Envelope::from_bytes(&message.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            reject_envelope(broker, &message, &e).await;
            return;
        }
    };

    debug!(
        request_id = %envelope.request_id,
        procedure = %envelope.procedure_name,
        reply_to = %envelope.reply_to,
        "Envelope received"
    );
    let reply_to = envelope.reply_to.clone();
    let response = dispatcher.dispatch(envelope).await;
    publish_reply(broker, &reply_to, response).await;
}

/// Answer an envelope that failed to decode when its correlation fields are
/// still readable; otherwise there is no one to tell and it is dropped.
async fn reject_envelope(broker: &dyn MessageBroker, message: &BrokerMessage, e: &WireError) {
    let Some(header) = EnvelopeHeader::from_bytes(&message.payload) else {
        error!(
            topic = %message.topic,
            offset = message.offset,
            key = %message.key,
            error = %e,
            "Discarding undecodable envelope"
        );
        return;
    };

    warn!(
        request_id = %header.request_id,
        topic = %message.topic,
        error = %e,
        "Rejecting malformed envelope"
    );
    let response = Response::failure(header.request_id, format!("Invalid envelope: {}", e));
    publish_reply(broker, &header.reply_to, response).await;
}

async fn publish_reply(broker: &dyn MessageBroker, reply_to: &str, response: Response) {
    let request_id = response.request_id;
    let payload = match response.to_bytes() {
        Ok(payload) => payload,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to encode response");
            return;
        }
    };

    match broker
        .publish(reply_to, &request_id.to_string(), payload)
        .await
    {
        Ok(receipt) => debug!(
            request_id = %request_id,
            topic = %receipt.topic,
            partition = receipt.partition,
            offset = receipt.offset,
            "Response published"
        ),
        Err(e) => warn!(
            request_id = %request_id,
            topic = %reply_to,
            error = %e,
            "Failed to publish response"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{register_builtin, BUILTIN_PROCEDURES};
    use crate::procedure::{InvocationContext, Procedure, ProcedureError};
    use crate::registry::ProcedureRegistry;
    use async_trait::async_trait;
    use relay_transport::InMemoryBroker;
    use relay_types::{ExecutionMetadata, ProcedureCall, RequestId};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn builtin_dispatcher() -> ProcedureDispatcher {
        let mut builder = ProcedureRegistry::builder();
        for name in BUILTIN_PROCEDURES {
            builder = register_builtin(builder, name, "client-1").unwrap();
        }
        ProcedureDispatcher::new(Arc::new(builder.build().unwrap()))
    }

    async fn send(broker: &InMemoryBroker, procedure: &str, params: Value) -> Envelope {
        let envelope = Envelope::new(
            ProcedureCall::new("client-1", procedure, params),
            "gw-replies",
            ExecutionMetadata::default(),
        );
        broker
            .publish(
                "client-1-procedures",
                &envelope.request_id.to_string(),
                envelope.to_bytes().unwrap(),
            )
            .await
            .unwrap();
        envelope
    }

    async fn next_reply(replies: &mut Subscription) -> Response {
        let message = tokio::time::timeout(Duration::from_secs(2), replies.recv())
            .await
            .expect("reply in time")
            .expect("subscription open");
        Response::from_bytes(&message.payload).unwrap()
    }

    #[tokio::test]
    async fn test_replies_to_reply_topic() {
        let broker = Arc::new(InMemoryBroker::with_history());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let handle = ProcedureWorker::new(
            WorkerConfig::new("CLIENT-1"),
            broker.clone(),
            builtin_dispatcher(),
        )
        .start()
        .await
        .unwrap();
        assert_eq!(handle.topics(), ["client-1-procedures"]);

        let sent = send(&broker, "calculateSum", json!({"a": 2, "b": 2})).await;
        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.request_id, sent.request_id);
        assert_eq!(reply.result().unwrap()["sum"], json!(4.0));

        let published = broker.published("gw-replies");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key, sent.request_id.to_string());
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_procedure_still_replies() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let _handle = ProcedureWorker::new(
            WorkerConfig::new("client-1"),
            broker.clone(),
            builtin_dispatcher(),
        )
        .start()
        .await
        .unwrap();

        send(&broker, "missing", json!({})).await;
        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.error_message(), Some("Procedure 'missing' not found"));
    }

    #[tokio::test]
    async fn test_undecodable_message_is_dropped() {
        let broker = Arc::new(InMemoryBroker::with_history());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let _handle = ProcedureWorker::new(
            WorkerConfig::new("client-1"),
            broker.clone(),
            builtin_dispatcher(),
        )
        .start()
        .await
        .unwrap();

        broker
            .publish("client-1-procedures", "junk", b"not json".to_vec())
            .await
            .unwrap();
        let sent = send(&broker, "echo", json!("after")).await;

        // The junk message produced no reply; the next one is answered.
        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.request_id, sent.request_id);
        assert_eq!(broker.published("gw-replies").len(), 1);
    }

    #[tokio::test]
    async fn test_envelope_without_gateway_stamp_is_answered() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let _handle = ProcedureWorker::new(
            WorkerConfig::new("client-1"),
            broker.clone(),
            builtin_dispatcher(),
        )
        .start()
        .await
        .unwrap();

        let id = RequestId::generate();
        let payload = json!({
            "requestId": id,
            "clientType": "client-1",
            "procedureName": "echo",
            "parameters": {"a": 1},
            "replyTo": "gw-replies",
            "metadata": {"userId": "u-1", "tenantId": "t-1"}
        });
        broker
            .publish("client-1-procedures", &id.to_string(), payload.to_string().into_bytes())
            .await
            .unwrap();

        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.request_id, id);
        assert_eq!(reply.result(), Some(&json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_malformed_envelope_with_reply_topic_gets_failure() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let _handle = ProcedureWorker::new(
            WorkerConfig::new("client-1"),
            broker.clone(),
            builtin_dispatcher(),
        )
        .start()
        .await
        .unwrap();

        let id = RequestId::generate();
        let payload = json!({"requestId": id, "replyTo": "gw-replies", "procedureName": 7});
        broker
            .publish("client-1-procedures", &id.to_string(), payload.to_string().into_bytes())
            .await
            .unwrap();

        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.request_id, id);
        assert!(reply.error_message().unwrap().starts_with("Invalid envelope: "));
    }

    #[tokio::test]
    async fn test_strict_pool_rejects_null_parameters() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let _handle = ProcedureWorker::new(
            WorkerConfig::new("client-1").with_strict_parameters(true),
            broker.clone(),
            builtin_dispatcher(),
        )
        .start()
        .await
        .unwrap();

        send(&broker, "healthCheck", Value::Null).await;
        let reply = next_reply(&mut replies).await;
        assert!(reply
            .error_message()
            .unwrap()
            .starts_with("Invalid parameters for procedure 'healthCheck'"));

        send(&broker, "healthCheck", json!({})).await;
        assert!(next_reply(&mut replies).await.is_success());
    }

    #[tokio::test]
    async fn test_extra_topics_keep_routed_topic() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let mut config = WorkerConfig::new("client-1");
        config.topics = vec!["legacy-calls".into()];
        let handle = ProcedureWorker::new(config, broker.clone(), builtin_dispatcher())
            .start()
            .await
            .unwrap();
        assert_eq!(handle.topics(), ["client-1-procedures", "legacy-calls"]);

        let sent = send(&broker, "echo", json!("routed")).await;
        assert_eq!(next_reply(&mut replies).await.request_id, sent.request_id);
    }

    struct Gauge {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Procedure for Gauge {
        type Params = Value;
        type Output = Value;

        async fn execute(&self, p: Value, _ctx: InvocationContext) -> Result<Value, ProcedureError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(p)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let peak = Arc::new(AtomicUsize::new(0));
        let registry = ProcedureRegistry::builder()
            .register(
                "gauge",
                Gauge {
                    current: Arc::new(AtomicUsize::new(0)),
                    peak: peak.clone(),
                },
            )
            .build()
            .unwrap();

        let broker = Arc::new(InMemoryBroker::new());
        let mut replies = broker.subscribe("gw-replies", "gw").await.unwrap();
        let _handle = ProcedureWorker::new(
            WorkerConfig::new("client-1").with_concurrency(2),
            broker.clone(),
            ProcedureDispatcher::new(Arc::new(registry)),
        )
        .start()
        .await
        .unwrap();

        for i in 0..8 {
            send(&broker, "gauge", json!(i)).await;
        }
        for _ in 0..8 {
            assert!(next_reply(&mut replies).await.is_success());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let broker = Arc::new(InMemoryBroker::new());
        let result = ProcedureWorker::new(
            WorkerConfig::new("client-1").with_concurrency(0),
            broker,
            builtin_dispatcher(),
        )
        .start()
        .await;
        assert!(matches!(result, Err(WorkerError::InvalidConfig(_))));
    }
}
