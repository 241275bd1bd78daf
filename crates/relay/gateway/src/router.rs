//! Procedure router
//!
//! Orchestrates one call: resolve topic, register pending handle, publish in
//! the background, await the handle up to the deadline.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::pending::PendingRequestTable;
use crate::resolver::TopicResolver;
use futures::FutureExt;
use relay_discovery::ServiceDiscovery;
use relay_transport::MessageBroker;
use relay_types::{Envelope, ExecutionMetadata, ProcedureCall, RequestId, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Gateway-side entry point for procedure calls. Clones share state.
#[derive(Clone)]
pub struct ProcedureRouter {
    config: Arc<GatewayConfig>,
    resolver: TopicResolver,
    broker: Arc<dyn MessageBroker>,
    pending: PendingRequestTable,
}

impl ProcedureRouter {
    pub fn new(
        config: GatewayConfig,
        broker: Arc<dyn MessageBroker>,
        discovery: Arc<dyn ServiceDiscovery>,
    ) -> Self {
        let resolver = TopicResolver::new(discovery, config.topic_suffix.clone());
        Self {
            config: Arc::new(config),
            resolver,
            broker,
            pending: PendingRequestTable::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Table the reply listener must complete into.
    pub fn pending(&self) -> &PendingRequestTable {
        &self.pending
    }

    /// Call a procedure and wait for its response.
    ///
    /// `Ok` carries the worker's response, successful or not. `Err` means the
    /// call never produced one.
    pub async fn submit(
        &self,
        call: ProcedureCall,
        metadata: ExecutionMetadata,
    ) -> GatewayResult<Response> {
        let envelope = Envelope::new(call, self.config.reply_topic(), metadata);
        self.route(envelope).await
    }

    /// Call with a caller-built envelope, e.g. to reuse a request id.
    ///
    /// `replyTo` is always set to this instance's reply topic. An id that is
    /// still in flight is rejected with `DuplicateRequest`.
    pub async fn submit_envelope(&self, mut envelope: Envelope) -> GatewayResult<Response> {
        envelope.reply_to = self.config.reply_topic().to_string();
        self.route(envelope).await
    }

    /// Start a call on a background task and return immediately.
    pub fn submit_async(&self, call: ProcedureCall, metadata: ExecutionMetadata) -> ResponseFuture {
        let envelope = Envelope::new(call, self.config.reply_topic(), metadata);
        let request_id = envelope.request_id;
        let router = self.clone();

        ResponseFuture {
            request_id,
            task: tokio::spawn(async move { router.route(envelope).await }),
        }
    }

    #[instrument(
        skip(self, envelope),
        fields(
            request_id = %envelope.request_id,
            client_type = %envelope.client_type,
            procedure = %envelope.procedure_name
        )
    )]
    async fn route(&self, envelope: Envelope) -> GatewayResult<Response> {
        if envelope.procedure_name.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "procedure name must not be empty".into(),
            ));
        }

        let topic = self.resolver.resolve(&envelope.client_type).await?;
        let request_id = envelope.request_id;
        let payload = envelope
            .to_bytes()
            .map_err(|e| GatewayError::Encoding(e.to_string()))?;

        let mut handle = self.pending.create(request_id)?;
        info!(topic = %topic, "Sending procedure request");
        self.publish_in_background(topic, request_id, payload);

        let deadline = self.config.request_timeout();
        match tokio::time::timeout(deadline, &mut handle).await {
            Ok(outcome) => outcome,
            Err(_) => {
                // A reply may still win this race; take whichever outcome did.
                self.pending.timeout_expire(request_id, deadline);
                handle.await
            }
        }
    }

    fn publish_in_background(&self, topic: String, request_id: RequestId, payload: Vec<u8>) {
        let broker = self.broker.clone();
        let pending = self.pending.clone();

        tokio::spawn(async move {
            match broker
                .publish(&topic, &request_id.to_string(), payload)
                .await
            {
                Ok(receipt) => debug!(
                    request_id = %request_id,
                    topic = %receipt.topic,
                    partition = receipt.partition,
                    offset = receipt.offset,
                    "Request published"
                ),
                Err(e) => {
                    error!(request_id = %request_id, topic = %topic, error = %e, "Publish failed");
                    pending.fail(
                        request_id,
                        GatewayError::BrokerPublish {
                            request_id,
                            topic,
                            reason: e.to_string(),
                        },
                    );
                }
            }
        });
    }
}

/// Result of [`ProcedureRouter::submit_async`].
///
/// Dropping it cancels the call and purges its pending entry.
pub struct ResponseFuture {
    request_id: RequestId,
    task: JoinHandle<GatewayResult<Response>>,
}

impl ResponseFuture {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

impl Future for ResponseFuture {
    type Output = GatewayResult<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let request_id = self.request_id;
        self.task.poll_unpin(cx).map(|joined| {
            joined.unwrap_or_else(|_| Err(GatewayError::Interrupted { request_id }))
        })
    }
}

impl Drop for ResponseFuture {
    fn drop(&mut self) {
        self.task.abort();
    }
}
