//! Gateway configuration

use relay_types::{reply_topic, DEFAULT_TOPIC_SUFFIX};
use std::time::Duration;

/// Gateway instance settings.
///
/// The reply topic is derived from the instance id once, here, and never
/// recomputed per call.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    instance_id: String,
    pub request_timeout_ms: u64,
    pub topic_suffix: String,
    reply_topic: String,
}

/// Default deadline for a call
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

impl GatewayConfig {
    pub fn new(instance_id: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        Self {
            reply_topic: reply_topic(&instance_id),
            instance_id,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            topic_suffix: DEFAULT_TOPIC_SUFFIX.to_string(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_topic_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.topic_suffix = suffix.into();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Private topic this instance consumes replies from.
    pub fn reply_topic(&self) -> &str {
        &self.reply_topic
    }

    /// Consumer group for the reply topic: the instance itself.
    pub fn reply_group(&self) -> &str {
        &self.instance_id
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
