//! Worker pool configuration

use crate::coercion::ParameterCoercer;
use relay_types::{request_topic, service_name, DEFAULT_TOPIC_SUFFIX};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one worker pool replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Logical pool name (client type), e.g. `CLIENT-1`
    pub service: String,

    /// Extra topics to consume besides the pool's derived request topic
    #[serde(default)]
    pub topics: Vec<String>,

    /// Consumer group; defaults to `worker-<service>`
    #[serde(default)]
    pub consumer_group: Option<String>,

    /// Maximum concurrent dispatches
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-execution budget in milliseconds; unbounded when absent
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,

    #[serde(default = "default_topic_suffix")]
    pub topic_suffix: String,

    /// Reject `null` parameters instead of retrying them as `{}`
    #[serde(default)]
    pub strict_parameters: bool,
}

fn default_concurrency() -> usize {
    3
}

fn default_topic_suffix() -> String {
    DEFAULT_TOPIC_SUFFIX.to_string()
}

impl WorkerConfig {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            topics: Vec::new(),
            consumer_group: None,
            concurrency: default_concurrency(),
            execution_timeout_ms: None,
            topic_suffix: default_topic_suffix(),
            strict_parameters: false,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_strict_parameters(mut self, strict: bool) -> Self {
        self.strict_parameters = strict;
        self
    }

    /// Topics this pool consumes. The derived request topic always comes
    /// first, since it is the only one gateways route to.
    pub fn topics(&self) -> Vec<String> {
        let mut topics = vec![request_topic(&self.service, &self.topic_suffix)];
        for topic in &self.topics {
            if !topics.contains(topic) {
                topics.push(topic.clone());
            }
        }
        topics
    }

    pub fn consumer_group(&self) -> String {
        self.consumer_group
            .clone()
            .unwrap_or_else(|| format!("worker-{}", service_name(&self.service)))
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }

    pub fn coercer(&self) -> ParameterCoercer {
        if self.strict_parameters {
            ParameterCoercer::strict()
        } else {
            ParameterCoercer::new()
        }
    }
}
