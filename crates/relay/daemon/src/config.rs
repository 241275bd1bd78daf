//! Configuration for relay-daemon

use relay_gateway::config::DEFAULT_REQUEST_TIMEOUT_MS;
use relay_gateway::GatewayConfig;
use relay_types::DEFAULT_TOPIC_SUFFIX;
use relay_worker::builtin::BUILTIN_PROCEDURES;
use relay_worker::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Embedded worker pools
    #[serde(default = "default_workers")]
    pub workers: Vec<WorkerPoolConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gateway: GatewaySettings::default(),
            workers: default_workers(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Instance id; generated at start-up when absent
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Deadline for a call in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Suffix appended to a service name to form its request topic
    #[serde(default = "default_topic_suffix")]
    pub topic_suffix: String,

    /// How long start-up waits for discovery to report a service
    #[serde(default = "default_readiness_wait_ms")]
    pub readiness_wait_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            instance_id: None,
            request_timeout_ms: default_request_timeout_ms(),
            topic_suffix: default_topic_suffix(),
            readiness_wait_ms: default_readiness_wait_ms(),
        }
    }
}

impl GatewaySettings {
    /// Build the gateway configuration, generating an instance id if needed.
    pub fn to_gateway_config(&self) -> GatewayConfig {
        let instance_id = self
            .instance_id
            .clone()
            .unwrap_or_else(|| format!("gateway-{}", uuid::Uuid::new_v4().simple()));

        GatewayConfig::new(instance_id)
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_topic_suffix(self.topic_suffix.clone())
    }

    pub fn readiness_wait(&self) -> Duration {
        Duration::from_millis(self.readiness_wait_ms)
    }
}

/// One embedded worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Logical pool name (client type)
    pub service: String,

    /// Built-in procedures hosted by the pool
    #[serde(default = "default_procedures")]
    pub procedures: Vec<String>,

    /// Number of replicas sharing the pool's consumer group
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Concurrent dispatches per replica
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-execution budget in milliseconds
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,

    /// Reject `null` parameters instead of retrying them as `{}`
    #[serde(default)]
    pub strict_parameters: bool,
}

impl WorkerPoolConfig {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            procedures: default_procedures(),
            replicas: default_replicas(),
            concurrency: default_concurrency(),
            execution_timeout_ms: None,
            strict_parameters: false,
        }
    }

    /// Worker configuration shared by every replica of the pool.
    pub fn worker_config(&self, topic_suffix: &str) -> WorkerConfig {
        let mut config = WorkerConfig::new(self.service.clone()).with_concurrency(self.concurrency);
        config.execution_timeout_ms = self.execution_timeout_ms;
        config.topic_suffix = topic_suffix.to_string();
        config.with_strict_parameters(self.strict_parameters)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_topic_suffix() -> String {
    DEFAULT_TOPIC_SUFFIX.to_string()
}

fn default_readiness_wait_ms() -> u64 {
    2_000
}

fn default_procedures() -> Vec<String> {
    BUILTIN_PROCEDURES.iter().map(|name| name.to_string()).collect()
}

fn default_replicas() -> usize {
    1
}

fn default_concurrency() -> usize {
    3
}

fn default_workers() -> Vec<WorkerPoolConfig> {
    vec![WorkerPoolConfig::new("client-1")]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `RELAY_`-prefixed environment variables (`RELAY_SERVER__LISTEN_ADDR`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.gateway.request_timeout_ms, 30_000);
        assert_eq!(config.workers.len(), 1);
        assert_eq!(config.workers[0].service, "client-1");
        assert_eq!(
            config.workers[0].procedures,
            vec!["echo", "calculateSum", "healthCheck"]
        );
    }

    #[test]
    fn test_generated_instance_id_is_unique() {
        let settings = GatewaySettings::default();
        let a = settings.to_gateway_config();
        let b = settings.to_gateway_config();
        assert_ne!(a.instance_id(), b.instance_id());
        assert!(a.reply_topic().starts_with("gateway-"));
        assert!(a.reply_topic().ends_with("-replies"));
    }

    #[test]
    fn test_fixed_instance_id() {
        let settings = GatewaySettings {
            instance_id: Some("GW 7".into()),
            request_timeout_ms: 500,
            ..Default::default()
        };
        let config = settings.to_gateway_config();
        assert_eq!(config.reply_topic(), "gw-7-replies");
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_pool_worker_config() {
        let mut pool = WorkerPoolConfig::new("Blockly Executor");
        pool.execution_timeout_ms = Some(1_000);
        let worker = pool.worker_config("-calls");
        assert_eq!(worker.topics(), vec!["blockly-executor-calls"]);
        assert_eq!(worker.concurrency, 3);
        assert_eq!(worker.execution_timeout(), Some(Duration::from_secs(1)));
        assert!(!worker.strict_parameters);

        pool.strict_parameters = true;
        assert!(pool.worker_config("-calls").strict_parameters);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.gateway.topic_suffix, "-procedures");
        assert!(config.server.enable_cors);
    }
}
