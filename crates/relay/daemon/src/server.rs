//! Server setup and lifecycle management
//!
//! Wires one gateway instance to an in-memory broker and discovery registry,
//! with the configured worker pools embedded in the same process.

use crate::api::create_router;
use crate::api::rest::state::{AppState, PoolInfo};
use crate::config::{DaemonConfig, WorkerPoolConfig};
use crate::error::{DaemonError, DaemonResult};
use axum::Router;
use relay_discovery::{wait_until_populated, InMemoryDiscovery, InstanceId};
use relay_gateway::{ProcedureRouter, ReplyListener};
use relay_transport::InMemoryBroker;
use relay_types::service_name;
use relay_worker::builtin::register_builtin;
use relay_worker::{ProcedureDispatcher, ProcedureRegistry, ProcedureWorker, WorkerHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Replica {
    instance_id: InstanceId,
    handle: WorkerHandle,
}

struct RunningPool {
    service: String,
    replicas: Vec<Replica>,
}

/// Relay daemon server
pub struct Server {
    config: DaemonConfig,
    discovery: Arc<InMemoryDiscovery>,
    listener: ReplyListener,
    pools: Vec<RunningPool>,
    state: AppState,
}

impl Server {
    /// Start the gateway, its reply listener and the embedded worker pools.
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let broker = Arc::new(InMemoryBroker::new());
        let discovery = Arc::new(InMemoryDiscovery::new());

        let gateway_config = config.gateway.to_gateway_config();
        let router = ProcedureRouter::new(gateway_config, broker.clone(), discovery.clone());
        let listener =
            ReplyListener::start(router.config(), &*broker, router.pending().clone()).await?;

        let mut pools = Vec::new();
        let mut pool_infos = Vec::new();
        for pool in &config.workers {
            let (running, info) =
                start_pool(pool, &config.gateway.topic_suffix, &broker, &discovery).await?;
            pools.push(running);
            pool_infos.push(info);
        }

        if !config.workers.is_empty() {
            wait_until_populated(
                &*discovery,
                config.gateway.readiness_wait(),
                READINESS_POLL_INTERVAL,
            )
            .await;
        }

        let state = AppState::new(router, discovery.clone(), pool_infos);
        Ok(Self {
            config,
            discovery,
            listener,
            pools,
            state,
        })
    }

    /// HTTP application for this server.
    pub fn app(&self) -> Router {
        create_router(self.state.clone(), self.config.server.enable_cors)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn discovery(&self) -> &InMemoryDiscovery {
        &self.discovery
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = self.app();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            %addr,
            instance_id = %self.state.router.config().instance_id(),
            reply_topic = %self.state.router.config().reply_topic(),
            "Relay daemon listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Relay daemon shutting down");
        self.shutdown();
        Ok(())
    }

    /// Deregister and stop every replica, then the reply listener.
    pub fn shutdown(self) {
        for pool in self.pools {
            for replica in pool.replicas {
                if let Err(e) = self
                    .discovery
                    .deregister(&pool.service, &replica.instance_id)
                {
                    tracing::warn!(service = %pool.service, error = %e, "Deregistration failed");
                }
                replica.handle.shutdown();
            }
        }
        self.listener.shutdown();
    }
}

async fn start_pool(
    pool: &WorkerPoolConfig,
    topic_suffix: &str,
    broker: &Arc<InMemoryBroker>,
    discovery: &InMemoryDiscovery,
) -> DaemonResult<(RunningPool, PoolInfo)> {
    let mut builder = ProcedureRegistry::builder();
    for name in &pool.procedures {
        builder = register_builtin(builder, name, &pool.service)?;
    }
    let registry = Arc::new(builder.build()?);
    let worker_config = pool.worker_config(topic_suffix);

    let mut replicas = Vec::with_capacity(pool.replicas);
    for _ in 0..pool.replicas {
        let dispatcher = ProcedureDispatcher::new(registry.clone());
        let handle = ProcedureWorker::new(worker_config.clone(), broker.clone(), dispatcher)
            .start()
            .await?;
        let instance_id = InstanceId::generate();
        discovery.register(&pool.service, instance_id.clone())?;
        replicas.push(Replica {
            instance_id,
            handle,
        });
    }

    if replicas.is_empty() {
        tracing::warn!(service = %pool.service, "Pool configured with zero replicas");
    }

    let info = PoolInfo {
        service: service_name(&pool.service),
        topics: worker_config.topics(),
        replicas: replicas.len(),
        concurrency: worker_config.concurrency,
        procedures: registry.descriptors(),
    };
    Ok((
        RunningPool {
            service: pool.service.clone(),
            replicas,
        },
        info,
    ))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
