//! Start-up readiness wait
//!
//! A freshly started gateway may see an empty registry until the registry
//! client completes its first fetch. Waiting briefly avoids rejecting the
//! first calls with `ServiceNotFound`.

use crate::discovery::ServiceDiscovery;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Poll `discovery` until it reports at least one service or `max_wait`
/// elapses. Returns whether the registry was populated in time. A `max_wait`
/// too large to represent as a deadline waits until the registry fills.
pub async fn wait_until_populated(
    discovery: &dyn ServiceDiscovery,
    max_wait: Duration,
    interval: Duration,
) -> bool {
    let deadline = Instant::now().checked_add(max_wait);
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        match discovery.list_services().await {
            Ok(services) if !services.is_empty() => {
                info!(count = services.len(), ?services, "Service registry is ready");
                return true;
            }
            Ok(_) => debug!(attempt, "Service registry still empty"),
            Err(e) => warn!(attempt, error = %e, "Error checking service registry"),
        }

        let next_poll = Instant::now().checked_add(interval);
        let out_of_time = match (deadline, next_poll) {
            (Some(deadline), Some(next_poll)) => next_poll > deadline,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if out_of_time {
            warn!(
                max_wait_ms = max_wait.as_millis() as u64,
                "Service registry still empty; discovery may fail until services register"
            );
            return false;
        }
        sleep(interval).await;
    }
}
