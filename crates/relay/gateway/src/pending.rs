//! Pending request table
//!
//! Correlates in-flight request ids with the oneshot senders their callers
//! wait on. Every terminal path (reply, timeout, publish failure, caller
//! cancellation) goes through `DashMap::remove`, so exactly one of them takes
//! the sender and the others observe an absent entry.

use crate::error::{GatewayError, GatewayResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use relay_types::{RequestId, Response};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Completion = oneshot::Sender<GatewayResult<Response>>;

/// Counters for terminal transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingStats {
    pub in_flight: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub interrupted: u64,
    /// Replies that arrived for no pending entry (late or duplicate)
    pub dropped_replies: u64,
}

#[derive(Default)]
struct Inner {
    entries: DashMap<RequestId, Completion>,
    completed: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    interrupted: AtomicU64,
    dropped_replies: AtomicU64,
}

impl Inner {
    fn take(&self, request_id: &RequestId) -> Option<Completion> {
        self.entries.remove(request_id).map(|(_, completion)| completion)
    }
}

/// Concurrent map of in-flight calls. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct PendingRequestTable {
    inner: Arc<Inner>,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `request_id` and return the handle its caller awaits.
    pub fn create(&self, request_id: RequestId) -> GatewayResult<PendingHandle> {
        match self.inner.entries.entry(request_id) {
            Entry::Occupied(_) => {
                warn!(request_id = %request_id, "Request already in flight");
                Err(GatewayError::DuplicateRequest(request_id))
            }
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                slot.insert(sender);
                debug!(request_id = %request_id, "Pending request registered");
                Ok(PendingHandle {
                    request_id,
                    receiver,
                    table: self.inner.clone(),
                })
            }
        }
    }

    /// Resolve the matching entry with `response`.
    ///
    /// Returns `false` when no entry exists: the call already timed out,
    /// failed, was cancelled, or this is a duplicate reply.
    pub fn complete(&self, response: Response) -> bool {
        let request_id = response.request_id;
        match self.inner.take(&request_id) {
            Some(completion) => {
                self.inner.completed.fetch_add(1, Ordering::Relaxed);
                if completion.send(Ok(response)).is_err() {
                    debug!(request_id = %request_id, "Caller went away before the reply");
                }
                true
            }
            None => {
                self.inner.dropped_replies.fetch_add(1, Ordering::Relaxed);
                warn!(
                    request_id = %request_id,
                    "Reply for unknown request, possibly timed out or duplicate"
                );
                false
            }
        }
    }

    /// Expire the entry with a `Timeout`, if it is still pending.
    pub fn timeout_expire(&self, request_id: RequestId, deadline: Duration) -> bool {
        match self.inner.take(&request_id) {
            Some(completion) => {
                self.inner.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(
                    request_id = %request_id,
                    timeout_ms = deadline.as_millis() as u64,
                    "Request timed out"
                );
                let _ = completion.send(Err(GatewayError::Timeout {
                    request_id,
                    timeout_ms: deadline.as_millis() as u64,
                }));
                true
            }
            None => false,
        }
    }

    /// Resolve the entry with `error`, if it is still pending.
    pub fn fail(&self, request_id: RequestId, error: GatewayError) -> bool {
        match self.inner.take(&request_id) {
            Some(completion) => {
                self.inner.failed.fetch_add(1, Ordering::Relaxed);
                let _ = completion.send(Err(error));
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.inner.entries.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn stats(&self) -> PendingStats {
        PendingStats {
            in_flight: self.inner.entries.len() as u64,
            completed: self.inner.completed.load(Ordering::Relaxed),
            timed_out: self.inner.timed_out.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            interrupted: self.inner.interrupted.load(Ordering::Relaxed),
            dropped_replies: self.inner.dropped_replies.load(Ordering::Relaxed),
        }
    }
}

/// Completion handle for one in-flight call.
///
/// Resolves to the reply or to the error that ended the call. Dropping it
/// before resolution removes the entry, so a later reply is dropped.
pub struct PendingHandle {
    request_id: RequestId,
    receiver: oneshot::Receiver<GatewayResult<Response>>,
    table: Arc<Inner>,
}

impl PendingHandle {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

impl Future for PendingHandle {
    type Output = GatewayResult<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let request_id = self.request_id;
        self.receiver.poll_unpin(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(GatewayError::Interrupted { request_id }),
        })
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        if self.table.take(&self.request_id).is_some() {
            self.table.interrupted.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %self.request_id, "Caller cancelled; pending entry purged");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_complete_resolves_handle() {
        let table = PendingRequestTable::new();
        let id = RequestId::generate();
        let handle = table.create(id).unwrap();
        assert!(table.contains(&id));

        assert!(table.complete(Response::success(id, json!("ok"))));
        let response = handle.await.unwrap();
        assert_eq!(response.result(), Some(&json!("ok")));
        assert!(table.is_empty());
        assert_eq!(table.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_second_completion_is_noop() {
        let table = PendingRequestTable::new();
        let id = RequestId::generate();
        let handle = table.create(id).unwrap();

        assert!(table.complete(Response::success(id, json!(1))));
        assert!(!table.complete(Response::success(id, json!(2))));

        assert_eq!(handle.await.unwrap().result(), Some(&json!(1)));
        let stats = table.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.dropped_replies, 1);
    }

    #[tokio::test]
    async fn test_timeout_then_late_reply() {
        let table = PendingRequestTable::new();
        let id = RequestId::generate();
        let handle = table.create(id).unwrap();

        assert!(table.timeout_expire(id, Duration::from_millis(40)));
        assert!(!table.complete(Response::success(id, json!("late"))));

        match handle.await {
            Err(GatewayError::Timeout {
                request_id,
                timeout_ms,
            }) => {
                assert_eq!(request_id, id);
                assert_eq!(timeout_ms, 40);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let stats = table.stats();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.dropped_replies, 1);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn test_fail_resolves_with_error() {
        let table = PendingRequestTable::new();
        let id = RequestId::generate();
        let handle = table.create(id).unwrap();

        assert!(table.fail(
            id,
            GatewayError::BrokerPublish {
                request_id: id,
                topic: "t".into(),
                reason: "down".into(),
            }
        ));
        assert!(!table.timeout_expire(id, Duration::from_secs(1)));
        assert!(matches!(handle.await, Err(GatewayError::BrokerPublish { .. })));
    }

    #[test]
    fn test_duplicate_in_flight_rejected() {
        let table = PendingRequestTable::new();
        let id = RequestId::generate();
        let _handle = table.create(id).unwrap();

        assert!(matches!(
            table.create(id),
            Err(GatewayError::DuplicateRequest(dup)) if dup == id
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_dropping_handle_purges_entry() {
        let table = PendingRequestTable::new();
        let id = RequestId::generate();
        let handle = table.create(id).unwrap();
        drop(handle);

        assert!(table.is_empty());
        assert!(!table.complete(Response::success(id, json!(null))));
        let stats = table.stats();
        assert_eq!(stats.interrupted, 1);
        assert_eq!(stats.dropped_replies, 1);
    }

    #[test]
    fn test_id_reusable_after_resolution() {
        let table = PendingRequestTable::new();
        let id = RequestId::generate();
        let _first = table.create(id).unwrap();
        table.complete(Response::success(id, json!(1)));

        assert!(table.create(id).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_terminals_resolve_once() {
        let table = PendingRequestTable::new();

        for _ in 0..200 {
            let id = RequestId::generate();
            let handle = table.create(id).unwrap();

            let completer = {
                let table = table.clone();
                tokio::spawn(async move { table.complete(Response::success(id, json!("r"))) })
            };
            let expirer = {
                let table = table.clone();
                tokio::spawn(async move { table.timeout_expire(id, Duration::from_millis(1)) })
            };
            let failer = {
                let table = table.clone();
                tokio::spawn(async move {
                    table.fail(id, GatewayError::Interrupted { request_id: id })
                })
            };

            let wins = [
                completer.await.unwrap(),
                expirer.await.unwrap(),
                failer.await.unwrap(),
            ];
            assert_eq!(wins.iter().filter(|w| **w).count(), 1);

            // The handle sees whichever transition won, and only that one.
            let _ = handle.await;
            assert!(!table.contains(&id));
        }

        let stats = table.stats();
        assert_eq!(stats.completed + stats.timed_out + stats.failed, 200);
        assert_eq!(stats.in_flight, 0);
    }
}
