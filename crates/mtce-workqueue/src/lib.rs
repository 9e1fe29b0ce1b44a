//! Per-node HTTP work-queue (spec §4.4 / component C4).
//!
//! Each node owns a strict FIFO of outbound HTTP requests against
//! inventory, VIM, keystone and the service manager. At most one request
//! per node is ever in flight; on completion the entry moves to a done
//! FIFO until the caller consumes it. Non-critical requests never
//! back-pressure the dispatcher: a failure is logged as a warning and the
//! done FIFO simply records the failure.
//!
//! The executor is a pluggable async step behind a trait seam with a
//! capped retry count; the work/done pair mirrors `workQueue`/`doneQueue`
//! with a cursor (spec §3 "Queues").

pub mod executor;
pub mod patch;
pub mod request;

pub use executor::{HttpExecutor, ReqwestExecutor};
pub use request::{DoneEntry, TargetService, WorkOutcome, WorkRequest};

use dashmap::DashMap;
use mtce_common::{MtceError, NodeHandle};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

struct NodeQueues {
    work: VecDeque<WorkRequest>,
    /// Set while the head of `work` has been dispatched but not yet
    /// resolved; spec §4.4 "at most one in-flight request per node".
    in_flight: bool,
    retries_left: u32,
    done: VecDeque<DoneEntry>,
}

impl NodeQueues {
    fn new() -> Self {
        Self {
            work: VecDeque::new(),
            in_flight: false,
            retries_left: 0,
            done: VecDeque::new(),
        }
    }
}

/// The HTTP work-queue shared by every node (spec §4.4). One instance per
/// daemon, handed to the dispatcher and to every stage handler that needs
/// to enqueue an inventory/VIM/keystone/service-manager request.
pub struct WorkQueue<E: HttpExecutor> {
    queues: DashMap<NodeHandle, NodeQueues>,
    executor: Arc<E>,
}

impl<E: HttpExecutor> WorkQueue<E> {
    pub fn new(executor: Arc<E>) -> Self {
        Self {
            queues: DashMap::new(),
            executor,
        }
    }

    /// Enqueue `request` at the tail of `handle`'s work FIFO (spec §4.4,
    /// §8 "FIFO order" law: two successive enqueues dequeue in the same
    /// order).
    pub fn enqueue(&self, handle: NodeHandle, request: WorkRequest) {
        self.queues
            .entry(handle)
            .or_insert_with(NodeQueues::new)
            .work
            .push_back(request);
    }

    /// True if `handle` has a request currently dispatched and awaiting a
    /// result.
    pub fn is_in_flight(&self, handle: NodeHandle) -> bool {
        self.queues
            .get(&handle)
            .map(|q| q.in_flight)
            .unwrap_or(false)
    }

    /// Advance `handle`'s queue by one step (spec §4.8 dispatcher step 2):
    /// if nothing is in flight, dispatch the head of the work FIFO and
    /// run it to completion against the configured executor, applying the
    /// critical-retry policy before the outcome lands in the done FIFO.
    ///
    /// Retries happen synchronously within this call (constant delay is
    /// the caller's concern if it wants one between attempts; the queue
    /// itself just counts attempts) so that "at most one in-flight
    /// request" holds even mid-retry.
    pub async fn advance(&self, handle: NodeHandle) {
        let request = {
            let mut entry = match self.queues.get_mut(&handle) {
                Some(e) => e,
                None => return,
            };
            if entry.in_flight {
                return;
            }
            let request = match entry.work.pop_front() {
                Some(r) => r,
                None => return,
            };
            entry.in_flight = true;
            entry.retries_left = request.max_retries;
            request
        };

        let op_tag = request.op_tag.clone();
        let mut attempt = 0u32;
        let result = loop {
            match self.executor.execute(&request).await {
                Ok(outcome) => break Ok(outcome),
                Err(e) => {
                    let retries_left = self
                        .queues
                        .get(&handle)
                        .map(|q| q.retries_left)
                        .unwrap_or(0);
                    if !request.non_critical && attempt < retries_left {
                        attempt += 1;
                        debug!(hostname_handle = %handle, op = %op_tag, attempt, "retrying http request");
                        continue;
                    }
                    if request.non_critical {
                        warn!(hostname_handle = %handle, op = %op_tag, error = %e, "non-critical http request failed");
                    }
                    break Err(e);
                }
            }
        };

        if let Some(mut entry) = self.queues.get_mut(&handle) {
            entry.in_flight = false;
            entry.done.push_back(DoneEntry { op_tag, result });
        }
    }

    /// Pop the oldest completed entry for `handle`, if any.
    pub fn pop_done(&self, handle: NodeHandle) -> Option<DoneEntry> {
        self.queues.get_mut(&handle)?.done.pop_front()
    }

    /// Number of requests still queued (not counting one in flight).
    pub fn pending_len(&self, handle: NodeHandle) -> usize {
        self.queues.get(&handle).map(|q| q.work.len()).unwrap_or(0)
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }
}

/// Maps a semantic error that escaped all the way to the done FIFO to the
/// `{status, reason, action}` triple callers can surface; protocol/system
/// errors (timeouts, connection failures) have no such mapping and are
/// just logged (spec §7: "a non-critical HTTP failure -> logged, done-FIFO
/// gets the failure, handler continues").
pub fn rest_failure_for(error: &MtceError) -> Option<mtce_common::error::RestFailure> {
    error.rest_mapping().map(|(_, failure)| failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyExecutor {
        fail_times: AtomicU32,
    }

    #[async_trait]
    impl HttpExecutor for FlakyExecutor {
        async fn execute(&self, _request: &WorkRequest) -> Result<WorkOutcome, MtceError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(MtceError::NotConnected("simulated".into()));
            }
            Ok(WorkOutcome {
                status: 200,
                body: None,
            })
        }
    }

    fn h(n: u64) -> NodeHandle {
        NodeHandle(n)
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let exec = Arc::new(FlakyExecutor {
            fail_times: AtomicU32::new(0),
        });
        let q = WorkQueue::new(exec);
        q.enqueue(
            h(1),
            WorkRequest::new(TargetService::Inventory, reqwest::Method::PATCH, "http://x", "first", "x")
                .non_critical(),
        );
        q.enqueue(
            h(1),
            WorkRequest::new(TargetService::Inventory, reqwest::Method::PATCH, "http://x", "second", "x")
                .non_critical(),
        );
        q.advance(h(1)).await;
        q.advance(h(1)).await;
        assert_eq!(q.pop_done(h(1)).unwrap().op_tag, "first");
        assert_eq!(q.pop_done(h(1)).unwrap().op_tag, "second");
    }

    #[tokio::test]
    async fn critical_request_retries_up_to_cap_then_fails() {
        let exec = Arc::new(FlakyExecutor {
            fail_times: AtomicU32::new(2),
        });
        let q = WorkQueue::new(exec);
        q.enqueue(
            h(1),
            WorkRequest::new(TargetService::Inventory, reqwest::Method::PATCH, "http://x", "force_task", "x")
                .critical(2),
        );
        q.advance(h(1)).await;
        let done = q.pop_done(h(1)).unwrap();
        assert!(done.result.is_ok());
    }

    #[tokio::test]
    async fn non_critical_failure_does_not_block_next_enqueue() {
        let exec = Arc::new(FlakyExecutor {
            fail_times: AtomicU32::new(1),
        });
        let q = WorkQueue::new(exec);
        q.enqueue(
            h(1),
            WorkRequest::new(TargetService::Inventory, reqwest::Method::PATCH, "http://x", "update_uptime", "x")
                .non_critical(),
        );
        q.advance(h(1)).await;
        let done = q.pop_done(h(1)).unwrap();
        assert!(done.result.is_err());
        assert!(!q.is_in_flight(h(1)));
    }
}
