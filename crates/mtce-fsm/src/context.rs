//! The explicit context object threaded through the dispatcher (spec §9
//! design note: "Process-wide singletons (`get_mtcInv_ptr`, `get_sockPtr`,
//! `get_eventPtr`, etc.). Replace with an explicit context object threaded
//! through the event loop"). One `HandlerContext` is built at startup and
//! shared (via `Arc`) by the dispatcher and every background task.

use crate::fit::FitConfig;
use crate::handlers::{bm, offline};
use crate::stage::NodeStageState;
use dashmap::DashMap;
use mtce_alarm::AlarmStore;
use mtce_bmc::BmcWorkerPool;
use mtce_command::CommandFifo;
use mtce_messaging::AckWaiter;
use mtce_registry::NodeRegistry;
use mtce_timer::TimerService;
use mtce_workqueue::{HttpExecutor, WorkQueue};
use std::sync::Arc;

/// Auto-recovery threshold bookkeeping (spec §4.9 `C9`) lives in
/// `mtce-fleet`, which this crate does not depend on; the dispatcher talks
/// to it only through this trait so `mtce-fsm` stays agnostic of the fleet
/// crate's own clock/cause types.
pub trait AutoRecoveryHook: Send + Sync {
    /// Record one more consecutive enable-handler failure for `handle`.
    /// Returns `true` once that cause is at or past the configured
    /// threshold (whether this call just tripped it or it was already
    /// tripped), `false` while still under threshold.
    fn record_enable_failure(&self, handle: mtce_common::NodeHandle) -> bool;

    /// A successful enable resets the consecutive-failure count.
    fn record_enable_success(&self, handle: mtce_common::NodeHandle);

    /// An admin lock/unlock re-enables recovery for `handle` (spec §4.9:
    /// "A subsequent admin lock/unlock re-enables recovery").
    fn reset_on_admin_action(&self, handle: mtce_common::NodeHandle);
}

/// Per-node runtime side tables that don't belong on `NodeRecord` itself
/// (spec §9: "owned by the node record" in spirit — kept here, keyed by
/// handle, so `mtce-registry` stays free of a dependency on every handler
/// module).
pub struct HandlerContext<E: HttpExecutor> {
    pub registry: Arc<NodeRegistry>,
    pub timers: Arc<TimerService>,
    pub workqueue: Arc<WorkQueue<E>>,
    pub bmc: Arc<BmcWorkerPool>,
    pub commands: Arc<CommandFifo>,
    pub alarms: Arc<AlarmStore>,
    pub ack_waiter: Arc<AckWaiter>,
    pub fit: FitConfig,
    /// Base URL for inventory PATCH requests built by `mtce_workqueue::patch`.
    pub inventory_base: String,

    pub stage_states: DashMap<mtce_common::NodeHandle, NodeStageState>,
    pub offline_trackers: DashMap<mtce_common::NodeHandle, offline::OfflineTracker>,
    pub bm_liveness: DashMap<mtce_common::NodeHandle, bm::BmLiveness>,

    pub auto_recovery: Option<Arc<dyn AutoRecoveryHook>>,
    /// Nodes the hook has reported as past the auto-recovery threshold,
    /// consulted by the enable handler so a `Failure` stage only feeds
    /// `RetriesExhausted` instead of a plain `Tick`.
    auto_recovery_exhausted: DashMap<mtce_common::NodeHandle, ()>,
}

impl<E: HttpExecutor> HandlerContext<E> {
    pub fn new(
        registry: Arc<NodeRegistry>,
        timers: Arc<TimerService>,
        workqueue: Arc<WorkQueue<E>>,
        bmc: Arc<BmcWorkerPool>,
        commands: Arc<CommandFifo>,
        alarms: Arc<AlarmStore>,
        ack_waiter: Arc<AckWaiter>,
    ) -> Self {
        Self {
            registry,
            timers,
            workqueue,
            bmc,
            commands,
            alarms,
            ack_waiter,
            fit: FitConfig::disabled(),
            inventory_base: String::new(),
            stage_states: DashMap::new(),
            offline_trackers: DashMap::new(),
            bm_liveness: DashMap::new(),
            auto_recovery: None,
            auto_recovery_exhausted: DashMap::new(),
        }
    }

    pub fn with_fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_inventory_base(mut self, base: impl Into<String>) -> Self {
        self.inventory_base = base.into();
        self
    }

    pub fn with_auto_recovery(mut self, hook: Arc<dyn AutoRecoveryHook>) -> Self {
        self.auto_recovery = Some(hook);
        self
    }

    /// Feed one more consecutive enable failure to the hook (if any) and
    /// remember whether it's now past threshold.
    pub fn note_enable_failure(&self, handle: mtce_common::NodeHandle) {
        let Some(hook) = &self.auto_recovery else { return };
        if hook.record_enable_failure(handle) {
            self.auto_recovery_exhausted.insert(handle, ());
        }
    }

    pub fn note_enable_success(&self, handle: mtce_common::NodeHandle) {
        if let Some(hook) = &self.auto_recovery {
            hook.record_enable_success(handle);
        }
        self.auto_recovery_exhausted.remove(&handle);
    }

    /// Consume the exhausted flag for `handle`: returns `true` at most once
    /// per `note_enable_failure` call that tripped it.
    pub fn take_auto_recovery_exhausted(&self, handle: mtce_common::NodeHandle) -> bool {
        self.auto_recovery_exhausted.remove(&handle).is_some()
    }

    pub fn note_admin_action_reset(&self, handle: mtce_common::NodeHandle) {
        if let Some(hook) = &self.auto_recovery {
            hook.reset_on_admin_action(handle);
        }
        self.auto_recovery_exhausted.remove(&handle);
    }

    /// Offline-liveness tracker for `handle`, created with
    /// `offline_threshold` the first time it's touched.
    pub fn offline_tracker(
        &self,
        handle: mtce_common::NodeHandle,
        offline_threshold: u32,
    ) -> dashmap::mapref::one::RefMut<'_, mtce_common::NodeHandle, offline::OfflineTracker> {
        self.offline_trackers
            .entry(handle)
            .or_insert_with(|| offline::OfflineTracker::new(offline_threshold))
    }

    pub fn bm_liveness(
        &self,
        handle: mtce_common::NodeHandle,
    ) -> dashmap::mapref::one::RefMut<'_, mtce_common::NodeHandle, bm::BmLiveness> {
        self.bm_liveness.entry(handle).or_insert_with(bm::BmLiveness::new)
    }

    pub fn stage_state(
        &self,
        handle: mtce_common::NodeHandle,
    ) -> dashmap::mapref::one::RefMut<'_, mtce_common::NodeHandle, NodeStageState> {
        self.stage_states.entry(handle).or_insert_with(NodeStageState::idle)
    }

    /// Drop every per-node side table entry for `handle` (spec §5: "no
    /// node is freed while ... its stage state, timers, or BMC worker slot
    /// are not quiesced" — the caller is responsible for having drained
    /// those first; this just releases the bookkeeping).
    pub fn forget(&self, handle: mtce_common::NodeHandle) {
        self.stage_states.remove(&handle);
        self.offline_trackers.remove(&handle);
        self.bm_liveness.remove(&handle);
        self.auto_recovery_exhausted.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtce_common::NodeHandle;
    use mtce_workqueue::ReqwestExecutor;

    fn ctx() -> HandlerContext<ReqwestExecutor> {
        HandlerContext::new(
            Arc::new(NodeRegistry::new()),
            Arc::new(TimerService::new()),
            Arc::new(WorkQueue::new(Arc::new(ReqwestExecutor::new()))),
            Arc::new(BmcWorkerPool::new(std::env::temp_dir())),
            Arc::new(CommandFifo::new()),
            Arc::new(AlarmStore::new()),
            Arc::new(AckWaiter::new()),
        )
    }

    #[test]
    fn stage_state_is_lazily_created_idle() {
        let ctx = ctx();
        let state = ctx.stage_state(NodeHandle(1));
        assert_eq!(state.union, crate::stage::StageUnion::Idle);
    }

    #[test]
    fn forget_clears_every_side_table() {
        let ctx = ctx();
        let h = NodeHandle(1);
        ctx.stage_state(h);
        ctx.offline_tracker(h, 3);
        ctx.bm_liveness(h);
        ctx.forget(h);
        assert!(ctx.stage_states.is_empty());
        assert!(ctx.offline_trackers.is_empty());
        assert!(ctx.bm_liveness.is_empty());
    }

    struct CountingHook {
        threshold: u32,
        failures: std::sync::atomic::AtomicU32,
        reset_calls: std::sync::atomic::AtomicU32,
    }

    impl AutoRecoveryHook for CountingHook {
        fn record_enable_failure(&self, _handle: mtce_common::NodeHandle) -> bool {
            let n = self.failures.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            n >= self.threshold
        }

        fn record_enable_success(&self, _handle: mtce_common::NodeHandle) {
            self.failures.store(0, std::sync::atomic::Ordering::SeqCst);
        }

        fn reset_on_admin_action(&self, _handle: mtce_common::NodeHandle) {
            self.reset_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn auto_recovery_exhausted_flag_is_set_once_threshold_is_hit_and_consumed_once() {
        let hook = Arc::new(CountingHook {
            threshold: 2,
            failures: std::sync::atomic::AtomicU32::new(0),
            reset_calls: std::sync::atomic::AtomicU32::new(0),
        });
        let ctx = ctx().with_auto_recovery(hook);
        let h = NodeHandle(7);

        ctx.note_enable_failure(h);
        assert!(!ctx.take_auto_recovery_exhausted(h));

        ctx.note_enable_failure(h);
        assert!(ctx.take_auto_recovery_exhausted(h));
        // Consumed: a second read without another failure sees nothing.
        assert!(!ctx.take_auto_recovery_exhausted(h));
    }

    #[test]
    fn success_and_admin_reset_clear_the_exhausted_flag() {
        let hook = Arc::new(CountingHook {
            threshold: 1,
            failures: std::sync::atomic::AtomicU32::new(0),
            reset_calls: std::sync::atomic::AtomicU32::new(0),
        });
        let ctx = ctx().with_auto_recovery(hook);
        let h = NodeHandle(9);

        ctx.note_enable_failure(h);
        ctx.note_enable_success(h);
        assert!(!ctx.take_auto_recovery_exhausted(h));

        ctx.note_enable_failure(h);
        ctx.note_admin_action_reset(h);
        assert!(!ctx.take_auto_recovery_exhausted(h));
    }
}
