//! Builds the shared runtime state every core crate needs and performs the
//! blocking startup sequence (spec §4.4/§5: "obtain a keystone token
//! before the inventory work queue can issue any PATCH") before the event
//! loop starts ticking.
//!
//! Grounded in `edge::OpenSASEEdge::new`/`init` (construct every manager,
//! then run an async init sequence before the main loop starts),
//! generalized here from one edge appliance's interface/tunnel/security
//! managers to this daemon's registry/timer/workqueue/bmc/command/alarm
//! set plus the `mtce-fleet` controllers.

use crate::config::McsConfig;
use mtce_alarm::AlarmStore;
use mtce_bmc::BmcWorkerPool;
use mtce_command::CommandFifo;
use mtce_fleet::{
    AutoRecoveryTracker, DorController, HeartbeatInterface, MnfaController, ReadinessCoordinator,
};
use mtce_fsm::context::{AutoRecoveryHook, HandlerContext};
use mtce_fsm::dispatcher::Dispatcher;
use mtce_fsm::fit::FitConfig;
use mtce_messaging::AckWaiter;
use mtce_registry::NodeRegistry;
use mtce_timer::TimerService;
use mtce_workqueue::{HttpExecutor, ReqwestExecutor, WorkQueue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("keystone authentication failed: {0}")]
    Auth(String),
    #[error("config error: {0}")]
    Config(#[from] anyhow::Error),
}

/// Fleet-level controllers (component C9), bundled separately from
/// `HandlerContext` because they are keyed by interface/cause rather than
/// by node and carry their own `Instant`-based clocks.
pub struct FleetControllers {
    pub mnfa: parking_lot::Mutex<MnfaController>,
    pub dor: parking_lot::Mutex<DorController>,
    pub readiness: parking_lot::Mutex<ReadinessCoordinator>,
    pub auto_recovery: Arc<parking_lot::Mutex<AutoRecoveryTracker>>,
}

/// Adapts the shared [`AutoRecoveryTracker`] to the narrow trait
/// `mtce-fsm`'s dispatcher talks to, so that crate stays free of a direct
/// dependency on `mtce-fleet` (spec §9 design note on process-wide
/// singletons applies equally to cross-crate coupling here).
struct AutoRecoveryAdapter(Arc<parking_lot::Mutex<AutoRecoveryTracker>>);

impl AutoRecoveryHook for AutoRecoveryAdapter {
    fn record_enable_failure(&self, handle: mtce_common::NodeHandle) -> bool {
        use mtce_fleet::auto_recovery::{Cause, Outcome};
        match self.0.lock().record_failure(handle, Cause::Enable) {
            Outcome::ContinueRetrying => false,
            Outcome::ThresholdExceeded | Outcome::AlreadyDisabled => true,
        }
    }

    fn record_enable_success(&self, handle: mtce_common::NodeHandle) {
        self.0.lock().record_success(handle, mtce_fleet::auto_recovery::Cause::Enable);
    }

    fn reset_on_admin_action(&self, handle: mtce_common::NodeHandle) {
        self.0.lock().reset_on_admin_action(handle);
    }
}

/// The assembled daemon: every `mtce-*` core crate's shared state plus the
/// dispatcher and fleet controllers built from it. Mirrors `OpenSASEEdge`'s
/// role as the struct `main.rs` constructs, initializes, then runs.
pub struct Mtced {
    pub config: McsConfig,
    pub ctx: Arc<HandlerContext<ReqwestExecutor>>,
    pub dispatcher: Arc<Dispatcher<ReqwestExecutor>>,
    pub fleet: Arc<FleetControllers>,
    keystone_token: parking_lot::RwLock<Option<String>>,
}

impl Mtced {
    /// Construct every manager from `config`, unstarted (spec §9:
    /// "replace process-wide singletons with an explicit context object").
    pub fn new(config: McsConfig) -> Self {
        let registry = Arc::new(NodeRegistry::new());
        let timers = Arc::new(TimerService::new());
        let executor = Arc::new(ReqwestExecutor::new());
        let workqueue = Arc::new(WorkQueue::new(executor));
        let bmc = Arc::new(BmcWorkerPool::new(std::path::PathBuf::from(&config.bmc_output_dir)));
        let commands = Arc::new(CommandFifo::new());
        let alarms = Arc::new(AlarmStore::new());
        let ack_waiter = Arc::new(AckWaiter::new());

        let fit = match (&config.fit_code, &config.fit_host) {
            (Some(code), Some(host)) => FitConfig::armed(code.clone(), host.clone()),
            _ => FitConfig::disabled(),
        };

        let auto_recovery = Arc::new(parking_lot::Mutex::new(AutoRecoveryTracker::new(
            config.hbs_failure_threshold,
        )));
        let auto_recovery_hook: Arc<dyn AutoRecoveryHook> =
            Arc::new(AutoRecoveryAdapter(auto_recovery.clone()));

        let ctx = Arc::new(
            HandlerContext::new(registry, timers, workqueue, bmc, commands, alarms, ack_waiter)
                .with_fit(fit)
                .with_inventory_base(config.inventory_base_url.clone())
                .with_auto_recovery(auto_recovery_hook),
        );

        let dispatcher = Arc::new(Dispatcher::new(ctx.clone()));

        let fleet = Arc::new(FleetControllers {
            mnfa: parking_lot::Mutex::new(MnfaController::new(
                config.mnfa_threshold(),
                Duration::from_secs(config.mnfa_recovery_secs),
                Duration::from_secs(config.mnfa_recovery_secs * 4),
            )),
            dor: parking_lot::Mutex::new(DorController::new(Duration::from_secs(
                config.dor_extended_window_secs,
            ))),
            readiness: parking_lot::Mutex::new(ReadinessCoordinator::new()),
            auto_recovery,
        });

        Self {
            config,
            ctx,
            dispatcher,
            fleet,
            keystone_token: parking_lot::RwLock::new(None),
        }
    }

    /// Block on acquiring a keystone token before admitting any inbound
    /// work (spec §4.4: the inventory work queue can't PATCH without one).
    /// Retries are the caller's responsibility; this makes one attempt.
    pub async fn authenticate(&self) -> Result<(), BootstrapError> {
        let client = reqwest::Client::new();
        let resp = client
            .post(&self.config.keystone_auth_url)
            .json(&serde_json::json!({"auth": {"identity": {"methods": ["password"]}}}))
            .send()
            .await
            .map_err(|e| BootstrapError::Auth(e.to_string()))?;

        let token = resp
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| BootstrapError::Auth("response carried no X-Subject-Token header".into()))?;

        *self.keystone_token.write() = Some(token);
        Ok(())
    }

    pub fn keystone_token(&self) -> Option<String> {
        self.keystone_token.read().clone()
    }

    /// Evaluate dead-office recovery against this process's own uptime
    /// (spec §4.9: "activates when the active controller itself comes up
    /// recently"), to be called once right after construction.
    pub fn evaluate_dor(&self, own_uptime: Duration) {
        self.fleet.dor.lock().activate_if_recent_boot(own_uptime, Instant::now());
    }

    pub fn heartbeat_interfaces(&self) -> [HeartbeatInterface; 2] {
        [HeartbeatInterface::Management, HeartbeatInterface::ClusterHost]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn construction_wires_every_manager_without_panicking() {
        let mtced = Mtced::new(McsConfig::default());
        assert!(mtced.keystone_token().is_none());
        assert_eq!(mtced.ctx.registry.handles_in_order().len(), 0);
    }

    #[test]
    fn dor_activates_only_for_a_recent_own_boot() {
        let mtced = Mtced::new(McsConfig::default());
        mtced.evaluate_dor(Duration::from_secs(5));
        assert!(mtced.fleet.dor.lock().is_active(Instant::now()));
    }
}
