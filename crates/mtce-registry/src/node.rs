//! The per-host record and the inventory payload used to create/modify it.
//!
//! Field set is grounded in spec §3's "State per node" inventory (hostname,
//! uuid, per-network addresses, personality/node-type, admin/oper/avail
//! triad, degrade mask, retry counters, `mtcAlive_gate`). Fields owned by
//! other crates (stage unions, timers, FIFOs, BMC worker slots) are kept
//! out of this record on purpose: `mtce-fsm`/`mtce-timer`/`mtce-workqueue`/
//! `mtce-bmc` each keep their own `NodeHandle`-keyed side table instead of
//! reaching into this one, so this crate never depends back on them.

use chrono::{DateTime, Utc};
use mtce_common::{
    AdminAction, AdminState, AvailStatus, ConfigAction, DegradeMask, NodeHandle, NodeType,
    OperState, Personality, TaskString,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The inventory-shaped payload carried by an add_host/modify_host call
/// (spec §4.3). Distinct from `NodeRecord`: this is what arrives over the
/// wire (from startup inventory replay or a REST callback); the registry
/// turns it into (or folds it into) a `NodeRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub hostname: String,
    pub uuid: String,
    pub personality: Personality,
    pub node_type: NodeType,
    pub mgmt_ip: String,
    pub mgmt_mac: String,
    pub cluster_host_ip: Option<String>,
    pub pxeboot_ip: Option<String>,
    pub bm_ip: Option<String>,
    pub bm_un: Option<String>,
    pub bm_pw: Option<String>,
    pub bm_type: Option<String>,
}

/// A registered host. Owns the lifecycle triad, the degrade mask, the
/// retry/throttle counters named in spec §3, and the admin-action queue.
/// Does not own timers, FIFOs, or the BMC worker slot — those live in
/// sibling crates keyed by this record's `handle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub handle: NodeHandle,
    pub hostname: String,
    pub uuid: String,
    pub personality: Personality,
    pub node_type: NodeType,
    pub mgmt_ip: String,
    pub mgmt_mac: String,
    pub cluster_host_ip: Option<String>,
    pub pxeboot_ip: Option<String>,
    pub bm_ip: Option<String>,
    pub bm_un: Option<String>,
    pub bm_pw: Option<String>,
    pub bm_type: Option<String>,

    pub admin_state: AdminState,
    pub oper_state: OperState,
    pub avail_status: AvailStatus,
    pub admin_action: AdminAction,
    /// Further admin-action requests append here and run on completion of
    /// the currently-executing one (spec §3 invariant: exactly one
    /// `adminAction` executing per node at a time).
    pub admin_action_todo_list: VecDeque<AdminAction>,
    pub config_action: ConfigAction,
    pub task: TaskString,
    pub degrade_mask: DegradeMask,

    /// While true, inbound mtcAlive for this node is silently dropped by
    /// every stage handler (still counted for diagnostics) — spec §3
    /// liveness-gate invariant.
    pub mtc_alive_gate: bool,
    pub uptime_secs: u64,

    pub retries: u32,
    pub cmd_retries: u32,
    pub http_retries_cur: u32,
    pub power_action_retries: u32,
    pub health_threshold_counter: u32,
    pub graceful_recovery_counter: u32,

    pub alarms_loaded: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeRecord {
    /// Build a fresh, locked, disabled, not-installed record from an
    /// inventory payload. Matches the initial state an `add_host` call
    /// produces (spec §4.3 `add`).
    pub fn from_inventory(handle: NodeHandle, inv: InventoryRecord) -> Self {
        let now = Utc::now();
        Self {
            handle,
            hostname: inv.hostname,
            uuid: inv.uuid,
            personality: inv.personality,
            node_type: inv.node_type,
            mgmt_ip: inv.mgmt_ip,
            mgmt_mac: inv.mgmt_mac,
            cluster_host_ip: inv.cluster_host_ip,
            pxeboot_ip: inv.pxeboot_ip,
            bm_ip: inv.bm_ip,
            bm_un: inv.bm_un,
            bm_pw: inv.bm_pw,
            bm_type: inv.bm_type,
            admin_state: AdminState::Locked,
            oper_state: OperState::Disabled,
            avail_status: AvailStatus::NotInstalled,
            admin_action: AdminAction::None,
            admin_action_todo_list: VecDeque::new(),
            config_action: ConfigAction::None,
            task: TaskString::Provisioning,
            degrade_mask: DegradeMask::NONE,
            mtc_alive_gate: false,
            uptime_secs: 0,
            retries: 0,
            cmd_retries: 0,
            http_retries_cur: 0,
            power_action_retries: 0,
            health_threshold_counter: 0,
            graceful_recovery_counter: 0,
            alarms_loaded: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a later inventory payload into this record in place, leaving
    /// lifecycle/runtime state untouched (spec §4.3 `modify`).
    pub fn apply_inventory(&mut self, inv: InventoryRecord) {
        self.hostname = inv.hostname;
        self.personality = inv.personality;
        self.node_type = inv.node_type;
        self.mgmt_ip = inv.mgmt_ip;
        self.mgmt_mac = inv.mgmt_mac;
        self.cluster_host_ip = inv.cluster_host_ip;
        self.pxeboot_ip = inv.pxeboot_ip;
        self.bm_ip = inv.bm_ip;
        self.bm_un = inv.bm_un;
        self.bm_pw = inv.bm_pw;
        self.bm_type = inv.bm_type;
        self.updated_at = Utc::now();
    }

    /// Spec §3/§8 degrade semantics.
    pub fn is_degraded(&self) -> bool {
        self.degrade_mask
            .implies_degraded(matches!(self.oper_state, OperState::Enabled))
    }
}
