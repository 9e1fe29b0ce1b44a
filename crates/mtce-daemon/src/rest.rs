//! The narrow interface the out-of-scope embedded HTTP server calls into
//! (spec §6 "Inbound REST callbacks"). This module does not listen on a
//! socket itself — that server is an external collaborator — it only
//! defines the request/response shapes and handler functions such a
//! server would dispatch into, keyed by the same User-Agent distinction
//! spec §6 names.
//!
//! Grounded in `mtce-registry::registry::NodeRegistry`'s add/modify/delete
//! for the mutating half, and in `mtce_common::MtceError::rest_mapping`
//! for the closed 4xx error-to-reason mapping spec §6/§7 require.

use crate::bootstrap::Mtced;
use mtce_common::{AdminAction, AvailStatus, MtceError, OperState};
use mtce_registry::InventoryRecord;
use serde::{Deserialize, Serialize};

/// The three recognized callers of `PATCH /v1/hosts/<uuid>` (spec §6: "body
/// varies by caller ... distinguished by a User-Agent prefix").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Sysinv,
    Vim,
    ServiceManager,
}

impl Caller {
    /// Parse the `User-Agent` header value, spec §6: "Valid User-Agents:
    /// `sysinv/1.0`, `vim/1.0`, `sm/1.0`. Any other User-Agent yields 403
    /// with a fixed reason string."
    pub fn from_user_agent(ua: &str) -> Option<Self> {
        if ua.starts_with("sysinv/") {
            Some(Caller::Sysinv)
        } else if ua.starts_with("vim/") {
            Some(Caller::Vim)
        } else if ua.starts_with("sm/") {
            Some(Caller::ServiceManager)
        } else {
            None
        }
    }
}

pub const UNRECOGNIZED_USER_AGENT_REASON: &str = "Unrecognized caller; expected sysinv/1.0, vim/1.0 or sm/1.0";
pub const DEGRADE_NOT_SUPPORTED_REASON: &str = "Controlled host degrade not supported";
pub const CLEARED_NOT_SUPPORTED_REASON: &str = "Controlled host severity clear not supported over this interface";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Failed,
    Degraded,
    Cleared,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VimSeverityPatch {
    pub hostname: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub reason: String,
    pub action: String,
}

impl From<MtceError> for ErrorResponse {
    fn from(e: MtceError) -> Self {
        if let MtceError::UnknownHostname(ref uuid) = e {
            return Self {
                status: 404,
                reason: format!("No host found with uuid {}", uuid),
                action: "Verify the uuid and retry.".to_string(),
            };
        }
        match e.rest_mapping() {
            Some((status, failure)) => Self {
                status,
                reason: failure.reason,
                action: failure.action,
            },
            None => Self {
                status: 500,
                reason: e.to_string(),
                action: "Retry; if the problem persists contact support.".to_string(),
            },
        }
    }
}

fn forbidden(reason: &str) -> ErrorResponse {
    ErrorResponse {
        status: 403,
        reason: reason.to_string(),
        action: "retry with a recognized caller identity".to_string(),
    }
}

fn method_not_allowed(reason: &str) -> ErrorResponse {
    ErrorResponse {
        status: 405,
        reason: reason.to_string(),
        action: "no action; the request is not supported".to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HostStateResponse {
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfoResponse {
    pub host_count: usize,
}

/// `POST /v1/hosts` (spec §6): add a host from an inventory-shaped body.
pub fn add_host(daemon: &Mtced, inv: InventoryRecord) -> Result<(), ErrorResponse> {
    daemon.ctx.registry.add(inv).map(|_| ()).map_err(ErrorResponse::from)
}

/// `PATCH /v1/hosts/<uuid>` when the caller is `sysinv` (spec §6): a plain
/// inventory modify.
pub fn modify_host(daemon: &Mtced, uuid: &str, inv: InventoryRecord, user_agent: &str) -> Result<(), ErrorResponse> {
    match Caller::from_user_agent(user_agent) {
        Some(Caller::Sysinv) => {}
        Some(_) => return Err(forbidden(UNRECOGNIZED_USER_AGENT_REASON)),
        None => return Err(forbidden(UNRECOGNIZED_USER_AGENT_REASON)),
    }
    let handle = daemon
        .ctx
        .registry
        .get_by_uuid(uuid)
        .ok_or_else(|| ErrorResponse::from(MtceError::UnknownHostname(uuid.to_string())))?
        .handle;
    daemon.ctx.registry.modify(handle, inv).map(|_| ()).map_err(ErrorResponse::from)
}

/// `PATCH /v1/hosts/<uuid>` when the caller is `vim` (spec §6 "VIM severity
/// sub-protocol"): only `severity: "failed"` is supported; the other two
/// values return 405 with a fixed reason and leave the registry unchanged.
pub fn vim_severity_patch(daemon: &Mtced, uuid: &str, patch: VimSeverityPatch, user_agent: &str) -> Result<(), ErrorResponse> {
    if Caller::from_user_agent(user_agent) != Some(Caller::Vim) {
        return Err(forbidden(UNRECOGNIZED_USER_AGENT_REASON));
    }

    match patch.severity {
        Severity::Degraded => Err(method_not_allowed(DEGRADE_NOT_SUPPORTED_REASON)),
        Severity::Cleared => Err(method_not_allowed(CLEARED_NOT_SUPPORTED_REASON)),
        Severity::Failed => {
            let record = daemon
                .ctx
                .registry
                .get_by_uuid(uuid)
                .ok_or_else(|| ErrorResponse::from(MtceError::UnknownHostname(uuid.to_string())))?;
            daemon.ctx.registry.with_mut(record.handle, |r| {
                r.avail_status = AvailStatus::Failed;
                r.oper_state = OperState::Disabled;
                r.admin_action_todo_list.push_back(AdminAction::Recover);
            });
            Ok(())
        }
    }
}

/// `DELETE /v1/hosts/<uuid>` (spec §6): "queues a delete admin-action"
/// rather than deleting synchronously — the delete handler runs to its
/// terminal stage before the registry actually unlinks the record.
pub fn queue_delete(daemon: &Mtced, uuid: &str) -> Result<(), ErrorResponse> {
    let record = daemon
        .ctx
        .registry
        .get_by_uuid(uuid)
        .ok_or_else(|| ErrorResponse::from(MtceError::UnknownHostname(uuid.to_string())))?;
    daemon.ctx.registry.with_mut(record.handle, |r| {
        r.admin_action_todo_list.push_back(AdminAction::Delete);
    });
    Ok(())
}

/// `GET /v1/hosts/<uuid>` (spec §6): "VIM-only, returns `{"state": ...}`".
pub fn get_host_state(daemon: &Mtced, uuid: &str, user_agent: &str) -> Result<HostStateResponse, ErrorResponse> {
    if Caller::from_user_agent(user_agent) != Some(Caller::Vim) {
        return Err(forbidden(UNRECOGNIZED_USER_AGENT_REASON));
    }
    let record = daemon
        .ctx
        .registry
        .get_by_uuid(uuid)
        .ok_or_else(|| ErrorResponse::from(MtceError::UnknownHostname(uuid.to_string())))?;
    Ok(HostStateResponse {
        state: record.avail_status.as_str().to_string(),
    })
}

/// `GET /v1/systems` (spec §6): "VIM-only, returns system info".
pub fn get_system_info(daemon: &Mtced, user_agent: &str) -> Result<SystemInfoResponse, ErrorResponse> {
    if Caller::from_user_agent(user_agent) != Some(Caller::Vim) {
        return Err(forbidden(UNRECOGNIZED_USER_AGENT_REASON));
    }
    Ok(SystemInfoResponse {
        host_count: daemon.ctx.registry.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McsConfig;
    use mtce_common::{NodeType, Personality};

    fn inv(hostname: &str, uuid: &str) -> InventoryRecord {
        InventoryRecord {
            hostname: hostname.to_string(),
            uuid: uuid.to_string(),
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
        }
    }

    #[test]
    fn unrecognized_user_agent_is_rejected() {
        let daemon = Mtced::new(McsConfig::default());
        daemon.ctx.registry.add(inv("worker-1", "uuid-1")).unwrap();
        let err = modify_host(&daemon, "uuid-1", inv("worker-1", "uuid-1"), "curl/8.0").unwrap_err();
        assert_eq!(err.status, 403);
        assert_eq!(err.reason, UNRECOGNIZED_USER_AGENT_REASON);
    }

    #[test]
    fn vim_degraded_severity_is_rejected_with_405_and_no_mutation() {
        let daemon = Mtced::new(McsConfig::default());
        let handle = daemon.ctx.registry.add(inv("worker-1", "uuid-1")).unwrap();
        let err = vim_severity_patch(
            &daemon,
            "uuid-1",
            VimSeverityPatch {
                hostname: "worker-1".to_string(),
                severity: Severity::Degraded,
            },
            "vim/1.0",
        )
        .unwrap_err();
        assert_eq!(err.status, 405);
        assert_eq!(err.reason, DEGRADE_NOT_SUPPORTED_REASON);
        let record = daemon.ctx.registry.get(handle).unwrap();
        assert!(record.admin_action_todo_list.is_empty());
    }

    #[test]
    fn vim_failed_severity_queues_force_fail() {
        let daemon = Mtced::new(McsConfig::default());
        let handle = daemon.ctx.registry.add(inv("worker-1", "uuid-1")).unwrap();
        vim_severity_patch(
            &daemon,
            "uuid-1",
            VimSeverityPatch {
                hostname: "worker-1".to_string(),
                severity: Severity::Failed,
            },
            "vim/1.0",
        )
        .unwrap();
        let record = daemon.ctx.registry.get(handle).unwrap();
        assert_eq!(record.avail_status, AvailStatus::Failed);
        assert_eq!(record.admin_action_todo_list.front(), Some(&AdminAction::Recover));
    }

    #[test]
    fn get_host_state_requires_vim_caller() {
        let daemon = Mtced::new(McsConfig::default());
        daemon.ctx.registry.add(inv("worker-1", "uuid-1")).unwrap();
        assert!(get_host_state(&daemon, "uuid-1", "sysinv/1.0").is_err());
        assert!(get_host_state(&daemon, "uuid-1", "vim/1.0").is_ok());
    }

    #[test]
    fn delete_is_queued_not_immediate() {
        let daemon = Mtced::new(McsConfig::default());
        let handle = daemon.ctx.registry.add(inv("worker-1", "uuid-1")).unwrap();
        queue_delete(&daemon, "uuid-1").unwrap();
        assert!(daemon.ctx.registry.get(handle).is_some());
        let record = daemon.ctx.registry.get(handle).unwrap();
        assert_eq!(record.admin_action_todo_list.front(), Some(&AdminAction::Delete));
    }
}
