//! Canonical JSON-patch body builders for inventory operations (spec
//! §4.4). Each function returns a ready-to-enqueue `WorkRequest`; callers
//! only need to supply the node's inventory `uuid` and, where relevant,
//! the new value(s).

use crate::request::{TargetService, WorkRequest};
use mtce_common::{AdminState, AvailStatus, OperState};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

fn patch_replace(path: &str, value: Value) -> Value {
    json!([{ "op": "replace", "path": path, "value": value }])
}

fn inventory_url(base: &str, uuid: &str) -> String {
    format!("{}/v1/ihosts/{}", base, uuid)
}

/// Non-critical, best-effort task-string update.
pub fn update_task(base: &str, uuid: &str, task: &str) -> WorkRequest {
    WorkRequest::new(
        TargetService::Inventory,
        Method::PATCH,
        inventory_url(base, uuid),
        "update_task",
        "update_task",
    )
    .with_body(patch_replace("/task", json!(task)))
    .non_critical()
}

/// Critical variant of `update_task`, retried up to `max_retries`.
pub fn force_task(base: &str, uuid: &str, task: &str, max_retries: u32) -> WorkRequest {
    WorkRequest::new(
        TargetService::Inventory,
        Method::PATCH,
        inventory_url(base, uuid),
        "force_task",
        "force_task",
    )
    .with_body(patch_replace("/task", json!(task)))
    .critical(max_retries)
}

pub fn update_uptime(base: &str, uuid: &str, uptime_secs: u64) -> WorkRequest {
    WorkRequest::new(
        TargetService::Inventory,
        Method::PATCH,
        inventory_url(base, uuid),
        "update_uptime",
        "update_uptime",
    )
    .with_body(patch_replace("/uptime", json!(uptime_secs)))
    .non_critical()
}

pub fn update_value(base: &str, uuid: &str, key: &str, value: Value) -> WorkRequest {
    WorkRequest::new(
        TargetService::Inventory,
        Method::PATCH,
        inventory_url(base, uuid),
        "update_value",
        "update_value",
    )
    .with_body(patch_replace(&format!("/{}", key), value))
}

pub fn update_state(base: &str, uuid: &str, state: &str, value: Value) -> WorkRequest {
    WorkRequest::new(
        TargetService::Inventory,
        Method::PATCH,
        inventory_url(base, uuid),
        "update_state",
        "update_state",
    )
    .with_body(patch_replace(&format!("/{}", state), value))
}

pub fn update_states(
    base: &str,
    uuid: &str,
    admin: AdminState,
    oper: OperState,
    avail: AvailStatus,
) -> WorkRequest {
    WorkRequest::new(
        TargetService::Inventory,
        Method::PATCH,
        inventory_url(base, uuid),
        "update_states",
        "update_states",
    )
    .with_body(json!([
        { "op": "replace", "path": "/administrative", "value": admin },
        { "op": "replace", "path": "/operational", "value": oper },
        { "op": "replace", "path": "/availability", "value": avail.as_str() },
    ]))
}

/// Critical variant of `update_states`, retried up to `max_retries`.
pub fn force_states(
    base: &str,
    uuid: &str,
    admin: AdminState,
    oper: OperState,
    avail: AvailStatus,
    max_retries: u32,
) -> WorkRequest {
    update_states(base, uuid, admin, oper, avail).critical(max_retries)
}

/// Subfunction (AIO worker role) state update.
pub fn subf_states(base: &str, uuid: &str, oper_subf: OperState, avail_subf: AvailStatus) -> WorkRequest {
    WorkRequest::new(
        TargetService::Inventory,
        Method::PATCH,
        inventory_url(base, uuid),
        "subf_states",
        "subf_states",
    )
    .with_body(json!([
        { "op": "replace", "path": "/subfunction_oper", "value": oper_subf },
        { "op": "replace", "path": "/subfunction_avail", "value": avail_subf.as_str() },
    ]))
}

/// Blocking variant used only at startup inventory replay (spec §4.4):
/// short timeout, no retries — the caller awaits it directly rather than
/// going through the FIFO.
pub fn update_states_now(
    base: &str,
    uuid: &str,
    admin: AdminState,
    oper: OperState,
    avail: AvailStatus,
) -> WorkRequest {
    update_states(base, uuid, admin, oper, avail).with_timeout(Duration::from_secs(5))
}
