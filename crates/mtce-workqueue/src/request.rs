//! The request descriptor queued per node (spec §4.4).

use serde_json::Value;
use std::time::Duration;

/// Which peer service a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetService {
    Inventory,
    Vim,
    Keystone,
    ServiceManager,
}

/// A queued HTTP request descriptor. Built by the canonical patch-body
/// functions in `patch` for inventory operations, or directly for
/// VIM/keystone/service-manager operations.
#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub target: TargetService,
    pub method: reqwest::Method,
    pub url: String,
    pub body: Option<Value>,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Non-critical requests never back-pressure the dispatcher: a failure
    /// is logged as a warning and the done FIFO simply records it failed.
    pub non_critical: bool,
    /// Short operator-facing tag, e.g. `"update_task"`, `"force_states"`.
    pub op_tag: String,
    pub log_prefix: String,
}

impl WorkRequest {
    pub fn new(
        target: TargetService,
        method: reqwest::Method,
        url: impl Into<String>,
        op_tag: impl Into<String>,
        log_prefix: impl Into<String>,
    ) -> Self {
        Self {
            target,
            method,
            url: url.into(),
            body: None,
            timeout: Duration::from_secs(10),
            max_retries: 0,
            non_critical: false,
            op_tag: op_tag.into(),
            log_prefix: log_prefix.into(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn critical(mut self, max_retries: u32) -> Self {
        self.non_critical = false;
        self.max_retries = max_retries;
        self
    }

    pub fn non_critical(mut self) -> Self {
        self.non_critical = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The result of a completed (or exhausted) request, as it lands in the
/// per-node done FIFO.
#[derive(Debug, Clone)]
pub struct WorkOutcome {
    pub status: u16,
    pub body: Option<Value>,
}

/// An entry in the done FIFO: the original request's op tag plus how it
/// concluded.
#[derive(Debug, Clone)]
pub struct DoneEntry {
    pub op_tag: String,
    pub result: Result<WorkOutcome, mtce_common::MtceError>,
}
