//! The closed error taxonomy shared by every mtce-* crate (spec §7).

use thiserror::Error;

/// Result alias used throughout the core.
pub type MtceResult<T> = Result<T, MtceError>;

/// Every return kind the core can produce. Handlers never panic or raise;
/// they return one of these and the dispatcher decides what to do with it
/// (retry / fail-stage / reject / log-and-continue — see §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MtceError {
    // -- input / parse -------------------------------------------------
    /// A caller supplied a malformed or out-of-range parameter.
    #[error("bad parameter: {0}")]
    BadParm(String),
    /// A `match` over a closed set hit a case that should be unreachable.
    #[error("bad case: {0}")]
    BadCase(String),
    /// JSON payload failed to parse.
    #[error("json parse error: {0}")]
    JsonParse(String),
    /// Payload parsed but failed semantic validation.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// A required string field was empty.
    #[error("empty string: {0}")]
    StringEmpty(String),
    /// Hostname is not present in the registry.
    #[error("unknown hostname: {0}")]
    UnknownHostname(String),
    /// Failed to resolve a host address.
    #[error("host address lookup failed: {0}")]
    HostAddrLookup(String),
    /// Node-type bitmask is invalid for the requested operation.
    #[error("invalid node type")]
    NodeType,

    // -- resource / system ----------------------------------------------
    /// Internal invariant violated: a pointer/handle that should exist didn't.
    #[error("null reference: {0}")]
    NullPointer(String),
    /// Operation attempted while the owning state machine is in the wrong state.
    #[error("bad state: {0}")]
    BadState(String),
    /// Failed to create a socket.
    #[error("socket create failed: {0}")]
    SocketCreate(String),
    /// Failed to bind a socket.
    #[error("socket bind failed: {0}")]
    SocketBind(String),
    /// Failed to put a socket into listen mode.
    #[error("socket listen failed: {0}")]
    SocketListen(String),
    /// Failed to set a socket option.
    #[error("socket option failed: {0}")]
    SocketOption(String),
    /// `sendto` failed.
    #[error("socket sendto failed: {0}")]
    SocketSendto(String),
    /// Failed to create a file (e.g. the BMC password file).
    #[error("file create failed: {0}")]
    FileCreate(String),
    /// Expected output file never appeared within the grace period.
    #[error("file access failed: {0}")]
    FileAccess(String),
    /// Host has no cluster-host network provisioned.
    #[error("no cluster-host network provisioned")]
    NoClstrProv,

    // -- protocol ---------------------------------------------------------
    /// A stage-owned timer expired while awaiting a reply.
    #[error("timeout")]
    Timeout,
    /// No command-response ACK was received for a sent command.
    #[error("no command ack received")]
    NoCmdAck,
    /// Caller should retry the same stage on the next tick.
    #[error("retry")]
    Retry,
    /// BMC reset control operation failed.
    #[error("reset control failed: {0}")]
    ResetControl(String),
    /// BMC power control operation failed.
    #[error("power control failed: {0}")]
    PowerControl(String),
    /// BMC is provisioned but not currently reachable.
    #[error("board management not accessible")]
    NotAccessible,
    /// Peer service connection is down.
    #[error("not connected: {0}")]
    NotConnected(String),
    /// BMC credentials/IP are not (fully) provisioned.
    #[error("board management provisioning error: {0}")]
    BmProvisionErr(String),
    /// Failed to spawn a worker thread.
    #[error("thread create failed: {0}")]
    ThreadCreate(String),
    /// Worker thread exited with an error.
    #[error("thread exit error: {0}")]
    ThreadExit(String),
    /// Worker thread is still running (slot not IDLE).
    #[error("thread still running")]
    ThreadRunning,
    /// Referenced controller is not the active one.
    #[error("not active controller")]
    NotActive,

    // -- semantic (admin-action rejections; never retried) -----------------
    /// The host's workload/unit is still active elsewhere.
    #[error("unit is active")]
    UnitActive,
    /// Storage redundancy would be lost by this operation.
    #[error("insufficient storage redundancy")]
    LowStorage,
    /// A patch operation is already in progress.
    #[error("patch in progress")]
    PatchInProgress,
    /// Host was patched but has not yet been rebooted.
    #[error("patched, reboot required")]
    PatchedNoReboot,
    /// Storage monitoring must be enabled first.
    #[error("storage monitor required")]
    NeedStorageMon,
    /// The peer controller is required to be enabled (duplex) first.
    #[error("duplex required")]
    NeedDuplex,
    /// Delete attempted while the host is still unlocked.
    #[error("host must be locked before delete")]
    DelUnlocked,
    /// Another admin action is already in progress for this host.
    #[error("admin action already in progress")]
    AdminAction,
    /// Swact attempted with no in-service mate to swact to.
    #[error("no in-service mate for swact")]
    SwactNoInsvMate,
    /// A mutating operation is already running for this host.
    #[error("operation already in progress")]
    OperInProgress,
    /// A swact is already in progress.
    #[error("swact already in progress")]
    SwactInProgress,
    /// Reset requested while host is powered off.
    #[error("host is powered off")]
    ResetPoweroff,
    /// Duplicate hostname on add/modify.
    #[error("duplicate hostname: {0}")]
    DupHostname(String),
    /// Duplicate uuid on add/modify.
    #[error("duplicate uuid: {0}")]
    DupUuid(String),
    /// Duplicate management IP address on add/modify.
    #[error("duplicate ip address: {0}")]
    DupIpAddr(String),
    /// Duplicate MAC address on add/modify.
    #[error("duplicate mac address: {0}")]
    DupMacAddr(String),
    /// Reserved hostname used with the wrong personality.
    #[error("reserved name violation: {0}")]
    ReservedName(String),
    /// Requested network is not provisioned for this host.
    #[error("network not provisioned: {0}")]
    NoIpSupport(String),

    // -- fault insertion (test only) ---------------------------------------
    /// A fault-insertion point fired (test/diagnostic builds only).
    #[error("fault inserted: {0}")]
    Fit(String),
}

/// The REST-facing `{status, reason, action}` triple a semantic `MtceError`
/// maps to (spec §6/§7). Protocol/resource errors are not mapped here; they
/// never reach the REST boundary directly.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RestFailure {
    /// Always `"fail"` for the failures this maps; reserved for future use.
    pub status: &'static str,
    /// Operator-facing reason text.
    pub reason: String,
    /// Operator-facing suggested action text.
    pub action: String,
}

impl MtceError {
    /// Maps a semantic (admin-action-rejection) error to its fixed
    /// operator-facing `{status, reason, action}` triple and HTTP status
    /// code, per spec §6/§7. Returns `None` for errors that are not part
    /// of the REST contract (protocol/resource errors are handled purely
    /// internally by the dispatcher).
    pub fn rest_mapping(&self) -> Option<(u16, RestFailure)> {
        use MtceError::*;
        let (code, reason, action): (u16, String, String) = match self {
            DupHostname(_) => (
                400,
                "Rejecting host-edit with duplicate hostname".to_string(),
                "Delete host with that hostname first, or choose a different one.".to_string(),
            ),
            DupUuid(_) => (
                400,
                "Rejecting host-edit with duplicate uuid".to_string(),
                "Delete host with that uuid first, or choose a different one.".to_string(),
            ),
            DupIpAddr(ip) => (
                400,
                "Rejecting host-edit with duplicate ip address".to_string(),
                format!("Delete host with ip address '{ip}' first, or choose a different one."),
            ),
            DupMacAddr(_) => (
                400,
                "Rejecting host-edit with duplicate mac address".to_string(),
                "Delete host with that mac address first, or choose a different one.".to_string(),
            ),
            ReservedName(msg) => (
                400,
                msg.clone(),
                "Use a different hostname, or set the matching personality.".to_string(),
            ),
            DelUnlocked => (
                400,
                "Host must be locked before it can be deleted".to_string(),
                "Lock the host and retry the delete.".to_string(),
            ),
            AdminAction => (
                409,
                "Another administrative action is already in progress for this host".to_string(),
                "Wait for the current action to complete and retry.".to_string(),
            ),
            SwactNoInsvMate => (
                409,
                "Controlled swact requires an in-service standby controller".to_string(),
                "Ensure the mate controller is unlocked-enabled and retry.".to_string(),
            ),
            UnitActive => (
                409,
                "Host cannot be locked while its unit is still active".to_string(),
                "Migrate or stop the active workload and retry.".to_string(),
            ),
            LowStorage => (
                409,
                "Locking this host would reduce storage redundancy below the minimum".to_string(),
                "Restore storage redundancy before locking this host.".to_string(),
            ),
            NeedDuplex => (
                409,
                "Controller cannot be locked while its peer is not enabled".to_string(),
                "Enable the peer controller and retry.".to_string(),
            ),
            _ => return None,
        };
        Some((
            code,
            RestFailure {
                status: "fail",
                reason,
                action,
            },
        ))
    }

    /// True for errors the dispatcher should silently re-run the current
    /// stage for on the next tick, rather than transitioning to a failure
    /// sub-stage.
    pub fn is_retry(&self) -> bool {
        matches!(self, MtceError::Retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dup_ip_maps_to_400_with_fixed_text() {
        let err = MtceError::DupIpAddr("10.0.0.5".into());
        let (code, failure) = err.rest_mapping().expect("semantic error must map");
        assert_eq!(code, 400);
        assert!(failure.reason.contains("duplicate ip address"));
    }

    #[test]
    fn dup_ip_action_carries_the_offending_address() {
        let err = MtceError::DupIpAddr("10.0.0.5".into());
        let (_, failure) = err.rest_mapping().expect("semantic error must map");
        assert_eq!(
            failure.action,
            "Delete host with ip address '10.0.0.5' first, or choose a different one."
        );
    }

    #[test]
    fn protocol_errors_have_no_rest_mapping() {
        assert!(MtceError::Timeout.rest_mapping().is_none());
        assert!(MtceError::Retry.rest_mapping().is_none());
    }

    #[test]
    fn retry_is_recognized() {
        assert!(MtceError::Retry.is_retry());
        assert!(!MtceError::Timeout.is_retry());
    }
}
