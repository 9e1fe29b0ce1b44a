//! The BMC worker pool (spec §4.5 / §5 "Concurrency & Resource Model"):
//! one detached worker "thread" per node (implemented as a `tokio` task —
//! this workspace's async runtime stands in for the original's pthread),
//! IDLE/LAUNCH/MONITOR/DONE/KILL/WAIT stages, cooperative cancellation only.
//!
//! Grounded directly in `threadUtil.h`'s documented contract: "only LAUNCH
//! from IDLE", "MONITOR polls runcount ... to detect completion", "never
//! force-cancel (pthread_cancel has proven unsafe for us)", "WAIT before
//! IDLE for a ~10s cool-off". The parent/worker data exchange (signal /
//! progress / runcount / status / status_string / data) is carried here as
//! three plain fields behind an `Arc` rather than the original's raw
//! struct pointer (spec §9 design note).

use crate::command::{expected_response_marker, BmcCommand, BmcTarget, Protocol};
use crate::passwd::PasswordFile;
use dashmap::DashMap;
use mtce_common::{MtceError, NodeHandle};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, info, warn};

/// Post-KILL cool-off before another LAUNCH is accepted (spec §4.5 "≈10 s").
pub const POST_KILL_WAIT: Duration = Duration::from_secs(10);

/// Default worker-side deadline; the parent's own timer runs a few seconds
/// longer (spec §4.5 "start the parent-side timeout a few seconds longer
/// than the worker-side deadline").
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(20);
const PARENT_GRACE: Duration = Duration::from_secs(5);

/// Worker lifecycle stage, owned and read only by the parent (spec §3
/// "BMC worker slot").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Launch,
    Monitor,
    Done,
    Kill,
    Wait,
}

/// Result the worker writes before it exits (spec §4.5 "worker-side
/// contract").
#[derive(Debug, Clone)]
pub struct WorkerResult {
    pub status: Result<(), MtceError>,
    pub status_string: String,
    /// Inline text, or (for `BmcInfo`) the output filename.
    pub data: String,
}

/// Fields exchanged between parent and worker (spec §5): `signal` flows
/// parent -> worker, the rest flow worker -> parent. Shared via `Arc`
/// instead of a raw pointer (spec §9).
struct ThreadInfo {
    /// Cooperative kill request; the worker polls this at every
    /// cancellation point and never has `.abort()` called on it.
    signal: AtomicBool,
    /// Monotonic progress counter the worker bumps as it moves through
    /// its own sub-stages (mirrors `info.progress`).
    progress: AtomicU64,
    /// Incremented exactly once, just before the worker exits. The parent
    /// treats `runcount > ctrl.runcount` as the one and only done-signal.
    runcount: AtomicU64,
    result: Mutex<Option<WorkerResult>>,
}

impl ThreadInfo {
    fn new() -> Self {
        Self {
            signal: AtomicBool::new(false),
            progress: AtomicU64::new(0),
            runcount: AtomicU64::new(0),
            result: Mutex::new(None),
        }
    }
}

/// Parent-only control state for one node's worker slot (spec §3
/// "thread-control struct").
struct Ctrl {
    stage: Stage,
    retries: u32,
    runcount: u64,
    /// Parent-side deadline: worker timeout plus the grace period (spec
    /// §4.5 "start the parent-side timeout a few seconds longer than the
    /// worker-side deadline").
    deadline: Option<Instant>,
    killed_at: Option<Instant>,
    info: Arc<ThreadInfo>,
}

impl Ctrl {
    fn idle() -> Self {
        Self {
            stage: Stage::Idle,
            retries: 0,
            runcount: 0,
            deadline: None,
            killed_at: None,
            info: Arc::new(ThreadInfo::new()),
        }
    }
}

/// One pool, shared by the dispatcher, holding at most one active worker
/// per node (spec §3 invariant: "at most one active" BMC worker).
pub struct BmcWorkerPool {
    slots: DashMap<NodeHandle, Ctrl>,
    output_dir: PathBuf,
    worker_timeout: Duration,
}

impl BmcWorkerPool {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            slots: DashMap::new(),
            output_dir: output_dir.into(),
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
        }
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub fn stage(&self, handle: NodeHandle) -> Stage {
        self.slots.get(&handle).map(|c| c.stage).unwrap_or(Stage::Idle)
    }

    /// Launch a BMC command for `handle`. Only succeeds from IDLE (spec
    /// §3 invariant); garbage-collects the previous command's password
    /// file unconditionally first (spec §9 "garbage-collect from the IDLE
    /// stage even when no worker is running").
    pub async fn launch(
        &self,
        handle: NodeHandle,
        hostname: &str,
        target: BmcTarget,
        password: &str,
        command: BmcCommand,
    ) -> Result<(), MtceError> {
        {
            let stage = self.stage(handle);
            if stage != Stage::Idle {
                return Err(MtceError::ThreadRunning);
            }
        }

        let pw_file = PasswordFile::create(&self.output_dir, hostname, command.as_str(), password).await?;

        let ctrl = Ctrl::idle();
        let info = ctrl.info.clone();
        self.slots.insert(
            handle,
            Ctrl {
                stage: Stage::Launch,
                deadline: Some(Instant::now() + self.worker_timeout + PARENT_GRACE),
                ..ctrl
            },
        );

        let output_dir = self.output_dir.clone();
        let hostname = hostname.to_string();
        let worker_timeout = self.worker_timeout;
        tokio::spawn(run_worker(
            info,
            hostname,
            target,
            pw_file,
            command,
            output_dir,
            worker_timeout,
        ));

        if let Some(mut c) = self.slots.get_mut(&handle) {
            c.stage = Stage::Monitor;
        }
        Ok(())
    }

    /// Poll for completion or parent-side timeout (spec §4.5 MONITOR).
    /// Returns `Some(result)` exactly once, when the worker has completed
    /// and the result has not yet been consumed.
    pub fn poll(&self, handle: NodeHandle) -> Option<WorkerResult> {
        let mut ctrl = self.slots.get_mut(&handle)?;
        match ctrl.stage {
            Stage::Monitor => {
                let current = ctrl.info.runcount.load(Ordering::Acquire);
                if current > ctrl.runcount {
                    ctrl.runcount = current;
                    ctrl.stage = Stage::Done;
                    return ctrl.info.result.try_lock().ok().and_then(|mut r| r.take());
                }
                if let Some(deadline) = ctrl.deadline {
                    if Instant::now() > deadline {
                        warn!(%handle, "bmc worker exceeded parent-side timeout; requesting kill");
                        ctrl.info.signal.store(true, Ordering::Release);
                        ctrl.stage = Stage::Kill;
                        ctrl.killed_at = Some(Instant::now());
                    }
                }
                None
            }
            Stage::Kill => {
                let current = ctrl.info.runcount.load(Ordering::Acquire);
                if current > ctrl.runcount {
                    ctrl.runcount = current;
                    ctrl.stage = Stage::Wait;
                    ctrl.killed_at = Some(Instant::now());
                }
                None
            }
            Stage::Wait => {
                if ctrl
                    .killed_at
                    .map(|k| k.elapsed() >= POST_KILL_WAIT)
                    .unwrap_or(true)
                {
                    ctrl.stage = Stage::Idle;
                }
                None
            }
            _ => None,
        }
    }

    /// Consume a DONE result and return the slot to IDLE (spec §3: "only
    /// consume when DONE").
    pub fn consume(&self, handle: NodeHandle) -> Option<WorkerResult> {
        let mut ctrl = self.slots.get_mut(&handle)?;
        if ctrl.stage != Stage::Done {
            return None;
        }
        let result = ctrl.info.result.try_lock().ok().and_then(|mut r| r.take());
        ctrl.stage = Stage::Idle;
        result
    }

    /// Request a cooperative kill regardless of stage (used by the
    /// dispatcher when a node is being deleted and must not leave a
    /// worker referencing a freed handle — spec §5 "no node is freed while
    /// ... its BMC worker slot is not IDLE").
    pub fn request_kill(&self, handle: NodeHandle) {
        if let Some(mut ctrl) = self.slots.get_mut(&handle) {
            ctrl.info.signal.store(true, Ordering::Release);
            if matches!(ctrl.stage, Stage::Launch | Stage::Monitor) {
                ctrl.stage = Stage::Kill;
                ctrl.killed_at = Some(Instant::now());
            }
        }
    }
}

/// The worker body. Runs as a detached tokio task; writes its result into
/// the shared `ThreadInfo`, bumps `runcount` last, then returns. Polls
/// `signal` cooperatively while the child process runs.
async fn run_worker(
    info: Arc<ThreadInfo>,
    hostname: String,
    target: BmcTarget,
    pw_file: PasswordFile,
    command: BmcCommand,
    output_dir: PathBuf,
    worker_timeout: Duration,
) {
    let result = execute(&info, &hostname, &target, &pw_file, command, &output_dir, worker_timeout).await;
    pw_file.unlink().await;
    *info.result.lock().await = Some(result);
    info.runcount.fetch_add(1, Ordering::Release);
    debug!(hostname = %hostname, command = command.as_str(), "bmc worker exiting");
}

async fn execute(
    info: &Arc<ThreadInfo>,
    hostname: &str,
    target: &BmcTarget,
    pw_file: &PasswordFile,
    command: BmcCommand,
    output_dir: &PathBuf,
    worker_timeout: Duration,
) -> WorkerResult {
    if info.signal.load(Ordering::Acquire) {
        return WorkerResult {
            status: Err(MtceError::ThreadExit("killed before launch".into())),
            status_string: "killed before launch".into(),
            data: String::new(),
        };
    }

    let output_file = output_dir.join(format!("{hostname}-{}.out", command.as_str()));
    let argv = target.protocol.argv(target, command, &pw_file.path);
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]).stdout(Stdio::piped()).stderr(Stdio::piped());

    info.progress.fetch_add(1, Ordering::Relaxed);

    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return WorkerResult {
                status: Err(MtceError::ThreadCreate(e.to_string())),
                status_string: "system call failed".into(),
                data: String::new(),
            }
        }
    };

    let output = match tokio_timeout(worker_timeout, child.wait_with_output()).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            return WorkerResult {
                status: Err(MtceError::ThreadExit(e.to_string())),
                status_string: "system call failed".into(),
                data: String::new(),
            }
        }
        Err(_) => {
            return WorkerResult {
                status: Err(MtceError::Timeout),
                status_string: "command did not produce output file ; timeout".into(),
                data: String::new(),
            }
        }
    };

    info.progress.fetch_add(1, Ordering::Relaxed);

    if info.signal.load(Ordering::Acquire) {
        return WorkerResult {
            status: Err(MtceError::ThreadExit("killed".into())),
            status_string: "killed by parent request".into(),
            data: String::new(),
        };
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return WorkerResult {
            status: Err(MtceError::ResetControl(format!("exit code {:?}", output.status.code()))),
            status_string: if stderr.is_empty() { "command failed".to_string() } else { stderr },
            data: stdout,
        };
    }

    if let Some(marker) = expected_response_marker(command, target.protocol) {
        if !stdout.contains(marker) {
            return WorkerResult {
                status: Err(MtceError::PowerControl("unexpected response".into())),
                status_string: "power command failed".into(),
                data: stdout,
            };
        }
    }

    if command.result_is_file() {
        if let Err(e) = tokio::fs::write(&output_file, &stdout).await {
            return WorkerResult {
                status: Err(MtceError::FileAccess(e.to_string())),
                status_string: "command did not produce output file ; timeout".into(),
                data: String::new(),
            };
        }
        info!(hostname = %hostname, command = command.as_str(), "bmc command completed");
        WorkerResult {
            status: Ok(()),
            status_string: "ok".into(),
            data: output_file.display().to_string(),
        }
    } else {
        info!(hostname = %hostname, command = command.as_str(), "bmc command completed");
        WorkerResult {
            status: Ok(()),
            status_string: "ok".into(),
            data: stdout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Protocol;

    fn target() -> BmcTarget {
        BmcTarget {
            bm_ip: "127.0.0.1".into(),
            bm_un: "root".into(),
            protocol: Protocol::Ipmitool,
        }
    }

    #[tokio::test]
    async fn launch_rejected_unless_idle() {
        let dir = tempfile::tempdir().unwrap();
        let pool = BmcWorkerPool::new(dir.path());
        let handle = NodeHandle(1);
        // Force the slot out of IDLE without a real launch.
        pool.slots.insert(
            handle,
            Ctrl {
                stage: Stage::Monitor,
                ..Ctrl::idle()
            },
        );
        let err = pool
            .launch(handle, "worker-1", target(), "pw", BmcCommand::PowerStatus)
            .await
            .unwrap_err();
        assert!(matches!(err, MtceError::ThreadRunning));
    }

    #[tokio::test]
    async fn kill_then_wait_blocks_relaunch_until_cooloff() {
        let dir = tempfile::tempdir().unwrap();
        let pool = BmcWorkerPool::new(dir.path());
        let handle = NodeHandle(1);
        pool.slots.insert(
            handle,
            Ctrl {
                stage: Stage::Wait,
                killed_at: Some(Instant::now()),
                ..Ctrl::idle()
            },
        );
        assert_eq!(pool.stage(handle), Stage::Wait);
        assert!(pool.poll(handle).is_none());
        assert_eq!(pool.stage(handle), Stage::Wait);
    }

    #[tokio::test]
    async fn wait_transitions_to_idle_after_cooloff_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let pool = BmcWorkerPool::new(dir.path());
        let handle = NodeHandle(1);
        pool.slots.insert(
            handle,
            Ctrl {
                stage: Stage::Wait,
                killed_at: Some(Instant::now() - POST_KILL_WAIT - Duration::from_secs(1)),
                ..Ctrl::idle()
            },
        );
        pool.poll(handle);
        assert_eq!(pool.stage(handle), Stage::Idle);
    }
}
