//! Hostname-modify compound command (spec §4.6): serializes a
//! delete-then-add across the heartbeat, hwmon and guest sub-services,
//! with a bounded wait for the HTTP work FIFO to drain before the add is
//! issued (spec §9 open question 2: "the rewrite must replicate the
//! original ordering and the `RETRY` return that re-enters the
//! dispatcher").
//!
//! This stage machine only tracks *sequencing*; the actual delete/add
//! calls against the registry and the sibling-service notifications are
//! the caller's (`mtce-fsm`) responsibility — this keeps `mtce-command`
//! free of a dependency on `mtce-registry`.

use mtce_common::MtceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Start,
    /// Delete issued to heartbeat/hwmon/guest; waiting for the node's
    /// `libEvent_work_fifo` (HTTP work queue) to fully drain before the
    /// add proceeds — §9 open question 2's "subtle" ordering requirement.
    DeleteWait,
    /// Add issued under the new hostname; waiting for it to complete.
    CreateWait,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    IssueDelete,
    IssueAdd,
    /// Re-enter the dispatcher on the next tick without making progress —
    /// the original's `RETRY` return (spec §9 open question 2).
    Retry,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    WorkQueueDrained,
    AddCompleted { ok: bool },
}

#[derive(Debug, Clone)]
pub struct HostnameModify {
    pub stage: Stage,
    pub old_hostname: String,
    pub new_hostname: String,
}

impl HostnameModify {
    pub fn new(old_hostname: impl Into<String>, new_hostname: impl Into<String>) -> Self {
        Self {
            stage: Stage::Start,
            old_hostname: old_hostname.into(),
            new_hostname: new_hostname.into(),
        }
    }

    pub fn step(&mut self, event: Event) -> (Action, Option<Result<(), MtceError>>) {
        match (self.stage, event) {
            (Stage::Start, _) => {
                self.stage = Stage::DeleteWait;
                (Action::IssueDelete, None)
            }
            (Stage::DeleteWait, Event::Tick) => (Action::Retry, None),
            (Stage::DeleteWait, Event::WorkQueueDrained) => {
                self.stage = Stage::CreateWait;
                (Action::IssueAdd, None)
            }
            (Stage::CreateWait, Event::Tick) => (Action::Retry, None),
            (Stage::CreateWait, Event::AddCompleted { ok }) => {
                self.stage = Stage::Done;
                (
                    Action::None,
                    Some(if ok {
                        Ok(())
                    } else {
                        Err(MtceError::BadState(format!(
                            "hostname modify {} -> {} failed on add",
                            self.old_hostname, self.new_hostname
                        )))
                    }),
                )
            }
            (Stage::Done, _) => (Action::None, None),
            _ => (Action::None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_not_issued_until_work_queue_drains() {
        let mut hm = HostnameModify::new("worker-1", "worker-1a");
        hm.step(Event::Tick); // Start -> DeleteWait, IssueDelete
        let (action, _) = hm.step(Event::Tick);
        assert_eq!(action, Action::Retry);
        let (action, _) = hm.step(Event::WorkQueueDrained);
        assert_eq!(action, Action::IssueAdd);
        assert_eq!(hm.stage, Stage::CreateWait);
    }

    #[test]
    fn completes_with_error_on_failed_add() {
        let mut hm = HostnameModify::new("worker-1", "worker-1a");
        hm.stage = Stage::CreateWait;
        let (_action, result) = hm.step(Event::AddCompleted { ok: false });
        assert!(result.unwrap().is_err());
    }
}
