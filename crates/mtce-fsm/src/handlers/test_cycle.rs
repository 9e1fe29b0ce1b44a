//! `oos_test_handler` / `insv_test_handler` (spec §4.7): "periodically
//! exercise BMC-access-test and other diagnostics." Both are driven off an
//! interval timer rather than an admin action, so they're modeled as a
//! small recurring cycle rather than a terminating stage sequence.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    /// Out-of-service test cycle: runs while the host is disabled/not yet
    /// enabled.
    OutOfService,
    /// In-service test cycle: runs while the host is enabled, lower
    /// frequency and non-blocking toward any admin action.
    InService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Running,
    Evaluate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    IntervalElapsed,
    TestComplete { pass: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    RunBmcAccessTest,
    RecordPass,
    RecordFail,
}

pub fn step(stage: Stage, event: Event) -> (Action, Option<Stage>) {
    use Event::*;
    use Stage::*;

    match (stage, event) {
        (Idle, IntervalElapsed) => (Action::RunBmcAccessTest, Some(Running)),
        (Running, TestComplete { .. }) => (Action::None, Some(Evaluate)),
        (Evaluate, TestComplete { pass: true }) => (Action::RecordPass, Some(Idle)),
        (Evaluate, TestComplete { pass: false }) => (Action::RecordFail, Some(Idle)),
        _ => (Action::None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_kicks_off_a_test_run() {
        let (action, next) = step(Stage::Idle, Event::IntervalElapsed);
        assert_eq!(action, Action::RunBmcAccessTest);
        assert_eq!(next, Some(Stage::Running));
    }

    #[test]
    fn both_personalities_of_test_cycle_are_independent_kinds() {
        assert_ne!(TestKind::OutOfService, TestKind::InService);
    }

    #[test]
    fn failed_test_records_fail_and_returns_to_idle() {
        let mut stage = Stage::Idle;
        for event in [
            Event::IntervalElapsed,
            Event::TestComplete { pass: false },
            Event::TestComplete { pass: false },
        ] {
            let (_, next) = step(stage, event);
            if let Some(next) = next {
                stage = next;
            }
        }
        assert_eq!(stage, Stage::Idle);
    }
}
