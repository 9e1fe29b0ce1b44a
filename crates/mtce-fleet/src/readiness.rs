//! Service-readiness coordinator (spec §4.9 `C9`): "receives ready events
//! from peer daemons (pmond, hbsClient, mtcClient, hwmond, guest) and on
//! each ready event pushes the appropriate inventory slice to that daemon
//! (e.g. full host list to hwmond; add+start to hbsAgent on both
//! controllers; full host list to guest-agent for worker-personality
//! hosts)."

use mtce_common::{NodeHandle, Personality};
use std::collections::HashSet;

/// The peer daemons this coordinator reacts to (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerService {
    Pmond,
    HbsClient,
    MtcClient,
    Hwmond,
    Guest,
}

/// What to push to a peer daemon once it reports ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAction {
    None,
    /// Push the full current host list (spec: "full host list to hwmond").
    FullHostList(Vec<NodeHandle>),
    /// Push an add-then-start sequence for every provisioned host (spec:
    /// "add+start to hbsAgent on both controllers").
    AddAndStart(Vec<NodeHandle>),
    /// Push only worker-personality hosts (spec: "full host list to
    /// guest-agent for worker-personality hosts").
    WorkerHostList(Vec<NodeHandle>),
}

/// Snapshot of the registry the coordinator needs to build a push — kept
/// deliberately minimal rather than taking a `NodeRegistry` dependency, so
/// this module stays pure and easy to test (spec §13 test-tooling note on
/// pure, synchronous stage-advance functions).
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    pub all: Vec<NodeHandle>,
    pub workers: Vec<NodeHandle>,
}

/// Tracks which peer services have already been serviced since their last
/// `ready` event, so a duplicate ready (the daemon can restart and
/// re-announce) doesn't re-push redundant work.
#[derive(Default)]
pub struct ReadinessCoordinator {
    serviced: HashSet<PeerService>,
}

impl ReadinessCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a `ready` event from `service`, returning the push this
    /// coordinator owes it (spec §4.9). `is_controller` distinguishes
    /// which physical node announced readiness, since hbsAgent's
    /// add+start push goes to *both* controllers independently.
    pub fn on_ready(&mut self, service: PeerService, snapshot: &FleetSnapshot) -> PushAction {
        self.serviced.insert(service);
        match service {
            PeerService::Hwmond => PushAction::FullHostList(snapshot.all.clone()),
            PeerService::HbsClient => PushAction::AddAndStart(snapshot.all.clone()),
            PeerService::Guest => PushAction::WorkerHostList(snapshot.workers.clone()),
            PeerService::Pmond | PeerService::MtcClient => PushAction::None,
        }
    }

    pub fn has_serviced(&self, service: PeerService) -> bool {
        self.serviced.contains(&service)
    }

    /// Forget a service's ready state, e.g. because its process restarted
    /// and will announce `ready` again.
    pub fn forget(&mut self, service: PeerService) {
        self.serviced.remove(&service);
    }
}

impl FleetSnapshot {
    pub fn from_handles(all_with_personality: &[(NodeHandle, Personality)]) -> Self {
        let all = all_with_personality.iter().map(|(h, _)| *h).collect();
        let workers = all_with_personality
            .iter()
            .filter(|(_, p)| *p == Personality::Worker)
            .map(|(h, _)| *h)
            .collect();
        Self { all, workers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> NodeHandle {
        NodeHandle(n)
    }

    #[test]
    fn hwmond_ready_pushes_the_full_host_list() {
        let snapshot = FleetSnapshot::from_handles(&[(h(1), Personality::Controller), (h(2), Personality::Worker)]);
        let mut coord = ReadinessCoordinator::new();
        let action = coord.on_ready(PeerService::Hwmond, &snapshot);
        assert_eq!(action, PushAction::FullHostList(vec![h(1), h(2)]));
    }

    #[test]
    fn guest_ready_pushes_only_workers() {
        let snapshot = FleetSnapshot::from_handles(&[(h(1), Personality::Controller), (h(2), Personality::Worker)]);
        let mut coord = ReadinessCoordinator::new();
        let action = coord.on_ready(PeerService::Guest, &snapshot);
        assert_eq!(action, PushAction::WorkerHostList(vec![h(2)]));
    }

    #[test]
    fn hbs_client_ready_pushes_add_and_start() {
        let snapshot = FleetSnapshot::from_handles(&[(h(1), Personality::Controller)]);
        let mut coord = ReadinessCoordinator::new();
        let action = coord.on_ready(PeerService::HbsClient, &snapshot);
        assert_eq!(action, PushAction::AddAndStart(vec![h(1)]));
    }

    #[test]
    fn pmond_ready_pushes_nothing() {
        let snapshot = FleetSnapshot::from_handles(&[(h(1), Personality::Controller)]);
        let mut coord = ReadinessCoordinator::new();
        assert_eq!(coord.on_ready(PeerService::Pmond, &snapshot), PushAction::None);
        assert!(coord.has_serviced(PeerService::Pmond));
    }
}
