//! The node registry: add/modify/delete, the uniqueness invariants, the
//! secondary lookup indices, and the per-personality lock precondition
//! checks.
//!
//! Backed by a `DashMap` for concurrent lookups, with secondary
//! `get_by_status`-style indices kept alongside the primary map. Insertion
//! order — required by spec §4.8's "dispatcher visits the registry in
//! insertion order" — is not something `DashMap` gives you, so it is
//! tracked separately in an `RwLock<Vec<NodeHandle>>`.

use crate::error::LockPrecheckError;
use crate::node::{InventoryRecord, NodeRecord};
use dashmap::DashMap;
use mtce_common::{AvailStatus, EventBase, HandleAllocator, MtceError, MtceResult, NodeHandle, OperState, Personality, TimerId};
use parking_lot::RwLock;
use tracing::info;

/// The ordered collection of node records plus its secondary indices
/// (spec §4.3 / C3).
pub struct NodeRegistry {
    nodes: DashMap<NodeHandle, NodeRecord>,
    order: RwLock<Vec<NodeHandle>>,
    allocator: HandleAllocator,

    by_hostname: DashMap<String, NodeHandle>,
    by_uuid: DashMap<String, NodeHandle>,
    by_mgmt_ip: DashMap<String, NodeHandle>,
    by_mgmt_mac: DashMap<String, NodeHandle>,
    by_timer_id: DashMap<TimerId, NodeHandle>,
    by_event_base: DashMap<EventBase, NodeHandle>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            order: RwLock::new(Vec::new()),
            allocator: HandleAllocator::new(),
            by_hostname: DashMap::new(),
            by_uuid: DashMap::new(),
            by_mgmt_ip: DashMap::new(),
            by_mgmt_mac: DashMap::new(),
            by_timer_id: DashMap::new(),
            by_event_base: DashMap::new(),
        }
    }

    /// Check whether `inv` may be added/modified without violating a
    /// uniqueness or reserved-name rule, without mutating the registry
    /// (spec §4.3 `precheck`). `existing` is the handle being modified, if
    /// any — its own current values are excluded from the duplicate check.
    pub fn precheck(&self, inv: &InventoryRecord, existing: Option<NodeHandle>) -> MtceResult<()> {
        if !inv.personality.reserved_name_ok(&inv.hostname) {
            return Err(MtceError::ReservedName(format!(
                "Can only add reserved '{}' hostname with personality set to '{}'",
                inv.hostname,
                expected_personality(&inv.hostname)
            )));
        }

        if let Some(found) = self.by_hostname.get(&inv.hostname) {
            if Some(*found) != existing {
                return Err(MtceError::DupHostname(inv.hostname.clone()));
            }
        }
        if let Some(found) = self.by_uuid.get(&inv.uuid) {
            if Some(*found) != existing {
                return Err(MtceError::DupUuid(inv.uuid.clone()));
            }
        }
        if let Some(found) = self.by_mgmt_ip.get(&inv.mgmt_ip) {
            if Some(*found) != existing {
                return Err(MtceError::DupIpAddr(inv.mgmt_ip.clone()));
            }
        }
        if let Some(found) = self.by_mgmt_mac.get(&inv.mgmt_mac) {
            if Some(*found) != existing {
                return Err(MtceError::DupMacAddr(inv.mgmt_mac.clone()));
            }
        }
        Ok(())
    }

    /// Create a node record from `inv`, or fold it into the existing
    /// record with the same hostname if one exists (spec §4.3 `add` /
    /// `modify`: "if absent, promoted to add").
    pub fn add(&self, inv: InventoryRecord) -> MtceResult<NodeHandle> {
        if let Some(handle) = self.by_hostname.get(&inv.hostname).map(|h| *h) {
            return self.modify(handle, inv);
        }

        self.precheck(&inv, None)?;

        let handle = self.allocator.next();
        let hostname = inv.hostname.clone();
        let uuid = inv.uuid.clone();
        let mgmt_ip = inv.mgmt_ip.clone();
        let mgmt_mac = inv.mgmt_mac.clone();

        info!(hostname = %hostname, handle = %handle, "adding host to registry");
        let record = NodeRecord::from_inventory(handle, inv);
        self.nodes.insert(handle, record);
        self.by_hostname.insert(hostname, handle);
        self.by_uuid.insert(uuid, handle);
        self.by_mgmt_ip.insert(mgmt_ip, handle);
        self.by_mgmt_mac.insert(mgmt_mac, handle);
        self.order.write().push(handle);
        Ok(handle)
    }

    /// Mutate an existing record in place (spec §4.3 `modify`).
    pub fn modify(&self, handle: NodeHandle, inv: InventoryRecord) -> MtceResult<NodeHandle> {
        self.precheck(&inv, Some(handle))?;

        let mut record = self
            .nodes
            .get_mut(&handle)
            .ok_or(MtceError::UnknownHostname(format!("{}", handle)))?;

        self.by_hostname.remove(&record.hostname);
        self.by_uuid.remove(&record.uuid);
        self.by_mgmt_ip.remove(&record.mgmt_ip);
        self.by_mgmt_mac.remove(&record.mgmt_mac);

        let hostname = inv.hostname.clone();
        let uuid = inv.uuid.clone();
        let mgmt_ip = inv.mgmt_ip.clone();
        let mgmt_mac = inv.mgmt_mac.clone();
        record.apply_inventory(inv);
        drop(record);

        self.by_hostname.insert(hostname, handle);
        self.by_uuid.insert(uuid, handle);
        self.by_mgmt_ip.insert(mgmt_ip, handle);
        self.by_mgmt_mac.insert(mgmt_mac, handle);
        info!(handle = %handle, "modified host in registry");
        Ok(handle)
    }

    /// Unlink and free a node record (spec §4.3 `delete`). Rejected unless
    /// the node is locked, matching spec §3's "destroyed ... after
    /// ensuring no outstanding timers/threads/FIFO entries reference it" —
    /// the caller is responsible for having drained those before calling.
    pub fn delete(&self, uuid: &str, forced: bool) -> MtceResult<()> {
        let handle = *self
            .by_uuid
            .get(uuid)
            .ok_or_else(|| MtceError::UnknownHostname(uuid.to_string()))?;

        let record = self
            .nodes
            .get(&handle)
            .ok_or_else(|| MtceError::UnknownHostname(uuid.to_string()))?;

        if !forced && matches!(record.admin_state, mtce_common::AdminState::Unlocked) {
            return Err(MtceError::DelUnlocked);
        }

        let hostname = record.hostname.clone();
        let mgmt_ip = record.mgmt_ip.clone();
        let mgmt_mac = record.mgmt_mac.clone();
        drop(record);

        self.nodes.remove(&handle);
        self.by_hostname.remove(&hostname);
        self.by_uuid.remove(uuid);
        self.by_mgmt_ip.remove(&mgmt_ip);
        self.by_mgmt_mac.remove(&mgmt_mac);
        self.by_timer_id.retain(|_, v| *v != handle);
        self.by_event_base.retain(|_, v| *v != handle);
        self.order.write().retain(|h| *h != handle);
        info!(hostname = %hostname, "deleted host from registry");
        Ok(())
    }

    /// Associate a timer id with the node that owns it, for reverse lookup
    /// from the signal handler (spec §4.1).
    pub fn bind_timer(&self, timer: TimerId, handle: NodeHandle) {
        self.by_timer_id.insert(timer, handle);
    }

    /// Associate an event-base handle with its owning node.
    pub fn bind_event_base(&self, base: EventBase, handle: NodeHandle) {
        self.by_event_base.insert(base, handle);
    }

    pub fn get(&self, handle: NodeHandle) -> Option<NodeRecord> {
        self.nodes.get(&handle).map(|r| r.clone())
    }

    pub fn get_by_hostname(&self, hostname: &str) -> Option<NodeRecord> {
        let handle = *self.by_hostname.get(hostname)?;
        self.get(handle)
    }

    pub fn get_by_uuid(&self, uuid: &str) -> Option<NodeRecord> {
        let handle = *self.by_uuid.get(uuid)?;
        self.get(handle)
    }

    pub fn get_by_ip(&self, ip: &str) -> Option<NodeRecord> {
        let handle = *self.by_mgmt_ip.get(ip)?;
        self.get(handle)
    }

    pub fn get_by_mac(&self, mac: &str) -> Option<NodeRecord> {
        let handle = *self.by_mgmt_mac.get(mac)?;
        self.get(handle)
    }

    pub fn get_by_timer_id(&self, timer: TimerId) -> Option<NodeRecord> {
        let handle = *self.by_timer_id.get(&timer)?;
        self.get(handle)
    }

    pub fn get_by_event_base(&self, base: EventBase) -> Option<NodeRecord> {
        let handle = *self.by_event_base.get(&base)?;
        self.get(handle)
    }

    /// Apply `f` to the record behind `handle`, if present.
    pub fn with_mut<R>(&self, handle: NodeHandle, f: impl FnOnce(&mut NodeRecord) -> R) -> Option<R> {
        self.nodes.get_mut(&handle).map(|mut r| f(&mut r))
    }

    /// Node count.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handles in insertion order, as the dispatcher requires (spec §4.8).
    pub fn handles_in_order(&self) -> Vec<NodeHandle> {
        self.order.read().clone()
    }

    /// Semantic-check for lock (spec §4.3): whether locking this node is
    /// currently permitted, per its personality's precondition.
    pub fn semantic_check_lock(&self, handle: NodeHandle) -> Result<(), LockPrecheckError> {
        let record = match self.nodes.get(&handle) {
            Some(r) => r,
            None => return Ok(()),
        };

        match record.personality {
            Personality::Controller => {
                let peer_ready = self
                    .nodes
                    .iter()
                    .any(|kv| {
                        kv.key() != &handle
                            && kv.value().personality == Personality::Controller
                            && kv.value().oper_state == OperState::Enabled
                            && kv.value().avail_status == AvailStatus::Available
                    });
                if peer_ready {
                    Ok(())
                } else {
                    Err(LockPrecheckError::PeerControllerNotReady)
                }
            }
            Personality::Storage => {
                let available_storage_peers = self
                    .nodes
                    .iter()
                    .filter(|kv| {
                        kv.key() != &handle
                            && kv.value().personality == Personality::Storage
                            && kv.value().avail_status == AvailStatus::Available
                    })
                    .count();
                if available_storage_peers >= 1 {
                    Ok(())
                } else {
                    Err(LockPrecheckError::StorageRedundancyLost)
                }
            }
            Personality::Worker => {
                let migration_target_exists = self.nodes.iter().any(|kv| {
                    kv.key() != &handle
                        && kv.value().personality == Personality::Worker
                        && kv.value().admin_state == mtce_common::AdminState::Unlocked
                        && kv.value().oper_state == OperState::Enabled
                });
                if migration_target_exists {
                    Ok(())
                } else {
                    Err(LockPrecheckError::MigrationNotFeasible)
                }
            }
        }
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn expected_personality(hostname: &str) -> &'static str {
    match hostname {
        "controller-0" | "controller-1" => "controller",
        "storage-0" => "storage",
        _ => "any",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtce_common::NodeType;

    fn inv(hostname: &str, uuid: &str, ip: &str, mac: &str) -> InventoryRecord {
        InventoryRecord {
            hostname: hostname.to_string(),
            uuid: uuid.to_string(),
            personality: Personality::Worker,
            node_type: NodeType::WORKER,
            mgmt_ip: ip.to_string(),
            mgmt_mac: mac.to_string(),
            cluster_host_ip: None,
            pxeboot_ip: None,
            bm_ip: None,
            bm_un: None,
            bm_pw: None,
            bm_type: None,
        }
    }

    #[test]
    fn add_then_lookup_by_every_index() {
        let reg = NodeRegistry::new();
        let handle = reg
            .add(inv("worker-1", "uuid-1", "10.0.0.1", "aa:bb:cc:dd:ee:01"))
            .unwrap();
        assert_eq!(reg.get_by_hostname("worker-1").unwrap().handle, handle);
        assert_eq!(reg.get_by_uuid("uuid-1").unwrap().handle, handle);
        assert_eq!(reg.get_by_ip("10.0.0.1").unwrap().handle, handle);
        assert_eq!(reg.get_by_mac("aa:bb:cc:dd:ee:01").unwrap().handle, handle);
    }

    #[test]
    fn duplicate_ip_is_rejected() {
        let reg = NodeRegistry::new();
        reg.add(inv("worker-1", "uuid-1", "10.0.0.1", "aa:bb:cc:dd:ee:01"))
            .unwrap();
        let err = reg
            .add(inv("worker-2", "uuid-2", "10.0.0.1", "aa:bb:cc:dd:ee:02"))
            .unwrap_err();
        assert!(matches!(err, MtceError::DupIpAddr(ref ip) if ip == "10.0.0.1"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reserved_name_mismatch_is_rejected() {
        let reg = NodeRegistry::new();
        let err = reg
            .add(inv("controller-0", "uuid-1", "10.0.0.1", "aa:bb:cc:dd:ee:01"))
            .unwrap_err();
        match &err {
            MtceError::ReservedName(msg) => {
                assert!(msg.contains("with personality set to 'controller'"));
            }
            other => panic!("expected ReservedName, got {other:?}"),
        }
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn add_modify_delete_round_trips_to_empty() {
        let reg = NodeRegistry::new();
        reg.add(inv("worker-1", "uuid-1", "10.0.0.1", "aa:bb:cc:dd:ee:01"))
            .unwrap();
        reg.add(inv("worker-1", "uuid-1", "10.0.0.2", "aa:bb:cc:dd:ee:01"))
            .unwrap();
        reg.delete("uuid-1", true).unwrap();
        assert!(reg.is_empty());
        assert!(reg.get_by_ip("10.0.0.2").is_none());
    }

    #[test]
    fn delete_unlocked_is_rejected_without_force() {
        let reg = NodeRegistry::new();
        let handle = reg
            .add(inv("worker-1", "uuid-1", "10.0.0.1", "aa:bb:cc:dd:ee:01"))
            .unwrap();
        reg.with_mut(handle, |r| r.admin_state = mtce_common::AdminState::Unlocked);
        let err = reg.delete("uuid-1", false).unwrap_err();
        assert!(matches!(err, MtceError::DelUnlocked));
    }

    #[test]
    fn worker_lock_requires_a_migration_target() {
        let reg = NodeRegistry::new();
        let handle = reg
            .add(inv("worker-1", "uuid-1", "10.0.0.1", "aa:bb:cc:dd:ee:01"))
            .unwrap();
        assert_eq!(
            reg.semantic_check_lock(handle),
            Err(LockPrecheckError::MigrationNotFeasible)
        );

        let peer = reg
            .add(inv("worker-2", "uuid-2", "10.0.0.2", "aa:bb:cc:dd:ee:02"))
            .unwrap();
        reg.with_mut(peer, |r| {
            r.admin_state = mtce_common::AdminState::Unlocked;
            r.oper_state = OperState::Enabled;
        });
        assert_eq!(reg.semantic_check_lock(handle), Ok(()));
    }
}
