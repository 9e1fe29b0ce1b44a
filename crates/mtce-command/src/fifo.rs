//! The per-node compound-command FIFO (spec §3 "Queues": `mtcCmd_work_fifo`
//! / `mtcCmd_done_fifo`), grounded in `mtcCmdHdlr.cpp`'s `node_ptr->
//! mtcCmd_work_fifo_ptr` / `mtcCmd_done_fifo_ptr` pair with a cursor.

use crate::{CommandKind, CommandStatus};
use dashmap::DashMap;
use mtce_common::NodeHandle;
use std::collections::VecDeque;

/// One compound command as it sits in the work FIFO.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub kind: CommandKind,
    pub seq: u64,
}

/// A command entry that has reached `DONE` (spec §4.6 step 3: "moves the
/// entry to the done FIFO with status").
#[derive(Debug, Clone)]
pub struct CommandDone {
    pub kind: CommandKind,
    pub seq: u64,
    pub status: CommandStatus,
    pub status_string: String,
}

#[derive(Default)]
struct NodeFifo {
    work: VecDeque<CommandEntry>,
    done: VecDeque<CommandDone>,
    next_seq: u64,
}

/// The FIFO shared by every node's command FSM. Strictly ordered: the
/// dispatcher (spec §8 FIFO order law) processes only the head entry for
/// each node per tick.
pub struct CommandFifo {
    nodes: DashMap<NodeHandle, NodeFifo>,
}

impl CommandFifo {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Push a new compound command onto `handle`'s work FIFO.
    pub fn push(&self, handle: NodeHandle, kind: CommandKind) -> u64 {
        let mut entry = self.nodes.entry(handle).or_default();
        let seq = entry.next_seq;
        entry.next_seq += 1;
        entry.work.push_back(CommandEntry { kind, seq });
        seq
    }

    /// The command currently at the head of `handle`'s work FIFO, if any.
    pub fn head(&self, handle: NodeHandle) -> Option<CommandEntry> {
        self.nodes.get(&handle)?.work.front().cloned()
    }

    /// Move the head entry to the done FIFO with its terminal status (spec
    /// §4.6 step 3). No-op if the FIFO is empty or the head's kind doesn't
    /// match (defensive: the caller should only call this right after
    /// observing `head()`).
    pub fn finish_head(&self, handle: NodeHandle, status: CommandStatus, status_string: impl Into<String>) {
        if let Some(mut fifo) = self.nodes.get_mut(&handle) {
            if let Some(entry) = fifo.work.pop_front() {
                fifo.done.push_back(CommandDone {
                    kind: entry.kind,
                    seq: entry.seq,
                    status,
                    status_string: status_string.into(),
                });
            }
        }
    }

    /// Pop the oldest completed entry for `handle`.
    pub fn pop_done(&self, handle: NodeHandle) -> Option<CommandDone> {
        self.nodes.get_mut(&handle)?.done.pop_front()
    }

    pub fn is_empty(&self, handle: NodeHandle) -> bool {
        self.nodes
            .get(&handle)
            .map(|f| f.work.is_empty())
            .unwrap_or(true)
    }

    pub fn len(&self, handle: NodeHandle) -> usize {
        self.nodes.get(&handle).map(|f| f.work.len()).unwrap_or(0)
    }
}

impl Default for CommandFifo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> NodeHandle {
        NodeHandle(n)
    }

    #[test]
    fn fifo_order_is_preserved_across_pushes() {
        let fifo = CommandFifo::new();
        fifo.push(h(1), CommandKind::ResetProgression);
        fifo.push(h(1), CommandKind::HostServicesStart { storage: false });
        assert_eq!(fifo.head(h(1)).unwrap().kind, CommandKind::ResetProgression);
        fifo.finish_head(h(1), CommandStatus::Pass, "ok");
        assert_eq!(
            fifo.head(h(1)).unwrap().kind,
            CommandKind::HostServicesStart { storage: false }
        );
    }

    #[test]
    fn finish_head_moves_entry_to_done_fifo() {
        let fifo = CommandFifo::new();
        fifo.push(h(1), CommandKind::ResetProgression);
        fifo.finish_head(h(1), CommandStatus::Pass, "ok");
        assert!(fifo.is_empty(h(1)));
        let done = fifo.pop_done(h(1)).unwrap();
        assert_eq!(done.kind, CommandKind::ResetProgression);
        assert_eq!(done.status, CommandStatus::Pass);
    }
}
