//! On-host agent messaging substrate (spec §4.2 / component C2): the fixed
//! wire format, the three per-network UDP channels, the command/event
//! vocabulary, and the ACK sub-protocol.
//!
//! The embedded HTTP event server, the netlink link-state watcher, the
//! inotify shadow-file watcher and the domain socket to the active-monitor
//! are out of scope here (spec §1: "specify only the interfaces the core
//! consumes/exposes" for these collaborators) — this crate only implements
//! the substrate the FSM handlers actually drive.

pub mod ack;
pub mod channel;
pub mod command;
pub mod message;

pub use ack::{AckOutcome, AckWaiter};
pub use channel::{Network, NetworkChannel};
pub use command::{HostCommand, HostEvent};
pub use message::Message;
