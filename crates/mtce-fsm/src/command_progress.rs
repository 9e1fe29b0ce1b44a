//! Per-node progress through the head of the compound-command FIFO (spec
//! §4.6/§4.8 step 1). Each [`mtce_command::CommandKind`] owns its own
//! stateful sub-FSM struct rather than a pure function, so unlike
//! [`crate::stage::StageUnion`] (which wraps pure `step` handlers) this
//! wraps the owned structs directly and is kept in its own side table.

use mtce_command::{host_services, hostname_modify, reset_progression};

/// The live sub-FSM for whatever sits at the head of a node's command FIFO.
#[derive(Debug, Clone)]
pub enum CommandProgress {
    ResetProgression(reset_progression::ResetProgression),
    HostServices(host_services::HostServices),
    HostnameModify(hostname_modify::HostnameModify),
}

impl CommandProgress {
    pub fn reset_progression(bmc_reset_delay_secs: u64) -> Self {
        CommandProgress::ResetProgression(reset_progression::ResetProgression::new(bmc_reset_delay_secs))
    }

    pub fn host_services(config: host_services::HostServicesConfig) -> Self {
        CommandProgress::HostServices(host_services::HostServices::new(config))
    }

    pub fn hostname_modify(old_hostname: impl Into<String>, new_hostname: impl Into<String>) -> Self {
        CommandProgress::HostnameModify(hostname_modify::HostnameModify::new(old_hostname, new_hostname))
    }
}
