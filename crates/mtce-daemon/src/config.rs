//! The daemon's config file (spec §6 "Environment / config file" / §SPEC_FULL
//! §12): one field per tunable named there, every field defaulted per
//! spec.md's "missing options use documented defaults" rule.
//!
//! Loaded with the `config` crate the way `kimberlite-config::loader`
//! layers sources (defaults, then a TOML file, then environment
//! variables), generalized here to this daemon's single config file
//! instead of kimberlite's four-tier project/user/local/env stack —
//! mtce has exactly one config file in the original (`/etc/mtc.conf`
//! equivalent) so there is nothing to layer beyond file-then-env.

use mtce_fleet::mnfa::ThresholdKind as MnfaThresholdKind;
use mtce_fleet::HbsFailureAction;
use serde::{Deserialize, Serialize};

/// All tunables the core's timers/thresholds/fault-insertion hooks read,
/// in place of the original's ambient global config struct (spec §9 design
/// note: "process-wide singletons ... replace with an explicit context
/// object").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McsConfig {
    pub mtcalive_timeout_controller_secs: u64,
    pub mtcalive_timeout_worker_secs: u64,
    pub goenabled_timeout_secs: u64,
    pub swact_timeout_secs: u64,
    pub sysinv_timeout_secs: u64,
    pub sysinv_noncrit_timeout_secs: u64,
    pub loss_of_comm_recovery_secs: u64,
    pub mnfa_recovery_secs: u64,
    pub work_queue_timeout_secs: u64,
    pub reinstall_timeout_secs: u64,

    pub insv_test_interval_secs: u64,
    pub oos_test_interval_secs: u64,
    pub uptime_interval_secs: u64,
    pub online_interval_secs: u64,
    pub token_refresh_interval_secs: u64,

    pub hbs_minor_threshold: u32,
    pub hbs_degrade_threshold: u32,
    pub hbs_failure_threshold: u32,
    pub hbs_failure_action: HbsFailureAction,

    pub mnfa_threshold_type: MnfaThresholdTypeConfig,
    pub mnfa_threshold_percent: u8,
    pub mnfa_threshold_number: u32,

    pub stress_test_mask: u32,
    pub fit_code: Option<String>,
    pub fit_host: Option<String>,

    /// How long after this controller's own boot dead-office recovery
    /// stays fleet-wide active (spec §4.9 DOR "extended window").
    pub dor_extended_window_secs: u64,

    pub inventory_base_url: String,
    pub keystone_auth_url: String,
    pub bmc_output_dir: String,
}

/// Serializable mirror of `mtce_fleet::mnfa::ThresholdKind`, kept separate
/// from the runtime enum because the runtime one carries a payload per
/// variant and this one is what the TOML file actually names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MnfaThresholdTypeConfig {
    Absolute,
    Percent,
}

impl McsConfig {
    /// Resolve the two-field `mnfa_threshold_type`/`_percent`/`_number`
    /// config trio into the single runtime enum `mtce-fleet` expects.
    pub fn mnfa_threshold(&self) -> MnfaThresholdKind {
        match self.mnfa_threshold_type {
            MnfaThresholdTypeConfig::Absolute => MnfaThresholdKind::Absolute(self.mnfa_threshold_number),
            MnfaThresholdTypeConfig::Percent => MnfaThresholdKind::Percent(self.mnfa_threshold_percent),
        }
    }
}

impl Default for McsConfig {
    fn default() -> Self {
        Self {
            mtcalive_timeout_controller_secs: 2,
            mtcalive_timeout_worker_secs: 6,
            goenabled_timeout_secs: 300,
            swact_timeout_secs: 300,
            sysinv_timeout_secs: 10,
            sysinv_noncrit_timeout_secs: 2,
            loss_of_comm_recovery_secs: 30,
            mnfa_recovery_secs: 120,
            work_queue_timeout_secs: 30,
            reinstall_timeout_secs: 1800,

            insv_test_interval_secs: 300,
            oos_test_interval_secs: 120,
            uptime_interval_secs: 60,
            online_interval_secs: 30,
            token_refresh_interval_secs: 3600,

            hbs_minor_threshold: 3,
            hbs_degrade_threshold: 6,
            hbs_failure_threshold: 10,
            hbs_failure_action: HbsFailureAction::Fail,

            mnfa_threshold_type: MnfaThresholdTypeConfig::Absolute,
            mnfa_threshold_percent: 40,
            mnfa_threshold_number: 2,

            stress_test_mask: 0,
            fit_code: None,
            fit_host: None,

            dor_extended_window_secs: 1800,

            inventory_base_url: "http://localhost:6385".to_string(),
            keystone_auth_url: "http://localhost:5000/v3/auth/tokens".to_string(),
            bmc_output_dir: "/var/run/mtce/bmc".to_string(),
        }
    }
}

/// Loads `McsConfig` from an optional TOML file plus `MTCE_`-prefixed
/// environment overrides, falling back to documented defaults for every
/// field the file and environment leave unset.
pub struct ConfigLoader {
    file_path: Option<std::path::PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file_path: None,
            env_prefix: "MTCE".to_string(),
        }
    }

    pub fn with_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn load(self) -> anyhow::Result<McsConfig> {
        use anyhow::Context;

        let mut builder = config::Config::builder().add_source(config::Config::try_from(&McsConfig::default())?);

        if let Some(path) = &self.file_path {
            if path.exists() {
                builder = builder.add_source(
                    config::File::from(path.as_path())
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let built = builder.build().context("failed to build mtce-daemon configuration")?;
        built.try_deserialize().context("failed to deserialize mtce-daemon configuration")
    }

    /// Load configuration, falling back to compiled-in defaults on any
    /// error (e.g. the config file has a malformed field) rather than
    /// refusing to start — matches `edge::EdgeConfig::load`'s
    /// fallback-to-default startup behavior.
    pub fn load_or_default(self) -> McsConfig {
        match self.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "config load failed, using defaults");
                McsConfig::default()
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
