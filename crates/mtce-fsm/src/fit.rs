//! Fault-insertion hook (spec §14 supplemented feature, from
//! `fitCodes.h` and the `stress_test_mask`/fault-insertion config options
//! in spec §6). Present but inert unless armed, so automated tests can
//! force specific failure branches without mocking the network.

use mtce_common::{MtceError, MtceResult};

/// Armed fault-insertion target: when `code` matches the tag a caller
/// passes to [`FitConfig::check`] and `host` (if set) matches the
/// hostname, the check returns `MtceError::Fit` instead of `Ok`.
#[derive(Debug, Clone, Default)]
pub struct FitConfig {
    pub code: Option<String>,
    pub host: Option<String>,
}

impl FitConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn armed(code: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            host: Some(host.into()),
        }
    }

    /// Checked at the top of a handler tick (spec §14). Returns `Ok(())`
    /// unless this exact `(code, hostname)` pair is armed.
    pub fn check(&self, code: &str, hostname: &str) -> MtceResult<()> {
        let code_matches = self.code.as_deref() == Some(code);
        let host_matches = match &self.host {
            Some(h) => h == hostname,
            None => true,
        };
        if code_matches && host_matches {
            Err(MtceError::Fit(format!("{code} @ {hostname}")))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_fit_never_fires() {
        let fit = FitConfig::disabled();
        assert!(fit.check("reset-hang", "worker-1").is_ok());
    }

    #[test]
    fn armed_fit_fires_only_for_matching_host() {
        let fit = FitConfig::armed("reset-hang", "worker-1");
        assert!(fit.check("reset-hang", "worker-1").is_err());
        assert!(fit.check("reset-hang", "worker-2").is_ok());
        assert!(fit.check("other-code", "worker-1").is_ok());
    }
}
