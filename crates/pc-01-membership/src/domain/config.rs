//! Membership and identity configuration.

use super::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default pause between liveness sweeps.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 20_000;
/// Default number of missed sweeps tolerated before a peer departs.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
/// Default cap on advertisements returned by a cluster-wide query.
pub const DEFAULT_DISCOVERY_RESULT_CAP: usize = 100;

/// Liveness and discovery tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipConfig {
    /// Pause between two sweeps.
    pub sweep_interval_ms: u64,
    /// Missed sweeps tolerated before departure.
    pub retry_limit: u32,
    /// Upper bound on results of cluster-wide discovery.
    pub discovery_result_cap: usize,
    /// TTL of presence advertisements. Defaults to `retry_limit * sweep_interval_ms`.
    pub advertisement_ttl_ms: u64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self::with_cadence(DEFAULT_SWEEP_INTERVAL_MS, DEFAULT_RETRY_LIMIT)
    }
}

impl MembershipConfig {
    /// Config with the given cadence and a TTL derived from it.
    pub fn with_cadence(sweep_interval_ms: u64, retry_limit: u32) -> Self {
        Self {
            sweep_interval_ms,
            retry_limit,
            discovery_result_cap: DEFAULT_DISCOVERY_RESULT_CAP,
            advertisement_ttl_ms: sweep_interval_ms.saturating_mul(u64::from(retry_limit)),
        }
    }

    /// Short cadence for tests.
    pub fn for_testing() -> Self {
        Self::with_cadence(50, 3)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn advertisement_ttl(&self) -> Duration {
        Duration::from_millis(self.advertisement_ttl_ms)
    }

    /// Age after which a neighbor entry is considered stale.
    pub fn staleness_window_ms(&self) -> u64 {
        self.sweep_interval_ms
            .saturating_mul(u64::from(self.retry_limit))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep_interval_ms",
                reason: "must be positive".into(),
            });
        }
        if self.retry_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "retry_limit",
                reason: "must be at least 1".into(),
            });
        }
        if self.discovery_result_cap == 0 {
            return Err(ConfigError::Invalid {
                field: "discovery_result_cap",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Where and how the local identity is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Root of the peer-to-peer state directory.
    pub p2p_dir: PathBuf,
    /// Optional per-instance sub-directory (lets two roles share a host).
    pub instance_dir: Option<String>,
    /// Login name mixed into derived peer ids. Falls back to `$USER`.
    pub login_name: Option<String>,
    /// Keystore password.
    pub password: String,
    /// Role seed mixed into derived peer ids.
    pub seed: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            p2p_dir: PathBuf::from("./p2p"),
            instance_dir: None,
            login_name: None,
            password: "peercloud".to_string(),
            seed: "storage".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Directory holding this instance's certificate and keystore.
    pub fn instance_root(&self) -> PathBuf {
        match &self.instance_dir {
            Some(sub) => self.p2p_dir.join(sub),
            None => self.p2p_dir.clone(),
        }
    }

    /// Effective login name: configured, then `$USER`, then `"peercloud"`.
    pub fn effective_login_name(&self) -> String {
        self.login_name
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "peercloud".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_is_retry_times_interval() {
        let config = MembershipConfig::default();
        assert_eq!(config.sweep_interval_ms, 20_000);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.discovery_result_cap, 100);
        assert_eq!(config.advertisement_ttl_ms, 60_000);
    }

    #[test]
    fn test_validate_rejects_zero_retry() {
        let mut config = MembershipConfig::for_testing();
        config.retry_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_instance_root_appends_sub_directory() {
        let config = IdentityConfig {
            instance_dir: Some("discovery".into()),
            ..IdentityConfig::default()
        };
        assert_eq!(config.instance_root(), PathBuf::from("./p2p/discovery"));
    }

    #[test]
    fn test_configured_login_name_wins() {
        let config = IdentityConfig {
            login_name: Some("alice".into()),
            ..IdentityConfig::default()
        };
        assert_eq!(config.effective_login_name(), "alice");
    }
}
