use super::errors::LocalityError;
use pc_01_membership::MembershipConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of a locality observation.
pub const DEFAULT_EVIDENCE_LIFETIME_MS: u64 = 30_000;

/// Locality sensing and merge tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityConfig {
    /// Pause between sensor rounds. Evidence lives twice this long.
    pub evidence_lifetime_ms: u64,
    /// Pause between merge-engine evidence polls.
    pub poll_interval_ms: u64,
    /// Age after which a recorded neighbor is pruned.
    pub neighbor_expiry_ms: u64,
    /// Upper bound on results per sensor or poll query.
    pub discovery_result_cap: usize,
    /// A relay sees everyone one hop away and must never publish evidence.
    pub is_relay: bool,
}

impl Default for LocalityConfig {
    fn default() -> Self {
        Self::from_membership(&MembershipConfig::default())
    }
}

impl LocalityConfig {
    /// Derive poll cadence and neighbor expiry from the liveness cadence.
    pub fn from_membership(membership: &MembershipConfig) -> Self {
        Self {
            evidence_lifetime_ms: DEFAULT_EVIDENCE_LIFETIME_MS,
            poll_interval_ms: membership.sweep_interval_ms,
            neighbor_expiry_ms: membership.staleness_window_ms(),
            discovery_result_cap: membership.discovery_result_cap,
            is_relay: false,
        }
    }

    pub fn for_testing() -> Self {
        Self {
            evidence_lifetime_ms: 100,
            ..Self::from_membership(&MembershipConfig::for_testing())
        }
    }

    pub fn evidence_lifetime(&self) -> Duration {
        Duration::from_millis(self.evidence_lifetime_ms)
    }

    /// TTL of published evidence: twice the sensing period.
    pub fn evidence_ttl(&self) -> Duration {
        Duration::from_millis(self.evidence_lifetime_ms.saturating_mul(2))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), LocalityError> {
        for (field, value) in [
            ("evidence_lifetime_ms", self.evidence_lifetime_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("neighbor_expiry_ms", self.neighbor_expiry_ms),
        ] {
            if value == 0 {
                return Err(LocalityError::InvalidConfig {
                    field,
                    reason: "must be positive".into(),
                });
            }
        }
        if self.discovery_result_cap == 0 {
            return Err(LocalityError::InvalidConfig {
                field: "discovery_result_cap",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_membership_cadence() {
        let config = LocalityConfig::default();
        assert_eq!(config.evidence_lifetime_ms, 30_000);
        assert_eq!(config.poll_interval_ms, 20_000);
        assert_eq!(config.neighbor_expiry_ms, 60_000);
        assert_eq!(config.evidence_ttl(), Duration::from_secs(60));
        assert!(!config.is_relay);
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let config = LocalityConfig {
            neighbor_expiry_ms: 0,
            ..LocalityConfig::for_testing()
        };
        assert!(matches!(
            config.validate(),
            Err(LocalityError::InvalidConfig { field: "neighbor_expiry_ms", .. })
        ));
    }
}
