use crate::domain::{LocalityConfig, LocalityError};
use pc_01_membership::MembershipConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    locality: LocalitySection,
}

#[derive(Debug, Deserialize, Default)]
struct LocalitySection {
    evidence_lifetime_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    neighbor_expiry_ms: Option<u64>,
    discovery_result_cap: Option<usize>,
    is_relay: Option<bool>,
}

/// Reads the `[locality]` section of the node's TOML file.
///
/// Other sections are ignored. Keys left out fall back to values derived
/// from the membership cadence.
///
/// ```toml
/// [locality]
/// evidence_lifetime_ms = 30000
/// is_relay = false
/// ```
#[derive(Debug, Clone)]
pub struct TomlLocalityConfig;

impl TomlLocalityConfig {
    /// Load and validate from a file.
    pub fn load<P: AsRef<Path>>(
        path: P,
        membership: &MembershipConfig,
    ) -> Result<LocalityConfig, LocalityError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            LocalityError::ConfigParse(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&content, membership)
    }

    pub fn parse(content: &str, membership: &MembershipConfig) -> Result<LocalityConfig, LocalityError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| LocalityError::ConfigParse(e.to_string()))?;

        let base = LocalityConfig::from_membership(membership);
        let l = file.locality;
        let config = LocalityConfig {
            evidence_lifetime_ms: l.evidence_lifetime_ms.unwrap_or(base.evidence_lifetime_ms),
            poll_interval_ms: l.poll_interval_ms.unwrap_or(base.poll_interval_ms),
            neighbor_expiry_ms: l.neighbor_expiry_ms.unwrap_or(base.neighbor_expiry_ms),
            discovery_result_cap: l.discovery_result_cap.unwrap_or(base.discovery_result_cap),
            is_relay: l.is_relay.unwrap_or(base.is_relay),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_section_derives_from_membership() {
        let membership = MembershipConfig::with_cadence(1_000, 4);
        let config = TomlLocalityConfig::parse("[membership]\nretry_limit = 4\n", &membership).unwrap();
        assert_eq!(config.poll_interval_ms, 1_000);
        assert_eq!(config.neighbor_expiry_ms, 4_000);
        assert_eq!(config.evidence_lifetime_ms, 30_000);
    }

    #[test]
    fn test_relay_flag_and_overrides() {
        let config = TomlLocalityConfig::parse(
            "[locality]\nis_relay = true\nevidence_lifetime_ms = 500\n",
            &MembershipConfig::default(),
        )
        .unwrap();
        assert!(config.is_relay);
        assert_eq!(config.evidence_ttl().as_millis(), 1_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let membership = MembershipConfig::default();
        assert!(matches!(
            TomlLocalityConfig::parse("[locality]\nneighbor_expiry_ms = 0\n", &membership),
            Err(LocalityError::InvalidConfig { .. })
        ));
        assert!(matches!(
            TomlLocalityConfig::parse("[locality\n", &membership),
            Err(LocalityError::ConfigParse(_))
        ));
    }
}
