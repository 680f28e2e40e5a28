use crate::domain::{IdentityConfig, MembershipConfig};
use crate::ports::ConfigProvider;

// ============================================================================
// StaticConfigProvider - Hardcoded config for testing/development
// ============================================================================

/// Static configuration provider.
///
/// Useful for tests and embedded clusters. For deployments, use `TomlConfigProvider`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    membership: MembershipConfig,
    identity: IdentityConfig,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_membership(mut self, membership: MembershipConfig) -> Self {
        self.membership = membership;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn membership_config(&self) -> MembershipConfig {
        self.membership.clone()
    }

    fn identity_config(&self) -> IdentityConfig {
        self.identity.clone()
    }
}

// ============================================================================
// TomlConfigProvider - File Config Loading (requires "network" feature)
// ============================================================================

#[cfg(feature = "network")]
mod toml_config {
    use super::*;
    use crate::domain::ConfigError;
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Deserialize, Default)]
    struct ConfigFile {
        #[serde(default)]
        membership: MembershipSection,
        #[serde(default)]
        identity: IdentitySection,
    }

    #[derive(Debug, Deserialize, Default)]
    struct MembershipSection {
        sweep_interval_ms: Option<u64>,
        retry_limit: Option<u32>,
        discovery_result_cap: Option<usize>,
        advertisement_ttl_ms: Option<u64>,
    }

    #[derive(Debug, Deserialize, Default)]
    struct IdentitySection {
        p2p_dir: Option<PathBuf>,
        instance_dir: Option<String>,
        login_name: Option<String>,
        password: Option<String>,
        seed: Option<String>,
    }

    /// TOML-based configuration provider.
    ///
    /// Every key is optional; missing keys keep their defaults. The
    /// advertisement TTL is re-derived from the cadence unless set explicitly.
    ///
    /// # Config File Format
    ///
    /// ```toml
    /// [membership]
    /// sweep_interval_ms = 20000
    /// retry_limit = 3
    /// discovery_result_cap = 100
    ///
    /// [identity]
    /// p2p_dir = "/var/lib/peercloud/p2p"
    /// password = "change-me"
    /// seed = "storage"
    /// ```
    #[derive(Debug, Clone)]
    pub struct TomlConfigProvider {
        membership: MembershipConfig,
        identity: IdentityConfig,
    }

    impl TomlConfigProvider {
        /// Load configuration from a TOML file.
        ///
        /// # Errors
        ///
        /// Returns error if the file cannot be read, parsed or validated.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
                path: path.as_ref().display().to_string(),
                source,
            })?;

            Self::parse(&content)
        }

        /// Parse configuration from a TOML string.
        pub fn parse(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

            let defaults = MembershipConfig::default();
            let m = file.membership;
            let mut membership = MembershipConfig::with_cadence(
                m.sweep_interval_ms.unwrap_or(defaults.sweep_interval_ms),
                m.retry_limit.unwrap_or(defaults.retry_limit),
            );
            membership.discovery_result_cap =
                m.discovery_result_cap.unwrap_or(defaults.discovery_result_cap);
            if let Some(ttl) = m.advertisement_ttl_ms {
                membership.advertisement_ttl_ms = ttl;
            }
            membership.validate()?;

            let base = IdentityConfig::default();
            let i = file.identity;
            let identity = IdentityConfig {
                p2p_dir: i.p2p_dir.unwrap_or(base.p2p_dir),
                instance_dir: i.instance_dir.or(base.instance_dir),
                login_name: i.login_name.or(base.login_name),
                password: i.password.unwrap_or(base.password),
                seed: i.seed.unwrap_or(base.seed),
            };

            Ok(Self {
                membership,
                identity,
            })
        }
    }

    impl ConfigProvider for TomlConfigProvider {
        fn membership_config(&self) -> MembershipConfig {
            self.membership.clone()
        }

        fn identity_config(&self) -> IdentityConfig {
            self.identity.clone()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_empty_file_yields_defaults() {
            let provider = TomlConfigProvider::parse("").unwrap();
            assert_eq!(provider.membership_config(), MembershipConfig::default());
            assert_eq!(provider.identity_config(), IdentityConfig::default());
        }

        #[test]
        fn test_cadence_override_rederives_ttl() {
            let provider = TomlConfigProvider::parse(
                "[membership]\nsweep_interval_ms = 1000\nretry_limit = 5\n",
            )
            .unwrap();
            let config = provider.membership_config();
            assert_eq!(config.retry_limit, 5);
            assert_eq!(config.advertisement_ttl_ms, 5_000);
        }

        #[test]
        fn test_explicit_ttl_wins() {
            let provider = TomlConfigProvider::parse(
                "[membership]\nsweep_interval_ms = 1000\nadvertisement_ttl_ms = 42\n",
            )
            .unwrap();
            assert_eq!(provider.membership_config().advertisement_ttl_ms, 42);
        }

        #[test]
        fn test_identity_section() {
            let provider = TomlConfigProvider::parse(
                "[identity]\np2p_dir = \"/srv/p2p\"\nseed = \"coordinator\"\n",
            )
            .unwrap();
            let identity = provider.identity_config();
            assert_eq!(identity.p2p_dir, PathBuf::from("/srv/p2p"));
            assert_eq!(identity.seed, "coordinator");
        }

        #[test]
        fn test_invalid_values_rejected() {
            assert!(TomlConfigProvider::parse("[membership]\nretry_limit = 0\n").is_err());
            assert!(TomlConfigProvider::parse("[membership\n").is_err());
        }
    }
}

#[cfg(feature = "network")]
pub use toml_config::TomlConfigProvider;
