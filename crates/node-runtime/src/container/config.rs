//! # Node Configuration
//!
//! One TOML file feeds every subsystem:
//!
//! ```toml
//! [node]
//! role = "demo"          # coordinator | storage | demo
//! demo_storage_peers = 4
//! demo_sites = 2
//!
//! [membership]
//! sweep_interval_ms = 20000
//!
//! [identity]
//! p2p_dir = "/var/lib/peercloud/p2p"
//!
//! [locality]
//! evidence_lifetime_ms = 30000
//! ```
//!
//! `PC_*` environment variables override file values. The file itself is
//! named by `PC_CONFIG`; without it every section keeps its defaults.
//!
//! `coordinator` and `storage` need a shared directory handed to
//! `NodeRuntime::with_directory`; only `demo` runs on the built-in one.

use pc_01_membership::adapters::TomlConfigProvider;
use pc_01_membership::{ConfigProvider, IdentityConfig, MembershipConfig};
use pc_02_locality::{LocalityConfig, LocalityError, TomlLocalityConfig};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "PC_CONFIG";

/// What this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    Coordinator,
    Storage,
    /// A coordinator and several storage peers sharing one in-process directory.
    Demo,
}

impl FromStr for NodeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coordinator" => Ok(Self::Coordinator),
            "storage" => Ok(Self::Storage),
            "demo" => Ok(Self::Demo),
            other => Err(ConfigError::InvalidValue {
                key: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Coordinator => "coordinator",
            Self::Storage => "storage",
            Self::Demo => "demo",
        };
        f.write_str(name)
    }
}

/// Process-level settings from the `[node]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    pub mode: NodeMode,
    /// Storage peers started in demo mode.
    pub demo_storage_peers: usize,
    /// Demo peers are spread round-robin over this many directly reachable sites.
    pub demo_sites: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            mode: NodeMode::Demo,
            demo_storage_peers: 4,
            demo_sites: 2,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid [node] section: {0}")]
    Parse(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Membership(#[from] pc_01_membership::ConfigError),

    #[error(transparent)]
    Locality(#[from] LocalityError),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub membership: MembershipConfig,
    pub identity: IdentityConfig,
    pub locality: LocalityConfig,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    node: NodeSection,
}

#[derive(Debug, Deserialize, Default)]
struct NodeSection {
    role: Option<NodeMode>,
    demo_storage_peers: Option<usize>,
    demo_sites: Option<usize>,
}

impl NodeConfig {
    /// Small cadences for tests and local demos.
    pub fn for_testing() -> Self {
        Self {
            node: NodeSettings::default(),
            membership: MembershipConfig::for_testing(),
            identity: IdentityConfig::default(),
            locality: LocalityConfig::for_testing(),
        }
    }

    /// Parse every section from one TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let provider = TomlConfigProvider::parse(content)?;
        let membership = provider.membership_config();
        let locality = TomlLocalityConfig::parse(content, &membership)?;

        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let defaults = NodeSettings::default();
        let node = NodeSettings {
            mode: file.node.role.unwrap_or(defaults.mode),
            demo_storage_peers: file.node.demo_storage_peers.unwrap_or(defaults.demo_storage_peers),
            demo_sites: file.node.demo_sites.unwrap_or(defaults.demo_sites),
        };

        let config = Self {
            node,
            membership,
            identity: provider.identity_config(),
            locality,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load from `PC_CONFIG` (if set) and apply `PC_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `PC_*` overrides from `lookup`. Changing the cadence re-derives
    /// the advertisement TTL, merge poll interval and neighbor expiry.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(role) = lookup("PC_ROLE") {
            self.node.mode = role.parse()?;
        }
        if let Some(peers) = parse_var(&lookup, "PC_DEMO_PEERS", "demo_storage_peers")? {
            self.node.demo_storage_peers = peers;
        }
        if let Some(sites) = parse_var(&lookup, "PC_DEMO_SITES", "demo_sites")? {
            self.node.demo_sites = sites;
        }

        let sweep = parse_var(&lookup, "PC_SWEEP_INTERVAL_MS", "sweep_interval_ms")?;
        let retries = parse_var(&lookup, "PC_RETRY_LIMIT", "retry_limit")?;
        if sweep.is_some() || retries.is_some() {
            let cap = self.membership.discovery_result_cap;
            self.membership = MembershipConfig::with_cadence(
                sweep.unwrap_or(self.membership.sweep_interval_ms),
                retries.unwrap_or(self.membership.retry_limit),
            );
            self.membership.discovery_result_cap = cap;
            self.locality.poll_interval_ms = self.membership.sweep_interval_ms;
            self.locality.neighbor_expiry_ms = self.membership.staleness_window_ms();
        }
        if let Some(cap) = parse_var(&lookup, "PC_DISCOVERY_CAP", "discovery_result_cap")? {
            self.membership.discovery_result_cap = cap;
            self.locality.discovery_result_cap = cap;
        }

        if let Some(dir) = lookup("PC_P2P_DIR") {
            self.identity.p2p_dir = PathBuf::from(dir);
        }
        if let Some(instance) = lookup("PC_INSTANCE_DIR") {
            self.identity.instance_dir = Some(instance);
        }
        if let Some(login) = lookup("PC_LOGIN") {
            self.identity.login_name = Some(login);
        }
        if let Some(password) = lookup("PC_PASSWORD") {
            self.identity.password = password;
        }
        if let Some(seed) = lookup("PC_SEED") {
            self.identity.seed = seed;
        }

        if let Some(lifetime) = parse_var(&lookup, "PC_EVIDENCE_LIFETIME_MS", "evidence_lifetime_ms")? {
            self.locality.evidence_lifetime_ms = lifetime;
        }
        if let Some(relay) = parse_var(&lookup, "PC_RELAY", "is_relay")? {
            self.locality.is_relay = relay;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.membership.validate()?;
        self.locality.validate()?;
        if self.node.mode == NodeMode::Demo && self.node.demo_sites == 0 {
            return Err(ConfigError::InvalidValue {
                key: "demo_sites",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, var: &str, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.node.mode, NodeMode::Demo);
        assert_eq!(config.membership.sweep_interval_ms, 20_000);
        assert_eq!(config.membership.retry_limit, 3);
        assert_eq!(config.locality.evidence_lifetime_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_all_sections() {
        let config = NodeConfig::parse(
            r#"
            [node]
            role = "storage"

            [membership]
            sweep_interval_ms = 1000
            retry_limit = 2

            [identity]
            seed = "rack-7"

            [locality]
            is_relay = true
            "#,
        )
        .unwrap();
        assert_eq!(config.node.mode, NodeMode::Storage);
        assert_eq!(config.membership.advertisement_ttl_ms, 2_000);
        assert_eq!(config.identity.seed, "rack-7");
        assert!(config.locality.is_relay);
        assert_eq!(config.locality.neighbor_expiry_ms, 2_000);
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(NodeConfig::parse("[node]\nrole = \"client\"\n").is_err());
    }

    #[test]
    fn test_env_overrides_rederive_cadence() {
        let mut config = NodeConfig::default();
        config
            .apply_overrides(env(&[
                ("PC_ROLE", "coordinator"),
                ("PC_SWEEP_INTERVAL_MS", "500"),
                ("PC_RETRY_LIMIT", "4"),
                ("PC_P2P_DIR", "/tmp/pc"),
            ]))
            .unwrap();
        assert_eq!(config.node.mode, NodeMode::Coordinator);
        assert_eq!(config.membership.advertisement_ttl_ms, 2_000);
        assert_eq!(config.locality.poll_interval_ms, 500);
        assert_eq!(config.locality.neighbor_expiry_ms, 2_000);
        assert_eq!(config.identity.p2p_dir, PathBuf::from("/tmp/pc"));
    }

    #[test]
    fn test_malformed_env_value_rejected() {
        let mut config = NodeConfig::default();
        let err = config
            .apply_overrides(env(&[("PC_RETRY_LIMIT", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "retry_limit", .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "[node]\ndemo_storage_peers = 6\n").unwrap();
        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.node.demo_storage_peers, 6);
        assert!(matches!(
            NodeConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
