//! Domain ids and selection specs.

/// The reserved catch-all domain. Always present, never collected.
pub const DEFAULT_DOMAIN: &str = "0";

/// Legacy root path that names the default domain.
const LEGACY_ROOT: &str = "/datanodes";

/// Marker prefix meaning "any domain except".
const EXCLUSION_MARKER: char = '~';

/// Canonical form of a domain id.
///
/// `/datanodes` and `/datanodes/` map to the default domain and a
/// `/datanodes/` prefix is stripped. Returns `None` for an empty id.
pub fn normalize_domain_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let id = if trimmed == LEGACY_ROOT || trimmed == "/datanodes/" {
        DEFAULT_DOMAIN
    } else {
        trimmed
            .strip_prefix("/datanodes/")
            .unwrap_or(trimmed)
    };
    (!id.is_empty()).then(|| id.to_string())
}

/// Which domains a random pick may draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainSelector {
    /// Members of exactly this domain.
    Only(String),
    /// Members of every domain except this one.
    Excluding(String),
}

impl DomainSelector {
    /// Parse `"<id>"` or `"~<id>"`.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        match spec.strip_prefix(EXCLUSION_MARKER) {
            Some(rest) => normalize_domain_id(rest).map(Self::Excluding),
            None => normalize_domain_id(spec).map(Self::Only),
        }
    }

    pub fn admits(&self, domain_id: &str) -> bool {
        match self {
            Self::Only(id) => id == domain_id,
            Self::Excluding(id) => id != domain_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_root_maps_to_default() {
        assert_eq!(normalize_domain_id("/datanodes").as_deref(), Some("0"));
        assert_eq!(normalize_domain_id("/datanodes/").as_deref(), Some("0"));
        assert_eq!(normalize_domain_id("/datanodes/7").as_deref(), Some("7"));
        assert_eq!(normalize_domain_id("  ").as_deref(), None);
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!(DomainSelector::parse("7"), Some(DomainSelector::Only("7".into())));
        assert_eq!(
            DomainSelector::parse("~0"),
            Some(DomainSelector::Excluding("0".into()))
        );
        assert_eq!(
            DomainSelector::parse("~/datanodes"),
            Some(DomainSelector::Excluding("0".into()))
        );
        assert_eq!(DomainSelector::parse("~"), None);
        assert_eq!(DomainSelector::parse(""), None);
    }

    #[test]
    fn test_selector_admits() {
        let excluding = DomainSelector::Excluding("0".into());
        assert!(!excluding.admits("0"));
        assert!(excluding.admits("7"));
        assert!(DomainSelector::Only("7".into()).admits("7"));
    }
}
