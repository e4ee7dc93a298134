//! Pool naming and provider ID conventions.
//!
//! Pools are discovered by name, so the format here must never change:
//! `karpenter-{flavor with '.' → '-'}[-{zone}]`.

/// Prefix of every provider ID handed to the autoscaler.
pub const PROVIDER_ID_PREFIX: &str = "openstack:///";

/// Prefix of every pool this orchestrator manages.
pub const POOL_NAME_PREFIX: &str = "karpenter-";

pub fn pool_name(flavor: &str, zone: &str) -> String {
    let flavor = flavor.replace('.', "-");
    if zone.is_empty() {
        format!("{POOL_NAME_PREFIX}{flavor}")
    } else {
        format!("{POOL_NAME_PREFIX}{flavor}-{zone}")
    }
}

pub fn is_managed_pool(name: &str) -> bool {
    name.starts_with(POOL_NAME_PREFIX)
}

pub fn provider_id(instance_id: &str) -> String {
    format!("{PROVIDER_ID_PREFIX}{instance_id}")
}

/// Instance ID inside a provider ID; `None` when the prefix is missing or
/// nothing follows it.
pub fn parse_provider_id(provider_id: &str) -> Option<&str> {
    provider_id
        .strip_prefix(PROVIDER_ID_PREFIX)
        .filter(|id| !id.is_empty())
}

/// First zone of a region.
pub fn default_zone(region: &str) -> String {
    format!("{}-a", region.to_lowercase())
}

/// Recover `{region}-{letter}` from the tail of a pool name. Regions may
/// themselves contain dashes (`eu-west-par`).
pub fn zone_from_pool_name(name: &str, region: &str) -> Option<String> {
    let region = region.to_lowercase();
    let (head, letter) = name.rsplit_once('-')?;

    let is_letter = letter.len() == 1 && letter.chars().all(|c| c.is_ascii_lowercase());
    (is_letter && head.ends_with(&format!("-{region}"))).then(|| format!("{region}-{letter}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_names_are_deterministic() {
        assert_eq!(pool_name("b3-8", "gra7-a"), "karpenter-b3-8-gra7-a");
        assert_eq!(pool_name("win.b2-7", ""), "karpenter-win-b2-7");
        assert!(is_managed_pool(&pool_name("c3-16", "sbg5-b")));
        assert!(!is_managed_pool("system-pool"));
    }

    #[test]
    fn provider_ids() {
        assert_eq!(provider_id("abc123"), "openstack:///abc123");
        assert_eq!(parse_provider_id("openstack:///abc123"), Some("abc123"));
        assert_eq!(parse_provider_id("abc123"), None);
        assert_eq!(parse_provider_id("openstack:///"), None);
        assert_eq!(parse_provider_id("aws:///i-123"), None);
    }

    #[test]
    fn zone_recovered_from_name() {
        assert_eq!(
            zone_from_pool_name("karpenter-b3-8-gra7-b", "GRA7").as_deref(),
            Some("gra7-b")
        );
        assert_eq!(
            zone_from_pool_name(&pool_name("b3-8", "eu-west-par-b"), "EU-WEST-PAR").as_deref(),
            Some("eu-west-par-b")
        );
        assert_eq!(zone_from_pool_name("karpenter-b3-8-gra7-b", "SBG5"), None);
        assert_eq!(zone_from_pool_name("karpenter-b3-8-par-b", "EU-WEST-PAR"), None);
        assert_eq!(zone_from_pool_name("karpenter-b3-8", "GRA7"), None);
        assert_eq!(zone_from_pool_name("gra7-a", "GRA7"), None);
        assert_eq!(default_zone("GRA7"), "gra7-a");
    }
}
