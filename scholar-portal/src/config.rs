use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use scholar_core::{ScholarConfig, ScholarConfigSnapshot};
use scholar_tenancy::MultipleAssignmentPolicy;

pub const ENV_PREFIX: &str = "SCHOLAR__";

const DEFAULTS: &[(&str, &str)] = &[
    ("http.host", "127.0.0.1"),
    ("http.port", "3036"),
    ("gateway.kind", "memory"),
    ("gateway.timeout_secs", "30"),
    ("storage.path", ".scholar/session.json"),
    ("tenancy.multiple_assignments", "reject"),
];

/// Defaults overridden by `SCHOLAR__SECTION__KEY` variables.
pub fn portal_config<I>(vars: I) -> ScholarConfig
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut config = ScholarConfig::from_pairs(DEFAULTS.iter().copied());
    config.load_vars(ENV_PREFIX, vars);
    config
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayKind {
    /// In-process relations, optionally seeded from a JSON file.
    Memory { seed: Option<PathBuf> },
    Http { url: String, anon_key: String, timeout: Duration },
}

/// Typed view over the config keys the portal reads.
#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub host: String,
    pub port: u16,
    pub gateway: GatewayKind,
    pub storage_path: PathBuf,
    pub policy: MultipleAssignmentPolicy,
    pub jwt_secret: Option<String>,
    pub audience: Option<String>,
}

fn non_empty(snapshot: &ScholarConfigSnapshot, key: &str) -> Option<String> {
    snapshot
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PortalSettings {
    pub fn from_snapshot(snapshot: &ScholarConfigSnapshot) -> Result<Self> {
        let gateway = match snapshot.get("gateway.kind").map(str::trim).unwrap_or("memory") {
            "memory" => GatewayKind::Memory {
                seed: non_empty(snapshot, "gateway.seed_path").map(PathBuf::from),
            },
            "http" => {
                let Some(url) = non_empty(snapshot, "gateway.url") else {
                    bail!("gateway.url is required when gateway.kind is http");
                };
                GatewayKind::Http {
                    url,
                    anon_key: non_empty(snapshot, "gateway.anon_key").unwrap_or_default(),
                    timeout: Duration::from_secs(snapshot.get_u64("gateway.timeout_secs").unwrap_or(30)),
                }
            }
            other => bail!("unknown gateway.kind: {other} (expected memory or http)"),
        };

        let policy = match snapshot.get("tenancy.multiple_assignments") {
            Some(raw) => raw
                .parse::<MultipleAssignmentPolicy>()
                .map_err(|e| anyhow::anyhow!("tenancy.multiple_assignments: {e}"))?,
            None => MultipleAssignmentPolicy::default(),
        };

        Ok(Self {
            host: non_empty(snapshot, "http.host").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: snapshot.get_u16("http.port").unwrap_or(3036),
            gateway,
            storage_path: non_empty(snapshot, "storage.path")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".scholar/session.json")),
            policy,
            jwt_secret: non_empty(snapshot, "auth.jwt_secret"),
            audience: non_empty(snapshot, "auth.audience"),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_give_a_memory_portal() {
        let settings = PortalSettings::from_snapshot(&portal_config(Vec::new()).snapshot()).unwrap();
        assert_eq!(settings.addr(), "127.0.0.1:3036");
        assert_eq!(settings.gateway, GatewayKind::Memory { seed: None });
        assert_eq!(settings.policy, MultipleAssignmentPolicy::Reject);
        assert_eq!(settings.jwt_secret, None);
    }

    #[test]
    fn env_overrides_select_the_http_gateway() {
        let config = portal_config(vars(&[
            ("SCHOLAR__GATEWAY__KIND", "http"),
            ("SCHOLAR__GATEWAY__URL", "https://db.example.org"),
            ("SCHOLAR__GATEWAY__ANON_KEY", "anon"),
            ("SCHOLAR__GATEWAY__TIMEOUT_SECS", "5"),
            ("SCHOLAR__TENANCY__MULTIPLE_ASSIGNMENTS", "most_recent"),
            ("OTHER__HTTP__PORT", "1"),
        ]));
        let settings = PortalSettings::from_snapshot(&config.snapshot()).unwrap();

        assert_eq!(
            settings.gateway,
            GatewayKind::Http {
                url: "https://db.example.org".to_string(),
                anon_key: "anon".to_string(),
                timeout: Duration::from_secs(5),
            }
        );
        assert_eq!(settings.policy, MultipleAssignmentPolicy::MostRecent);
        assert_eq!(settings.port, 3036);
    }

    #[test]
    fn bad_values_are_reported() {
        let config = portal_config(vars(&[("SCHOLAR__GATEWAY__KIND", "http")]));
        let err = PortalSettings::from_snapshot(&config.snapshot()).unwrap_err();
        assert!(err.to_string().contains("gateway.url"));

        let config = portal_config(vars(&[("SCHOLAR__TENANCY__MULTIPLE_ASSIGNMENTS", "first")]));
        assert!(PortalSettings::from_snapshot(&config.snapshot()).is_err());
    }
}
