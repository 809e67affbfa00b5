//! Server configuration from environment variables

use anyhow::{Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Deployment profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Dev,
    Test,
    Prod,
}

impl Profile {
    /// Log filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Profile::Dev => "debug",
            Profile::Test | Profile::Prod => "info",
        }
    }
}

impl FromStr for Profile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Profile::Dev),
            "test" => Ok(Profile::Test),
            "prod" | "production" => Ok(Profile::Prod),
            other => anyhow::bail!("unknown profile: {}", other),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Dev => "dev",
            Profile::Test => "test",
            Profile::Prod => "prod",
        };
        f.write_str(name)
    }
}

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub profile: Profile,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// Optional pipeline config JSON
    pub pipeline_config: Option<PathBuf>,
    /// Build a Rekognition client at startup
    pub enable_cloud: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            profile: Profile::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pipeline_config: None,
            enable_cloud: false,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from any key lookup
    ///
    /// Reads `RECEIPTSCAN_ADDR`, `RECEIPTSCAN_PROFILE`, `RECEIPTSCAN_MAX_BODY`,
    /// `RECEIPTSCAN_CONFIG` and `RECEIPTSCAN_CLOUD`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = var("RECEIPTSCAN_ADDR") {
            config.addr = addr
                .parse()
                .with_context(|| format!("invalid RECEIPTSCAN_ADDR: {}", addr))?;
        }
        if let Some(profile) = var("RECEIPTSCAN_PROFILE") {
            config.profile = profile.parse()?;
        }
        if let Some(max_body) = var("RECEIPTSCAN_MAX_BODY") {
            config.max_body_bytes = max_body
                .parse()
                .with_context(|| format!("invalid RECEIPTSCAN_MAX_BODY: {}", max_body))?;
        }
        config.pipeline_config = var("RECEIPTSCAN_CONFIG").map(PathBuf::from);
        config.enable_cloud = var("RECEIPTSCAN_CLOUD")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(config.profile, Profile::Dev);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(config.pipeline_config.is_none());
        assert!(!config.enable_cloud);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("RECEIPTSCAN_ADDR", "0.0.0.0:8080"),
            ("RECEIPTSCAN_PROFILE", "prod"),
            ("RECEIPTSCAN_MAX_BODY", "1048576"),
            ("RECEIPTSCAN_CONFIG", "/etc/receiptscan.json"),
            ("RECEIPTSCAN_CLOUD", "true"),
        ]))
        .unwrap();

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.profile, Profile::Prod);
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert_eq!(
            config.pipeline_config,
            Some(PathBuf::from("/etc/receiptscan.json"))
        );
        assert!(config.enable_cloud);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("RECEIPTSCAN_ADDR", "nowhere")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("RECEIPTSCAN_PROFILE", "staging")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("RECEIPTSCAN_MAX_BODY", "-1")])).is_err());
    }

    #[test]
    fn test_profile_log_filters() {
        assert_eq!(Profile::Dev.default_log_filter(), "debug");
        assert_eq!(Profile::Prod.default_log_filter(), "info");
        assert_eq!(Profile::Test.to_string(), "test");
    }
}
