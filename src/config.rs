use crate::registry::VerifierConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete configuration for git-release.
///
/// Loaded from TOML; every field has a default so a missing or partial file
/// still yields a working configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_grace_period() -> u64 {
    3
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    5
}

fn default_timeout() -> u64 {
    60
}

fn default_api_base() -> String {
    "https://crates.io".to_string()
}

/// Settings for the release pipeline itself
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReleaseConfig {
    /// Prefix for release tags, e.g. "v" -> "v1.2.3"
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Remote the release commit and tag are pushed to
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Files whose version strings the release rewrites
    #[serde(default)]
    pub version_files: Vec<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            tag_prefix: default_tag_prefix(),
            remote: default_remote(),
            version_files: Vec::new(),
        }
    }
}

/// Settings for post-push registry verification
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Package name to verify on the registry; empty skips verification
    #[serde(default)]
    pub package: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            package: String::new(),
            api_base: default_api_base(),
            grace_period_secs: default_grace_period(),
            poll_interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout(),
        }
    }
}

impl RegistryConfig {
    /// Convert the raw seconds fields into a verifier budget
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            grace_period: Duration::from_secs(self.grace_period_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_attempts,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            release: ReleaseConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Lookup order:
/// 1. Custom path provided as parameter
/// 2. `gitrelease.toml` in the current directory
/// 3. `.gitrelease.toml` in the user config directory
/// 4. Default configuration if no file found
pub fn load_config(config_path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./gitrelease.toml").exists() {
        fs::read_to_string("./gitrelease.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(".gitrelease.toml");
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.release.tag_prefix, "v");
        assert_eq!(config.release.remote, "origin");
        assert!(config.release.version_files.is_empty());
        assert_eq!(config.registry.max_attempts, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [release]
            tag_prefix = "release-"
            "#,
        )
        .unwrap();
        assert_eq!(config.release.tag_prefix, "release-");
        assert_eq!(config.release.remote, "origin");
        assert_eq!(config.registry.grace_period_secs, 3);
    }

    #[test]
    fn test_full_toml() {
        let config: Config = toml::from_str(
            r#"
            [release]
            tag_prefix = "v"
            remote = "upstream"
            version_files = ["Cargo.toml", "package.json"]

            [registry]
            package = "my-crate"
            api_base = "https://registry.example.com"
            grace_period_secs = 1
            poll_interval_secs = 1
            max_attempts = 10
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.release.remote, "upstream");
        assert_eq!(config.release.version_files.len(), 2);
        assert_eq!(config.registry.package, "my-crate");
        assert_eq!(config.registry.max_attempts, 10);
    }

    #[test]
    fn test_verifier_config_conversion() {
        let registry = RegistryConfig {
            grace_period_secs: 3,
            poll_interval_secs: 2,
            max_attempts: 5,
            timeout_secs: 60,
            ..Default::default()
        };
        let verifier = registry.verifier_config();
        assert_eq!(verifier.grace_period, Duration::from_secs(3));
        assert_eq!(verifier.poll_interval, Duration::from_secs(2));
        assert_eq!(verifier.max_attempts, 5);
        assert_eq!(verifier.timeout, Duration::from_secs(60));
    }
}
