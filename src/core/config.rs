use crate::core::CurrencyPair;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://economia.awesomeapi.com.br";

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "CurrencyPair::default_set")]
    pub pairs: Vec<CurrencyPair>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            pairs: CurrencyPair::default_set(),
            provider: ProviderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or the built-in defaults
    /// when no file has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.timeout_secs == 0 {
            bail!("provider.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxwatch", "fxwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
pairs:
  - USD-BRL
  - eur/usd
provider:
  base_url: "http://example.com/quotes"
  timeout_secs: 3
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(
            config.pairs,
            vec![CurrencyPair::new("USD", "BRL"), CurrencyPair::new("EUR", "USD")]
        );
        assert_eq!(config.provider.base_url, "http://example.com/quotes");
        assert_eq!(config.provider.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pairs.len(), 4);
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.timeout_secs, 10);

        let partial: AppConfig =
            serde_yaml::from_str("provider:\n  base_url: http://localhost:1234\n").unwrap();
        assert_eq!(partial.provider.timeout_secs, 10);
        assert_eq!(partial.pairs, CurrencyPair::default_set());
    }

    #[test]
    fn test_invalid_pair_is_rejected() {
        let result = serde_yaml::from_str::<AppConfig>("pairs:\n  - USDBRL\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config: AppConfig =
            serde_yaml::from_str(include_str!("../../docs/example_config.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_zero_timeout_is_rejected() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "provider:\n  base_url: http://localhost:1234\n  timeout_secs: 0\n",
        )?;

        let result = AppConfig::load_from_path(&config_path);

        assert!(result.is_err());
        assert!(
            format!("{:#}", result.unwrap_err()).contains("timeout_secs must be greater than zero")
        );
        assert!(AppConfig::default().validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_load_from_missing_path_fails() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let result = AppConfig::load_from_path(temp_dir.path().join("missing.yaml"));
        assert!(result.is_err());
        Ok(())
    }
}
