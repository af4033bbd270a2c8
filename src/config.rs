//! Client configuration: one base address per resource family plus cache
//! tuning knobs.
//!
//! Base addresses are resolved once at startup, either from a YAML file or
//! from environment variables. They are not hot-reloadable; a new
//! `Config` means new clients.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, Result};

/// Default retention for cache entries with no active subscriber.
const DEFAULT_RETENTION_SECS: u64 = 60;

/// Default time before a cached value is considered stale.
const DEFAULT_STALE_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub endpoints: Endpoints,
  #[serde(default)]
  pub cache: CacheConfig,
}

/// One environment-provided base URL per resource family.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
  pub fund_requests: String,
  pub shared_expenses: String,
  pub funds: String,
  pub kyc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds an unsubscribed entry is kept before eviction.
  #[serde(default = "default_retention_secs")]
  pub retention_secs: u64,
  /// Seconds before a cached value is considered stale.
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

fn default_retention_secs() -> u64 {
  DEFAULT_RETENTION_SECS
}

fn default_stale_secs() -> u64 {
  DEFAULT_STALE_SECS
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      retention_secs: DEFAULT_RETENTION_SECS,
      stale_secs: DEFAULT_STALE_SECS,
    }
  }
}

impl CacheConfig {
  pub fn retention(&self) -> Duration {
    Duration::from_secs(self.retention_secs)
  }

  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fundlink.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fundlink/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(ClientError::Config(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(ClientError::Config(
        "no configuration file found; create one at ~/.config/fundlink/config.yaml \
         or use Config::from_env"
          .to_string(),
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fundlink.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fundlink").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      ClientError::Config(format!(
        "failed to read config file {}: {}",
        path.display(),
        e
      ))
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
      ClientError::Config(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })?;

    config.validate()?;
    Ok(config)
  }

  /// Assemble configuration from environment variables.
  ///
  /// Reads FUNDLINK_FUND_REQUESTS_URL, FUNDLINK_SHARED_EXPENSES_URL,
  /// FUNDLINK_FUNDS_URL, and FUNDLINK_KYC_URL.
  pub fn from_env() -> Result<Self> {
    let var = |name: &str| {
      std::env::var(name)
        .map_err(|_| ClientError::Config(format!("missing environment variable {}", name)))
    };

    let config = Self {
      endpoints: Endpoints {
        fund_requests: var("FUNDLINK_FUND_REQUESTS_URL")?,
        shared_expenses: var("FUNDLINK_SHARED_EXPENSES_URL")?,
        funds: var("FUNDLINK_FUNDS_URL")?,
        kyc: var("FUNDLINK_KYC_URL")?,
      },
      cache: CacheConfig::default(),
    };

    config.validate()?;
    Ok(config)
  }

  /// Parse a base address, so a bad URL fails at construction instead of
  /// on first dispatch.
  pub fn base_url(address: &str) -> Result<Url> {
    Url::parse(address)
      .map_err(|e| ClientError::Config(format!("invalid base URL '{}': {}", address, e)))
  }

  fn validate(&self) -> Result<()> {
    for address in [
      &self.endpoints.fund_requests,
      &self.endpoints.shared_expenses,
      &self.endpoints.funds,
      &self.endpoints.kyc,
    ] {
      Self::base_url(address)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn sample_yaml() -> &'static str {
    "endpoints:\n\
     \x20 fund_requests: https://api.example.com/fund-requests-svc\n\
     \x20 shared_expenses: https://api.example.com/expenses-svc\n\
     \x20 funds: https://api.example.com/funds-svc\n\
     \x20 kyc: https://api.example.com/kyc-svc\n\
     cache:\n\
     \x20 retention_secs: 30\n"
  }

  #[test]
  fn loads_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(sample_yaml().as_bytes()).unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.endpoints.funds, "https://api.example.com/funds-svc");
    assert_eq!(config.cache.retention_secs, 30);
    // stale_secs falls back to the default when omitted
    assert_eq!(config.cache.stale_secs, 300);
  }

  #[test]
  fn missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/config.yaml"))).unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
  }

  #[test]
  fn rejects_invalid_base_url() {
    let yaml = "endpoints:\n\
      \x20 fund_requests: not a url\n\
      \x20 shared_expenses: https://b.example.com\n\
      \x20 funds: https://c.example.com\n\
      \x20 kyc: https://d.example.com\n";
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
  }
}
