use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::{BuildRequest, DEFAULT_REQUEST_BURST};

/// Top-level configuration loaded from `.app-inventory.yaml` or an explicit path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
  /// Environment tag attached to metric samples
  #[serde(default = "default_environment")]
  pub environment: String,

  #[serde(default)]
  pub collection: CollectionConfig,
}

fn default_environment() -> String {
  "default".to_string()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      environment: default_environment(),
      collection: CollectionConfig::default(),
    }
  }
}

/// What is collected from the cluster and how fast.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
  /// Label selector of the namespaces to collect, empty for all
  #[serde(default)]
  pub namespace_selector: String,

  /// Attach resource configuration and usage of running pods
  #[serde(default)]
  pub with_resources: bool,

  /// Maximum number of API calls in flight (default 40).
  #[serde(default = "default_burst")]
  pub burst: usize,

  /// List OpenShift DeploymentConfigs (default true).
  #[serde(default = "default_deployment_configs")]
  pub deployment_configs: bool,
}

fn default_burst() -> usize {
  DEFAULT_REQUEST_BURST
}

fn default_deployment_configs() -> bool {
  true
}

impl Default for CollectionConfig {
  fn default() -> Self {
    Self {
      namespace_selector: String::new(),
      with_resources: false,
      burst: default_burst(),
      deployment_configs: default_deployment_configs(),
    }
  }
}

impl Config {
  pub fn build_request(&self) -> BuildRequest {
    BuildRequest {
      namespace_selector: self.collection.namespace_selector.to_owned(),
      include_resource_usage: self.collection.with_resources,
      request_burst: self.collection.burst,
      include_deployment_configs: self.collection.deployment_configs,
    }
  }
}

const DEFAULT_CONFIG_FILE: &str = ".app-inventory.yaml";

/// Load configuration from an explicit path, the default `.app-inventory.yaml` in the
/// current working directory, or fall back to `Config::default()`.
pub fn load(path: Option<&str>) -> Result<Config> {
  load_from(path, std::env::current_dir().ok().as_deref())
}

fn load_from(path: Option<&str>, base_dir: Option<&std::path::Path>) -> Result<Config> {
  if let Some(p) = path {
    let contents = std::fs::read_to_string(p).with_context(|| format!("Failed to read config file: {p}"))?;
    let config: Config =
      serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {p}"))?;
    return Ok(config);
  }

  if let Some(dir) = base_dir {
    let default_path = dir.join(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
      let contents = std::fs::read_to_string(&default_path)
        .with_context(|| format!("Failed to read config file: {}", default_path.display()))?;
      let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", default_path.display()))?;
      return Ok(config);
    }
  }

  Ok(Config::default())
}
