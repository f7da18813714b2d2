use clap::{Parser, builder::NonEmptyStringValueParser};
use clap_verbosity_flag::{Verbosity, WarnLevel};

use crate::{config::Config, output};

/// Inventory the applications and container images running in a Kubernetes or OpenShift cluster
#[derive(Parser, Debug)]
#[command(author, about, version)]
pub struct Cli {
  /// Path to the configuration file, defaults to `.app-inventory.yaml` in the current directory
  #[arg(long)]
  pub config: Option<String>,

  /// Path to the kubeconfig file, defaults to `KUBECONFIG` or `~/.kube/config`
  #[arg(long)]
  pub kubeconfig: Option<String>,

  /// Label selector of the namespaces to collect
  #[arg(long = "ns-selector")]
  pub namespace_selector: Option<String>,

  /// Include resource configuration and usage of running pods
  #[arg(long)]
  pub with_resources: bool,

  /// Maximum number of Kubernetes API calls in flight
  #[arg(long)]
  pub burst: Option<usize>,

  /// Environment tag attached to metric samples
  #[arg(long, value_parser = NonEmptyStringValueParser::new())]
  pub environment: Option<String>,

  /// Do not list OpenShift DeploymentConfigs, for clusters without the `apps.openshift.io` API group
  #[arg(long)]
  pub no_deployment_configs: bool,

  #[arg(short, long, value_enum, default_value_t)]
  pub format: output::Format,

  /// Write to file instead of stdout
  #[arg(short, long)]
  pub output: Option<String>,

  #[clap(flatten)]
  pub verbose: Verbosity<WarnLevel>,
}

impl Cli {
  /// Overrides the values of the configuration file with the flags that were given
  pub fn apply(&self, mut config: Config) -> Config {
    if let Some(selector) = &self.namespace_selector {
      config.collection.namespace_selector = selector.to_owned();
    }
    if self.with_resources {
      config.collection.with_resources = true;
    }
    if let Some(burst) = self.burst {
      config.collection.burst = burst;
    }
    if let Some(environment) = &self.environment {
      config.environment = environment.to_owned();
    }
    if self.no_deployment_configs {
      config.collection.deployment_configs = false;
    }

    config
  }
}
