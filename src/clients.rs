use std::future::Future;

use anyhow::Result;
use k8s_openapi::api::{apps, batch, core::v1::Pod};
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use tokio::sync::Semaphore;

use crate::{
  builder::BuildError,
  k8s::{self, DeploymentConfig, PodMetrics, StreamImage},
};

/// Trait abstracting all Kubernetes API operations used while building the inventory
pub trait ClusterClients {
  fn list_namespaces(&self, selector: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
  fn list_deployments(&self, namespace: &str) -> impl Future<Output = Result<Vec<apps::v1::Deployment>>> + Send;
  fn list_stateful_sets(&self, namespace: &str) -> impl Future<Output = Result<Vec<apps::v1::StatefulSet>>> + Send;
  fn list_deployment_configs(&self, namespace: &str) -> impl Future<Output = Result<Vec<DeploymentConfig>>> + Send;
  fn list_cron_jobs(&self, namespace: &str) -> impl Future<Output = Result<Vec<batch::v1::CronJob>>> + Send;
  fn list_daemon_sets(&self, namespace: &str) -> impl Future<Output = Result<Vec<apps::v1::DaemonSet>>> + Send;
  fn list_pods(&self, namespace: &str) -> impl Future<Output = Result<Vec<Pod>>> + Send;
  fn get_image_stream_image(&self, namespace: &str, name: &str) -> impl Future<Output = Result<StreamImage>> + Send;
  fn get_pod_metrics(&self, namespace: &str, name: &str) -> impl Future<Output = Result<PodMetrics>> + Send;
}

/// Kubernetes client implementation wrapping kube-rs
///
/// All calls share one pool of `burst` permits, so the bound holds across every
/// namespace collected concurrently
pub struct KubeClients {
  client: kube::Client,
  limiter: Semaphore,
}

impl KubeClients {
  /// Burst is clamped to between one permit and `Semaphore::MAX_PERMITS`
  pub fn new(client: kube::Client, burst: usize) -> Self {
    Self {
      client,
      limiter: Semaphore::new(burst.clamp(1, Semaphore::MAX_PERMITS)),
    }
  }

  /// Connects with the given kubeconfig file, or else with the default kubeconfig
  /// or the in-cluster service account
  pub async fn connect(kubeconfig: Option<&str>, burst: usize) -> Result<Self, BuildError> {
    let client = match kubeconfig {
      Some(path) => {
        let kubeconfig_error = |source: KubeconfigError| BuildError::Kubeconfig {
          path: path.to_owned(),
          source,
        };
        let kubeconfig = Kubeconfig::read_from(path).map_err(kubeconfig_error)?;
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
          .await
          .map_err(kubeconfig_error)?;
        kube::Client::try_from(config).map_err(BuildError::Connect)?
      }
      None => kube::Client::try_default().await.map_err(BuildError::Connect)?,
    };
    Ok(Self::new(client, burst))
  }

  async fn throttled<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
    let _permit = self.limiter.acquire().await?;
    call.await
  }
}

impl ClusterClients for KubeClients {
  async fn list_namespaces(&self, selector: &str) -> Result<Vec<String>> {
    self.throttled(k8s::get_namespaces(&self.client, selector)).await
  }

  async fn list_deployments(&self, namespace: &str) -> Result<Vec<apps::v1::Deployment>> {
    self.throttled(k8s::get_deployments(&self.client, namespace)).await
  }

  async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<apps::v1::StatefulSet>> {
    self.throttled(k8s::get_stateful_sets(&self.client, namespace)).await
  }

  async fn list_deployment_configs(&self, namespace: &str) -> Result<Vec<DeploymentConfig>> {
    self.throttled(k8s::get_deployment_configs(&self.client, namespace)).await
  }

  async fn list_cron_jobs(&self, namespace: &str) -> Result<Vec<batch::v1::CronJob>> {
    self.throttled(k8s::get_cron_jobs(&self.client, namespace)).await
  }

  async fn list_daemon_sets(&self, namespace: &str) -> Result<Vec<apps::v1::DaemonSet>> {
    self.throttled(k8s::get_daemon_sets(&self.client, namespace)).await
  }

  async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
    self.throttled(k8s::get_pods(&self.client, namespace)).await
  }

  async fn get_image_stream_image(&self, namespace: &str, name: &str) -> Result<StreamImage> {
    self.throttled(k8s::get_image_stream_image(&self.client, namespace, name)).await
  }

  async fn get_pod_metrics(&self, namespace: &str, name: &str) -> Result<PodMetrics> {
    self.throttled(k8s::get_pod_metrics(&self.client, namespace, name)).await
  }
}
