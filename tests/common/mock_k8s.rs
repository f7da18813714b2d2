use std::{
  collections::HashMap,
  sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{Result, bail};
use k8s_openapi::api::{
  apps::v1::{DaemonSet, Deployment, StatefulSet},
  batch::v1::CronJob,
  core::v1::Pod,
};
use parking_lot::Mutex;

use app_inventory::clients::ClusterClients;
use app_inventory::k8s::{DeploymentConfig, PodMetrics, StreamImage};

/// Mock cluster serving in-memory objects keyed by namespace
#[derive(Default)]
pub struct MockClusterClients {
  pub namespaces: Vec<String>,
  pub deployments: HashMap<String, Vec<Deployment>>,
  pub stateful_sets: HashMap<String, Vec<StatefulSet>>,
  pub deployment_configs: HashMap<String, Vec<DeploymentConfig>>,
  pub cron_jobs: HashMap<String, Vec<CronJob>>,
  pub daemon_sets: HashMap<String, Vec<DaemonSet>>,
  pub pods: HashMap<String, Vec<Pod>>,
  /// ImageStreamImages keyed by their name, e.g. `app@sha256:...`
  pub stream_images: HashMap<String, StreamImage>,
  /// Usage snapshots keyed by pod name
  pub pod_metrics: HashMap<String, PodMetrics>,
  /// Namespaces whose StatefulSet listing fails
  pub failing_namespaces: Vec<String>,

  pub selectors: Mutex<Vec<String>>,
  pub deployment_config_calls: AtomicUsize,
  pub stream_image_calls: AtomicUsize,
  pub pod_metrics_calls: AtomicUsize,
}

impl MockClusterClients {
  pub fn with_namespaces(namespaces: &[&str]) -> Self {
    Self {
      namespaces: namespaces.iter().map(|ns| ns.to_string()).collect(),
      ..Default::default()
    }
  }

  pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
  }

  fn listed<T: Clone>(objects: &HashMap<String, Vec<T>>, namespace: &str) -> Vec<T> {
    objects.get(namespace).cloned().unwrap_or_default()
  }
}

impl ClusterClients for MockClusterClients {
  async fn list_namespaces(&self, selector: &str) -> Result<Vec<String>> {
    self.selectors.lock().push(selector.to_string());
    Ok(self.namespaces.clone())
  }

  async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>> {
    Ok(Self::listed(&self.deployments, namespace))
  }

  async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>> {
    if self.failing_namespaces.iter().any(|ns| ns == namespace) {
      bail!("mock K8s error in namespace {namespace}");
    }
    Ok(Self::listed(&self.stateful_sets, namespace))
  }

  async fn list_deployment_configs(&self, namespace: &str) -> Result<Vec<DeploymentConfig>> {
    self.deployment_config_calls.fetch_add(1, Ordering::SeqCst);
    Ok(Self::listed(&self.deployment_configs, namespace))
  }

  async fn list_cron_jobs(&self, namespace: &str) -> Result<Vec<CronJob>> {
    Ok(Self::listed(&self.cron_jobs, namespace))
  }

  async fn list_daemon_sets(&self, namespace: &str) -> Result<Vec<DaemonSet>> {
    Ok(Self::listed(&self.daemon_sets, namespace))
  }

  async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
    Ok(Self::listed(&self.pods, namespace))
  }

  async fn get_image_stream_image(&self, namespace: &str, name: &str) -> Result<StreamImage> {
    self.stream_image_calls.fetch_add(1, Ordering::SeqCst);
    match self.stream_images.get(name) {
      Some(image) => Ok(image.clone()),
      None => bail!("imagestreamimages {name} not found in namespace {namespace}"),
    }
  }

  async fn get_pod_metrics(&self, namespace: &str, name: &str) -> Result<PodMetrics> {
    self.pod_metrics_calls.fetch_add(1, Ordering::SeqCst);
    match self.pod_metrics.get(name) {
      Some(metrics) => Ok(metrics.clone()),
      None => bail!("pods.metrics.k8s.io {name} not found in namespace {namespace}"),
    }
  }
}

/// Mock that returns errors for all methods
pub struct MockClusterClientsError;

impl ClusterClients for MockClusterClientsError {
  async fn list_namespaces(&self, _selector: &str) -> Result<Vec<String>> { bail!("mock K8s error") }
  async fn list_deployments(&self, _namespace: &str) -> Result<Vec<Deployment>> { bail!("mock K8s error") }
  async fn list_stateful_sets(&self, _namespace: &str) -> Result<Vec<StatefulSet>> { bail!("mock K8s error") }
  async fn list_deployment_configs(&self, _namespace: &str) -> Result<Vec<DeploymentConfig>> { bail!("mock K8s error") }
  async fn list_cron_jobs(&self, _namespace: &str) -> Result<Vec<CronJob>> { bail!("mock K8s error") }
  async fn list_daemon_sets(&self, _namespace: &str) -> Result<Vec<DaemonSet>> { bail!("mock K8s error") }
  async fn list_pods(&self, _namespace: &str) -> Result<Vec<Pod>> { bail!("mock K8s error") }
  async fn get_image_stream_image(&self, _namespace: &str, _name: &str) -> Result<StreamImage> { bail!("mock K8s error") }
  async fn get_pod_metrics(&self, _namespace: &str, _name: &str) -> Result<PodMetrics> { bail!("mock K8s error") }
}
