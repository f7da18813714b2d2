use std::{error::Error, sync::Arc, time::Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{
  clients::ClusterClients,
  model::{ApplicationConfig, ApplicationImage, Kind, NamespaceGraph, Pod, Resource, TopologyModel},
};

/// Default bound on the API calls in flight across all namespaces
pub const DEFAULT_REQUEST_BURST: usize = 40;

/// Parameters of a single inventory build
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
  /// Label selector applied to namespaces, empty for all namespaces
  pub namespace_selector: String,
  /// Attach usage snapshots of running pods
  pub include_resource_usage: bool,
  pub request_burst: usize,
  /// List `apps.openshift.io` DeploymentConfigs, disable on clusters without that API group
  pub include_deployment_configs: bool,
}

impl Default for BuildRequest {
  fn default() -> Self {
    Self {
      namespace_selector: String::new(),
      include_resource_usage: false,
      request_burst: DEFAULT_REQUEST_BURST,
      include_deployment_configs: true,
    }
  }
}

/// Fatal failures of an inventory build
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  #[error("Unable to connect to cluster, ensure a kubeconfig file is present and points at the cluster")]
  Connect(#[source] kube::Error),

  #[error("Unable to load kubeconfig file {path}")]
  Kubeconfig {
    path: String,
    #[source]
    source: kube::config::KubeconfigError,
  },

  #[error("Unable to list namespaces matching selector '{selector}'")]
  ListNamespaces {
    selector: String,
    #[source]
    source: Box<dyn Error + Send + Sync>,
  },

  #[error("Unable to collect resources of namespace {namespace}")]
  Namespace {
    namespace: String,
    #[source]
    source: Box<dyn Error + Send + Sync>,
  },

  #[error("A namespace worker did not complete")]
  Worker(#[source] tokio::task::JoinError),
}

/// Builds a [`TopologyModel`] by collecting every selected namespace on its own task
///
/// All namespaces run to completion even when some of them fail; the build then
/// reports the first recorded failure and the partially populated model is dropped
pub struct ModelBuilder<C> {
  clients: Arc<C>,
  request: Arc<BuildRequest>,
  model: TopologyModel,
}

impl<C> Clone for ModelBuilder<C> {
  fn clone(&self) -> Self {
    Self {
      clients: Arc::clone(&self.clients),
      request: Arc::clone(&self.request),
      model: self.model.clone(),
    }
  }
}

impl<C> ModelBuilder<C>
where
  C: ClusterClients + Send + Sync + 'static,
{
  pub fn new(clients: Arc<C>, request: BuildRequest) -> Self {
    Self {
      clients,
      request: Arc::new(request),
      model: TopologyModel::new(),
    }
  }

  pub async fn build(self) -> Result<TopologyModel, BuildError> {
    info!("Building inventory with {:?}", self.request);
    self.collect_cluster().await?;

    Ok(self.model)
  }

  async fn collect_cluster(&self) -> Result<(), BuildError> {
    let selector = &self.request.namespace_selector;
    debug!("Namespace selector: '{selector}'");

    let namespaces = self
      .clients
      .list_namespaces(selector)
      .await
      .map_err(|err| BuildError::ListNamespaces {
        selector: selector.to_owned(),
        source: err.into(),
      })?;

    let start = Instant::now();
    let (errors, mut failures) = mpsc::channel(namespaces.len().max(1));
    let mut workers = JoinSet::new();
    for namespace in &namespaces {
      let worker = self.clone();
      let errors = errors.clone();
      let namespace = namespace.to_owned();
      workers.spawn(async move { worker.collect_namespace(&namespace, &errors).await });
    }
    drop(errors);

    let mut aborted = None;
    while let Some(joined) = workers.join_next().await {
      if let Err(err) = joined {
        warn!("Namespace worker did not complete: {err}");
        aborted.get_or_insert(err);
      }
    }

    info!(
      "Collected {} namespaces in {:?} with a request burst of {}",
      namespaces.len(),
      start.elapsed(),
      self.request.request_burst
    );

    if let Ok(err) = failures.try_recv() {
      return Err(err);
    }
    match aborted {
      Some(err) => Err(BuildError::Worker(err)),
      None => Ok(()),
    }
  }

  /// Registers the namespace, collects it and then replaces the registration with
  /// the collected graph, complete or not
  async fn collect_namespace(&self, namespace: &str, errors: &mpsc::Sender<BuildError>) {
    info!("Collecting namespace {namespace}");
    self.model.add_namespace(NamespaceGraph::new(namespace));

    let mut graph = NamespaceGraph::new(namespace);
    let result = self.populate_namespace(&mut graph).await;
    let graph = self.model.add_namespace(graph);

    match result {
      Ok(()) => info!("Collected namespace {namespace} with {} resources", graph.len()),
      Err(err) => {
        warn!("Failed to collect namespace {namespace}: {err:#}");
        let failure = BuildError::Namespace {
          namespace: namespace.to_owned(),
          source: err.into(),
        };
        if let Err(err) = errors.try_send(failure) {
          debug!("Discarded failure of namespace {namespace}: {err}");
        }
      }
    }
  }

  async fn populate_namespace(&self, graph: &mut NamespaceGraph) -> Result<()> {
    let namespace = graph.name().to_owned();
    let ns = namespace.as_str();

    let deployments = self.clients.list_deployments(ns).await?;
    self.add_providers(graph, deployments.into_iter().map(Resource::from).collect()).await;

    let stateful_sets = self.clients.list_stateful_sets(ns).await?;
    self.add_providers(graph, stateful_sets.into_iter().map(Resource::from).collect()).await;

    if self.request.include_deployment_configs {
      let deployment_configs = self.clients.list_deployment_configs(ns).await?;
      self.add_providers(graph, deployment_configs.into_iter().map(Resource::from).collect()).await;
    } else {
      debug!("Skipping DeploymentConfigs in namespace {ns}");
    }

    let cron_jobs = self.clients.list_cron_jobs(ns).await?;
    self.add_providers(graph, cron_jobs.into_iter().map(Resource::from).collect()).await;

    let daemon_sets = self.clients.list_daemon_sets(ns).await?;
    self.add_providers(graph, daemon_sets.into_iter().map(Resource::from).collect()).await;

    for pod in self.clients.list_pods(ns).await? {
      let mut pod = Pod::from(pod);
      debug!("Found Pod {} in namespace {ns}", pod.name());

      let is_new = graph.lookup(Kind::Pod, pod.id()).is_none();
      if is_new && self.request.include_resource_usage && pod.is_running() {
        match self.clients.get_pod_metrics(ns, pod.name()).await {
          Ok(usage) => pod.set_usage(usage),
          Err(err) => warn!("No usage metrics for pod {} in namespace {ns}: {err:#}", pod.name()),
        }
      }
      graph.add_resource(Resource::Pod(pod));
    }

    Ok(())
  }

  /// Adds the resources and resolves the images of those that were not duplicates
  async fn add_providers(&self, graph: &mut NamespaceGraph, resources: Vec<Resource>) {
    for resource in resources {
      debug!("Found {} {} in namespace {}", resource.kind(), resource.name(), graph.name());
      let configs = resource.application_configs().map(<[ApplicationConfig]>::to_vec).unwrap_or_default();

      if graph.add_resource(resource) {
        for config in &configs {
          self.resolve_image(graph.name(), config).await;
        }
      }
    }
  }

  /// Caches the image of the container, unless it is cached already or its image stream cannot be read
  async fn resolve_image(&self, namespace: &str, config: &ApplicationConfig) {
    let reference = &config.image_reference;
    if self.model.contains_image(reference) {
      debug!("Image {reference} already resolved");
      return;
    }

    let image = if config.is_image_stream() {
      let stream_id = config.image_stream_id();
      match self.clients.get_image_stream_image(namespace, stream_id).await {
        Ok(stream) => ApplicationImage::by_image_stream(reference, &stream),
        Err(err) => {
          warn!("Cannot resolve ImageStreamImage {stream_id} in namespace {namespace}: {err:#}");
          return;
        }
      }
    } else {
      ApplicationImage::by_registry(reference)
    };

    debug!("Resolved image {reference} to {} {}", image.name(), image.version());
    self.model.add_image(reference, image);
  }
}
