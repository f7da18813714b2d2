use std::{collections::BTreeMap, fmt};

use k8s_openapi::{
  api::{
    apps, batch,
    core::{
      self,
      v1::{PodTemplateSpec, ResourceRequirements},
    },
  },
  apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::{ObjectMeta, OwnerReference}},
};
use serde::{Deserialize, Serialize};

use crate::{
  k8s::{DeploymentConfig, PodMetrics},
  model::image,
};

/// Name of the pseudo-container reported by the metrics API for the pod sandbox
const SANDBOX_CONTAINER: &str = "POD";

/// Kind of a cluster object tracked in a namespace graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kind {
  Deployment,
  StatefulSet,
  DeploymentConfig,
  DaemonSet,
  CronJob,
  Pod,
}

impl Kind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Kind::Deployment => "Deployment",
      Kind::StatefulSet => "StatefulSet",
      Kind::DeploymentConfig => "DeploymentConfig",
      Kind::DaemonSet => "DaemonSet",
      Kind::CronJob => "CronJob",
      Kind::Pod => "Pod",
    }
  }

  /// Prefix of the identity of resources of this kind
  fn id_prefix(&self) -> &'static str {
    match self {
      Kind::Deployment => "deployment",
      Kind::StatefulSet => "sts",
      Kind::DeploymentConfig => "deploymentconfig",
      Kind::DaemonSet => "daemonset",
      Kind::CronJob => "cronjob",
      Kind::Pod => "pod",
    }
  }
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A container declared by the pod template of a workload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
  pub container_name: String,
  pub image_reference: String,
  pub resources: Option<ResourceRequirements>,
}

impl ApplicationConfig {
  /// True when the image is pinned by digest and must be resolved through an image stream
  pub fn is_image_stream(&self) -> bool {
    image::is_image_stream_reference(&self.image_reference)
  }

  /// Name of the ImageStreamImage holding the image, e.g. `app@sha256:...`
  pub fn image_stream_id(&self) -> &str {
    match self.image_reference.rsplit_once('/') {
      Some((_, id)) => id,
      None => &self.image_reference,
    }
  }
}

fn application_configs(template: Option<&PodTemplateSpec>) -> Vec<ApplicationConfig> {
  template
    .and_then(|t| t.spec.as_ref())
    .map(|spec| {
      spec
        .containers
        .iter()
        .map(|c| ApplicationConfig {
          container_name: c.name.clone(),
          image_reference: c.image.clone().unwrap_or_default(),
          resources: c.resources.clone(),
        })
        .collect()
    })
    .unwrap_or_default()
}

/// Identity of a resource, fixed when the resource is discovered
#[derive(Clone, Debug, PartialEq)]
struct Metadata {
  id: String,
  name: String,
  owner_references: Vec<OwnerReference>,
}

impl Metadata {
  fn new(kind: Kind, meta: ObjectMeta) -> Self {
    let name = meta.name.unwrap_or_default();
    Self {
      id: format!("{} {name}", kind.id_prefix()),
      name,
      owner_references: meta.owner_references.unwrap_or_default(),
    }
  }
}

/// A controller resource declaring a set of containers
#[derive(Clone, Debug, PartialEq)]
pub struct Workload {
  metadata: Metadata,
  containers: Vec<ApplicationConfig>,
}

impl Workload {
  fn new(kind: Kind, meta: ObjectMeta, template: Option<&PodTemplateSpec>) -> Self {
    Self {
      metadata: Metadata::new(kind, meta),
      containers: application_configs(template),
    }
  }

  pub fn name(&self) -> &str {
    &self.metadata.name
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pod {
  metadata: Metadata,
  phase: Option<String>,
  ready: bool,
  usage: Option<PodMetrics>,
}

impl Pod {
  pub fn name(&self) -> &str {
    &self.metadata.name
  }

  pub fn id(&self) -> &str {
    &self.metadata.id
  }

  pub fn phase(&self) -> Option<&str> {
    self.phase.as_deref()
  }

  pub fn is_running(&self) -> bool {
    self.phase() == Some("Running")
  }

  pub fn is_ready(&self) -> bool {
    self.ready
  }

  pub fn usage(&self) -> Option<&PodMetrics> {
    self.usage.as_ref()
  }

  pub fn set_usage(&mut self, usage: PodMetrics) {
    self.usage = Some(usage);
  }

  /// Returns the usage of the named container, only for running pods with an attached snapshot
  pub fn usage_for_container(&self, container_name: &str) -> Option<&BTreeMap<String, Quantity>> {
    if !self.is_running() {
      return None;
    }

    self
      .usage
      .as_ref()?
      .containers
      .iter()
      .filter(|c| c.name != SANDBOX_CONTAINER)
      .find(|c| c.name == container_name)
      .map(|c| &c.usage)
  }
}

impl From<core::v1::Pod> for Pod {
  fn from(pod: core::v1::Pod) -> Self {
    let status = pod.status.unwrap_or_default();
    let ready = status
      .conditions
      .unwrap_or_default()
      .iter()
      .find(|c| c.type_ == "Ready")
      .is_some_and(|c| c.status == "True");

    Self {
      metadata: Metadata::new(Kind::Pod, pod.metadata),
      phase: status.phase,
      ready,
      usage: None,
    }
  }
}

/// A cluster object tracked by the topology
///
/// All variants share an identity and owner references. Controllers additionally
/// expose the containers of their pod template through [`Resource::application_configs`]
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
  Deployment(Workload),
  StatefulSet(Workload),
  DeploymentConfig(Workload),
  DaemonSet(Workload),
  CronJob(Workload),
  Pod(Pod),
}

impl Resource {
  pub fn kind(&self) -> Kind {
    match self {
      Resource::Deployment(_) => Kind::Deployment,
      Resource::StatefulSet(_) => Kind::StatefulSet,
      Resource::DeploymentConfig(_) => Kind::DeploymentConfig,
      Resource::DaemonSet(_) => Kind::DaemonSet,
      Resource::CronJob(_) => Kind::CronJob,
      Resource::Pod(_) => Kind::Pod,
    }
  }

  fn metadata(&self) -> &Metadata {
    match self {
      Resource::Deployment(w)
      | Resource::StatefulSet(w)
      | Resource::DeploymentConfig(w)
      | Resource::DaemonSet(w)
      | Resource::CronJob(w) => &w.metadata,
      Resource::Pod(p) => &p.metadata,
    }
  }

  pub fn id(&self) -> &str {
    &self.metadata().id
  }

  pub fn name(&self) -> &str {
    &self.metadata().name
  }

  pub fn label(&self) -> &str {
    self.name()
  }

  pub fn owner_references(&self) -> &[OwnerReference] {
    &self.metadata().owner_references
  }

  /// Returns true if the owner reference points at this resource or at the
  /// intermediate controller it generates
  ///
  /// Intermediate controllers (ReplicaSet, ReplicationController, Job) are matched
  /// by name prefix instead of being listed, so names sharing a prefix can collide
  pub fn is_owner_of(&self, owner: &OwnerReference) -> bool {
    let name = self.name();
    match self {
      Resource::Deployment(_) => match owner.kind.as_str() {
        "Deployment" => owner.name == name,
        "ReplicaSet" => owner.name.starts_with(name),
        _ => false,
      },
      Resource::DeploymentConfig(_) => match owner.kind.as_str() {
        "DeploymentConfig" => owner.name == name,
        "ReplicationController" => owner.name.starts_with(name),
        _ => false,
      },
      Resource::CronJob(_) => owner.kind == "Job" && owner.name.starts_with(name),
      Resource::StatefulSet(_) | Resource::DaemonSet(_) => owner.kind == self.kind().as_str() && owner.name == name,
      Resource::Pod(_) => false,
    }
  }

  /// Containers of the resource, `None` for resources that do not declare any
  pub fn application_configs(&self) -> Option<&[ApplicationConfig]> {
    match self {
      Resource::Deployment(w)
      | Resource::StatefulSet(w)
      | Resource::DeploymentConfig(w)
      | Resource::DaemonSet(w)
      | Resource::CronJob(w) => Some(&w.containers),
      Resource::Pod(_) => None,
    }
  }

  pub fn as_pod(&self) -> Option<&Pod> {
    match self {
      Resource::Pod(pod) => Some(pod),
      _ => None,
    }
  }
}

impl From<apps::v1::Deployment> for Resource {
  fn from(deployment: apps::v1::Deployment) -> Self {
    let apps::v1::Deployment { metadata, spec, .. } = deployment;
    let template = spec.as_ref().map(|s| &s.template);
    Resource::Deployment(Workload::new(Kind::Deployment, metadata, template))
  }
}

impl From<apps::v1::StatefulSet> for Resource {
  fn from(sset: apps::v1::StatefulSet) -> Self {
    let apps::v1::StatefulSet { metadata, spec, .. } = sset;
    let template = spec.as_ref().map(|s| &s.template);
    Resource::StatefulSet(Workload::new(Kind::StatefulSet, metadata, template))
  }
}

impl From<DeploymentConfig> for Resource {
  fn from(dc: DeploymentConfig) -> Self {
    let DeploymentConfig { metadata, spec } = dc;
    Resource::DeploymentConfig(Workload::new(Kind::DeploymentConfig, metadata, spec.template.as_ref()))
  }
}

impl From<apps::v1::DaemonSet> for Resource {
  fn from(dset: apps::v1::DaemonSet) -> Self {
    let apps::v1::DaemonSet { metadata, spec, .. } = dset;
    let template = spec.as_ref().map(|s| &s.template);
    Resource::DaemonSet(Workload::new(Kind::DaemonSet, metadata, template))
  }
}

impl From<batch::v1::CronJob> for Resource {
  fn from(cjob: batch::v1::CronJob) -> Self {
    let batch::v1::CronJob { metadata, spec, .. } = cjob;
    let template = spec
      .as_ref()
      .and_then(|s| s.job_template.spec.as_ref())
      .map(|s| &s.template);
    Resource::CronJob(Workload::new(Kind::CronJob, metadata, template))
  }
}

impl From<core::v1::Pod> for Resource {
  fn from(pod: core::v1::Pod) -> Self {
    Resource::Pod(Pod::from(pod))
  }
}
