use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::debug;

use crate::model::resource::{ApplicationConfig, Kind, Pod, Resource};

/// Resources of one namespace, indexed by kind
///
/// Within a kind, resources keep the order in which they were added
#[derive(Clone, Debug, Default)]
pub struct NamespaceGraph {
  name: String,
  resources_by_kind: BTreeMap<Kind, Vec<Resource>>,
}

impl NamespaceGraph {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      resources_by_kind: BTreeMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn lookup(&self, kind: Kind, id: &str) -> Option<&Resource> {
    self.resources_by_kind(kind).iter().find(|r| r.id() == id)
  }

  /// Adds the resource unless one of the same kind and id is already present
  ///
  /// Returns false when the resource was a duplicate and has been dropped
  pub fn add_resource(&mut self, resource: Resource) -> bool {
    if self.lookup(resource.kind(), resource.id()).is_some() {
      debug!("Skipped existing resource {} of kind {}", resource.name(), resource.kind());
      return false;
    }

    debug!("Adding resource {} of kind {}", resource.name(), resource.kind());
    self.resources_by_kind.entry(resource.kind()).or_default().push(resource);
    true
  }

  /// Returns the first resource recognizing the owner reference as its own
  pub fn lookup_owner(&self, owner: &OwnerReference) -> Option<&Resource> {
    self.all_resources().find(|r| r.is_owner_of(owner))
  }

  pub fn resources_by_kind(&self, kind: Kind) -> &[Resource] {
    self.resources_by_kind.get(&kind).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
    self.resources_by_kind.values().flatten()
  }

  /// Resources declaring containers, paired with those containers
  pub fn application_providers(&self) -> impl Iterator<Item = (&Resource, &[ApplicationConfig])> {
    self
      .all_resources()
      .filter_map(|r| r.application_configs().map(|configs| (r, configs)))
  }

  /// Returns the pods whose owner references are recognized by the parent
  ///
  /// A pod is returned once even when several of its owner references match
  pub fn all_pods_owned_by(&self, parent: &Resource) -> Vec<&Pod> {
    self
      .resources_by_kind(Kind::Pod)
      .iter()
      .filter(|pod| pod.owner_references().iter().any(|owner| parent.is_owner_of(owner)))
      .filter_map(Resource::as_pod)
      .collect()
  }

  pub fn len(&self) -> usize {
    self.resources_by_kind.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
