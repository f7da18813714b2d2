use std::{
  collections::{HashMap, hash_map::Entry},
  sync::Arc,
};

use parking_lot::RwLock;

use crate::model::{image::ApplicationImage, namespace::NamespaceGraph};

/// Cluster-wide aggregate of namespace graphs and resolved images
///
/// Namespace registration and the image cache are guarded by separate locks so
/// namespace workers can share one model while collecting. Clones are handles on
/// the same namespaces and images
#[derive(Clone, Debug, Default)]
pub struct TopologyModel {
  namespaces: Arc<RwLock<HashMap<String, Arc<NamespaceGraph>>>>,
  images: Arc<RwLock<HashMap<String, Arc<ApplicationImage>>>>,
}

impl TopologyModel {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers the graph under its name, replacing any graph registered under the same name
  ///
  /// Workers register an empty graph when they start and the graph they collected
  /// when they finish
  pub fn add_namespace(&self, graph: NamespaceGraph) -> Arc<NamespaceGraph> {
    let graph = Arc::new(graph);
    self.namespaces.write().insert(graph.name().to_owned(), Arc::clone(&graph));
    graph
  }

  pub fn namespace(&self, name: &str) -> Option<Arc<NamespaceGraph>> {
    self.namespaces.read().get(name).cloned()
  }

  /// All registered namespaces, in no particular order
  pub fn all_namespaces(&self) -> Vec<Arc<NamespaceGraph>> {
    self.namespaces.read().values().cloned().collect()
  }

  pub fn sorted_namespaces(&self) -> Vec<Arc<NamespaceGraph>> {
    let mut namespaces = self.all_namespaces();
    namespaces.sort_by(|a, b| a.name().cmp(b.name()));
    namespaces
  }

  /// Caches the image for the reference unless one is already cached
  ///
  /// Returns false when an earlier image for the reference was kept
  pub fn add_image(&self, reference: impl Into<String>, image: ApplicationImage) -> bool {
    match self.images.write().entry(reference.into()) {
      Entry::Vacant(entry) => {
        entry.insert(Arc::new(image));
        true
      }
      Entry::Occupied(_) => false,
    }
  }

  pub fn image_by_reference(&self, reference: &str) -> Option<Arc<ApplicationImage>> {
    self.images.read().get(reference).cloned()
  }

  pub fn contains_image(&self, reference: &str) -> bool {
    self.images.read().contains_key(reference)
  }

  pub fn image_count(&self) -> usize {
    self.images.read().len()
  }
}
