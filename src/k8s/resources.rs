use std::{collections::BTreeMap, fmt::Debug};

use anyhow::{Context, Result};
use k8s_openapi::{
  NamespaceResourceScope,
  api::{
    apps, batch,
    core::v1::{Namespace, Pod, PodTemplateSpec},
  },
  apimachinery::pkg::api::resource::Quantity,
};
use kube::{
  Client, CustomResource, Resource,
  api::{Api, ApiResource, DynamicObject, ListParams},
  core::GroupVersionKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// DeploymentConfig as served by the OpenShift `apps.openshift.io` API group
///
/// Only the fields needed to discover the containers of the deployment are modelled
/// <https://docs.openshift.com/container-platform/latest/rest_api/workloads_apis/deploymentconfig-apps-openshift-io-v1.html>
#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(
  derive = "Default",
  derive = "PartialEq",
  group = "apps.openshift.io",
  kind = "DeploymentConfig",
  namespaced,
  schema = "disabled",
  plural = "deploymentconfigs",
  singular = "deploymentconfig",
  version = "v1"
)]
pub struct DeploymentConfigSpec {
  pub replicas: Option<i32>,
  pub template: Option<PodTemplateSpec>,
}

/// The `image` of an OpenShift ImageStreamImage
///
/// `dockerImageMetadata` is kept as the raw embedded document; it is only
/// decoded when the image version is derived from its labels
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamImage {
  #[serde(default)]
  pub docker_image_reference: String,
  pub docker_image_metadata: Option<serde_json::Value>,
}

/// Usage snapshot of a pod from the `metrics.k8s.io` API
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PodMetrics {
  pub timestamp: Option<String>,
  pub window: Option<String>,
  #[serde(default)]
  pub containers: Vec<ContainerMetrics>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ContainerMetrics {
  pub name: String,
  #[serde(default)]
  pub usage: BTreeMap<String, Quantity>,
}

/// Returns the names of the namespaces matching the label selector
///
/// An empty selector matches all namespaces
pub async fn get_namespaces(client: &Client, selector: &str) -> Result<Vec<String>> {
  let api: Api<Namespace> = Api::all(client.clone());
  let params = match selector {
    "" => ListParams::default(),
    selector => ListParams::default().labels(selector),
  };
  let namespace_list = api.list(&params).await?;

  Ok(namespace_list.items.into_iter().filter_map(|ns| ns.metadata.name).collect())
}

async fn list_namespaced<K>(client: &Client, namespace: &str) -> Result<Vec<K>>
where
  K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
  <K as Resource>::DynamicType: Default,
{
  let api: Api<K> = Api::namespaced(client.clone(), namespace);
  let list = api
    .list(&ListParams::default())
    .await
    .with_context(|| format!("Cannot list {} in namespace {namespace}", K::plural(&Default::default())))?;

  Ok(list.items)
}

pub async fn get_deployments(client: &Client, namespace: &str) -> Result<Vec<apps::v1::Deployment>> {
  list_namespaced(client, namespace).await
}

pub async fn get_stateful_sets(client: &Client, namespace: &str) -> Result<Vec<apps::v1::StatefulSet>> {
  list_namespaced(client, namespace).await
}

pub async fn get_deployment_configs(client: &Client, namespace: &str) -> Result<Vec<DeploymentConfig>> {
  list_namespaced(client, namespace).await
}

pub async fn get_cron_jobs(client: &Client, namespace: &str) -> Result<Vec<batch::v1::CronJob>> {
  list_namespaced(client, namespace).await
}

pub async fn get_daemon_sets(client: &Client, namespace: &str) -> Result<Vec<apps::v1::DaemonSet>> {
  list_namespaced(client, namespace).await
}

pub async fn get_pods(client: &Client, namespace: &str) -> Result<Vec<Pod>> {
  list_namespaced(client, namespace).await
}

/// Fetches a namespaced object of a kind that is not known at compile time
async fn get_dynamic(client: &Client, namespace: &str, name: &str, gvk: &GroupVersionKind, plural: &str) -> Result<DynamicObject> {
  let resource = ApiResource::from_gvk_with_plural(gvk, plural);
  let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &resource);
  let object = api
    .get(name)
    .await
    .with_context(|| format!("Cannot get {}/{name} in namespace {namespace}", gvk.kind))?;

  Ok(object)
}

/// Returns the image behind an image stream reference such as `app@sha256:...`
pub async fn get_image_stream_image(client: &Client, namespace: &str, name: &str) -> Result<StreamImage> {
  let gvk = GroupVersionKind::gvk("image.openshift.io", "v1", "ImageStreamImage");
  let object = get_dynamic(client, namespace, name, &gvk, "imagestreamimages").await?;
  let image = object
    .data
    .get("image")
    .cloned()
    .with_context(|| format!("ImageStreamImage {name} has no image"))?;

  Ok(serde_json::from_value(image)?)
}

/// Returns the current usage snapshot of a pod
pub async fn get_pod_metrics(client: &Client, namespace: &str, name: &str) -> Result<PodMetrics> {
  let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
  let object = get_dynamic(client, namespace, name, &gvk, "pods").await?;

  Ok(serde_json::from_value(object.data)?)
}
