use std::collections::BTreeMap;

use k8s_openapi::{
  api::{
    apps::v1::{DaemonSet, DaemonSetSpec, Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec},
    batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec},
    core::v1::{Container, Pod, PodSpec, PodStatus, PodTemplateSpec, ResourceRequirements},
  },
  apimachinery::pkg::{
    api::resource::Quantity,
    apis::meta::v1::{ObjectMeta, OwnerReference},
  },
};
use serde_json::json;

use app_inventory::k8s::{ContainerMetrics, DeploymentConfig, DeploymentConfigSpec, PodMetrics, StreamImage};

pub const DIGEST: &str = "sha256:9c3f0a51";

fn meta(name: &str, namespace: &str, owners: &[(&str, &str)]) -> ObjectMeta {
  ObjectMeta {
    name: Some(name.into()),
    namespace: Some(namespace.into()),
    owner_references: (!owners.is_empty()).then(|| {
      owners
        .iter()
        .map(|(kind, name)| OwnerReference {
          api_version: "apps/v1".into(),
          kind: kind.to_string(),
          name: name.to_string(),
          uid: format!("uid-{name}"),
          ..Default::default()
        })
        .collect()
    }),
    ..Default::default()
  }
}

/// Pod template with one container per `(name, image)` pair
pub fn template(containers: &[(&str, &str)]) -> PodTemplateSpec {
  PodTemplateSpec {
    metadata: None,
    spec: Some(PodSpec {
      containers: containers
        .iter()
        .map(|(name, image)| Container {
          name: name.to_string(),
          image: Some(image.to_string()),
          ..Default::default()
        })
        .collect(),
      ..Default::default()
    }),
  }
}

pub fn make_deployment(name: &str, namespace: &str, containers: &[(&str, &str)]) -> Deployment {
  Deployment {
    metadata: meta(name, namespace, &[]),
    spec: Some(DeploymentSpec {
      replicas: Some(2),
      template: template(containers),
      ..Default::default()
    }),
    ..Default::default()
  }
}

/// Creates a Deployment whose single container declares cpu/memory limits and requests
pub fn make_deployment_with_resources(name: &str, namespace: &str, image: &str) -> Deployment {
  let mut deployment = make_deployment(name, namespace, &[("app", image)]);
  let quantities = |cpu: &str, memory: &str| {
    BTreeMap::from([
      ("cpu".to_string(), Quantity(cpu.into())),
      ("memory".to_string(), Quantity(memory.into())),
    ])
  };
  if let Some(spec) = deployment.spec.as_mut().and_then(|s| s.template.spec.as_mut()) {
    spec.containers[0].resources = Some(ResourceRequirements {
      limits: Some(quantities("500m", "256Mi")),
      requests: Some(quantities("100m", "128Mi")),
      ..Default::default()
    });
  }
  deployment
}

pub fn make_stateful_set(name: &str, namespace: &str, containers: &[(&str, &str)]) -> StatefulSet {
  StatefulSet {
    metadata: meta(name, namespace, &[]),
    spec: Some(StatefulSetSpec {
      template: template(containers),
      ..Default::default()
    }),
    ..Default::default()
  }
}

pub fn make_daemon_set(name: &str, namespace: &str, containers: &[(&str, &str)]) -> DaemonSet {
  DaemonSet {
    metadata: meta(name, namespace, &[]),
    spec: Some(DaemonSetSpec {
      template: template(containers),
      ..Default::default()
    }),
    ..Default::default()
  }
}

pub fn make_cron_job(name: &str, namespace: &str, containers: &[(&str, &str)]) -> CronJob {
  CronJob {
    metadata: meta(name, namespace, &[]),
    spec: Some(CronJobSpec {
      schedule: "0 * * * *".into(),
      job_template: JobTemplateSpec {
        metadata: None,
        spec: Some(JobSpec {
          template: template(containers),
          ..Default::default()
        }),
      },
      ..Default::default()
    }),
    ..Default::default()
  }
}

pub fn make_deployment_config(name: &str, namespace: &str, containers: &[(&str, &str)]) -> DeploymentConfig {
  DeploymentConfig {
    metadata: meta(name, namespace, &[]),
    spec: DeploymentConfigSpec {
      replicas: Some(1),
      template: Some(template(containers)),
    },
  }
}

/// Creates a Pod in the given phase owned by the `(kind, name)` owner references
pub fn make_pod(name: &str, namespace: &str, phase: &str, owners: &[(&str, &str)]) -> Pod {
  Pod {
    metadata: meta(name, namespace, owners),
    status: Some(PodStatus {
      phase: Some(phase.into()),
      ..Default::default()
    }),
    ..Default::default()
  }
}

/// Usage snapshot with one `(container, cpu, memory)` entry per container
pub fn make_pod_metrics(containers: &[(&str, &str, &str)]) -> PodMetrics {
  PodMetrics {
    timestamp: Some("2024-05-01T12:00:00Z".into()),
    window: Some("30s".into()),
    containers: containers
      .iter()
      .map(|(name, cpu, memory)| ContainerMetrics {
        name: name.to_string(),
        usage: BTreeMap::from([
          ("cpu".to_string(), Quantity(cpu.to_string())),
          ("memory".to_string(), Quantity(memory.to_string())),
        ]),
      })
      .collect(),
  }
}

/// ImageStreamImage content carrying an optional `version` label
pub fn make_stream_image(docker_image_reference: &str, version: Option<&str>) -> StreamImage {
  let labels = match version {
    Some(version) => json!({ "version": version, "vendor": "acme" }),
    None => json!({ "vendor": "acme" }),
  };
  StreamImage {
    docker_image_reference: docker_image_reference.into(),
    docker_image_metadata: Some(json!({ "Config": { "Labels": labels } })),
  }
}

/// Internal registry reference pinned by digest
pub fn image_stream_reference(namespace: &str, name: &str) -> String {
  format!("image-registry.openshift-image-registry.svc:5000/{namespace}/{name}@{DIGEST}")
}
