use std::{collections::BTreeMap, fs::File, io::prelude::*};

use anyhow::{Context, Result};
use clap::ValueEnum;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled, settings::Style};

use crate::model::{ApplicationConfig, NOT_AVAILABLE, NamespaceGraph, Resource, TopologyModel};

const CSV_HEADER: &str = "namespace,application,kind,container,imageName,imageVersion,fullImageName";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Format {
  /// Table written to stdout
  #[default]
  Text,
  /// Comma separated values with a header row
  Csv,
  /// JSON array of the rows used for logging or writing to a *.json file
  Json,
  /// Prometheus text exposition of application gauges
  Metrics,
}

/// Settings shared by the renderers
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
  /// Value of the `environment` label of metric samples
  pub environment: String,
  /// Include resource configuration and usage samples
  pub with_resources: bool,
}

/// One container of an application provider
#[derive(Clone, Debug, PartialEq, Serialize, Tabled)]
#[tabled(rename_all = "UpperCase")]
pub struct ApplicationRow {
  pub namespace: String,
  pub application: String,
  pub kind: String,
  pub container: String,
  #[serde(rename = "imageName")]
  pub image: String,
  #[serde(rename = "imageVersion")]
  pub version: String,
  #[serde(rename = "fullImageName")]
  #[tabled(rename = "FULL IMAGE")]
  pub full_image: String,
}

/// Name, version and full name of the container image, the raw reference when it was not resolved
fn image_columns(model: &TopologyModel, config: &ApplicationConfig) -> (String, String, String) {
  match model.image_by_reference(&config.image_reference) {
    Some(image) => (image.name().to_owned(), image.version().to_owned(), image.full_name().to_owned()),
    None => (
      config.image_reference.to_owned(),
      NOT_AVAILABLE.to_owned(),
      config.image_reference.to_owned(),
    ),
  }
}

/// Rows of all containers, by namespace name, then kind, then listing order
pub fn application_rows(model: &TopologyModel) -> Vec<ApplicationRow> {
  let mut rows = vec![];

  for namespace in model.sorted_namespaces() {
    for (resource, configs) in namespace.application_providers() {
      for config in configs {
        let (image, version, full_image) = image_columns(model, config);
        rows.push(ApplicationRow {
          namespace: namespace.name().to_owned(),
          application: resource.name().to_owned(),
          kind: resource.kind().to_string(),
          container: config.container_name.to_owned(),
          image,
          version,
          full_image,
        });
      }
    }
  }

  rows
}

fn csv_escape(value: &str) -> String {
  if value.contains(',') || value.contains('"') || value.contains('\n') {
    format!("\"{}\"", value.replace('"', "\"\""))
  } else {
    value.to_owned()
  }
}

pub fn to_csv(rows: &[ApplicationRow]) -> String {
  let mut lines = vec![CSV_HEADER.to_owned()];

  for row in rows {
    let fields = [
      &row.namespace,
      &row.application,
      &row.kind,
      &row.container,
      &row.image,
      &row.version,
      &row.full_image,
    ];
    lines.push(fields.map(|f| csv_escape(f)).join(","));
  }

  lines.join("\n")
}

pub fn to_stdout_table(rows: &[ApplicationRow]) -> String {
  let mut table = Table::new(rows);
  table.with(Style::sharp());

  format!("{table}\n")
}

fn quantity_or_na(quantities: Option<&BTreeMap<String, Quantity>>, name: &str) -> String {
  quantities
    .and_then(|q| q.get(name))
    .map(|q| q.0.to_owned())
    .unwrap_or_else(|| NOT_AVAILABLE.to_owned())
}

/// Application gauges registered in a registry owned by a single rendering
struct ApplicationMetrics {
  registry: Registry,
  version: GaugeVec,
  resources_config: GaugeVec,
  resources_usage: GaugeVec,
}

impl ApplicationMetrics {
  fn new(with_resources: bool) -> Result<Self> {
    let registry = Registry::new();

    let version = GaugeVec::new(
      Opts::new("application_version", "Container image of an application"),
      &["environment", "namespace", "application", "type", "container", "image", "version", "full_image"],
    )?;
    let resources_config = GaugeVec::new(
      Opts::new("application_resources_config", "Resource limits and requests of an application container"),
      &[
        "environment",
        "namespace",
        "application",
        "type",
        "container",
        "cpu_limits",
        "memory_limits",
        "cpu_requests",
        "memory_requests",
      ],
    )?;
    let resources_usage = GaugeVec::new(
      Opts::new("application_resources_usage", "Resource usage of an application container in a running pod"),
      &["environment", "namespace", "application", "type", "pod", "container", "cpu_usage", "memory_usage"],
    )?;

    registry
      .register(Box::new(version.clone()))
      .context("Failed to register application_version metric")?;
    if with_resources {
      registry
        .register(Box::new(resources_config.clone()))
        .context("Failed to register application_resources_config metric")?;
      registry
        .register(Box::new(resources_usage.clone()))
        .context("Failed to register application_resources_usage metric")?;
    }

    Ok(Self {
      registry,
      version,
      resources_config,
      resources_usage,
    })
  }

  fn record_config(&self, environment: &str, namespace: &str, resource: &Resource, config: &ApplicationConfig) {
    let kind = resource.kind().to_string();
    let resources = config.resources.as_ref();
    let limits = resources.and_then(|r| r.limits.as_ref());
    let requests = resources.and_then(|r| r.requests.as_ref());

    self
      .resources_config
      .with_label_values(&[
        environment,
        namespace,
        resource.name(),
        &kind,
        &config.container_name,
        &quantity_or_na(limits, "cpu"),
        &quantity_or_na(limits, "memory"),
        &quantity_or_na(requests, "cpu"),
        &quantity_or_na(requests, "memory"),
      ])
      .set(1.0);
  }

  fn record_usage(&self, environment: &str, namespace: &NamespaceGraph, resource: &Resource, config: &ApplicationConfig) {
    let kind = resource.kind().to_string();

    for pod in namespace.all_pods_owned_by(resource) {
      if !pod.is_running() {
        continue;
      }

      let usage = pod
        .usage_for_container(&config.container_name)
        .or_else(|| pod.usage_for_container(pod.name()));
      self
        .resources_usage
        .with_label_values(&[
          environment,
          namespace.name(),
          resource.name(),
          &kind,
          pod.name(),
          &config.container_name,
          &quantity_or_na(usage, "cpu"),
          &quantity_or_na(usage, "memory"),
        ])
        .set(1.0);
    }
  }

  fn encode(&self) -> Result<String> {
    let mut buffer = vec![];
    TextEncoder::new()
      .encode(&self.registry.gather(), &mut buffer)
      .context("Failed to encode metrics")?;

    Ok(String::from_utf8(buffer)?)
  }
}

pub fn to_metrics(model: &TopologyModel, options: &RenderOptions) -> Result<String> {
  let metrics = ApplicationMetrics::new(options.with_resources)?;
  let environment = options.environment.as_str();

  for namespace in model.sorted_namespaces() {
    for (resource, configs) in namespace.application_providers() {
      let kind = resource.kind().to_string();
      for config in configs {
        let (image, version, full_image) = image_columns(model, config);
        metrics
          .version
          .with_label_values(&[
            environment,
            namespace.name(),
            resource.name(),
            &kind,
            &config.container_name,
            &image,
            &version,
            &full_image,
          ])
          .set(1.0);

        if options.with_resources {
          metrics.record_config(environment, namespace.name(), resource, config);
          metrics.record_usage(environment, &namespace, resource, config);
        }
      }
    }
  }

  metrics.encode()
}

pub fn render(model: &TopologyModel, format: &Format, options: &RenderOptions) -> Result<String> {
  let output = match format {
    Format::Text => to_stdout_table(&application_rows(model)),
    Format::Csv => to_csv(&application_rows(model)),
    Format::Json => serde_json::to_string_pretty(&application_rows(model))?,
    Format::Metrics => to_metrics(model, options)?,
  };

  Ok(output)
}

pub fn output(content: &str, filename: &Option<String>) -> Result<()> {
  match filename {
    Some(filename) => {
      let mut file = File::create(filename).with_context(|| format!("Failed to create output file: {filename}"))?;
      file.write_all(content.as_bytes())?;
    }
    None => {
      println!("{content}");
    }
  }

  Ok(())
}
