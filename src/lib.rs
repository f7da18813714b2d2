pub mod builder;
mod cli;
pub mod clients;
pub mod config;
pub mod k8s;
pub mod model;
pub mod output;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

pub use builder::{BuildError, BuildRequest, ModelBuilder};
pub use cli::Cli;
use clients::KubeClients;
use output::RenderOptions;

/// Collects the inventory of the cluster and writes it in the requested format
pub async fn inventory(cli: &Cli) -> Result<()> {
  let config = cli.apply(config::load(cli.config.as_deref())?);
  let request = config.build_request();

  let clients = KubeClients::connect(cli.kubeconfig.as_deref(), request.request_burst).await?;
  info!("Cluster connected");

  let model = ModelBuilder::new(Arc::new(clients), request).build().await?;

  let options = RenderOptions {
    environment: config.environment.to_owned(),
    with_resources: config.collection.with_resources,
  };
  let rendered = output::render(&model, &cli.format, &options)?;
  output::output(&rendered, &cli.output)?;

  Ok(())
}
