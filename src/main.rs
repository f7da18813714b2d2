use std::process;

use app_inventory::Cli;
use clap::Parser;

#[tokio::main]
async fn main() {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_max_level(cli.verbose.tracing_level_filter())
    .init();

  if let Err(err) = app_inventory::inventory(&cli).await {
    eprintln!("{err:?}");
    process::exit(2);
  }
}
