//! `download-data`: fetch one Roboflow dataset version into local storage.

use clap::Parser;
use yolotrack::args::DownloadCli;
use yolotrack::logging;
use yolotrack_core::pipeline::download;
use yolotrack_core::{ProcessEnv, RoboflowClient, load_defaults};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = DownloadCli::parse();
    let _guard = logging::init(cli.common.verbose, cli.common.quiet, "download-data.log");

    let workspace = std::env::current_dir().ok();
    let defaults = load_defaults(cli.common.config.as_deref(), workspace.as_deref())?;
    let client = RoboflowClient::new();
    let location =
        download::fetch(cli.pipeline_args(), &ProcessEnv, &defaults.download, &client).await?;

    println!("Dataset downloaded to: {}", location.path.display());
    Ok(())
}
