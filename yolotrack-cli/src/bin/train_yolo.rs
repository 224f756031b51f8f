//! `train-yolo`: train a YOLO detector inside an MLflow run.

use clap::Parser;
use tracing::info;
use yolotrack::args::TrainCli;
use yolotrack::logging;
use yolotrack_core::pipeline::train::{self, TrainCollaborators};
use yolotrack_core::{
    MlflowClient, NvidiaSmiProbe, ProcessEnv, TrainConfig, UltralyticsTrainer, load_defaults,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = TrainCli::parse();
    let _guard = logging::init(cli.common.verbose, cli.common.quiet, "train-yolo.log");

    let workspace = std::env::current_dir().ok();
    let defaults = load_defaults(cli.common.config.as_deref(), workspace.as_deref())?;
    let config = TrainConfig::resolve(cli.pipeline_args(), &ProcessEnv, &defaults.train)?;

    let tracker = MlflowClient::new(&config.tracking_uri)?;
    let probe = NvidiaSmiProbe::new();
    let trainer = UltralyticsTrainer::new(config.trainer_bin.clone());

    println!("\nStarting YOLO training...");
    let outcome = train::run(
        &config,
        TrainCollaborators {
            tracker: &tracker,
            gpu: &probe,
            trainer: &trainer,
        },
    )
    .await?;
    info!(
        run_id = outcome.run.run_id.as_str(),
        run_name = outcome.run.run_name.as_str(),
        output = outcome.output_name.as_str(),
        "Training run recorded"
    );

    println!("\nTraining complete. Results are available in MLflow.");
    Ok(())
}
