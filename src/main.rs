//! boostflow - Main Entry Point

use boostflow::cli::{
    cmd_cache, cmd_evaluate, cmd_graph, cmd_predict, cmd_run, cmd_split, cmd_train, Cli, Commands,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boostflow=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { dataset, seed, test_split_ratio, store, no_cache, model_out, json } => {
            cmd_run(dataset, seed, test_split_ratio, store, no_cache, model_out, json).await?;
        }
        Commands::Split { dataset, output, seed, test_split_ratio } => {
            cmd_split(dataset, output, seed, test_split_ratio).await?;
        }
        Commands::Train { x, y, output, n_estimators, max_depth, learning_rate } => {
            cmd_train(&x, &y, &output, n_estimators, max_depth, learning_rate)?;
        }
        Commands::Predict { model, x, output } => {
            cmd_predict(&model, &x, &output)?;
        }
        Commands::Evaluate { predictions, actual } => {
            cmd_evaluate(&predictions, &actual)?;
        }
        Commands::Graph { dot } => {
            cmd_graph(dot)?;
        }
        Commands::Cache { action, store } => {
            cmd_cache(action, store)?;
        }
    }

    Ok(())
}
