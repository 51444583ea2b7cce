//! Habitus - Main Entry Point
//!
//! Obesity-category classification pipeline with a train/predict CLI.

use clap::Parser;
use habitus::cli::{cmd_check, cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "habitus=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            target,
            model,
            trees,
            max_depth,
            seed,
            cv_folds,
            compare,
            output,
        } => {
            cmd_train(&data, &target, &model, trees, max_depth, seed, cv_folds, compare, &output)?;
        }
        Commands::Predict { artifacts, input } => {
            cmd_predict(&artifacts, &input)?;
        }
        Commands::Check { artifacts, data } => {
            cmd_check(&artifacts, data.as_ref())?;
        }
        Commands::Info { artifacts, data } => {
            cmd_info(artifacts.as_ref(), data.as_ref())?;
        }
    }

    Ok(())
}
