//! Command-line interface definitions and argument parsing

use crate::model::TierParams;
use crate::trainer::TrainerConfig;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Market price tiering: train the K-Means tier model and query price positions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fit scaler and tier model on historical prices and write artifacts
    Train(TrainArgs),
    /// Tier, market percentile and recommendation for one price
    Estimate(QueryArgs),
    /// Brands competing in the price's tier and near its price
    Competitors(QueryArgs),
}

#[derive(ClapArgs, Debug)]
pub struct TrainArgs {
    /// Cleaned historical CSV with a price_usd column
    #[arg(short, long, default_value = "data/processed/merged_watches.csv")]
    pub input: PathBuf,

    /// Directory for the scaler, model and training report
    #[arg(short, long, default_value = "models")]
    pub artifacts: PathBuf,

    /// Output CSV with the tier assignment column
    #[arg(
        short,
        long,
        default_value = "data/processed/merged_watches_with_tiers.csv"
    )]
    pub output: PathBuf,

    /// Random seed for K-Means initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Maximum iterations for K-Means
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Number of K-Means restarts
    #[arg(long, default_value = "10")]
    pub n_runs: usize,

    /// Optional PNG chart of the fitted tiers
    #[arg(long)]
    pub plot: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct QueryArgs {
    /// Price in USD
    #[arg(short, long)]
    pub price: f64,

    /// Labeled historical CSV written by `train`
    #[arg(
        short,
        long,
        default_value = "data/processed/merged_watches_with_tiers.csv"
    )]
    pub data: PathBuf,

    /// Directory holding the trained artifacts
    #[arg(short, long, default_value = "models")]
    pub artifacts: PathBuf,
}

impl TrainArgs {
    pub fn to_config(&self) -> TrainerConfig {
        TrainerConfig {
            input: self.input.clone(),
            artifact_dir: self.artifacts.clone(),
            labeled_output: self.output.clone(),
            params: TierParams {
                seed: self.seed,
                max_iters: self.max_iters,
                tolerance: self.tolerance,
                n_runs: self.n_runs,
                ..TierParams::default()
            },
            plot: self.plot.clone(),
        }
    }
}
