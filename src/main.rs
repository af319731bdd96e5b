//! Price tier CLI: offline training and per-price market queries

use anyhow::{Context, Result};
use clap::Parser;
use price_tier::cli::{Args, Command, QueryArgs};
use price_tier::{run_training, MarketContext, TierError};
use serde::Serialize;
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match &args.command {
        Command::Train(train_args) => {
            let config = train_args.to_config();
            let start_time = Instant::now();
            let outcome = run_training(&config)
                .with_context(|| format!("training on {} failed", config.input.display()))?;

            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            log::info!(
                "Training complete in {:.2}s",
                start_time.elapsed().as_secs_f64()
            );
        }
        Command::Estimate(query) => {
            let context = load_context(query)?;
            respond(context.estimate(query.price))?;
        }
        Command::Competitors(query) => {
            let context = load_context(query)?;
            respond(context.competitors(query.price))?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn load_context(query: &QueryArgs) -> Result<MarketContext> {
    MarketContext::load(&query.artifacts, &query.data).with_context(|| {
        format!(
            "loading artifacts from {} and data from {}",
            query.artifacts.display(),
            query.data.display()
        )
    })
}

#[derive(Serialize)]
struct CannotAnswer {
    error: &'static str,
    message: String,
}

/// Print the answer, or a structured refusal for conditions the caller can fix
fn respond<T: Serialize>(result: price_tier::Result<T>) -> Result<()> {
    let json = match result {
        Ok(answer) => serde_json::to_string_pretty(&answer)?,
        Err(err) if err.is_recoverable() => serde_json::to_string_pretty(&cannot_answer(&err))?,
        Err(err) => return Err(err.into()),
    };
    println!("{}", json);
    Ok(())
}

fn cannot_answer(err: &TierError) -> CannotAnswer {
    CannotAnswer {
        error: err.kind(),
        message: err.to_string(),
    }
}
