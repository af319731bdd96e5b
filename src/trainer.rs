//! Offline trainer: features, scaler, tier model and artifact persistence

use crate::data::{self, HistoricalTable};
use crate::error::Result;
use crate::features::{build_features, PriceScaler};
use crate::model::{fit_tiers, TierFit, TierModel, TierParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const SCALER_FILE: &str = "price_scaler.json";
pub const MODEL_FILE: &str = "price_tiers.json";
pub const REPORT_FILE: &str = "training_report.json";

/// Settings for one training run
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Cleaned historical CSV with a `price_usd` column
    pub input: PathBuf,
    /// Directory receiving the scaler, model and report
    pub artifact_dir: PathBuf,
    /// Where to write the input rows with their tier assignment
    pub labeled_output: PathBuf,
    pub params: TierParams,
    /// Optional PNG chart of the fitted tiers
    pub plot: Option<PathBuf>,
}

/// Scaler and tier model as persisted by the trainer
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub scaler: PriceScaler,
    pub model: TierModel,
}

impl Artifacts {
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;
        write_json(&dir.join(MODEL_FILE), &self.model)?;
        log::info!("Artifacts written to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let scaler: PriceScaler = read_json(&dir.join(SCALER_FILE))?;
        let model: TierModel = read_json(&dir.join(MODEL_FILE))?;
        log::info!(
            "Loaded scaler and {}-tier model from {}",
            model.n_tiers(),
            dir.display()
        );
        Ok(Self { scaler, model })
    }
}

/// Per-tier summary in raw price space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSummary {
    pub tier_id: usize,
    pub label: String,
    pub size: usize,
    /// Centroid price component mapped back to USD
    pub centroid_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Summary written next to the artifacts after every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub total_rows: usize,
    pub rows_without_price: usize,
    pub inertia: f64,
    pub tiers: Vec<TierSummary>,
}

/// Everything a training pass produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: Artifacts,
    pub fit: TierFit,
    /// Tier id per table row; `None` where the price is missing
    pub assignments: Vec<Option<usize>>,
    pub report: TrainingReport,
}

impl TrainingOutcome {
    /// Training table with its tier column filled in
    pub fn labeled_table(&self, table: HistoricalTable) -> Result<HistoricalTable> {
        table.with_tiers(self.assignments.clone())
    }
}

/// Fit scaler and tier model on the priced rows of a table.
///
/// Rows with a missing price are skipped. A present non-positive price aborts
/// training, as does degenerate data (constant prices, fewer distinct prices
/// than tiers).
pub fn train(table: &HistoricalTable, params: &TierParams) -> Result<TrainingOutcome> {
    let priced: Vec<(usize, f64)> = table
        .prices()
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.map(|price| (i, price)))
        .collect();
    let prices: Vec<f64> = priced.iter().map(|&(_, p)| p).collect();

    log::info!(
        "Training on {} priced rows ({} without price)",
        prices.len(),
        table.len() - prices.len()
    );

    let vectors = build_features(&prices)?;
    let scaler = PriceScaler::fit(&vectors)?;
    let scaled = scaler.transform_all(&vectors)?;
    log::debug!("Scaler mean={:?} std={:?}", scaler.mean(), scaler.std());

    let fit = fit_tiers(&scaled, params)?;
    log::info!(
        "Fitted {} tiers, inertia {:.4}",
        fit.model.n_tiers(),
        fit.inertia
    );

    let mut assignments = vec![None; table.len()];
    for (&(row, _), &tier) in priced.iter().zip(fit.labels.iter()) {
        assignments[row] = Some(tier);
    }

    let report = build_report(table.len(), &prices, &scaler, &fit);
    for tier in &report.tiers {
        log::info!(
            "Tier {} ({}): {} rows, {:.2}..{:.2} USD",
            tier.tier_id,
            tier.label,
            tier.size,
            tier.min_price,
            tier.max_price
        );
    }

    Ok(TrainingOutcome {
        artifacts: Artifacts {
            scaler,
            model: fit.model.clone(),
        },
        fit,
        assignments,
        report,
    })
}

/// Full batch job: load CSV, train, persist artifacts, labeled table and report
pub fn run_training(config: &TrainerConfig) -> Result<TrainingOutcome> {
    let mut df = data::read_frame(&config.input)?;
    let table = data::table_from_frame(&df)?;
    log::info!("Loaded {} rows from {}", table.len(), config.input.display());

    let outcome = train(&table, &config.params)?;

    // labeled table first: artifacts must never point at a stale table
    data::write_labeled_frame(&mut df, &outcome.assignments, &config.labeled_output)?;
    log::info!(
        "Labeled table written to {}",
        config.labeled_output.display()
    );
    outcome.artifacts.save(&config.artifact_dir)?;
    write_json(&config.artifact_dir.join(REPORT_FILE), &outcome.report)?;

    if let Some(plot) = &config.plot {
        let labeled = outcome.labeled_table(table)?;
        crate::viz::create_tier_chart(&labeled, &outcome.artifacts.model, plot)?;
        log::info!("Tier chart written to {}", plot.display());
    }

    Ok(outcome)
}

fn build_report(
    total_rows: usize,
    prices: &[f64],
    scaler: &PriceScaler,
    fit: &TierFit,
) -> TrainingReport {
    let sizes = fit.cluster_sizes();
    let tiers = fit
        .model
        .centroids()
        .outer_iter()
        .enumerate()
        .map(|(tier_id, centroid)| {
            let members = prices
                .iter()
                .zip(fit.labels.iter())
                .filter(|&(_, &label)| label == tier_id)
                .map(|(&p, _)| p);
            let (min_price, max_price) = members.fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), p| (lo.min(p), hi.max(p)),
            );

            TierSummary {
                tier_id,
                label: fit.model.tier_label(tier_id).to_string(),
                size: sizes[tier_id],
                centroid_price: scaler.inverse_transform(&[centroid[0], centroid[1]])[0],
                min_price,
                max_price,
            }
        })
        .collect();

    TrainingReport {
        trained_at: Utc::now(),
        total_rows,
        rows_without_price: total_rows - prices.len(),
        inertia: fit.inertia,
        tiers,
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TierError;

    fn training_table() -> HistoricalTable {
        let prices = vec![
            Some(95.0),
            Some(140.0),
            None,
            Some(180.0),
            Some(950.0),
            Some(1200.0),
            Some(1500.0),
            Some(7000.0),
            None,
            Some(8200.0),
            Some(9900.0),
            Some(55000.0),
            Some(64000.0),
            Some(80000.0),
        ];
        HistoricalTable::from_prices(prices)
    }

    #[test]
    fn test_train_assigns_priced_rows() {
        let table = training_table();
        let outcome = train(&table, &TierParams::default()).unwrap();

        assert_eq!(outcome.assignments.len(), table.len());
        assert_eq!(outcome.assignments[2], None);
        assert_eq!(outcome.assignments[8], None);
        assert_eq!(outcome.assignments.iter().flatten().count(), 12);

        assert_eq!(outcome.report.total_rows, 14);
        assert_eq!(outcome.report.rows_without_price, 2);
        assert_eq!(outcome.report.tiers.len(), 4);
        assert_eq!(
            outcome.report.tiers.iter().map(|t| t.size).sum::<usize>(),
            12
        );
    }

    #[test]
    fn test_report_tiers_are_price_ordered_by_label() {
        let outcome = train(&training_table(), &TierParams::default()).unwrap();

        let mut tiers = outcome.report.tiers.clone();
        tiers.sort_by(|a, b| a.centroid_price.total_cmp(&b.centroid_price));
        let labels: Vec<&str> = tiers.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Entry Luxury", "Mid Luxury", "High End Luxury", "Ultra High End Luxury"]
        );
        for tier in &tiers {
            assert!(tier.min_price <= tier.max_price);
        }
    }

    #[test]
    fn test_non_positive_price_aborts() {
        let table = HistoricalTable::from_prices(vec![
            Some(100.0),
            Some(0.0),
            Some(300.0),
            Some(400.0),
            Some(500.0),
        ]);
        let err = train(&table, &TierParams::default()).unwrap_err();
        assert!(matches!(err, TierError::InvalidPrice(_)));
    }

    #[test]
    fn test_constant_prices_abort() {
        let table = HistoricalTable::from_prices(vec![Some(2500.0); 8]);
        let err = train(&table, &TierParams::default()).unwrap_err();
        assert!(matches!(err, TierError::DegenerateTrainingData(_)));
    }

    #[test]
    fn test_artifacts_roundtrip() {
        let outcome = train(&training_table(), &TierParams::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        outcome.artifacts.save(dir.path()).unwrap();
        let loaded = Artifacts::load(dir.path()).unwrap();
        assert_eq!(loaded, outcome.artifacts);
    }
}
