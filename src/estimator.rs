//! Online tier estimation over loaded artifacts
//!
//! [`MarketContext`] is built once at startup and only read afterwards, so a
//! shared reference can serve any number of concurrent requests.

use crate::data::{BrandCount, HistoricalTable};
use crate::error::{Result, TierError};
use crate::features::{FeatureVector, PriceScaler};
use crate::market::{round_percentile, MarketDistribution, Recommendation};
use crate::model::TierModel;
use crate::trainer::Artifacts;
use serde::Serialize;
use std::path::Path;

/// How many brands each competitor ranking lists
pub const TOP_BRANDS: usize = 5;
/// Near-price band around the query price, inclusive on both ends
pub const NEAR_PRICE_LOWER: f64 = 0.8;
pub const NEAR_PRICE_UPPER: f64 = 1.2;

/// Answer to a price position query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEstimate {
    pub input_price: f64,
    /// Rounded to two decimals
    pub market_percentile: f64,
    pub price_tier: String,
    pub recommendation: String,
    #[serde(skip)]
    pub tier_id: usize,
    #[serde(skip)]
    pub policy: Recommendation,
}

/// Answer to a competitor query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorSnapshot {
    pub price: f64,
    pub tier_id: usize,
    pub tier_label: String,
    pub total_in_tier: usize,
    pub total_near_price: usize,
    pub top_brands_in_tier: Vec<BrandCount>,
    pub top_brands_near_price: Vec<BrandCount>,
}

/// Immutable inference context: scaler, tier model and historical market
#[derive(Debug, Clone)]
pub struct MarketContext {
    scaler: PriceScaler,
    model: TierModel,
    table: HistoricalTable,
    distribution: MarketDistribution,
}

impl MarketContext {
    pub fn new(scaler: PriceScaler, model: TierModel, table: HistoricalTable) -> Self {
        let distribution = MarketDistribution::new(table.price_column());
        Self {
            scaler,
            model,
            table,
            distribution,
        }
    }

    /// Load artifacts from a directory and the labeled table from CSV
    pub fn load(artifact_dir: impl AsRef<Path>, table_path: impl AsRef<Path>) -> Result<Self> {
        let artifacts = Artifacts::load(artifact_dir)?;
        let table = crate::data::load_table(table_path)?;
        Ok(Self::new(artifacts.scaler, artifacts.model, table))
    }

    pub fn model(&self) -> &TierModel {
        &self.model
    }

    pub fn table(&self) -> &HistoricalTable {
        &self.table
    }

    /// Feature-engineer, scale and classify one price
    pub fn predict_tier(&self, price: f64) -> Result<usize> {
        let vector = FeatureVector::new(price)?;
        let scaled = self.scaler.transform(&vector);
        self.model.predict(&scaled)
    }

    /// Position a price in the market: tier, percentile and recommendation
    pub fn estimate(&self, price: f64) -> Result<PriceEstimate> {
        let tier_id = self.predict_tier(price)?;
        let price_tier = self.model.tier_label(tier_id);

        let percentile = self.distribution.percentile(price)?;
        let policy = Recommendation::from_percentile(percentile);

        log::debug!(
            "price {} -> tier {} ({}), percentile {:.4}",
            price,
            tier_id,
            price_tier,
            percentile
        );

        Ok(PriceEstimate {
            input_price: price,
            market_percentile: round_percentile(percentile),
            price_tier: price_tier.to_string(),
            recommendation: policy.message().to_string(),
            tier_id,
            policy,
        })
    }

    /// Brands competing in the same tier, and within +/-20% of the price
    pub fn competitors(&self, price: f64) -> Result<CompetitorSnapshot> {
        let tier_id = self.predict_tier(price)?;

        let in_tier = self.table.filter(|row| row.tier == Some(tier_id));
        if in_tier.is_empty() {
            return Err(TierError::NoCompetitors(tier_id));
        }

        let lower = price * NEAR_PRICE_LOWER;
        let upper = price * NEAR_PRICE_UPPER;
        let near_price: Vec<usize> = in_tier
            .iter()
            .copied()
            .filter(|&i| {
                self.table
                    .row(i)
                    .and_then(|row| row.price)
                    .is_some_and(|p| p >= lower && p <= upper)
            })
            .collect();

        Ok(CompetitorSnapshot {
            price,
            tier_id,
            tier_label: self.model.tier_label(tier_id).to_string(),
            total_in_tier: in_tier.len(),
            total_near_price: near_price.len(),
            top_brands_in_tier: self.table.top_brands(&in_tier, TOP_BRANDS),
            top_brands_near_price: self.table.top_brands(&near_price, TOP_BRANDS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_features;
    use ndarray::array;

    fn scaler() -> PriceScaler {
        let vectors = build_features(&[100.0, 1000.0, 10000.0, 100000.0]).unwrap();
        PriceScaler::fit(&vectors).unwrap()
    }

    /// Four tiers whose centroids sit on the scaled training prices
    fn model(scaler: &PriceScaler) -> TierModel {
        let points: Vec<[f64; 2]> = build_features(&[100.0, 1000.0, 10000.0, 100000.0])
            .unwrap()
            .iter()
            .map(|v| scaler.transform(v))
            .collect();
        TierModel::from_centroids(array![
            [points[1][0], points[1][1]],
            [points[0][0], points[0][1]],
            [points[3][0], points[3][1]],
            [points[2][0], points[2][1]]
        ])
        .unwrap()
    }

    fn context(table: HistoricalTable) -> MarketContext {
        let scaler = scaler();
        let model = model(&scaler);
        MarketContext::new(scaler, model, table)
    }

    fn market_table() -> HistoricalTable {
        let brand = |s: &str| Some(s.to_string());
        HistoricalTable::new(
            vec![
                brand("Seiko"),
                brand("Tissot"),
                brand("Seiko"),
                brand("Oris"),
                brand("Longines"),
                brand("Oris"),
                brand("Rolex"),
            ],
            vec![
                Some(90.0),
                Some(110.0),
                Some(130.0),
                Some(800.0),
                Some(1000.0),
                Some(1200.0),
                Some(9000.0),
            ],
            vec![Some(1), Some(1), Some(1), Some(0), Some(0), Some(0), Some(3)],
        )
        .unwrap()
    }

    #[test]
    fn test_estimate() {
        let ctx = context(market_table());
        let estimate = ctx.estimate(1000.0).unwrap();

        assert_eq!(estimate.input_price, 1000.0);
        assert_eq!(estimate.tier_id, 0);
        assert_eq!(estimate.price_tier, "Mid Luxury");
        // 4 of 7 below
        assert_eq!(estimate.market_percentile, 57.14);
        assert_eq!(estimate.policy, Recommendation::WellAligned);
    }

    #[test]
    fn test_estimate_is_idempotent() {
        let ctx = context(market_table());
        assert_eq!(ctx.estimate(4321.0).unwrap(), ctx.estimate(4321.0).unwrap());
    }

    #[test]
    fn test_invalid_price() {
        let ctx = context(market_table());
        assert!(matches!(ctx.estimate(0.0), Err(TierError::InvalidPrice(_))));
        assert!(matches!(ctx.estimate(-5.0), Err(TierError::InvalidPrice(_))));
        assert!(matches!(ctx.competitors(0.0), Err(TierError::InvalidPrice(_))));
    }

    #[test]
    fn test_no_market_data() {
        let ctx = context(HistoricalTable::from_prices(vec![None, None]));
        assert!(matches!(ctx.estimate(500.0), Err(TierError::NoMarketData)));
    }

    #[test]
    fn test_competitors() {
        let ctx = context(market_table());
        let snapshot = ctx.competitors(1000.0).unwrap();

        assert_eq!(snapshot.tier_id, 0);
        assert_eq!(snapshot.tier_label, "Mid Luxury");
        assert_eq!(snapshot.total_in_tier, 3);
        // 800 and 1200 sit exactly on the band edges
        assert_eq!(snapshot.total_near_price, 3);
        assert_eq!(snapshot.top_brands_in_tier[0].brand, "Oris");
        assert_eq!(snapshot.top_brands_in_tier[0].count, 2);
        assert_eq!(snapshot.top_brands_in_tier[1].brand, "Longines");
    }

    #[test]
    fn test_competitors_near_band() {
        let ctx = context(market_table());
        let snapshot = ctx.competitors(110.0).unwrap();

        assert_eq!(snapshot.tier_id, 1);
        assert_eq!(snapshot.total_in_tier, 3);
        // band [88, 132] covers all three entry rows
        assert_eq!(snapshot.total_near_price, 3);
        assert_eq!(snapshot.top_brands_near_price[0].brand, "Seiko");

        let narrow = ctx.competitors(95.0).unwrap();
        // band [76, 114]
        assert_eq!(narrow.total_near_price, 2);
    }

    #[test]
    fn test_no_competitors() {
        let ctx = context(market_table());
        // tier 2 holds the 100k centroid and has no rows
        assert!(matches!(
            ctx.competitors(100000.0),
            Err(TierError::NoCompetitors(2))
        ));
    }
}
