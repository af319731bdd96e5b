//! Market percentile and pricing recommendation

use crate::error::{Result, TierError};
use serde::Serialize;

/// Percentile above which a price is positioned as premium (exclusive)
pub const PREMIUM_THRESHOLD: f64 = 90.0;
/// Percentile below which a price is flagged as possibly underpriced (exclusive)
pub const COMPETITIVE_THRESHOLD: f64 = 20.0;

/// Sorted historical price distribution for percentile queries
#[derive(Debug, Clone, Default)]
pub struct MarketDistribution {
    sorted: Vec<f64>,
}

impl MarketDistribution {
    /// NaN entries are dropped; callers pass already-cleaned prices
    pub fn new(prices: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = prices.into_iter().filter(|p| !p.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        Self { sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Share of historical prices strictly below `price`, in `[0, 100]`
    pub fn percentile(&self, price: f64) -> Result<f64> {
        if self.sorted.is_empty() {
            return Err(TierError::NoMarketData);
        }

        let below = self.sorted.partition_point(|&p| p < price);
        Ok(ratio_percent(below, self.sorted.len()))
    }
}

fn ratio_percent(count: usize, total: usize) -> f64 {
    100.0 * count as f64 / total as f64
}

/// Round to two decimals for presentation.
///
/// Rounds the exact binary value half to even, so 0.125 becomes 0.12.
pub fn round_percentile(percentile: f64) -> f64 {
    format!("{:.2}", percentile)
        .parse()
        .unwrap_or(percentile)
}

/// Pricing advice derived from the market percentile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Premium,
    WellAligned,
    Competitive,
}

impl Recommendation {
    pub fn from_percentile(percentile: f64) -> Self {
        if percentile > PREMIUM_THRESHOLD {
            Recommendation::Premium
        } else if percentile < COMPETITIVE_THRESHOLD {
            Recommendation::Competitive
        } else {
            Recommendation::WellAligned
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::Premium => {
                "This price is higher than most of the market. Position as premium."
            }
            Recommendation::Competitive => {
                "This price is very competitive. Make sure you are not underpricing."
            }
            Recommendation::WellAligned => "This price is well aligned with the current market.",
        }
    }
}
