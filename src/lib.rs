//! Price tiering: where a product price sits in its market.
//!
//! The offline [`trainer`] fits a standard scaler and a 4-tier K-Means model
//! on historical prices. The online [`estimator`] maps a new price to a tier,
//! ranks it against the historical distribution and derives a recommendation.

pub mod cli;
pub mod data;
pub mod error;
pub mod estimator;
pub mod features;
pub mod market;
pub mod model;
pub mod trainer;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_table, HistoricalTable};
pub use error::{Result, TierError};
pub use estimator::{CompetitorSnapshot, MarketContext, PriceEstimate};
pub use features::{FeatureVector, PriceScaler};
pub use market::{MarketDistribution, Recommendation};
pub use model::{fit_tiers, TierModel, TierParams};
pub use trainer::{run_training, train, Artifacts, TrainerConfig};
