//! Error taxonomy shared by the trainer and the estimator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TierError {
    /// Price is non-positive, NaN or infinite, so `log10` is undefined.
    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    #[error("degenerate training data: {0}")]
    DegenerateTrainingData(String),

    #[error("no market data available to rank the price against")]
    NoMarketData,

    #[error("no competitors found for price tier {0}")]
    NoCompetitors(usize),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("table columns have mismatched lengths: {0}")]
    ShapeMismatch(String),

    #[error("clustering error: {0}")]
    Clustering(#[from] linfa_clustering::KMeansError),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("array shape error: {0}")]
    Array(#[from] ndarray::ShapeError),

    #[error("dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl TierError {
    /// Conditions the serving boundary answers with a structured "cannot answer"
    /// response instead of a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TierError::InvalidPrice(_) | TierError::NoMarketData | TierError::NoCompetitors(_)
        )
    }

    /// Stable machine-readable name used in structured responses.
    pub fn kind(&self) -> &'static str {
        match self {
            TierError::InvalidPrice(_) => "invalid_price",
            TierError::DegenerateTrainingData(_) => "degenerate_training_data",
            TierError::NoMarketData => "no_market_data",
            TierError::NoCompetitors(_) => "no_competitors",
            TierError::MissingColumn(_) => "missing_column",
            TierError::ShapeMismatch(_) => "shape_mismatch",
            TierError::Clustering(_) => "clustering",
            TierError::Plot(_) => "plot",
            TierError::Array(_) => "array",
            TierError::Polars(_) => "dataframe",
            TierError::Io(_) => "io",
            TierError::Serde(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, TierError>;
