//! Price feature engineering and standard scaling

use crate::error::{Result, TierError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Number of features per observation: price and its base-10 logarithm.
pub const N_FEATURES: usize = 2;

/// Feature pair `(price, log10(price))` for one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub price: f64,
    pub log_price: f64,
}

impl FeatureVector {
    /// Build the feature pair for a price.
    ///
    /// Fails with [`TierError::InvalidPrice`] for non-positive or non-finite
    /// prices, since the logarithm is undefined there.
    pub fn new(price: f64) -> Result<Self> {
        if !price.is_finite() || price <= 0.0 {
            return Err(TierError::InvalidPrice(price));
        }

        Ok(Self {
            price,
            log_price: price.log10(),
        })
    }

    pub fn to_array(self) -> [f64; N_FEATURES] {
        [self.price, self.log_price]
    }
}

/// Build feature vectors for every price, failing on the first invalid one
pub fn build_features(prices: &[f64]) -> Result<Vec<FeatureVector>> {
    prices.iter().map(|&p| FeatureVector::new(p)).collect()
}

/// Fitted z-score scaler over the two price features.
///
/// Holds the per-feature mean and population standard deviation learned from
/// the training set. Never mutated after [`PriceScaler::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceScaler {
    mean: [f64; N_FEATURES],
    std: [f64; N_FEATURES],
}

impl PriceScaler {
    /// Fit the scaler on a non-empty set of feature vectors.
    ///
    /// A feature with zero spread (all training prices identical) is a fatal
    /// training-data error.
    pub fn fit(vectors: &[FeatureVector]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(TierError::DegenerateTrainingData(
                "cannot fit scaler on an empty training set".into(),
            ));
        }

        let n = vectors.len() as f64;
        let mut mean = [0.0; N_FEATURES];
        let mut std = [0.0; N_FEATURES];

        for j in 0..N_FEATURES {
            let column = vectors.iter().map(|v| v.to_array()[j]);
            let first = vectors[0].to_array()[j];
            let constant = column.clone().all(|x| x == first);

            let m = column.clone().sum::<f64>() / n;
            let variance = column.map(|x| (x - m).powi(2)).sum::<f64>() / n;
            let s = variance.sqrt();

            if constant || s == 0.0 {
                return Err(TierError::DegenerateTrainingData(format!(
                    "feature {} has zero standard deviation",
                    FEATURE_NAMES[j]
                )));
            }

            mean[j] = m;
            std[j] = s;
        }

        Ok(Self { mean, std })
    }

    pub fn mean(&self) -> [f64; N_FEATURES] {
        self.mean
    }

    pub fn std(&self) -> [f64; N_FEATURES] {
        self.std
    }

    /// Standardize one feature vector: `(x - mean) / std` per component
    pub fn transform(&self, vector: &FeatureVector) -> [f64; N_FEATURES] {
        let raw = vector.to_array();
        let mut scaled = [0.0; N_FEATURES];
        for j in 0..N_FEATURES {
            scaled[j] = (raw[j] - self.mean[j]) / self.std[j];
        }
        scaled
    }

    /// Standardize a batch into an `(n, 2)` matrix
    pub fn transform_all(&self, vectors: &[FeatureVector]) -> Result<Array2<f64>> {
        let flat: Vec<f64> = vectors
            .iter()
            .flat_map(|v| self.transform(v))
            .collect();
        Ok(Array2::from_shape_vec((vectors.len(), N_FEATURES), flat)?)
    }

    /// Map a standardized point back to raw feature space
    pub fn inverse_transform(&self, scaled: &[f64; N_FEATURES]) -> [f64; N_FEATURES] {
        let mut raw = [0.0; N_FEATURES];
        for j in 0..N_FEATURES {
            raw[j] = scaled[j] * self.std[j] + self.mean[j];
        }
        raw
    }
}

const FEATURE_NAMES: [&str; N_FEATURES] = ["price", "log_price"];
