//! K-Means price tier model

use crate::error::{Result, TierError};
use crate::features::N_FEATURES;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of market tiers the model partitions prices into
pub const N_TIERS: usize = 4;

/// Tier names ordered from cheapest to most expensive centroid
pub const TIER_NAMES: [&str; N_TIERS] = [
    "Entry Luxury",
    "Mid Luxury",
    "High End Luxury",
    "Ultra High End Luxury",
];

/// Label for a tier id with no entry in the lookup
pub const UNKNOWN_TIER: &str = "Unknown";

/// K-Means hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct TierParams {
    pub n_tiers: usize,
    pub seed: u64,
    pub max_iters: u64,
    pub tolerance: f64,
    /// Number of k-means++ restarts; the run with lowest inertia wins
    pub n_runs: usize,
}

impl Default for TierParams {
    fn default() -> Self {
        Self {
            n_tiers: N_TIERS,
            seed: 42,
            max_iters: 300,
            tolerance: 1e-4,
            n_runs: 10,
        }
    }
}

/// Fitted tier partition of standardized feature space.
///
/// Only the centroids are read back from an artifact; ranks are always
/// re-derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredTierModel")]
pub struct TierModel {
    /// One centroid per tier id, shape `(n_tiers, 2)`
    centroids: Array2<f64>,
    /// Price rank of each tier id (0 = cheapest centroid)
    ranks: Vec<usize>,
}

#[derive(Deserialize)]
struct StoredTierModel {
    centroids: Array2<f64>,
}

impl TryFrom<StoredTierModel> for TierModel {
    type Error = TierError;

    fn try_from(stored: StoredTierModel) -> Result<Self> {
        TierModel::from_centroids(stored.centroids)
    }
}

impl TierModel {
    /// Build a model from centroids, deriving the id-to-rank mapping from the
    /// scaled price component.
    pub fn from_centroids(centroids: Array2<f64>) -> Result<Self> {
        if centroids.ncols() != N_FEATURES || centroids.nrows() == 0 {
            return Err(TierError::ShapeMismatch(format!(
                "centroid matrix must be (k, {}), got {:?}",
                N_FEATURES,
                centroids.shape()
            )));
        }

        let mut order: Vec<usize> = (0..centroids.nrows()).collect();
        order.sort_by(|&a, &b| centroids[[a, 0]].total_cmp(&centroids[[b, 0]]));

        let mut ranks = vec![0; order.len()];
        for (rank, &id) in order.iter().enumerate() {
            ranks[id] = rank;
        }

        Ok(Self { centroids, ranks })
    }

    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn n_tiers(&self) -> usize {
        self.centroids.nrows()
    }

    /// Price rank of a tier id, `None` for ids the model does not know
    pub fn rank(&self, tier_id: usize) -> Option<usize> {
        self.ranks.get(tier_id).copied()
    }

    /// Human-readable tier name, "Unknown" for unmapped ids
    pub fn tier_label(&self, tier_id: usize) -> &'static str {
        self.rank(tier_id)
            .and_then(|rank| TIER_NAMES.get(rank))
            .copied()
            .unwrap_or(UNKNOWN_TIER)
    }

    /// Nearest centroid in Euclidean distance; ties go to the lowest id
    pub fn predict(&self, scaled: &[f64]) -> Result<usize> {
        if scaled.len() != N_FEATURES {
            return Err(TierError::ShapeMismatch(format!(
                "feature vector must have exactly {} dimensions, got {}",
                N_FEATURES,
                scaled.len()
            )));
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_tier = 0;

        for (tier_id, centroid) in self.centroids.outer_iter().enumerate() {
            let distance: f64 = scaled
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            if distance < min_distance {
                min_distance = distance;
                closest_tier = tier_id;
            }
        }

        Ok(closest_tier)
    }
}

/// Result of a training run: the model plus per-row assignments
#[derive(Debug, Clone)]
pub struct TierFit {
    pub model: TierModel,
    /// Tier id of every training row, in input order
    pub labels: Array1<usize>,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
}

impl TierFit {
    /// Number of training rows per tier id
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.model.n_tiers()];
        for &label in self.labels.iter() {
            if label < sizes.len() {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// Fit the tier model on standardized features.
///
/// # Arguments
/// * `features` - Standardized feature matrix `(n_samples, 2)`
/// * `params` - K-Means hyperparameters; the seed makes refits reproducible
///
/// # Returns
/// * Fitted [`TierFit`], or `DegenerateTrainingData` when there are fewer
///   distinct observations than tiers
pub fn fit_tiers(features: &Array2<f64>, params: &TierParams) -> Result<TierFit> {
    if params.n_tiers == 0 {
        return Err(TierError::DegenerateTrainingData(
            "tier count must be positive".into(),
        ));
    }
    if features.ncols() != N_FEATURES {
        return Err(TierError::ShapeMismatch(format!(
            "feature matrix must have {} columns, got {}",
            N_FEATURES,
            features.ncols()
        )));
    }

    let distinct = count_distinct_rows(features);
    if distinct < params.n_tiers {
        return Err(TierError::DegenerateTrainingData(format!(
            "{} distinct observations cannot form {} tiers",
            distinct, params.n_tiers
        )));
    }

    let rng = StdRng::seed_from_u64(params.seed);
    let dataset = DatasetBase::from(features.clone());

    let kmeans = KMeans::params_with(params.n_tiers, rng, L2Dist)
        .max_n_iterations(params.max_iters)
        .tolerance(params.tolerance)
        .n_runs(params.n_runs)
        .fit(&dataset)?;

    let model = TierModel::from_centroids(kmeans.centroids().clone())?;

    let labels = features
        .outer_iter()
        .map(|row| model.predict(&row.to_vec()))
        .collect::<Result<Vec<usize>>>()?;
    let labels = Array1::from(labels);

    let fit = TierFit {
        inertia: compute_inertia(features, &labels, model.centroids()),
        model,
        labels,
    };

    if let Some(empty) = fit.cluster_sizes().iter().position(|&size| size == 0) {
        return Err(TierError::DegenerateTrainingData(format!(
            "tier {} has no observations",
            empty
        )));
    }

    Ok(fit)
}

/// Count distinct rows by exact bit pattern
fn count_distinct_rows(features: &Array2<f64>) -> usize {
    features
        .outer_iter()
        .map(|row| row.iter().map(|x| x.to_bits()).collect::<Vec<u64>>())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &tier) in labels.iter().enumerate() {
        if tier < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(tier);
            inertia += point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
        }
    }

    inertia
}
