//! K-means clustering over standardized customer features.
//!
//! Fitting is delegated to `linfa-clustering` (k-means++ initialization,
//! Euclidean distance) driven by a fixed-seed RNG so the same upload always
//! yields the same segments. Cluster ids are arbitrary labels with no
//! ordering.

use campaign_core::{CampaignError, CampaignResult};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct KMeansParams {
    pub n_clusters: usize,
    pub max_iterations: u64,
    pub tolerance: f64,
    /// Independent initializations; the lowest-inertia run wins.
    pub n_runs: usize,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            max_iterations: 300,
            tolerance: 1e-4,
            n_runs: 10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansModel {
    pub centroids: Array2<f64>,
    /// Cluster id per input row.
    pub labels: Vec<usize>,
    /// Within-cluster sum of squares.
    pub inertia: f64,
}

/// Fit k-means on already-scaled rows.
pub fn fit(params: &KMeansParams, data: &Array2<f64>) -> CampaignResult<KMeansModel> {
    if params.n_clusters == 0 {
        return Err(CampaignError::Config(
            "k-means needs at least one cluster".to_string(),
        ));
    }
    if data.nrows() < params.n_clusters {
        return Err(CampaignError::DegenerateInput(format!(
            "{} customers cannot be split into {} segments",
            data.nrows(),
            params.n_clusters
        )));
    }
    let distinct = distinct_rows(data);
    if distinct < params.n_clusters {
        return Err(CampaignError::DegenerateInput(format!(
            "only {distinct} distinct customer profiles; {} segments requested",
            params.n_clusters
        )));
    }

    let rng = StdRng::seed_from_u64(params.seed);
    let dataset = Dataset::new(data.clone(), Array1::<usize>::zeros(data.nrows()));
    let model = KMeans::params_with(params.n_clusters, rng, L2Dist)
        .n_runs(params.n_runs)
        .max_n_iterations(params.max_iterations)
        .tolerance(params.tolerance)
        .fit(&dataset)
        .map_err(|e| CampaignError::Internal(anyhow::anyhow!("k-means fit failed: {e}")))?;

    let labels: Array1<usize> = model.predict(data);
    let centroids = model.centroids().clone();
    let inertia = data
        .outer_iter()
        .zip(labels.iter())
        .map(|(row, &label)| squared_distance(row, centroids.row(label)))
        .sum();

    debug!(
        clusters = params.n_clusters,
        rows = data.nrows(),
        inertia,
        "K-means fitted"
    );

    Ok(KMeansModel {
        centroids,
        labels: labels.to_vec(),
        inertia,
    })
}

fn distinct_rows(data: &Array2<f64>) -> usize {
    data.outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
