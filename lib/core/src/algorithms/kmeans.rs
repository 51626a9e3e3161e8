//! K-means clustering backed by `linfa-clustering`
//!
//! Also backs anomaly detection, where the score of a point is its distance to
//! the nearest centroid.

use super::math::squared_distance;
use super::Dataset;
use crate::{Error, Result};
use ahash::AHashSet;
use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::Array1;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KMeansModel {
    pub centroids: Vec<Vec<f64>>,
}

impl KMeansModel {
    pub fn fit(dataset: &Dataset, k: usize, max_iterations: usize, seed: u64) -> Result<Self> {
        if k == 0 {
            return Err(Error::config("num_clusters must be at least 1"));
        }
        if dataset.is_empty() {
            return Err(Error::Training("k-means needs at least one row".to_string()));
        }
        // Seeding cannot place more centroids than there are distinct points
        let k = k.min(distinct_rows(&dataset.features));

        let records = dataset.records()?;
        let targets = Array1::from_elem(records.nrows(), ());
        let model = KMeans::params_with_rng(k, Xoshiro256Plus::seed_from_u64(seed))
            .max_n_iterations(max_iterations.max(1) as u64)
            .fit(&DatasetBase::new(records, targets))
            .map_err(|e| Error::Training(format!("k-means failed: {}", e)))?;

        let centroids = model
            .centroids()
            .outer_iter()
            .map(|c| c.to_vec())
            .collect();
        Ok(Self { centroids })
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn dim(&self) -> usize {
        self.centroids.first().map(Vec::len).unwrap_or(0)
    }

    /// Index of the nearest centroid and the Euclidean distance to it
    pub fn nearest(&self, point: &[f64]) -> (usize, f64) {
        let (index, sq) = nearest_index(&self.centroids, point);
        (index, sq.sqrt())
    }

    /// Sum of squared distances of every row to its nearest centroid
    pub fn cost(&self, data: &[Vec<f64>]) -> f64 {
        data.par_iter()
            .map(|row| nearest_index(&self.centroids, row).1)
            .sum()
    }
}

fn nearest_index(centroids: &[Vec<f64>], point: &[f64]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(c, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, f64::INFINITY))
}

fn distinct_rows(rows: &[Vec<f64>]) -> usize {
    rows.iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<AHashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Dataset {
        let mut data = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f64 * 0.01;
            data.push(vec![0.0 + jitter, 0.0 - jitter]);
            data.push(vec![10.0 - jitter, 10.0 + jitter]);
        }
        Dataset::unsupervised(data)
    }

    #[test]
    fn test_separates_blobs() {
        let data = two_blobs();
        let model = KMeansModel::fit(&data, 2, 50, 42).unwrap();
        assert_eq!(model.k(), 2);
        assert_eq!(model.dim(), 2);
        let (a, _) = model.nearest(&[0.0, 0.0]);
        let (b, _) = model.nearest(&[10.0, 10.0]);
        assert_ne!(a, b);
        assert!(model.cost(&data.features) < 1.0);
    }

    #[test]
    fn test_same_seed_same_model() {
        let data = two_blobs();
        let m1 = KMeansModel::fit(&data, 2, 50, 7).unwrap();
        let m2 = KMeansModel::fit(&data, 2, 50, 7).unwrap();
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_distance_to_nearest() {
        let model = KMeansModel {
            centroids: vec![vec![0.0, 0.0], vec![10.0, 0.0]],
        };
        let (index, distance) = model.nearest(&[7.0, 4.0]);
        assert_eq!(index, 1);
        assert!((distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_more_clusters_than_distinct_points() {
        let data = Dataset::unsupervised(vec![vec![1.0], vec![1.0], vec![1.0]]);
        let model = KMeansModel::fit(&data, 3, 10, 1).unwrap();
        assert_eq!(model.k(), 1);
        assert_eq!(model.centroids[0], vec![1.0]);
    }

    #[test]
    fn test_zero_clusters_rejected() {
        let data = Dataset::unsupervised(vec![vec![1.0]]);
        assert!(KMeansModel::fit(&data, 0, 10, 1).is_err());
    }
}
