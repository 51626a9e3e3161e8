//! Matrix factorization by explicit alternating least squares.
//!
//! Rows are `[user, product]` with the rating as label. User and product ids
//! must be non-negative integers.

use super::math::dot;
use super::Dataset;
use crate::{Error, Result};
use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorModel {
    pub rank: usize,
    pub user_factors: BTreeMap<u64, Vec<f64>>,
    pub product_factors: BTreeMap<u64, Vec<f64>>,
}

type Ratings = BTreeMap<u64, Vec<(u64, f64)>>;

impl FactorModel {
    pub fn fit(
        dataset: &Dataset,
        rank: usize,
        iterations: usize,
        lambda: f64,
        seed: u64,
    ) -> Result<Self> {
        if rank == 0 {
            return Err(Error::config("rank must be at least 1"));
        }
        if dataset.width() != 2 {
            return Err(Error::Training(format!(
                "collaborative filtering expects [user, product] rows, got {} columns",
                dataset.width()
            )));
        }
        let labels = dataset.labels()?;

        let mut by_user: Ratings = BTreeMap::new();
        let mut by_product: Ratings = BTreeMap::new();
        for (row, &rating) in dataset.features.iter().zip(labels) {
            let user = to_id("user", row[0])?;
            let product = to_id("product", row[1])?;
            by_user.entry(user).or_default().push((product, rating));
            by_product.entry(product).or_default().push((user, rating));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let scale = 1.0 / (rank as f64).sqrt();
        let mut product_factors: BTreeMap<u64, Vec<f64>> = by_product
            .keys()
            .map(|&p| (p, (0..rank).map(|_| rng.random::<f64>() * scale).collect()))
            .collect();
        let mut user_factors = BTreeMap::new();

        for _ in 0..iterations.max(1) {
            user_factors = solve_side(&by_user, &product_factors, rank, lambda)?;
            product_factors = solve_side(&by_product, &user_factors, rank, lambda)?;
        }

        Ok(Self {
            rank,
            user_factors,
            product_factors,
        })
    }

    pub fn predict(&self, user: u64, product: u64) -> Result<f64> {
        let u = self.user_factors.get(&user).ok_or_else(|| Error::InvalidValue {
            feature: "user".to_string(),
            value: user.to_string(),
        })?;
        let p = self
            .product_factors
            .get(&product)
            .ok_or_else(|| Error::InvalidValue {
                feature: "product".to_string(),
                value: product.to_string(),
            })?;
        Ok(dot(u, p))
    }

    pub(crate) fn predict_row(&self, input: &[f64]) -> Result<f64> {
        match input {
            [user, product] => self.predict(to_id("user", *user)?, to_id("product", *product)?),
            _ => Err(Error::SchemaSkew {
                expected: 2,
                actual: input.len(),
            }),
        }
    }

    /// Products with the highest predicted rating for `user`
    pub fn recommend_products(&self, user: u64, count: usize) -> Result<Vec<(u64, f64)>> {
        let u = self.user_factors.get(&user).ok_or_else(|| {
            Error::config(format!("invalid user id: {}", user))
        })?;
        Ok(top_n(&self.product_factors, u, count))
    }

    /// Users most likely to be interested in `product`
    pub fn recommend_users(&self, product: u64, count: usize) -> Result<Vec<(u64, f64)>> {
        let p = self.product_factors.get(&product).ok_or_else(|| {
            Error::config(format!("invalid product id: {}", product))
        })?;
        Ok(top_n(&self.user_factors, p, count))
    }

    /// Root mean squared error over rated pairs; unknown ids are skipped
    pub fn rmse(&self, dataset: &Dataset) -> Option<f64> {
        let labels = dataset.labels.as_ref()?;
        let errors: Vec<f64> = dataset
            .features
            .iter()
            .zip(labels)
            .filter_map(|(row, y)| self.predict_row(row).ok().map(|p| (p - y) * (p - y)))
            .collect();
        if errors.is_empty() {
            return None;
        }
        Some((errors.iter().sum::<f64>() / errors.len() as f64).sqrt())
    }
}

fn to_id(kind: &str, value: f64) -> Result<u64> {
    if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
        return Err(Error::InvalidValue {
            feature: kind.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value as u64)
}

/// Solve the regularized least squares problem for every id on one side,
/// holding the other side's factors fixed.
fn solve_side(
    ratings: &Ratings,
    fixed: &BTreeMap<u64, Vec<f64>>,
    rank: usize,
    lambda: f64,
) -> Result<BTreeMap<u64, Vec<f64>>> {
    ratings
        .par_iter()
        .map(|(&id, rated)| solve_factor(rated, fixed, rank, lambda).map(|x| (id, x)))
        .collect()
}

/// Ridge solve as plain least squares: `sqrt(reg) * I` rows with zero targets
/// are stacked under the rated rows.
fn solve_factor(
    rated: &[(u64, f64)],
    fixed: &BTreeMap<u64, Vec<f64>>,
    rank: usize,
    lambda: f64,
) -> Result<Vec<f64>> {
    let n = rated.len();
    let mut records = Array2::<f64>::zeros((n + rank, rank));
    let mut targets = Array1::<f64>::zeros(n + rank);
    for (i, (other, rating)) in rated.iter().enumerate() {
        let factor = fixed.get(other).ok_or_else(|| {
            Error::Training(format!("no factor for id {}", other))
        })?;
        for (j, v) in factor.iter().enumerate() {
            records[[i, j]] = *v;
        }
        targets[i] = *rating;
    }
    let reg = (lambda * n as f64).max(1e-9).sqrt();
    for j in 0..rank {
        records[[n + j, j]] = reg;
    }

    let fitted = LinearRegression::new()
        .with_intercept(false)
        .fit(&DatasetBase::new(records, targets))
        .map_err(|e| Error::Training(format!("factor solve failed: {}", e)))?;
    Ok(fitted.params().to_vec())
}

fn top_n(candidates: &BTreeMap<u64, Vec<f64>>, factor: &[f64], count: usize) -> Vec<(u64, f64)> {
    let mut scored: Vec<(u64, f64)> = candidates
        .iter()
        .map(|(&id, f)| (id, dot(factor, f)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(count);
    scored
}
