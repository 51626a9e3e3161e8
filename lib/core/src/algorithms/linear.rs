//! Linear and logistic regression backed by `linfa-linear` and `linfa-logistic`.
//!
//! The fitted coefficients are copied out of the linfa models so the artifact
//! only carries plain weights and an intercept.

use super::math::{dot, sigmoid};
use super::Dataset;
use crate::{Error, Result};
use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_linear::LinearRegression;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// Ordinary least squares. Constant columns get a zero weight.
    pub fn fit(dataset: &Dataset) -> Result<Self> {
        let records = dataset.records()?;
        let targets = dataset.targets()?;

        let varying = varying_columns(dataset);
        if varying.is_empty() {
            let mean = targets.mean().unwrap_or(0.0);
            return Ok(Self {
                weights: vec![0.0; dataset.width()],
                intercept: mean,
            });
        }

        let fitted = LinearRegression::new()
            .fit(&DatasetBase::new(records.select(Axis(1), &varying), targets))
            .map_err(|e| Error::Training(format!("linear regression failed: {}", e)))?;

        let mut weights = vec![0.0; dataset.width()];
        for (&column, &w) in varying.iter().zip(fitted.params()) {
            weights[column] = w;
        }
        check_finite(&weights, fitted.intercept())?;
        Ok(Self {
            weights,
            intercept: fitted.intercept(),
        })
    }

    #[inline]
    pub fn predict(&self, input: &[f64]) -> f64 {
        dot(&self.weights, input) + self.intercept
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub intercept: f64,
    /// Probability at or above which the positive class is predicted
    pub threshold: f64,
}

impl LogisticModel {
    /// Labels must be 0 or 1 and both classes must occur.
    pub fn fit(dataset: &Dataset, iterations: usize, l2: f64) -> Result<Self> {
        if !(l2 >= 0.0 && l2.is_finite()) {
            return Err(Error::config(format!(
                "reg_parameter must be non-negative, got {}",
                l2
            )));
        }
        let classes = dataset
            .labels()?
            .iter()
            .map(|&y| match y {
                y if y == 0.0 => Ok(0usize),
                y if y == 1.0 => Ok(1usize),
                y => Err(Error::Training(format!(
                    "logistic regression needs binary labels, found {}",
                    y
                ))),
            })
            .collect::<Result<Array1<usize>>>()?;

        let fitted = LogisticRegression::default()
            .alpha(l2)
            .max_iterations(iterations.max(1) as u64)
            .fit(&DatasetBase::new(dataset.records()?, classes))
            .map_err(|e| Error::Training(format!("logistic regression failed: {}", e)))?;

        // linfa picks which class is positive; store weights for class 1
        let sign = if fitted.labels().pos.class == 1 { 1.0 } else { -1.0 };
        let weights: Vec<f64> = fitted.params().iter().map(|w| sign * w).collect();
        let intercept = sign * fitted.intercept();
        check_finite(&weights, intercept)?;
        Ok(Self {
            weights,
            intercept,
            threshold: 0.5,
        })
    }

    #[inline]
    pub fn probability(&self, input: &[f64]) -> f64 {
        sigmoid(dot(&self.weights, input) + self.intercept)
    }

    #[inline]
    pub fn predict_class(&self, input: &[f64]) -> f64 {
        if self.probability(input) >= self.threshold {
            1.0
        } else {
            0.0
        }
    }
}

fn varying_columns(dataset: &Dataset) -> Vec<usize> {
    (0..dataset.width())
        .filter(|&column| {
            let first = dataset.features[0][column];
            dataset.features.iter().any(|row| row[column] != first)
        })
        .collect()
}

fn check_finite(weights: &[f64], intercept: f64) -> Result<()> {
    if weights.iter().all(|w| w.is_finite()) && intercept.is_finite() {
        Ok(())
    } else {
        Err(Error::Training(
            "fitted coefficients are not finite".to_string(),
        ))
    }
}
