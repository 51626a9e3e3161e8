//! Trainers
//!
//! A closed set of algorithm variants dispatched by name. Each trainer consumes
//! the preprocessed numeric [`Dataset`] and produces a [`ModelParams`] variant
//! that is embedded in the model artifact.

pub mod als;
pub mod kmeans;
pub mod linear;
mod math;

pub use als::FactorModel;
pub use kmeans::KMeansModel;
pub use linear::{LinearModel, LogisticModel};

use crate::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    KMeans,
    AnomalyDetection,
    LinearRegression,
    LogisticRegression,
    CollaborativeFiltering,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::KMeans,
        Algorithm::AnomalyDetection,
        Algorithm::LinearRegression,
        Algorithm::LogisticRegression,
        Algorithm::CollaborativeFiltering,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::KMeans => "K_MEANS",
            Algorithm::AnomalyDetection => "ANOMALY_DETECTION",
            Algorithm::LinearRegression => "LINEAR_REGRESSION",
            Algorithm::LogisticRegression => "LOGISTIC_REGRESSION",
            Algorithm::CollaborativeFiltering => "COLLABORATIVE_FILTERING",
        }
    }

    pub fn class(&self) -> AlgorithmClass {
        match self {
            Algorithm::KMeans => AlgorithmClass::Clustering,
            Algorithm::AnomalyDetection => AlgorithmClass::AnomalyDetection,
            Algorithm::LinearRegression => AlgorithmClass::Regression,
            Algorithm::LogisticRegression => AlgorithmClass::Classification,
            Algorithm::CollaborativeFiltering => AlgorithmClass::Recommendation,
        }
    }

    /// Whether training needs a response column
    pub fn is_supervised(&self) -> bool {
        matches!(
            self,
            Algorithm::LinearRegression
                | Algorithm::LogisticRegression
                | Algorithm::CollaborativeFiltering
        )
    }

    /// Train a model on `dataset`. Randomized steps draw from `seed`.
    pub fn train(
        &self,
        dataset: &Dataset,
        hyper: &HyperParameters,
        seed: u64,
    ) -> Result<ModelParams> {
        if dataset.is_empty() {
            return Err(Error::Training(format!(
                "{} cannot be trained on an empty dataset",
                self.name()
            )));
        }
        if self.is_supervised() && dataset.labels.is_none() {
            return Err(Error::Training(format!(
                "{} requires a response variable",
                self.name()
            )));
        }

        let params = match self {
            Algorithm::KMeans => ModelParams::KMeans(KMeansModel::fit(
                dataset,
                hyper.get_usize("num_clusters", 3)?,
                hyper.get_usize("max_iterations", 100)?,
                seed,
            )?),
            Algorithm::AnomalyDetection => ModelParams::AnomalyDetection(KMeansModel::fit(
                dataset,
                hyper.get_usize("num_clusters", 3)?,
                hyper.get_usize("max_iterations", 100)?,
                seed,
            )?),
            Algorithm::LinearRegression => ModelParams::LinearRegression(LinearModel::fit(dataset)?),
            Algorithm::LogisticRegression => ModelParams::LogisticRegression(LogisticModel::fit(
                dataset,
                hyper.get_usize("iterations", 100)?,
                hyper.get_f64("reg_parameter", 0.01)?,
            )?),
            Algorithm::CollaborativeFiltering => {
                ModelParams::CollaborativeFiltering(FactorModel::fit(
                    dataset,
                    hyper.get_usize("rank", 10)?,
                    hyper.get_usize("iterations", 10)?,
                    hyper.get_f64("lambda", 0.01)?,
                    seed,
                )?)
            }
        };
        Ok(params)
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Family of an algorithm, recorded in the artifact
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlgorithmClass {
    Clustering,
    AnomalyDetection,
    Regression,
    Classification,
    Recommendation,
}

/// Numeric training data: one row per example, in trained-slot order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Option<Vec<f64>>,
}

impl Dataset {
    pub fn unsupervised(features: Vec<Vec<f64>>) -> Self {
        Self {
            features,
            labels: None,
        }
    }

    pub fn supervised(features: Vec<Vec<f64>>, labels: Vec<f64>) -> Self {
        Self {
            features,
            labels: Some(labels),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn width(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }

    pub(crate) fn labels(&self) -> Result<&[f64]> {
        self.labels
            .as_deref()
            .ok_or_else(|| Error::Training("dataset has no labels".to_string()))
    }

    /// Features as an `n x width` matrix
    pub fn records(&self) -> Result<Array2<f64>> {
        let width = self.width();
        if let Some(row) = self.features.iter().find(|row| row.len() != width) {
            return Err(Error::SchemaSkew {
                expected: width,
                actual: row.len(),
            });
        }
        let flat: Vec<f64> = self.features.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.len(), width), flat)
            .map_err(|e| Error::Training(format!("invalid feature matrix: {}", e)))
    }

    pub(crate) fn targets(&self) -> Result<Array1<f64>> {
        Ok(Array1::from(self.labels()?.to_vec()))
    }
}

/// String-valued hyper-parameters, parsed on demand by each trainer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HyperParameters(pub BTreeMap<String, String>);

impl HyperParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        self.parse(key, default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64> {
        self.parse(key, default)
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.0.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::config(format!("hyper-parameter '{}' has invalid value '{}'", key, raw))
            }),
        }
    }
}

/// Learned parameters, one variant per algorithm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ModelParams {
    KMeans(KMeansModel),
    AnomalyDetection(KMeansModel),
    LinearRegression(LinearModel),
    LogisticRegression(LogisticModel),
    CollaborativeFiltering(FactorModel),
}

impl ModelParams {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ModelParams::KMeans(_) => Algorithm::KMeans,
            ModelParams::AnomalyDetection(_) => Algorithm::AnomalyDetection,
            ModelParams::LinearRegression(_) => Algorithm::LinearRegression,
            ModelParams::LogisticRegression(_) => Algorithm::LogisticRegression,
            ModelParams::CollaborativeFiltering(_) => Algorithm::CollaborativeFiltering,
        }
    }

    /// Input width the parameters were fitted on
    pub fn input_width(&self) -> usize {
        match self {
            ModelParams::KMeans(m) | ModelParams::AnomalyDetection(m) => m.dim(),
            ModelParams::LinearRegression(m) => m.weights.len(),
            ModelParams::LogisticRegression(m) => m.weights.len(),
            ModelParams::CollaborativeFiltering(_) => 2,
        }
    }

    /// Raw model output for one numeric input vector.
    ///
    /// Cluster index for k-means, distance to the nearest centroid for anomaly
    /// detection, the regression value, the predicted class (0 or 1) for
    /// logistic regression and the predicted rating for collaborative filtering.
    pub fn predict(&self, input: &[f64]) -> Result<f64> {
        match self {
            ModelParams::KMeans(m) => Ok(m.nearest(input).0 as f64),
            ModelParams::AnomalyDetection(m) => Ok(m.nearest(input).1),
            ModelParams::LinearRegression(m) => Ok(m.predict(input)),
            ModelParams::LogisticRegression(m) => Ok(m.predict_class(input)),
            ModelParams::CollaborativeFiltering(m) => m.predict_row(input),
        }
    }
}
