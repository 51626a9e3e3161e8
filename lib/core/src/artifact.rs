//! The model artifact
//!
//! Everything needed to serve a trained model travels in one immutable bundle:
//! the schema, the index map, the frozen encodings, the learned parameters and
//! the training-time statistics that serving replays (imputation means,
//! normalization bounds, the anomaly score distribution).

use crate::algorithms::{Algorithm, AlgorithmClass, ModelParams};
use crate::encoding::Encodings;
use crate::index_map::IndexMap;
use crate::schema::{Feature, FeatureSchema};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Artifact layout version written by this build
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub format_version: u16,
    pub model_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub algorithm_name: String,
    pub algorithm_class: AlgorithmClass,
    pub features: FeatureSchema,
    pub response_variable: Option<String>,
    pub response_index: Option<usize>,
    pub encodings: Encodings,
    pub index_map: IndexMap,
    pub params: ModelParams,
    /// Inputs are min-max scaled with `summary.slot_min`/`slot_max`
    pub normalization: bool,
    pub normal_labels: Option<NormalLabels>,
    pub summary: ArtifactSummary,
}

/// Labels reported by anomaly models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalLabels {
    pub normal: String,
    pub anomaly: String,
}

impl Default for NormalLabels {
    fn default() -> Self {
        Self {
            normal: "normal".to_string(),
            anomaly: "anomaly".to_string(),
        }
    }
}

/// Training-time statistics kept with the model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArtifactSummary {
    /// Per-feature descriptive statistics, keyed `<feature>.<stat>`
    pub statistics: BTreeMap<String, String>,
    /// Mean of each trained slot, used for missing values
    pub slot_means: Vec<f64>,
    pub slot_min: Vec<f64>,
    pub slot_max: Vec<f64>,
    /// Anomaly scores of the training rows, ascending
    pub training_scores: Vec<f64>,
    pub min_percentile: Option<u32>,
    pub max_percentile: Option<u32>,
    pub best_percentile: Option<u32>,
}

impl ArtifactSummary {
    /// Nearest-rank percentile of the training score distribution.
    ///
    /// `percentile` must be in `(0, 100]`.
    pub fn score_threshold(&self, percentile: f64) -> Result<f64> {
        validate_percentile(percentile)?;
        if self.training_scores.is_empty() {
            return Err(Error::config(
                "model has no training score distribution to derive a threshold from",
            ));
        }
        let n = self.training_scores.len();
        let rank = (percentile * n as f64 / 100.0).ceil() as usize;
        Ok(self.training_scores[rank.clamp(1, n) - 1])
    }
}

pub fn validate_percentile(percentile: f64) -> Result<()> {
    if percentile.is_nan() || percentile <= 0.0 || percentile > 100.0 {
        return Err(Error::config(format!(
            "percentile must be in (0, 100], got {}",
            percentile
        )));
    }
    Ok(())
}

impl ModelArtifact {
    /// Assemble a new artifact with a fresh id and creation time
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        features: FeatureSchema,
        response_variable: Option<String>,
        encodings: Encodings,
        index_map: IndexMap,
        params: ModelParams,
        normalization: bool,
        normal_labels: Option<NormalLabels>,
        summary: ArtifactSummary,
    ) -> Result<Self> {
        let response_index = match &response_variable {
            Some(name) => Some(
                features
                    .get(name)
                    .ok_or_else(|| {
                        Error::config(format!("response variable '{}' is not in the schema", name))
                    })?
                    .index,
            ),
            None => None,
        };
        let algorithm = params.algorithm();
        let artifact = Self {
            format_version: FORMAT_VERSION,
            model_id: Uuid::new_v4(),
            created_at: Utc::now(),
            algorithm_name: algorithm.name().to_string(),
            algorithm_class: algorithm.class(),
            features,
            response_variable,
            response_index,
            encodings,
            index_map,
            params,
            normalization,
            normal_labels,
            summary,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Check the internal consistency of a built or freshly decoded artifact
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.index_map.validate(Some(self.features.width()))?;
        if let Some(response) = self.response_index {
            if self.index_map.position_of(response).is_some() {
                return Err(Error::config("response column is part of the trained inputs"));
            }
        }
        let algorithm: Algorithm = self.algorithm_name.parse()?;
        if algorithm != self.params.algorithm() {
            return Err(Error::config(format!(
                "algorithm name {} does not match parameters of {}",
                self.algorithm_name,
                self.params.algorithm()
            )));
        }
        let width = self.width();
        if self.params.input_width() != width {
            return Err(Error::SchemaSkew {
                expected: self.params.input_width(),
                actual: width,
            });
        }
        let slot_stats = [
            ("slot_means", self.summary.slot_means.len()),
            ("slot_min", self.summary.slot_min.len()),
            ("slot_max", self.summary.slot_max.len()),
        ];
        for (name, len) in slot_stats {
            if len != width {
                return Err(Error::config(format!(
                    "summary {} has {} entries, expected {}",
                    name, len, width
                )));
            }
        }
        Ok(())
    }

    /// Trained input width
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.index_map.width()
    }

    #[inline]
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.params.algorithm()
    }

    #[inline]
    #[must_use]
    pub fn is_anomaly_model(&self) -> bool {
        self.algorithm_class == AlgorithmClass::AnomalyDetection
    }

    /// Feature behind each trained slot, in slot order
    pub fn slot_features(&self) -> Vec<&Feature> {
        self.index_map
            .as_slice()
            .iter()
            .filter_map(|&original| self.features.by_index(original))
            .collect()
    }

    pub fn included_feature_names(&self) -> Vec<String> {
        self.slot_features()
            .into_iter()
            .map(|f| f.name.clone())
            .collect()
    }
}
