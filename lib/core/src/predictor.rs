//! Serving-time prediction
//!
//! A [`Predictor`] owns one loaded artifact and turns aligned rows into
//! scores. Values are already in trained-slot order, so no index translation
//! happens here: each slot is encoded, imputed and normalized exactly as it
//! was during training.

use crate::aligner::AlignedVector;
use crate::algorithms::AlgorithmClass;
use crate::artifact::{validate_percentile, ModelArtifact};
use crate::encoding::FrozenEncodings;
use crate::schema::is_missing;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Model output for one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    /// Decoded class label, when the model has one to report
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDecision {
    pub is_anomaly: bool,
    pub score: f64,
    pub threshold: f64,
    pub label: Option<String>,
}

/// How a batch reacts to a failing row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Stop at the first failing row and return its error
    #[default]
    FailBatch,
    /// Report a result for every row
    PerRow,
}

#[derive(Debug, Clone)]
struct Slot {
    feature: String,
    original_index: usize,
    categorical: bool,
}

#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: Arc<ModelArtifact>,
    encodings: FrozenEncodings,
    slots: Vec<Slot>,
}

impl Predictor {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        let encodings = artifact.encodings.freeze();
        let slots = artifact
            .index_map
            .as_slice()
            .iter()
            .map(|&original| Slot {
                feature: artifact
                    .features
                    .by_index(original)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| format!("column {}", original)),
                original_index: original,
                categorical: encodings.is_categorical(original),
            })
            .collect();
        Self {
            artifact,
            encodings,
            slots,
        }
    }

    #[inline]
    #[must_use]
    pub fn artifact(&self) -> &Arc<ModelArtifact> {
        &self.artifact
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.slots.len()
    }

    /// Convert an aligned row into the numeric input the model was trained on
    pub fn vectorize(&self, aligned: &AlignedVector) -> Result<Vec<f64>> {
        if aligned.width() != self.width() {
            return Err(Error::SchemaSkew {
                expected: self.width(),
                actual: aligned.width(),
            });
        }
        let summary = &self.artifact.summary;

        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let value = match aligned.get(i).map(str::trim) {
                    Some(raw) if !is_missing(raw) => self.convert(slot, raw)?,
                    _ => summary.slot_means[i],
                };
                if !self.artifact.normalization {
                    return Ok(value);
                }
                let range = summary.slot_max[i] - summary.slot_min[i];
                Ok(if range > 0.0 {
                    (value - summary.slot_min[i]) / range
                } else {
                    0.0
                })
            })
            .collect()
    }

    fn convert(&self, slot: &Slot, raw: &str) -> Result<f64> {
        if slot.categorical {
            return self
                .encodings
                .encode(slot.original_index, &slot.feature, raw)
                .map(f64::from);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(Error::InvalidValue {
                feature: slot.feature.clone(),
                value: raw.to_string(),
            }),
        }
    }

    pub fn predict(&self, aligned: &AlignedVector) -> Result<Score> {
        let input = self.vectorize(aligned)?;
        let value = self.artifact.params.predict(&input)?;
        Ok(Score {
            value,
            label: self.label_of(value),
        })
    }

    fn label_of(&self, value: f64) -> Option<String> {
        if self.artifact.algorithm_class != AlgorithmClass::Classification {
            return None;
        }
        let response = self.artifact.response_index?;
        self.encodings
            .decode(response, value as u32)
            .map(str::to_string)
    }

    /// Score every row, in input order.
    ///
    /// With [`BatchPolicy::FailBatch`] the first failing row aborts the batch
    /// and its error carries the row index; with [`BatchPolicy::PerRow`] every
    /// row gets its own result.
    pub fn predict_batch(
        &self,
        rows: &[AlignedVector],
        policy: BatchPolicy,
    ) -> Result<Vec<Result<Score>>> {
        let mut results = Vec::with_capacity(rows.len());
        for (row, aligned) in rows.iter().enumerate() {
            let result = self.predict(aligned).map_err(|e| e.at_row(row));
            match (policy, result) {
                (BatchPolicy::FailBatch, Err(e)) => return Err(e),
                (_, result) => results.push(result),
            }
        }
        Ok(results)
    }

    /// Compare a raw anomaly score against the training distribution.
    ///
    /// The percentile is checked before anything else.
    pub fn classify(&self, score: f64, percentile: f64) -> Result<AnomalyDecision> {
        validate_percentile(percentile)?;
        if !self.artifact.is_anomaly_model() {
            return Err(Error::config(format!(
                "{} is not an anomaly detection model",
                self.artifact.algorithm_name
            )));
        }
        let threshold = self.artifact.summary.score_threshold(percentile)?;
        Ok(self.decide(score, threshold))
    }

    fn decide(&self, score: f64, threshold: f64) -> AnomalyDecision {
        let is_anomaly = score > threshold;
        let label = self.artifact.normal_labels.as_ref().map(|labels| {
            if is_anomaly {
                labels.anomaly.clone()
            } else {
                labels.normal.clone()
            }
        });
        AnomalyDecision {
            is_anomaly,
            score,
            threshold,
            label,
        }
    }
}

/// Anomaly decisions at a fixed percentile.
///
/// The threshold is derived once, so invalid percentiles fail at construction
/// before any row is scored.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    predictor: Predictor,
    percentile: f64,
    threshold: f64,
}

impl AnomalyScorer {
    pub fn new(predictor: Predictor, percentile: f64) -> Result<Self> {
        let threshold = predictor.classify(0.0, percentile)?.threshold;
        Ok(Self {
            predictor,
            percentile,
            threshold,
        })
    }

    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[inline]
    #[must_use]
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn score(&self, aligned: &AlignedVector) -> Result<AnomalyDecision> {
        let raw = self.predictor.predict(aligned)?.value;
        Ok(self.predictor.decide(raw, self.threshold))
    }

    pub fn score_batch(
        &self,
        rows: &[AlignedVector],
        policy: BatchPolicy,
    ) -> Result<Vec<Result<AnomalyDecision>>> {
        let mut results = Vec::with_capacity(rows.len());
        for (row, aligned) in rows.iter().enumerate() {
            let result = self.score(aligned).map_err(|e| e.at_row(row));
            match (policy, result) {
                (BatchPolicy::FailBatch, Err(e)) => return Err(e),
                (_, result) => results.push(result),
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{KMeansModel, LogisticModel, ModelParams};
    use crate::artifact::{ArtifactSummary, NormalLabels};
    use crate::encoding::EncodingsBuilder;
    use crate::index_map::IndexMap;
    use crate::schema::{Feature, FeatureSchema};

    fn anomaly_artifact() -> Arc<ModelArtifact> {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("x", 0),
            Feature::categorical("color", 1),
        ]);
        let mut builder = EncodingsBuilder::new([1]);
        for row in [["0", "red"], ["0", "green"], ["0", "blue"]] {
            builder.observe(&row);
        }
        let index_map = IndexMap::from_schema(&schema, None).unwrap();
        let params = ModelParams::AnomalyDetection(KMeansModel {
            centroids: vec![vec![0.0, 0.0]],
        });
        let summary = ArtifactSummary {
            slot_means: vec![5.0, 1.0],
            slot_min: vec![0.0, 0.0],
            slot_max: vec![10.0, 2.0],
            training_scores: (1..=100).map(f64::from).collect(),
            ..Default::default()
        };
        Arc::new(
            ModelArtifact::new(
                schema,
                None,
                builder.build(),
                index_map,
                params,
                false,
                Some(NormalLabels::default()),
                summary,
            )
            .unwrap(),
        )
    }

    fn classifier_artifact() -> Arc<ModelArtifact> {
        let schema = FeatureSchema::new(vec![
            Feature::numerical("x", 0),
            Feature::categorical("outcome", 1),
        ]);
        let mut builder = EncodingsBuilder::new([1]);
        builder.observe(&["1", "no"]);
        builder.observe(&["9", "yes"]);
        let index_map = IndexMap::from_schema(&schema, Some(1)).unwrap();
        let params = ModelParams::LogisticRegression(LogisticModel {
            weights: vec![1.0],
            intercept: -5.0,
            threshold: 0.5,
        });
        let summary = ArtifactSummary {
            slot_means: vec![5.0],
            slot_min: vec![1.0],
            slot_max: vec![9.0],
            ..Default::default()
        };
        Arc::new(
            ModelArtifact::new(
                schema,
                Some("outcome".to_string()),
                builder.build(),
                index_map,
                params,
                false,
                None,
                summary,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_width_mismatch_is_schema_skew() {
        let predictor = Predictor::new(anomaly_artifact());
        let result = predictor.predict(&AlignedVector::from_values(["1"]));
        assert!(matches!(
            result,
            Err(Error::SchemaSkew {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_categorical_and_missing_slots() {
        let predictor = Predictor::new(anomaly_artifact());
        let input = predictor
            .vectorize(&AlignedVector::new(vec![None, Some("blue".to_string())]))
            .unwrap();
        assert_eq!(input, vec![5.0, 2.0]);

        let input = predictor
            .vectorize(&AlignedVector::new(vec![Some("3".to_string()), Some("NA".to_string())]))
            .unwrap();
        assert_eq!(input, vec![3.0, 1.0]);
    }

    #[test]
    fn test_unseen_category_rejected() {
        let predictor = Predictor::new(anomaly_artifact());
        let result = predictor.predict(&AlignedVector::from_values(["1", "purple"]));
        assert!(matches!(result, Err(Error::UnseenCategory { row: None, .. })));
    }

    #[test]
    fn test_invalid_numeric_value() {
        let predictor = Predictor::new(anomaly_artifact());
        let result = predictor.predict(&AlignedVector::from_values(["abc", "red"]));
        assert!(matches!(result, Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn test_percentile_bounds() {
        let predictor = Predictor::new(anomaly_artifact());
        assert!(matches!(
            predictor.classify(1.0, 0.0),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            predictor.classify(1.0, 101.0),
            Err(Error::Configuration(_))
        ));
        let decision = predictor.classify(100.5, 100.0).unwrap();
        assert_eq!(decision.threshold, 100.0);
        assert!(decision.is_anomaly);
        assert_eq!(decision.label.as_deref(), Some("anomaly"));
    }

    #[test]
    fn test_scorer_threshold() {
        let scorer = AnomalyScorer::new(Predictor::new(anomaly_artifact()), 95.0).unwrap();
        assert_eq!(scorer.threshold(), 95.0);

        let near = scorer.score(&AlignedVector::from_values(["3", "green"])).unwrap();
        assert!(!near.is_anomaly);
        assert_eq!(near.label.as_deref(), Some("normal"));

        let far = scorer.score(&AlignedVector::from_values(["500", "red"])).unwrap();
        assert!(far.is_anomaly);
        assert!(AnomalyScorer::new(Predictor::new(anomaly_artifact()), 0.0).is_err());
    }

    #[test]
    fn test_classify_requires_anomaly_model() {
        let predictor = Predictor::new(classifier_artifact());
        assert!(predictor.classify(1.0, 50.0).is_err());
    }

    #[test]
    fn test_decodes_class_label() {
        let predictor = Predictor::new(classifier_artifact());
        let low = predictor.predict(&AlignedVector::from_values(["1"])).unwrap();
        let high = predictor.predict(&AlignedVector::from_values(["9"])).unwrap();
        assert_eq!(low.label.as_deref(), Some("no"));
        assert_eq!(high.label.as_deref(), Some("yes"));
    }

    #[test]
    fn test_batch_policies() {
        let predictor = Predictor::new(anomaly_artifact());
        let rows = vec![
            AlignedVector::from_values(["1", "red"]),
            AlignedVector::from_values(["1", "purple"]),
            AlignedVector::from_values(["2", "green"]),
        ];

        let err = predictor
            .predict_batch(&rows, BatchPolicy::FailBatch)
            .unwrap_err();
        assert!(matches!(err, Error::UnseenCategory { row: Some(1), .. }));

        let results = predictor.predict_batch(&rows, BatchPolicy::PerRow).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_normalization_replays_bounds() {
        let mut artifact = (*anomaly_artifact()).clone();
        artifact.normalization = true;
        let predictor = Predictor::new(Arc::new(artifact));
        let input = predictor
            .vectorize(&AlignedVector::from_values(["5", "green"]))
            .unwrap();
        assert_eq!(input, vec![0.5, 0.5]);
    }
}
