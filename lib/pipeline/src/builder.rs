//! Model building
//!
//! Runs the whole training pipeline over a delimited dataset and assembles the
//! resulting [`ModelArtifact`]. The parallel stages (tokenizing, filtering,
//! selection, encoding, imputation, vectorization) only ever apply state that
//! was computed in a single sequential pass beforehand.

use crate::config::TrainingConfig;
use crate::encoder::Encoder;
use crate::imputation::MeanImputer;
use crate::selector::FeatureSelector;
use crate::tokenizer::{RowFilter, Tokenizer};
use crate::vectorizer::{MinMaxScaler, Vectorizer};
use modelbridge_core::{
    is_missing, Algorithm, ArtifactSummary, Dataset, Error, FeatureSchema, ModelArtifact,
    ModelParams, NormalLabels, Result,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Evaluation of a freshly trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// `mse`, `accuracy`, `cost` or `rmse`
    pub name: String,
    pub value: f64,
    /// Whether the metric was measured on held-out rows rather than the training rows
    pub held_out: bool,
}

/// Human-facing report of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub algorithm: String,
    pub features: Vec<String>,
    pub total_rows: usize,
    pub dropped_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metric: Option<Metric>,
    pub best_percentile: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub summary: ModelSummary,
}

#[derive(Debug, Clone)]
pub struct ModelBuilder {
    config: TrainingConfig,
}

impl ModelBuilder {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn build_from_path(&self, path: impl AsRef<Path>) -> Result<TrainedModel> {
        let text = std::fs::read_to_string(path.as_ref())?;
        self.build(&text)
    }

    /// Train on the delimited `text`
    pub fn build(&self, text: &str) -> Result<TrainedModel> {
        let config = &self.config;
        let algorithm = config.algorithm()?;
        let schema = &config.schema;
        let response_index = config.response_index()?;

        let rows = Tokenizer::new(config.format, config.header).tokenize(text)?;
        let total_rows = rows.len();
        let (rows, dropped_rows) = RowFilter::new(schema, response_index).apply(rows);
        if rows.is_empty() {
            return Err(Error::Training(format!(
                "no usable rows out of {} after filtering",
                total_rows
            )));
        }

        let selector = FeatureSelector::new(schema, response_index)?;
        let index_map = selector.index_map();
        let encoder = Encoder::fit(schema, index_map, response_index, &rows);
        let selected = selector.select_all(&rows);
        let missing = missing_counts(&selected.iter().map(|r| &r.features[..]).collect::<Vec<_>>());
        let responses: Vec<Option<String>> = selected.iter().map(|r| r.response.clone()).collect();

        let mut encoded = encoder.encode_all(&selected)?;
        let imputer = MeanImputer::fit(schema, index_map, &encoded);
        imputer.impute_all(&mut encoded);

        let vectorizer = Vectorizer::new(schema, index_map);
        let mut dataset = vectorizer.vectorize_all(&encoded, algorithm.is_supervised())?;
        let scaler = MinMaxScaler::fit(&dataset);
        if config.normalization {
            scaler.apply(&mut dataset);
        }

        let (train_idx, test_idx) = split(dataset.len(), config.train_fraction, config.seed);
        let train = subset(&dataset, &train_idx);
        let test = subset(&dataset, &test_idx);
        debug!(
            "Training {} on {} rows, holding out {}",
            algorithm,
            train.len(),
            test.len()
        );

        let params = algorithm.train(&train, &config.hyper_parameters, config.seed)?;
        let eval = if test.is_empty() { &train } else { &test };
        let metric = evaluate(&params, eval).map(|(name, value)| Metric {
            name: name.to_string(),
            value,
            held_out: !test.is_empty(),
        });

        let feature_names: Vec<String> = index_map
            .as_slice()
            .iter()
            .filter_map(|&i| schema.by_index(i).map(|f| f.name.clone()))
            .collect();
        let mut summary = ArtifactSummary {
            statistics: statistics(schema, &feature_names, &imputer, &scaler, &missing, &encoder),
            slot_means: imputer.means().to_vec(),
            slot_min: scaler.min.clone(),
            slot_max: scaler.max.clone(),
            ..Default::default()
        };

        let mut normal_labels = None;
        if algorithm == Algorithm::AnomalyDetection {
            normal_labels = config.normal_labels.clone();
            let (min, max) = percentile_range(config)?;
            summary.training_scores = sorted_scores(&params, &train)?;
            summary.min_percentile = Some(min);
            summary.max_percentile = Some(max);
            if let Some(labels) = &normal_labels {
                let eval_idx = if test.is_empty() { &train_idx } else { &test_idx };
                let truth: Vec<Option<&str>> =
                    eval_idx.iter().map(|&i| responses[i].as_deref()).collect();
                summary.best_percentile =
                    best_percentile(&summary, &params, eval, &truth, labels, min, max)?;
            }
        }

        let best_percentile = summary.best_percentile;
        let artifact = ModelArtifact::new(
            schema.clone(),
            config.response_variable.clone(),
            encoder.encodings().clone(),
            index_map.clone(),
            params,
            config.normalization,
            normal_labels,
            summary,
        )?;

        info!(
            "Built {} model {} on {} rows ({} features, {} dropped)",
            algorithm,
            artifact.model_id,
            train.len(),
            feature_names.len(),
            dropped_rows
        );

        Ok(TrainedModel {
            artifact,
            summary: ModelSummary {
                algorithm: algorithm.name().to_string(),
                features: feature_names,
                total_rows,
                dropped_rows,
                train_rows: train.len(),
                test_rows: test.len(),
                metric,
                best_percentile,
            },
        })
    }
}

/// Seeded shuffle, then the first `fraction` of rows train and the rest test
fn split(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    if fraction >= 1.0 {
        return (indices, Vec::new());
    }
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train_len = ((n as f64 * fraction).round() as usize).clamp(1, n);
    let test = indices.split_off(train_len);
    (indices, test)
}

fn subset(dataset: &Dataset, indices: &[usize]) -> Dataset {
    Dataset {
        features: indices.iter().map(|&i| dataset.features[i].clone()).collect(),
        labels: dataset
            .labels
            .as_ref()
            .map(|labels| indices.iter().map(|&i| labels[i]).collect()),
    }
}

fn missing_counts(rows: &[&[String]]) -> Vec<usize> {
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut counts = vec![0; width];
    for row in rows {
        for (slot, value) in row.iter().enumerate() {
            if is_missing(value) {
                counts[slot] += 1;
            }
        }
    }
    counts
}

fn statistics(
    schema: &FeatureSchema,
    names: &[String],
    imputer: &MeanImputer,
    scaler: &MinMaxScaler,
    missing: &[usize],
    encoder: &Encoder,
) -> BTreeMap<String, String> {
    let mut stats = BTreeMap::new();
    for (slot, name) in names.iter().enumerate() {
        stats.insert(format!("{}.mean", name), imputer.means()[slot].to_string());
        stats.insert(format!("{}.min", name), scaler.min[slot].to_string());
        stats.insert(format!("{}.max", name), scaler.max[slot].to_string());
        stats.insert(
            format!("{}.missing", name),
            missing.get(slot).copied().unwrap_or(0).to_string(),
        );
    }
    for column in encoder.encodings().columns() {
        if let Some(feature) = schema.by_index(column.index) {
            stats.insert(format!("{}.unique", feature.name), column.len().to_string());
        }
    }
    stats
}

fn evaluate(params: &ModelParams, data: &Dataset) -> Option<(&'static str, f64)> {
    if data.is_empty() {
        return None;
    }
    let n = data.len() as f64;
    match (params, &data.labels) {
        (ModelParams::KMeans(m) | ModelParams::AnomalyDetection(m), _) => {
            Some(("cost", m.cost(&data.features)))
        }
        (ModelParams::LinearRegression(m), Some(labels)) => {
            let sse: f64 = data
                .features
                .par_iter()
                .zip(labels.par_iter())
                .map(|(x, y)| (m.predict(x) - y).powi(2))
                .sum();
            Some(("mse", sse / n))
        }
        (ModelParams::LogisticRegression(m), Some(labels)) => {
            let correct = data
                .features
                .par_iter()
                .zip(labels.par_iter())
                .filter(|(x, y)| m.predict_class(x) == **y)
                .count();
            Some(("accuracy", correct as f64 / n))
        }
        (ModelParams::CollaborativeFiltering(m), Some(_)) => m.rmse(data).map(|v| ("rmse", v)),
        _ => None,
    }
}

fn percentile_range(config: &TrainingConfig) -> Result<(u32, u32)> {
    let hyper = &config.hyper_parameters;
    let min = hyper.get_usize("min_percentile", 80)?;
    let max = hyper.get_usize("max_percentile", 100)?;
    if min == 0 || max > 100 || min > max {
        return Err(Error::config(format!(
            "percentile range must satisfy 0 < min <= max <= 100, got {}..{}",
            min, max
        )));
    }
    Ok((min as u32, max as u32))
}

fn sorted_scores(params: &ModelParams, data: &Dataset) -> Result<Vec<f64>> {
    let mut scores = data
        .features
        .par_iter()
        .map(|row| params.predict(row))
        .collect::<Result<Vec<f64>>>()?;
    scores.sort_by(|a, b| a.total_cmp(b));
    Ok(scores)
}

/// The percentile in `min..=max` whose threshold best agrees with the labelled rows
fn best_percentile(
    summary: &ArtifactSummary,
    params: &ModelParams,
    data: &Dataset,
    truth: &[Option<&str>],
    labels: &NormalLabels,
    min: u32,
    max: u32,
) -> Result<Option<u32>> {
    let scores = data
        .features
        .iter()
        .map(|row| params.predict(row))
        .collect::<Result<Vec<f64>>>()?;
    let labelled: Vec<(f64, bool)> = scores
        .into_iter()
        .zip(truth)
        .filter_map(|(score, label)| label.map(|l| (score, l == labels.anomaly)))
        .collect();
    if labelled.is_empty() {
        return Ok(None);
    }

    let mut best: Option<(u32, usize)> = None;
    for percentile in min..=max {
        let threshold = summary.score_threshold(f64::from(percentile))?;
        let correct = labelled
            .iter()
            .filter(|(score, anomalous)| (*score > threshold) == *anomalous)
            .count();
        if best.map_or(true, |(_, c)| correct > c) {
            best = Some((percentile, correct));
        }
    }
    Ok(best.map(|(p, _)| p))
}
